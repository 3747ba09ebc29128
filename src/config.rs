use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Parser, Debug, Clone)]
#[command(name = "csv-uploader", version, about = "Upload, preview and download CSV files")]
pub struct Cli {
    /// Base URL of the upload service
    #[arg(long, env = "CSV_UPLOADER_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout in seconds (no timeout when omitted)
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let url = Url::parse(cli.api_url.trim())
            .with_context(|| format!("Invalid API URL: {}", cli.api_url))?;

        if !matches!(url.scheme(), "http" | "https") {
            bail!("API URL must use http or https, got {}", url.scheme());
        }
        if url.host_str().is_none() {
            bail!("API URL has no host: {}", cli.api_url);
        }

        let timeout = match cli.timeout_secs {
            Some(0) => bail!("--timeout-secs must be greater than zero"),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            api_url: url.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }
}
