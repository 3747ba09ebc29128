use anyhow::{anyhow, Context, Result};
use clap::Parser;
use csv_uploader::api::ApiClient;
use csv_uploader::app::CsvUploader;
use csv_uploader::config::{Cli, Config};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("csv-uploader-io")
        .build()
        .context("Failed to start async runtime")?;
    let client = ApiClient::new(&config.api_url, config.timeout)?;

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([640.0, 640.0])
            .with_min_inner_size([420.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "CSV Uploader",
        options,
        Box::new(move |cc| Box::new(CsvUploader::new(cc, runtime, client))),
    )
    .map_err(|e| anyhow!("Failed to run the UI: {}", e))
}
