//! Desktop client for a CSV upload service.
//!
//! Files are uploaded concurrently with per-file progress, then listed,
//! previewed and downloaded through the service's HTTP API.

pub mod api;
pub mod app;
pub mod config;
pub mod files;
pub mod preview;
pub mod upload;
pub mod utils;
