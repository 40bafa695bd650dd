//! Data models: extraction records and pipeline configuration.

pub mod config;
pub mod record;
