use std::fs;
use std::path::Path;

use mt_core::WriterConfig;

use crate::error::{Result, StoreError};

/// Parse a writer config from TOML text. Missing keys take their defaults.
pub fn parse_config(text: &str) -> Result<WriterConfig> {
    let config: WriterConfig =
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
    config
        .validate()
        .map_err(|e| StoreError::Config(e.to_string()))?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<WriterConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
    let config = parse_config(&text)?;
    tracing::info!(
        path = %path.display(),
        dataset = %config.dataset,
        max_slots = config.max_slots,
        min_quality = %config.min_quality,
        "loaded writer config"
    );
    Ok(config)
}

/// Render a config back to TOML, e.g. to record it alongside a dataset.
pub fn to_toml(config: &WriterConfig) -> Result<String> {
    toml::to_string(config).map_err(|e| StoreError::Config(e.to_string()))
}
