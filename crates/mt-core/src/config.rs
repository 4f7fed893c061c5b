use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BUFFER_ROWS, DEFAULT_DATASET, DEFAULT_MAX_SLOTS};
use crate::error::{Result, WriterError};
use crate::quality::{Quality, SelectorCuts};

/// Settings for one muon table writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Table name in the output store
    pub dataset: String,
    /// Slots per event; muons past this rank are not written
    pub max_slots: usize,
    /// Lowest quality tier that passes selection
    pub min_quality: Quality,
    /// Rows buffered before they are pushed to the sink
    pub buffer_rows: usize,
    pub selector: SelectorCuts,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            max_slots: DEFAULT_MAX_SLOTS,
            min_quality: Quality::Medium,
            buffer_rows: DEFAULT_BUFFER_ROWS,
            selector: SelectorCuts::default(),
        }
    }
}

impl WriterConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.dataset) {
            return Err(WriterError::InvalidConfig(format!(
                "dataset name '{}' must be ASCII letters, digits or '_' and not start with a digit",
                self.dataset
            )));
        }
        if self.max_slots == 0 {
            return Err(WriterError::InvalidConfig("max_slots must be > 0".into()));
        }
        if self.buffer_rows == 0 {
            return Err(WriterError::InvalidConfig("buffer_rows must be > 0".into()));
        }
        Ok(())
    }
}

/// ASCII identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = WriterConfig::default();
        assert_eq!(config.dataset, "muons");
        assert_eq!(config.max_slots, 20);
        assert_eq!(config.min_quality, Quality::Medium);
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_slots() {
        let config = WriterConfig {
            max_slots: 0,
            ..WriterConfig::default()
        };
        assert!(matches!(config.validate(), Err(WriterError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_buffer() {
        let config = WriterConfig {
            buffer_rows: 0,
            ..WriterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_dataset_names() {
        for name in ["", "1muons", "mu-ons", "muons;drop", "μ"] {
            let config = WriterConfig {
                dataset: name.to_string(),
                ..WriterConfig::default()
            };
            assert!(config.validate().is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("muons"));
        assert!(is_identifier("_tight_muons2"));
        assert!(!is_identifier("2muons"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WriterConfig =
            serde_json::from_str(r#"{"max_slots": 4, "min_quality": "tight"}"#).unwrap();
        assert_eq!(config.max_slots, 4);
        assert_eq!(config.min_quality, Quality::Tight);
        assert_eq!(config.dataset, "muons");
        assert_eq!(config.buffer_rows, 1024);
    }
}
