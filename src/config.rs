//! Sorter settings, read from an optional JSON file.
//!
//! ```json
//! { "labels": ["foods", "landscape", "people", "receipts", "screenshots"],
//!   "relocate": "copy", "use_gpu": false, "intra_threads": 4, "input_size": 224 }
//! ```
//!
//! Instead of `labels`, a model's `config.json` style `id2label` map is also
//! accepted.

use crate::error::AppError;
use crate::models::classify_types::{default_labels, RelocateMode};
use crate::services::classifier::backend::ModelOptions;
use crate::services::classifier::inference::INPUT_SIZE;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    pub labels: Option<Vec<String>>,
    pub id2label: Option<HashMap<String, String>>,
    pub relocate: RelocateMode,
    pub use_gpu: bool,
    pub intra_threads: usize,
    pub input_size: u32,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            labels: None,
            id2label: None,
            relocate: RelocateMode::default(),
            use_gpu: false,
            intra_threads: 4,
            input_size: INPUT_SIZE,
        }
    }
}

impl SorterConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read config file {}", path.display()), e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let config: SorterConfig = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.input_size == 0 {
            return Err(AppError::Config("input_size must be positive".to_string()));
        }
        if self.intra_threads == 0 {
            return Err(AppError::Config("intra_threads must be positive".to_string()));
        }
        let labels = self.label_set()?;
        if labels.is_empty() {
            return Err(AppError::Config("label set is empty".to_string()));
        }
        Ok(())
    }

    /// Ordered label set: `labels`, then `id2label`, then the built-in set.
    pub fn label_set(&self) -> Result<Vec<String>, AppError> {
        if let Some(labels) = &self.labels {
            return Ok(labels.clone());
        }

        let Some(id2label) = &self.id2label else {
            return Ok(default_labels());
        };

        let mut indexed = id2label
            .iter()
            .map(|(k, v)| {
                k.parse::<usize>()
                    .map(|idx| (idx, v.clone()))
                    .map_err(|_| AppError::Config(format!("id2label key `{}` is not an index", k)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        indexed.sort_by_key(|(idx, _)| *idx);

        for (expected, (idx, _)) in indexed.iter().enumerate() {
            if *idx != expected {
                return Err(AppError::Config(format!("id2label is missing index {}", expected)));
            }
        }

        Ok(indexed.into_iter().map(|(_, label)| label).collect())
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            use_gpu: self.use_gpu,
            intra_threads: self.intra_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SorterConfig::from_json("{}").unwrap();
        assert_eq!(config.label_set().unwrap(), default_labels());
        assert_eq!(config.relocate, RelocateMode::Move);
        assert_eq!(config.input_size, 224);
        assert_eq!(config.model_options().intra_threads, 4);
    }

    #[test]
    fn id2label_is_ordered_by_index() {
        let config = SorterConfig::from_json(
            r#"{"id2label": {"1": "dogs", "0": "cats", "2": "birds"}, "relocate": "copy"}"#,
        )
        .unwrap();
        assert_eq!(config.label_set().unwrap(), vec!["cats", "dogs", "birds"]);
        assert_eq!(config.relocate, RelocateMode::Copy);
    }

    #[test]
    fn id2label_with_gaps_is_rejected() {
        let err = SorterConfig::from_json(r#"{"id2label": {"0": "cats", "2": "birds"}}"#).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(SorterConfig::from_json(r#"{"relocate": "teleport"}"#).is_err());
        assert!(SorterConfig::from_json(r#"{"input_size": 0}"#).is_err());
        assert!(SorterConfig::from_json(r#"{"labels": []}"#).is_err());
    }
}
