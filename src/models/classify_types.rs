use crate::services::classifier::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categories the bundled gallery model was trained on, in output order.
pub const DEFAULT_LABELS: [&str; 5] = ["foods", "landscape", "people", "receipts", "screenshots"];

pub fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub ready: bool,
    pub backend: Option<BackendKind>,
    pub model_path: Option<String>,
    pub error: Option<String>,
}

/// Raw model output: arg-max index and the value at that index.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassifyResult {
    pub file_name: String,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct QuantizationParams {
    pub scale: f32,
    pub zero_point: i32,
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelInfo {
    pub backend: BackendKind,
    pub input_name: Option<String>,
    pub input_shape: Option<Vec<usize>>,
    pub input_type: Option<String>,
    pub quantization: Option<QuantizationParams>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelocateMode {
    Copy,
    #[default]
    Move,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub category_counts: BTreeMap<String, usize>,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
}
