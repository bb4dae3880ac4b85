//! The inference adapter: one loaded model, one label set, one predict call.

use crate::error::AppError;
use crate::models::classify_types::{default_labels, ClassifyResult, ModelInfo, ModelStatus, Prediction};
use crate::services::classifier::backend::{BackendKind, LoadedModel, ModelOptions};
use crate::services::classifier::inference::{self, INPUT_SIZE};
use ndarray::Array3;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Anything that can turn a normalized HWC image into a label index.
///
/// [`InferenceAdapter`] is the production implementation; the folder
/// processor only depends on this trait.
pub trait ImageClassifier {
    fn labels(&self) -> &[String];
    fn is_ready(&self) -> bool;
    /// Square side the image is resized to before `predict`.
    fn input_size(&self) -> u32 {
        INPUT_SIZE
    }
    fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError>;
}

pub struct InferenceAdapter {
    model: Option<LoadedModel>,
    model_path: Option<PathBuf>,
    labels: Vec<String>,
    options: ModelOptions,
    input_size: u32,
    error: Option<String>,
    cancel_flag: Arc<AtomicBool>,
}

impl Default for InferenceAdapter {
    fn default() -> Self {
        Self::new(default_labels(), ModelOptions::default())
    }
}

impl InferenceAdapter {
    pub fn new(labels: Vec<String>, options: ModelOptions) -> Self {
        Self {
            model: None,
            model_path: None,
            labels,
            options,
            input_size: INPUT_SIZE,
            error: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Loads a model, picking the backend from the file extension.
    ///
    /// An unsupported extension is rejected before anything changes. Any
    /// later failure leaves the adapter with no model loaded.
    pub fn load_model(&mut self, path: &Path) -> Result<BackendKind, AppError> {
        let kind = BackendKind::from_path(path)?;

        self.model = None;
        self.model_path = None;
        self.error = None;

        tracing::info!(backend = %kind, path = %path.display(), "Loading model");

        match LoadedModel::load(kind, path, &self.options) {
            Ok(model) => {
                self.model = Some(model);
                self.model_path = Some(path.to_path_buf());
                tracing::info!(backend = %kind, "Model ready");
                Ok(kind)
            }
            Err(e) => {
                tracing::error!(backend = %kind, "Error loading model: {}", e);
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.model.as_ref().map(LoadedModel::kind)
    }

    pub fn get_error(&self) -> Option<String> {
        self.error.clone()
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            ready: self.is_ready(),
            backend: self.backend(),
            model_path: self.model_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            error: self.get_error(),
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo, AppError> {
        self.model
            .as_ref()
            .map(LoadedModel::info)
            .ok_or(AppError::ModelNotLoaded)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError> {
        let model = self.model.as_mut().ok_or(AppError::ModelNotLoaded)?;
        model.predict(image)
    }

    /// Classifies one image file and resolves its label.
    pub fn classify_image(&mut self, path: &Path) -> Result<ClassifyResult, AppError> {
        if !self.is_ready() {
            return Err(AppError::ModelNotLoaded);
        }

        let tensor = inference::preprocess_image(path, self.input_size)?;
        let prediction = self.predict(&tensor)?;
        let label = label_for(&self.labels, prediction.class_index)?;

        Ok(ClassifyResult {
            file_name: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            label: label.to_string(),
            confidence: prediction.confidence,
        })
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    pub fn cancel_classification(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn reset_cancel_flag(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

impl ImageClassifier for InferenceAdapter {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn is_ready(&self) -> bool {
        InferenceAdapter::is_ready(self)
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError> {
        InferenceAdapter::predict(self, image)
    }
}

pub fn label_for(labels: &[String], class_index: usize) -> Result<&str, AppError> {
    labels.get(class_index).map(String::as_str).ok_or_else(|| {
        AppError::Inference(format!(
            "Model predicted class {} but only {} labels are configured",
            class_index,
            labels.len()
        ))
    })
}
