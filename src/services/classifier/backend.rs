//! Backend detection and dispatch.
//!
//! A model file is routed to one of three inference engines based on its
//! extension. Each engine wraps its own runtime and exposes the same
//! `predict(image) -> Prediction` call; [`LoadedModel`] dispatches to it.

use crate::error::AppError;
use crate::models::classify_types::{ModelInfo, Prediction};
#[cfg(feature = "keras")]
use crate::services::classifier::keras::KerasModel;
#[cfg(feature = "onnx")]
use crate::services::classifier::onnx::OnnxModel;
use crate::services::classifier::tflite::TfliteModel;
use ndarray::Array3;
use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const SUPPORTED_EXTENSIONS: &[&str] = &[".keras", ".h5", ".tflite", ".onnx"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BackendKind {
    /// Keras saved model (`.keras`, `.h5`).
    FullRuntime,
    /// TensorFlow Lite flatbuffer (`.tflite`).
    MobileFormat,
    /// ONNX graph (`.onnx`).
    CrossFramework,
}

impl BackendKind {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "keras" | "h5" => Ok(BackendKind::FullRuntime),
            "tflite" => Ok(BackendKind::MobileFormat),
            "onnx" => Ok(BackendKind::CrossFramework),
            _ => Err(AppError::UnsupportedFormat {
                extension: if ext.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", ext)
                },
                supported: SUPPORTED_EXTENSIONS.join(", "),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::FullRuntime => "Keras",
            BackendKind::MobileFormat => "TFLite",
            BackendKind::CrossFramework => "ONNX",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runtime knobs shared by the backends that support them.
#[derive(Clone, Debug)]
pub struct ModelOptions {
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            use_gpu: false,
            intra_threads: 4,
        }
    }
}

pub enum LoadedModel {
    #[cfg(feature = "keras")]
    FullRuntime(KerasModel),
    MobileFormat(TfliteModel),
    #[cfg(feature = "onnx")]
    CrossFramework(OnnxModel),
}

impl LoadedModel {
    pub fn load(kind: BackendKind, path: &Path, options: &ModelOptions) -> Result<Self, AppError> {
        if !path.is_file() {
            return Err(AppError::ModelLoad {
                backend: kind.name(),
                path: path.to_path_buf(),
                message: "model file not found".to_string(),
            });
        }

        match kind {
            BackendKind::FullRuntime => load_full_runtime(path),
            BackendKind::MobileFormat => TfliteModel::load(path).map(LoadedModel::MobileFormat),
            BackendKind::CrossFramework => load_cross_framework(path, options),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "keras")]
            LoadedModel::FullRuntime(_) => BackendKind::FullRuntime,
            LoadedModel::MobileFormat(_) => BackendKind::MobileFormat,
            #[cfg(feature = "onnx")]
            LoadedModel::CrossFramework(_) => BackendKind::CrossFramework,
        }
    }

    pub fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError> {
        match self {
            #[cfg(feature = "keras")]
            LoadedModel::FullRuntime(model) => model.predict(image),
            LoadedModel::MobileFormat(model) => model.predict(image),
            #[cfg(feature = "onnx")]
            LoadedModel::CrossFramework(model) => model.predict(image),
        }
    }

    pub fn info(&self) -> ModelInfo {
        match self {
            #[cfg(feature = "keras")]
            LoadedModel::FullRuntime(model) => model.info(),
            LoadedModel::MobileFormat(model) => model.info(),
            #[cfg(feature = "onnx")]
            LoadedModel::CrossFramework(model) => model.info(),
        }
    }
}

#[cfg(feature = "keras")]
fn load_full_runtime(path: &Path) -> Result<LoadedModel, AppError> {
    KerasModel::load(path).map(LoadedModel::FullRuntime)
}

#[cfg(not(feature = "keras"))]
fn load_full_runtime(_path: &Path) -> Result<LoadedModel, AppError> {
    Err(AppError::MissingOptionalDependency {
        backend: BackendKind::FullRuntime.name(),
        dependency: "an embedded Python runtime with TensorFlow/Keras",
        remedy: "Rebuild with `--features keras` and install TensorFlow with: pip install tensorflow",
    })
}

#[cfg(feature = "onnx")]
fn load_cross_framework(path: &Path, options: &ModelOptions) -> Result<LoadedModel, AppError> {
    OnnxModel::load(path, options).map(LoadedModel::CrossFramework)
}

#[cfg(not(feature = "onnx"))]
fn load_cross_framework(_path: &Path, _options: &ModelOptions) -> Result<LoadedModel, AppError> {
    Err(AppError::MissingOptionalDependency {
        backend: BackendKind::CrossFramework.name(),
        dependency: "ONNX Runtime",
        remedy: "Rebuild with `--features onnx` to bundle ONNX Runtime.",
    })
}
