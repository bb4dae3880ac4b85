use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Model not loaded. Call load_model first.")]
    ModelNotLoaded,

    #[error("Unsupported model format: {extension}. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("The {backend} backend needs {dependency}, which is not available. {remedy}")]
    MissingOptionalDependency {
        backend: &'static str,
        dependency: &'static str,
        remedy: &'static str,
    },

    #[error("Failed to load {backend} model {}: {message}", path.display())]
    ModelLoad {
        backend: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown category `{0}`")]
    UnknownCategory(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Message(String),
}

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::io("I/O error", err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Message(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Message(msg.to_string())
    }
}
