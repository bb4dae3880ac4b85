//! Classifies the photos in a folder with a pretrained CNN and sorts them into
//! category subfolders.
//!
//! A model is loaded through one of three backends picked by file extension
//! (Keras, TFLite or ONNX) and is then used through a single
//! [`InferenceAdapter::predict`] call. [`process_folder`] drives a whole run
//! and reports through a [`ClassifyObserver`].

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::SorterConfig;
pub use error::AppError;
pub use models::classify_types::{
    default_labels, ClassifyResult, ModelInfo, ModelStatus, Prediction, QuantizationParams, RelocateMode,
    RunSummary, DEFAULT_LABELS,
};
pub use services::classifier::adapter::{ImageClassifier, InferenceAdapter};
pub use services::classifier::backend::{BackendKind, ModelOptions, SUPPORTED_EXTENSIONS};
pub use services::classifier::events::{
    ChannelObserver, ClassifyEvent, ClassifyObserver, RecordingObserver,
};
pub use services::classifier::inference::{preprocess_image, INPUT_SIZE};
pub use services::classifier::processor::{process_folder, ProcessOptions};
pub use services::converter::{
    default_output_path, write_raw_batches, ExportFormat, RepresentativeDataset, SizeReport,
    DEFAULT_CALIBRATION_SAMPLES,
};
