use crate::error::AppError;
use crate::models::classify_types::{ModelInfo, Prediction};
use crate::services::classifier::backend::{BackendKind, ModelOptions};
use crate::services::classifier::inference::arg_max;
use ndarray::{Array3, Axis};
use ort::session::Session;
use ort::value::Value;
use std::path::Path;

pub struct OnnxModel {
    session: Session,
    input_name: String,
}

impl OnnxModel {
    pub fn load(path: &Path, options: &ModelOptions) -> Result<Self, AppError> {
        let load_err = |message: String| AppError::ModelLoad {
            backend: BackendKind::CrossFramework.name(),
            path: path.to_path_buf(),
            message,
        };

        let _ = ort::init().with_name("gallery-sorter").commit();

        let mut builder = Session::builder()
            .map_err(|e| load_err(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(options.intra_threads)
            .map_err(|e| load_err(format!("Failed to set intra threads: {}", e)))?;

        if options.use_gpu {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::DirectMLExecutionProvider::default().build(),
                    ort::execution_providers::CoreMLExecutionProvider::default().build(),
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(|e| load_err(format!("Failed to register GPU execution providers: {}", e)))?;
        } else {
            builder = builder
                .with_execution_providers([ort::execution_providers::CPUExecutionProvider::default().build()])
                .map_err(|e| load_err(format!("Failed to register CPU execution provider: {}", e)))?;
        }

        let session = builder
            .commit_from_file(path)
            .map_err(|e| load_err(format!("Failed to load ONNX model: {}", e)))?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| load_err("Model declares no inputs".to_string()))?;

        Ok(Self { session, input_name })
    }

    pub fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError> {
        let batch = image.clone().insert_axis(Axis(0));

        let input_tensor = Value::from_array(batch)
            .map_err(|e| AppError::Inference(format!("Failed to create tensor value: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| AppError::Inference(e.to_string()))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        arg_max(data)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            backend: BackendKind::CrossFramework,
            input_name: Some(self.input_name.clone()),
            input_shape: None,
            input_type: Some("f32".to_string()),
            quantization: None,
        }
    }
}
