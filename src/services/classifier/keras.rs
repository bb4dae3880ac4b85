//! Keras backend. Models are loaded and run by TensorFlow inside an embedded
//! Python interpreter, so the full saved graph (custom layers included) is
//! honoured.

use crate::error::AppError;
use crate::models::classify_types::{ModelInfo, Prediction};
use crate::services::classifier::backend::BackendKind;
use crate::services::classifier::inference::arg_max;
use ndarray::Array3;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::Path;

pub struct KerasModel {
    model: Py<PyAny>,
}

impl KerasModel {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        Python::with_gil(|py| {
            let keras = py.import_bound("keras").map_err(|_| AppError::MissingOptionalDependency {
                backend: BackendKind::FullRuntime.name(),
                dependency: "the `keras` Python package",
                remedy: "Install TensorFlow in the embedded interpreter with: pip install tensorflow",
            })?;

            let model = keras
                .getattr("models")
                .and_then(|models| models.call_method1("load_model", (path.to_string_lossy().as_ref(),)))
                .map_err(|e| AppError::ModelLoad {
                    backend: BackendKind::FullRuntime.name(),
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;

            Ok(Self {
                model: model.unbind(),
            })
        })
    }

    pub fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError> {
        let (h, w, c) = image.dim();
        let flat: Vec<f32> = image.iter().copied().collect();

        let values: Vec<f32> = Python::with_gil(|py| -> PyResult<Vec<f32>> {
            let np = py.import_bound("numpy")?;
            let batch = np
                .call_method1("asarray", (flat, "float32"))?
                .call_method1("reshape", ((1usize, h, w, c),))?;

            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("verbose", 0)?;
            let prediction = self.model.bind(py).call_method("predict", (batch,), Some(&kwargs))?;

            prediction.call_method0("flatten")?.call_method0("tolist")?.extract()
        })
        .map_err(|e| AppError::Inference(e.to_string()))?;

        arg_max(&values)
    }

    pub fn info(&self) -> ModelInfo {
        let input_shape = Python::with_gil(|py| {
            self.model
                .bind(py)
                .getattr("input_shape")
                .and_then(|shape| shape.extract::<Vec<Option<usize>>>())
                .ok()
                .map(|dims| dims.into_iter().map(|d| d.unwrap_or(1)).collect())
        });

        ModelInfo {
            backend: BackendKind::FullRuntime,
            input_name: None,
            input_shape,
            input_type: Some("f32".to_string()),
            quantization: None,
        }
    }
}
