//! TensorFlow Lite backend, executed by tract.
//!
//! Models produced by the quantizing exporter declare 8-bit integer inputs
//! with a `(scale, zero_point)` pair. Float images are rescaled into that
//! integer domain before they are fed to the plan.

use crate::error::AppError;
use crate::models::classify_types::{ModelInfo, Prediction, QuantizationParams};
use crate::services::classifier::backend::BackendKind;
use crate::services::classifier::inference::{arg_max, resize_tensor};
use ndarray::Array3;
use std::path::Path;
use tract_tflite::prelude::*;

type TflitePlan = TypedRunnableModel<TypedModel>;

pub struct TfliteModel {
    plan: TflitePlan,
    input_type: DatumType,
    input_shape: Option<Vec<usize>>,
}

impl TfliteModel {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let load_err = |e: TractError| AppError::ModelLoad {
            backend: BackendKind::MobileFormat.name(),
            path: path.to_path_buf(),
            message: format!("{:#}", e),
        };

        let model = tract_tflite::tflite().model_for_path(path).map_err(load_err)?;
        let fact = model.input_fact(0).map_err(load_err)?.clone();
        let input_shape = fact.shape.as_concrete().map(|dims| dims.to_vec());

        let plan = model
            .into_optimized()
            .and_then(|m| m.into_runnable())
            .map_err(load_err)?;

        tracing::debug!(
            input_type = ?fact.datum_type,
            input_shape = ?input_shape,
            "TFLite interpreter ready"
        );

        Ok(Self {
            plan,
            input_type: fact.datum_type,
            input_shape,
        })
    }

    /// Quantization of the input tensor, if the model expects 8-bit integers.
    pub fn input_quantization(&self) -> Option<QuantizationParams> {
        input_quantization(self.input_type)
    }

    /// Spatial size the model declares for its NHWC input.
    fn expected_hw(&self) -> Option<(usize, usize)> {
        match self.input_shape.as_deref() {
            Some([_, h, w, _]) => Some((*h, *w)),
            _ => None,
        }
    }

    pub fn predict(&mut self, image: &Array3<f32>) -> Result<Prediction, AppError> {
        let (h, w, _) = image.dim();
        let resized;
        let image = match self.expected_hw() {
            Some((eh, ew)) if (eh, ew) != (h, w) => {
                resized = resize_tensor(image, eh, ew)?;
                &resized
            }
            _ => image,
        };

        let input = build_input(image, self.input_type)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| AppError::Inference(format!("{:#}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

        arg_max(&output_values(output)?)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            backend: BackendKind::MobileFormat,
            input_name: None,
            input_shape: self.input_shape.clone(),
            input_type: Some(format!("{:?}", self.input_type)),
            quantization: self.input_quantization(),
        }
    }
}

fn is_eight_bit(dt: DatumType) -> bool {
    matches!(dt.unquantized(), DatumType::U8 | DatumType::I8)
}

fn input_quantization(dt: DatumType) -> Option<QuantizationParams> {
    if !is_eight_bit(dt) {
        return None;
    }
    // Integer inputs without quantization metadata report (0, 0), as the
    // TFLite interpreter does.
    let (zero_point, scale) = dt.qparams().map(|q| q.zp_scale()).unwrap_or((0, 0.0));
    Some(QuantizationParams { scale, zero_point })
}

/// `value / scale + zero_point`, or the untouched value when `scale` is zero.
pub fn rescale(value: f32, params: QuantizationParams) -> f32 {
    if params.scale == 0.0 {
        value
    } else {
        value / params.scale + params.zero_point as f32
    }
}

fn build_input(image: &Array3<f32>, input_type: DatumType) -> Result<Tensor, AppError> {
    let (h, w, c) = image.dim();
    let shape = (1, h, w, c);
    let shape_err = |e: tract_ndarray::ShapeError| AppError::Inference(format!("Failed to create tensor: {}", e));

    let Some(params) = input_quantization(input_type) else {
        let data: Vec<f32> = image.iter().copied().collect();
        let tensor = Tensor::from(tract_ndarray::Array4::from_shape_vec(shape, data).map_err(shape_err)?);
        if input_type == DatumType::F32 {
            return Ok(tensor);
        }
        return tensor
            .cast_to_dt(input_type)
            .map(|t| t.into_owned())
            .map_err(|e| AppError::Inference(format!("{:#}", e)));
    };

    // `as` truncates toward zero and saturates at the type bounds.
    let mut tensor = match input_type.unquantized() {
        DatumType::I8 => {
            let data: Vec<i8> = image.iter().map(|&v| rescale(v, params) as i8).collect();
            Tensor::from(tract_ndarray::Array4::from_shape_vec(shape, data).map_err(shape_err)?)
        }
        _ => {
            let data: Vec<u8> = image.iter().map(|&v| rescale(v, params) as u8).collect();
            Tensor::from(tract_ndarray::Array4::from_shape_vec(shape, data).map_err(shape_err)?)
        }
    };
    // Carry the quantization parameters over to the raw integer tensor.
    unsafe { tensor.set_datum_type(input_type) };
    Ok(tensor)
}

/// Reads an output tensor as floats, dequantizing 8-bit outputs that carry
/// quantization parameters.
fn output_values(tensor: &Tensor) -> Result<Vec<f32>, AppError> {
    let dt = tensor.datum_type();
    if let Some(qp) = dt.qparams() {
        let (zero_point, scale) = qp.zp_scale();
        let dequant = |raw: f32| (raw - zero_point as f32) * scale;
        match dt.unquantized() {
            DatumType::U8 => {
                let raw = tensor.as_slice::<u8>().map_err(extract_err)?;
                return Ok(raw.iter().map(|&v| dequant(v as f32)).collect());
            }
            DatumType::I8 => {
                let raw = tensor.as_slice::<i8>().map_err(extract_err)?;
                return Ok(raw.iter().map(|&v| dequant(v as f32)).collect());
            }
            _ => {}
        }
    }

    let values = tensor.cast_to::<f32>().map_err(extract_err)?;
    let slice = values.as_slice::<f32>().map_err(extract_err)?;
    Ok(slice.to_vec())
}

fn extract_err(e: TractError) -> AppError {
    AppError::Inference(format!("Failed to extract output tensor: {:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantized_u8(scale: f32, zero_point: i32) -> DatumType {
        DatumType::QU8(QParams::ZpScale { zero_point, scale })
    }

    #[test]
    fn rescale_applies_scale_and_zero_point() {
        let params = QuantizationParams {
            scale: 1.0 / 255.0,
            zero_point: 0,
        };
        assert!((rescale(1.0, params) - 255.0).abs() < 1e-3);

        let params = QuantizationParams {
            scale: 0.5,
            zero_point: -128,
        };
        assert!((rescale(0.25, params) - -127.5).abs() < 1e-6);
    }

    #[test]
    fn rescale_skips_division_when_scale_is_zero() {
        let params = QuantizationParams {
            scale: 0.0,
            zero_point: 7,
        };
        let v = rescale(0.42, params);
        assert!(v.is_finite());
        assert_eq!(v, 0.42);
    }

    #[test]
    fn only_eight_bit_inputs_count_as_quantized() {
        assert!(input_quantization(DatumType::F32).is_none());
        assert_eq!(
            input_quantization(DatumType::U8),
            Some(QuantizationParams {
                scale: 0.0,
                zero_point: 0
            })
        );
        let params = input_quantization(quantized_u8(0.25, 3)).unwrap();
        assert_eq!(params.zero_point, 3);
        assert!((params.scale - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn quantized_input_is_rescaled_then_cast() {
        let dt = quantized_u8(1.0 / 255.0, 0);
        let image = Array3::from_elem((2, 2, 3), 1.0f32);
        let tensor = build_input(&image, dt).unwrap();

        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        assert_eq!(tensor.datum_type(), dt);
        let raw = tensor.as_slice::<u8>().unwrap();
        assert!(raw.iter().all(|&v| v >= 254));
    }

    #[test]
    fn zero_scale_input_is_cast_without_rescale() {
        let image = Array3::from_elem((1, 1, 3), 0.9f32);
        let tensor = build_input(&image, DatumType::U8).unwrap();
        let raw = tensor.as_slice::<u8>().unwrap();
        assert_eq!(raw, &[0, 0, 0]);
    }

    #[test]
    fn float_input_is_passed_through() {
        let image = Array3::from_elem((2, 3, 3), 0.5f32);
        let tensor = build_input(&image, DatumType::F32).unwrap();
        assert_eq!(tensor.shape(), &[1, 2, 3, 3]);
        assert!(tensor.as_slice::<f32>().unwrap().iter().all(|&v| v == 0.5));
    }

    #[test]
    fn quantized_outputs_are_dequantized() {
        let mut tensor = Tensor::from(tract_ndarray::arr1(&[0u8, 128, 255]));
        unsafe { tensor.set_datum_type(quantized_u8(1.0 / 256.0, 0)) };
        let values = output_values(&tensor).unwrap();
        assert!((values[1] - 0.5).abs() < 1e-6);
        assert_eq!(arg_max(&values).unwrap().class_index, 2);
    }
}
