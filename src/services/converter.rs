//! Helpers for the model export workflow.
//!
//! Export itself runs in TensorFlow's own tooling; this module supplies the
//! pieces that depend on the classifier: where converted models go, how much
//! smaller they got, and the calibration images used for int8 quantization.

use crate::error::AppError;
use crate::services::classifier::backend::BackendKind;
use crate::services::classifier::inference::{self, INPUT_SIZE};
use crate::services::fs_service;
use ndarray::{Array4, Axis};
use rayon::prelude::*;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CALIBRATION_SAMPLES: usize = 100;

/// Target of a Keras export. Quantized TFLite exports keep the `.tflite`
/// extension and are told apart by their 8-bit input type at load time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    MobileFormat,
    CrossFramework,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::MobileFormat => "tflite",
            ExportFormat::CrossFramework => "onnx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "tflite" => Ok(ExportFormat::MobileFormat),
            "onnx" => Ok(ExportFormat::CrossFramework),
            other => Err(format!("Unknown export format '{}', expected tflite or onnx", other)),
        }
    }
}

/// Output path next to the source model, with the target extension.
pub fn default_output_path(model_path: &Path, format: ExportFormat) -> Result<PathBuf, AppError> {
    if BackendKind::from_path(model_path)? != BackendKind::FullRuntime {
        return Err(format!(
            "Only Keras models can be converted, got {}",
            model_path.display()
        )
        .into());
    }
    Ok(model_path.with_extension(format.extension()))
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct SizeReport {
    pub original_bytes: u64,
    pub converted_bytes: u64,
}

impl SizeReport {
    pub fn measure(original: &Path, converted: &Path) -> Result<Self, AppError> {
        Ok(Self {
            original_bytes: fs_service::file_size(original)?,
            converted_bytes: fs_service::file_size(converted)?,
        })
    }

    pub fn original_mb(&self) -> f64 {
        self.original_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn converted_mb(&self) -> f64 {
        self.converted_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Percentage saved; `None` when the original is empty.
    pub fn reduction_percent(&self) -> Option<f64> {
        if self.original_bytes == 0 {
            return None;
        }
        Some((1.0 - self.converted_bytes as f64 / self.original_bytes as f64) * 100.0)
    }
}

/// Sample images that calibrate int8 quantization ranges.
pub struct RepresentativeDataset {
    files: Vec<PathBuf>,
    input_size: u32,
}

impl RepresentativeDataset {
    pub fn from_folder(folder: &Path, num_samples: usize) -> Result<Self, AppError> {
        let mut files = fs_service::list_image_files_recursive(folder)?;
        if files.is_empty() {
            return Err(format!("No images found in {}", folder.display()).into());
        }
        files.truncate(num_samples);

        tracing::info!(folder = %folder.display(), samples = files.len(), "Building representative dataset");

        Ok(Self {
            files,
            input_size: INPUT_SIZE,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// One `[1, H, W, 3]` batch per readable sample, in file order.
    pub fn batches(&self) -> Vec<Array4<f32>> {
        self.files
            .par_iter()
            .filter_map(|path| match inference::preprocess_image(path, self.input_size) {
                Ok(tensor) => Some(tensor.insert_axis(Axis(0))),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Skipping calibration sample: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Writes batches back to back as little-endian f32, readable with
/// `numpy.fromfile(path, "<f4").reshape(-1, 224, 224, 3)`.
pub fn write_raw_batches(batches: &[Array4<f32>], output: &Path) -> Result<u64, AppError> {
    let file = std::fs::File::create(output)
        .map_err(|e| AppError::io(format!("Failed to create file {}", output.display()), e))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    for batch in batches {
        for value in batch.iter() {
            writer
                .write_all(&value.to_le_bytes())
                .map_err(|e| AppError::io("Failed to write calibration data", e))?;
            written += 4;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::io("Failed to write calibration data", e))?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn output_path_swaps_extension() {
        let out = default_output_path(Path::new("/models/resnet.keras"), ExportFormat::MobileFormat).unwrap();
        assert_eq!(out, PathBuf::from("/models/resnet.tflite"));
        let out = default_output_path(Path::new("model.h5"), ExportFormat::CrossFramework).unwrap();
        assert_eq!(out, PathBuf::from("model.onnx"));
        assert!(default_output_path(Path::new("model.onnx"), ExportFormat::CrossFramework).is_err());
    }

    #[test]
    fn export_format_parses_cli_names() {
        assert_eq!("tflite".parse::<ExportFormat>().unwrap(), ExportFormat::MobileFormat);
        assert_eq!(".ONNX".parse::<ExportFormat>().unwrap(), ExportFormat::CrossFramework);
        assert!("h5".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn size_report_computes_reduction() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("model.keras");
        let converted = dir.path().join("model.tflite");
        fs::write(&original, vec![0u8; 4000]).unwrap();
        fs::write(&converted, vec![0u8; 1000]).unwrap();

        let report = SizeReport::measure(&original, &converted).unwrap();
        assert_eq!(report.original_bytes, 4000);
        assert!((report.reduction_percent().unwrap() - 75.0).abs() < 1e-9);

        let empty = SizeReport {
            original_bytes: 0,
            converted_bytes: 10,
        };
        assert!(empty.reduction_percent().is_none());
    }

    #[test]
    fn representative_dataset_limits_samples_and_skips_bad_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])).save(dir.path().join("a.png")).unwrap();
        fs::write(dir.path().join("b.jpg"), b"broken").unwrap();
        RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])).save(nested.join("c.png")).unwrap();

        let dataset = RepresentativeDataset::from_folder(dir.path(), 2).unwrap();
        assert_eq!(dataset.files().len(), 2);

        let batches = dataset.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].dim(), (1, 224, 224, 3));

        let out = dir.path().join("calibration.bin");
        let written = write_raw_batches(&batches, &out).unwrap();
        assert_eq!(written, 224 * 224 * 3 * 4);
        assert_eq!(fs::metadata(&out).unwrap().len(), written);
    }

    #[test]
    fn representative_dataset_needs_images() {
        let dir = tempdir().unwrap();
        assert!(RepresentativeDataset::from_folder(dir.path(), 10).is_err());
    }
}
