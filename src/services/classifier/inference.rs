use crate::error::AppError;
use crate::models::classify_types::Prediction;
use image::{ImageBuffer, ImageReader, Rgb};
use ndarray::Array3;
use std::path::Path;

/// Square input size every bundled gallery model was exported with.
pub const INPUT_SIZE: u32 = 224;

/// Decodes an image and turns it into an HWC tensor in [0, 1].
///
/// The image is stretched to `size`x`size` without keeping the aspect ratio,
/// matching how the gallery models were trained.
pub fn preprocess_image(path: &Path, size: u32) -> Result<Array3<f32>, AppError> {
    let img = ImageReader::open(path)
        .map_err(|e| AppError::io(format!("Failed to open image {}", path.display()), e))?
        .with_guessed_format()
        .map_err(|e| AppError::io(format!("Failed to read image {}", path.display()), e))?
        .decode()
        .map_err(|e| AppError::Image {
            path: path.to_path_buf(),
            source: e,
        })?;

    let rgb = img
        .resize_exact(size, size, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let data: Vec<f32> = rgb.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();

    Array3::from_shape_vec((size as usize, size as usize, 3), data)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}

/// Bilinear resize of an HWC float tensor to a new spatial size.
pub fn resize_tensor(image: &Array3<f32>, height: usize, width: usize) -> Result<Array3<f32>, AppError> {
    let (h, w, c) = image.dim();
    if (h, w) == (height, width) {
        return Ok(image.clone());
    }
    if c != 3 {
        return Err(AppError::Inference(format!(
            "Expected 3 channels, image has {}",
            c
        )));
    }

    let raw: Vec<f32> = image.iter().copied().collect();
    let buffer: ImageBuffer<Rgb<f32>, Vec<f32>> = ImageBuffer::from_raw(w as u32, h as u32, raw)
        .ok_or_else(|| AppError::Inference("Image buffer does not match its dimensions".to_string()))?;
    let resized = image::imageops::resize(
        &buffer,
        width as u32,
        height as u32,
        image::imageops::FilterType::Triangle,
    );

    Array3::from_shape_vec((height, width, 3), resized.into_raw())
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}

/// Index and value of the largest output. NaN entries never win.
pub fn arg_max(values: &[f32]) -> Result<Prediction, AppError> {
    let mut best: Option<Prediction> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some(b) if b.confidence >= value => {}
            _ => {
                best = Some(Prediction {
                    class_index: idx,
                    confidence: value,
                })
            }
        }
    }

    best.ok_or_else(|| AppError::Inference("Model produced no usable outputs".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::tempdir;

    #[test]
    fn arg_max_picks_first_maximum() {
        let p = arg_max(&[0.1, 0.7, 0.2, 0.7]).unwrap();
        assert_eq!(p.class_index, 1);
        assert!((p.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn arg_max_ignores_nan_and_rejects_empty() {
        let p = arg_max(&[f32::NAN, 0.3, 0.2]).unwrap();
        assert_eq!(p.class_index, 1);
        assert!(arg_max(&[]).is_err());
        assert!(arg_max(&[f32::NAN]).is_err());
    }

    #[test]
    fn preprocess_stretches_and_normalizes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("white.png");
        RgbImage::from_pixel(40, 10, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let tensor = preprocess_image(&path, INPUT_SIZE).unwrap();
        assert_eq!(tensor.dim(), (224, 224, 3));
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn preprocess_reports_undecodable_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(preprocess_image(&path, INPUT_SIZE).is_err());
    }

    #[test]
    fn resize_tensor_changes_spatial_dims_only() {
        let image = Array3::from_elem((224, 224, 3), 0.5f32);
        let resized = resize_tensor(&image, 96, 128).unwrap();
        assert_eq!(resized.dim(), (96, 128, 3));
        assert!(resized.iter().all(|&v| (v - 0.5).abs() < 1e-4));
    }
}
