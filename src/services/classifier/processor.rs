//! Sorting a folder of images into category subfolders.

use crate::error::AppError;
use crate::models::classify_types::{RelocateMode, RunSummary};
use crate::services::classifier::adapter::{label_for, ImageClassifier};
use crate::services::classifier::events::ClassifyObserver;
use crate::services::classifier::inference;
use crate::services::fs_service;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct ProcessOptions {
    /// Categories to sort into. Empty means every label.
    pub selected: Vec<String>,
    pub relocate: RelocateMode,
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl ProcessOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

pub fn skipped_label(label: &str) -> String {
    format!("{} (skipped - not in selected categories)", label)
}

/// Classifies every image directly inside `folder` and files the ones whose
/// label is selected into `<folder>/<label>/`.
///
/// Failures on a single image are reported through `on_error` and the run
/// continues. Failures before the loop starts are reported with an empty
/// file name and returned.
pub fn process_folder<C, O>(
    classifier: &mut C,
    folder: &Path,
    options: &ProcessOptions,
    observer: &mut O,
) -> Result<RunSummary, AppError>
where
    C: ImageClassifier + ?Sized,
    O: ClassifyObserver + ?Sized,
{
    match run(classifier, folder, options, observer) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            tracing::error!(folder = %folder.display(), "Error processing folder: {}", e);
            observer.on_error("", &e.to_string());
            Err(e)
        }
    }
}

fn run<C, O>(
    classifier: &mut C,
    folder: &Path,
    options: &ProcessOptions,
    observer: &mut O,
) -> Result<RunSummary, AppError>
where
    C: ImageClassifier + ?Sized,
    O: ClassifyObserver + ?Sized,
{
    if !classifier.is_ready() {
        return Err(AppError::ModelNotLoaded);
    }

    let labels: Vec<String> = classifier.labels().to_vec();
    let input_size = classifier.input_size();
    let selected = resolve_selection(&labels, &options.selected)?;

    fs_service::ensure_category_dirs(folder, &selected)?;
    let images = fs_service::list_image_files(folder)?;
    let total = images.len();

    tracing::info!(folder = %folder.display(), total, relocate = ?options.relocate, "Starting classification run");

    let mut summary = RunSummary {
        category_counts: selected.iter().map(|l| (l.clone(), 0)).collect(),
        total,
        ..RunSummary::default()
    };

    if total == 0 {
        observer.on_status_update("No images found in the selected folder.");
        observer.on_complete(&summary.category_counts, 0, 0);
        return Ok(summary);
    }

    let mut counts: BTreeMap<String, usize> = labels.iter().map(|l| (l.clone(), 0)).collect();

    for (i, img_path) in images.iter().enumerate() {
        if options.is_cancelled() {
            summary.cancelled = true;
            observer.on_status_update(&format!("Cancelled after {} of {} images.", i, total));
            break;
        }

        observer.on_progress_update(i as f32 / total as f32 * 100.0);
        observer.on_status_update(&format!("Processing image {} of {}", i + 1, total));

        let file_name = img_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let outcome = inference::preprocess_image(img_path, input_size)
            .and_then(|tensor| classifier.predict(&tensor))
            .and_then(|prediction| {
                let label = label_for(&labels, prediction.class_index)?.to_string();
                Ok((label, prediction.confidence))
            });

        let (label, confidence) = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(file = %file_name, "Error processing image: {}", e);
                summary.failed += 1;
                observer.on_error(&file_name, &e.to_string());
                continue;
            }
        };

        tracing::debug!(file = %file_name, label = %label, confidence, "Classified");

        if !selected.contains(&label) {
            summary.skipped += 1;
            observer.on_image_classified(&file_name, &skipped_label(&label), confidence);
            continue;
        }

        if let Err(e) = fs_service::relocate(img_path, &folder.join(&label), options.relocate) {
            tracing::warn!(file = %file_name, "Error relocating image: {}", e);
            summary.failed += 1;
            observer.on_error(&file_name, &e.to_string());
            continue;
        }

        if let Some(count) = counts.get_mut(&label) {
            *count += 1;
        }
        summary.processed += 1;
        observer.on_image_classified(&file_name, &label, confidence);
    }

    summary.category_counts = counts
        .into_iter()
        .filter(|(label, _)| selected.contains(label))
        .collect();

    if !summary.cancelled {
        observer.on_progress_update(100.0);
    }
    observer.on_complete(&summary.category_counts, summary.processed, total);
    observer.on_status_update(&format!(
        "Done! {} images sorted into the selected categories. {} images skipped.",
        summary.processed, summary.skipped
    ));

    tracing::info!(
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        total,
        cancelled = summary.cancelled,
        "Classification run finished"
    );

    Ok(summary)
}

fn resolve_selection(labels: &[String], requested: &[String]) -> Result<Vec<String>, AppError> {
    if requested.is_empty() {
        return Ok(labels.to_vec());
    }

    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        if !labels.contains(name) {
            return Err(AppError::UnknownCategory(name.clone()));
        }
        if !selected.contains(name) {
            selected.push(name.clone());
        }
    }
    Ok(selected)
}
