use anyhow::Context;
use gallery_sorter_lib::{default_output_path, write_raw_batches, ExportFormat, RepresentativeDataset, SizeReport};
use std::path::Path;

pub fn size_report(original: &Path, converted: Option<&Path>, format: ExportFormat) -> anyhow::Result<()> {
    let converted = match converted {
        Some(path) => path.to_path_buf(),
        None => default_output_path(original, format)?,
    };
    let report = SizeReport::measure(original, &converted)?;

    println!("Original model size:  {:.2} MB", report.original_mb());
    println!("Converted model size: {:.2} MB", report.converted_mb());
    if let Some(reduction) = report.reduction_percent() {
        println!("Size reduction:       {:.2}%", reduction);
    }
    Ok(())
}

pub async fn calibrate(folder: &Path, output: &Path, samples: usize) -> anyhow::Result<()> {
    let folder = folder.to_path_buf();
    let output = output.to_path_buf();

    let (count, bytes) = tokio::task::spawn_blocking(move || -> anyhow::Result<(usize, u64)> {
        let dataset = RepresentativeDataset::from_folder(&folder, samples)?;
        let batches = dataset.batches();
        if batches.is_empty() {
            anyhow::bail!("None of the {} sample images could be decoded", dataset.files().len());
        }
        let bytes = write_raw_batches(&batches, &output)?;
        Ok((batches.len(), bytes))
    })
    .await
    .context("Calibration task failed")??;

    println!("Wrote {} representative batches ({} bytes)", count, bytes);
    Ok(())
}
