use anyhow::Context;
use gallery_sorter_lib::{
    process_folder, AppError, ChannelObserver, ClassifyEvent, InferenceAdapter, ProcessOptions,
    RelocateMode, RunSummary, SorterConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

pub struct ClassifyArgs {
    pub folder: PathBuf,
    pub model: PathBuf,
    pub categories: Vec<String>,
    pub copy: bool,
    pub move_files: bool,
    pub config: Option<PathBuf>,
    pub gpu: bool,
    pub json: bool,
}

fn load_config(path: Option<&Path>) -> Result<SorterConfig, AppError> {
    match path {
        Some(path) => SorterConfig::load(path),
        None => Ok(SorterConfig::default()),
    }
}

/// Loads the model on a blocking thread; backends parse large files.
async fn load_adapter(config: &SorterConfig, model: &Path, use_gpu: bool) -> anyhow::Result<InferenceAdapter> {
    let labels = config.label_set()?;
    let mut options = config.model_options();
    options.use_gpu |= use_gpu;
    let input_size = config.input_size;
    let model = model.to_path_buf();

    let adapter = tokio::task::spawn_blocking(move || -> Result<InferenceAdapter, AppError> {
        let mut adapter = InferenceAdapter::new(labels, options).with_input_size(input_size);
        adapter.load_model(&model)?;
        Ok(adapter)
    })
    .await
    .context("Model loading task failed")??;

    Ok(adapter)
}

pub async fn classify_images(args: ClassifyArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let relocate = if args.copy {
        RelocateMode::Copy
    } else if args.move_files {
        RelocateMode::Move
    } else {
        config.relocate
    };

    let mut adapter = load_adapter(&config, &args.model, args.gpu).await?;
    adapter.reset_cancel_flag();

    let cancel_flag = adapter.cancel_flag();
    let ctrl_c_flag = cancel_flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_flag.store(true, Ordering::Relaxed);
        }
    });

    let options = ProcessOptions {
        selected: args.categories,
        relocate,
        cancel_flag: Some(cancel_flag),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let folder = args.folder.clone();
    let run = tokio::task::spawn_blocking(move || {
        let mut observer = ChannelObserver::new(tx);
        process_folder(&mut adapter, &folder, &options, &mut observer)
    });

    let mut renderer = Renderer::new(args.json);
    while let Some(event) = rx.recv().await {
        renderer.render(&event)?;
    }

    let summary = run.await.context("Classification task failed")??;
    renderer.finish(&summary);
    Ok(())
}

pub async fn predict_image(image: &Path, model: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let mut adapter = load_adapter(&config, model, false).await?;
    let image = image.to_path_buf();

    let result = tokio::task::spawn_blocking(move || adapter.classify_image(&image))
        .await
        .context("Classification task failed")??;

    println!("{}: {} ({:.2}%)", result.file_name, result.label, result.confidence * 100.0);
    Ok(())
}

pub async fn inspect_model(model: &Path) -> anyhow::Result<()> {
    let adapter = load_adapter(&SorterConfig::default(), model, false).await?;
    let info = adapter.model_info()?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Draws run events either as a progress bar with a result log, or as JSON lines.
struct Renderer {
    bar: Option<ProgressBar>,
}

impl Renderer {
    fn new(json: bool) -> Self {
        let bar = if json {
            None
        } else {
            let bar = ProgressBar::new(100);
            let style = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
                .map(|style| style.progress_chars("##-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            Some(bar)
        };
        Self { bar }
    }

    fn render(&mut self, event: &ClassifyEvent) -> anyhow::Result<()> {
        let Some(bar) = &self.bar else {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        };

        match event {
            ClassifyEvent::Progress { percent } => bar.set_position(percent.round() as u64),
            ClassifyEvent::Status { message } => bar.set_message(message.clone()),
            ClassifyEvent::Classified {
                file_name,
                label,
                confidence,
            } => bar.println(format!("{}: {} ({:.2}%)", file_name, label, confidence * 100.0)),
            ClassifyEvent::Error { file_name, message } if file_name.is_empty() => {
                bar.println(format!("ERROR: {}", message))
            }
            ClassifyEvent::Error { file_name, message } => {
                bar.println(format!("ERROR processing {}: {}", file_name, message))
            }
            ClassifyEvent::Complete {
                category_counts,
                processed,
                total,
            } => {
                bar.println(format!("\nClassification summary: {} of {} images sorted", processed, total));
                for (label, count) in category_counts {
                    bar.println(format!("  {}: {}", label, count));
                }
            }
        }
        Ok(())
    }

    fn finish(&self, summary: &RunSummary) {
        if let Some(bar) = &self.bar {
            if summary.cancelled {
                bar.abandon_with_message("Cancelled");
            } else {
                bar.finish_with_message(format!(
                    "Done: {} sorted, {} skipped, {} failed",
                    summary.processed, summary.skipped, summary.failed
                ));
            }
        }
    }
}
