mod commands;

use clap::{Parser, Subcommand};
use gallery_sorter_lib::{ExportFormat, DEFAULT_CALIBRATION_SAMPLES};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gallery-sorter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sort a folder of photos into categories with a pretrained classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every image in a folder and file it into category subfolders
    Classify {
        /// Folder containing the images (not searched recursively)
        folder: PathBuf,

        /// Model file (.keras, .h5, .tflite or .onnx)
        #[arg(short, long)]
        model: PathBuf,

        /// Only sort into these categories (comma separated); others are skipped
        #[arg(short, long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Copy classified images instead of moving them
        #[arg(long, conflicts_with = "move_files")]
        copy: bool,

        /// Move classified images (the default unless the config says otherwise)
        #[arg(long = "move")]
        move_files: bool,

        /// JSON settings file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Try GPU execution providers (ONNX models only)
        #[arg(long)]
        gpu: bool,

        /// Print events as JSON lines instead of a progress bar
        #[arg(long)]
        json: bool,
    },

    /// Classify a single image
    Predict {
        image: PathBuf,

        #[arg(short, long)]
        model: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show which backend a model loads with and what input it expects
    Inspect {
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Compare model file sizes before and after conversion
    SizeReport {
        /// Source Keras model
        original: PathBuf,

        /// Converted model; defaults to the original's path with the format's extension
        converted: Option<PathBuf>,

        /// Export format, `tflite` or `onnx`
        #[arg(short, long, default_value = "tflite")]
        format: ExportFormat,
    },

    /// Write representative batches for int8 quantization
    Calibrate {
        /// Folder of sample images (searched recursively)
        folder: PathBuf,

        /// Output file of raw little-endian f32 batches
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value_t = DEFAULT_CALIBRATION_SAMPLES)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_sorter_lib=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            folder,
            model,
            categories,
            copy,
            move_files,
            config,
            gpu,
            json,
        } => {
            commands::classifier::classify_images(commands::classifier::ClassifyArgs {
                folder,
                model,
                categories,
                copy,
                move_files,
                config,
                gpu,
                json,
            })
            .await
        }
        Commands::Predict { image, model, config } => {
            commands::classifier::predict_image(&image, &model, config.as_deref()).await
        }
        Commands::Inspect { model } => commands::classifier::inspect_model(&model).await,
        Commands::SizeReport {
            original,
            converted,
            format,
        } => commands::converter::size_report(&original, converted.as_deref(), format),
        Commands::Calibrate {
            folder,
            output,
            samples,
        } => commands::converter::calibrate(&folder, &output, samples).await,
    }
}
