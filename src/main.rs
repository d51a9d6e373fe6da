//! frame-ocr: extract a numeric time series from a fixed region of a video
//!
//! Reads a video file (with the `opencv` feature) or a directory of frames,
//! recognizes the value shown inside the ROI on sampled frames, and writes
//! `<name>_data.csv` and `<name>_plot.png`. The run report is printed as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use frame_ocr::api::models::RunConfig;
use frame_ocr::api::OcrService;
use frame_ocr::core::ocr::{Recognizer, TemplateRecognizer};
use frame_ocr::core::video::Roi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// Digit template matching
    Template,
    /// Tesseract OCR (needs the `tesseract` feature)
    Tesseract,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file or directory of frame images
    video: PathBuf,

    /// Region to read, as x,y,width,height
    #[arg(long)]
    roi: Option<Roi>,

    /// Sample every n-th frame
    #[arg(long)]
    every: Option<u64>,

    /// Sample every n seconds (overrides --every)
    #[arg(long)]
    interval: Option<f64>,

    /// Frame rate assumed for a directory of frames
    #[arg(long)]
    fps: Option<f64>,

    /// Directory with 0.png..9.png, dot.png, comma.png
    #[arg(long)]
    templates: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Engine::Template)]
    engine: Engine,

    #[arg(long)]
    csv_dir: Option<PathBuf>,

    #[arg(long)]
    plot_dir: Option<PathBuf>,

    /// JSON run configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text written for missing values
    #[arg(long)]
    missing_marker: Option<String>,

    /// Parallel frame ranges (image sequences only), 0 for one per CPU
    #[arg(long)]
    partitions: Option<usize>,
}

fn main() -> Result<()> {
    frame_ocr::init_logging();
    let args = Args::parse();

    let config = build_config(&args)?;
    let Some(roi) = args.roi.or(config.roi) else {
        bail!("no ROI given; pass --roi x,y,width,height or set \"roi\" in the config file");
    };

    let recognizer = build_recognizer(&args)?;
    info!("🔍 Using {} recognizer", recognizer.name());

    let service = OcrService::new(&args.video, roi, config);
    let report = service
        .run(recognizer.as_ref())
        .with_context(|| format!("Failed to process {:?}", args.video))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => RunConfig::default(),
    };

    if let Some(every) = args.every {
        config.extraction.sample_every = every;
        config.extraction.sample_interval_secs = None;
    }
    if let Some(interval) = args.interval {
        config.extraction.sample_interval_secs = Some(interval);
    }
    if let Some(fps) = args.fps {
        config.image_sequence_fps = fps;
    }
    if let Some(dir) = &args.csv_dir {
        config.csv_dir = dir.clone();
    }
    if let Some(dir) = &args.plot_dir {
        config.plot_dir = dir.clone();
    }
    if let Some(marker) = &args.missing_marker {
        config.export.missing_marker = marker.clone();
    }
    if let Some(partitions) = args.partitions {
        config.partitions = partitions;
    }
    Ok(config)
}

fn build_recognizer(args: &Args) -> Result<Box<dyn Recognizer>> {
    match args.engine {
        Engine::Template => {
            let Some(dir) = &args.templates else {
                bail!("the template engine needs --templates DIR");
            };
            let recognizer = TemplateRecognizer::from_dir(dir)
                .with_context(|| format!("Failed to load templates from {:?}", dir))?;
            Ok(Box::new(recognizer))
        }
        Engine::Tesseract => tesseract_recognizer(),
    }
}

#[cfg(feature = "tesseract")]
fn tesseract_recognizer() -> Result<Box<dyn Recognizer>> {
    let recognizer = frame_ocr::core::ocr::TesseractRecognizer::new("eng")
        .context("Failed to initialize Tesseract")?;
    Ok(Box::new(recognizer))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_recognizer() -> Result<Box<dyn Recognizer>> {
    bail!("this build has no Tesseract support; rebuild with --features tesseract")
}
