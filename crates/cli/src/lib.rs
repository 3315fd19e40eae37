use anyhow::{Context, Result};
use bubble_core::{DocumentSource, OcrConfig, OcrDispatcher, OcrNotice, Session, TesseractRecognizer};
use clap::{Parser, Subcommand};
use pdf_engine::{OpenDocument, OpenSource};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storage::{load_preferences_from, Preferences, Storage, StorageError};
use tracing::{info, warn};

pub mod logging;
pub mod script;

/// How long `annotate --ocr` waits for outstanding recognitions before exporting.
const OCR_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "bubblemark")]
#[command(about = "Number features on PDF drawings with bubble markers")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Replay an event script on a PDF and export the annotated copy.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON array of steps (click, drag, toggle_selection, next_page, ...).
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        /// Pixels per page unit; overrides the stored preference.
        #[arg(long)]
        zoom: Option<f32>,
        /// Recognize text in captured regions with tesseract.
        #[arg(long)]
        ocr: bool,
        /// Preferences file to use instead of the one in the data directory.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: usize,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Annotate { file, script, output, zoom, ocr, config, verbose } => {
            let mut preferences = load_preferences(config.as_deref())?;
            if let Some(zoom) = zoom {
                preferences.zoom = zoom;
            }
            logging::init(verbose || preferences.debug_logging);
            run_annotate(&file, &script, &output, ocr, &preferences)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let document = OpenDocument::open(OpenSource::from(file)).context("failed to open PDF")?;
    let pages = document
        .page_boxes()?
        .into_iter()
        .map(|page_box| PageSizeOutput { width: page_box.width, height: page_box.height })
        .collect();

    let payload =
        InfoOutput { path: file.display().to_string(), page_count: document.page_count(), pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_annotate(
    file: &Path,
    script_path: &Path,
    output: &Path,
    ocr: bool,
    preferences: &Preferences,
) -> Result<()> {
    ensure_pdf_exists(file)?;
    let steps = script::load_script(script_path)?;

    let mut session = Session::new().with_zoom(preferences.zoom).context("invalid zoom")?;
    if ocr {
        let config = OcrConfig::new()
            .with_command(&preferences.tesseract_command)
            .with_language(&preferences.ocr_language);
        let workers = config.max_concurrent;
        session = session.with_ocr(OcrDispatcher::new(Arc::new(TesseractRecognizer::new(config)), workers));
    }

    #[cfg(feature = "pdfium")]
    let document = {
        let engine = pdf_engine::PdfiumEngine::bind().context("failed to load PDFium")?;
        OpenDocument::with_engine(engine, OpenSource::from(file)).context("failed to open PDF")?
    };
    #[cfg(not(feature = "pdfium"))]
    let document = OpenDocument::open(OpenSource::from(file)).context("failed to open PDF")?;
    session.open(document).context("failed to show first page")?;

    for (index, step) in steps.iter().enumerate() {
        for action in step.actions() {
            session.apply(action).with_context(|| format!("step {} ({step:?}) failed", index + 1))?;
        }
        report(&session.poll_ocr());
    }
    report(&session.wait_for_ocr(OCR_WAIT));

    let markers = session
        .export(output)
        .with_context(|| format!("failed to export annotated PDF to {}", output.display()))?;
    info!(markers, path = %output.display(), "export finished");

    print!("{}", session.listing());
    println!("{}", output.display());

    Ok(())
}

fn report(notices: &[OcrNotice]) {
    for notice in notices {
        match notice {
            OcrNotice::Recognized { bubble, text } => {
                info!(page = bubble.page, local_index = bubble.local_index, text = %text, "text recognized");
            }
            OcrNotice::Failed { bubble, message } => {
                warn!(page = bubble.page, local_index = bubble.local_index, "{message}");
                eprintln!("warning: {message}");
            }
        }
    }
}

fn load_preferences(config: Option<&Path>) -> Result<Preferences> {
    let preferences = match config {
        Some(path) => load_preferences_from(path)
            .with_context(|| format!("failed to load preferences from {}", path.display()))?,
        None => match Storage::from_default_project() {
            Ok(storage) => storage.load_preferences().context("failed to load preferences")?,
            Err(StorageError::NoDataDirectory) => Preferences::default(),
            Err(error) => return Err(error.into()),
        },
    };

    Ok(preferences)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
