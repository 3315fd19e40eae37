//! Text recognition for captured regions
//!
//! Recognition runs off the event loop. A capture hands its bitmap to the
//! [`OcrDispatcher`] and returns immediately; the result comes back later as an
//! [`OcrOutcome`] keyed by bubble identity and page clear epoch.

use crate::store::BubbleId;
use image::{GrayImage, RgbaImage};
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to run OCR command `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR command exited with {status}: {stderr}")]
    Failed { status: std::process::ExitStatus, stderr: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("OCR worker stopped before reporting a result")]
    Disconnected,
}

/// OCR engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// Executable of the Tesseract command line tool
    pub command: PathBuf,

    /// Language to use for OCR (e.g., "eng" for English)
    pub language: String,

    /// Maximum number of recognitions running at once
    pub max_concurrent: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { command: PathBuf::from("tesseract"), language: "eng".to_string(), max_concurrent: 2 }
    }
}

impl OcrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// External text recognizer.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Recognizer backed by the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    config: OcrConfig,
}

impl TesseractRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        let input = tempfile::Builder::new().prefix("bubble-ocr-").suffix(".png").tempfile()?;
        image.save(input.path())?;

        let output = Command::new(&self.config.command)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .output()
            .map_err(|source| OcrError::Launch {
                command: self.config.command.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Identifies which bubble a recognition result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrJob {
    pub bubble: BubbleId,
    /// Clear epoch of the bubble's page when the job was submitted.
    pub epoch: u64,
}

#[derive(Debug)]
pub struct OcrOutcome {
    pub job: OcrJob,
    pub result: Result<String, OcrError>,
}

/// Converts a capture into what the recognizer is given: a grayscale copy.
pub fn prepare_image(image: &RgbaImage) -> GrayImage {
    image::imageops::grayscale(image)
}

struct OcrRequest {
    job: OcrJob,
    image: GrayImage,
}

/// Fire-and-forget recognition on a fixed pool of background workers.
///
/// Every submitted job yields exactly one [`OcrOutcome`]. A job counts as in flight
/// until its outcome has been taken out through [`drain`](Self::drain) or
/// [`wait`](Self::wait).
pub struct OcrDispatcher {
    requests: async_channel::Sender<OcrRequest>,
    sender: Sender<OcrOutcome>,
    receiver: Receiver<OcrOutcome>,
    outstanding: AtomicUsize,
}

impl OcrDispatcher {
    /// Starts `max_concurrent` workers (at least one) sharing `recognizer`.
    pub fn new(recognizer: Arc<dyn Recognizer>, max_concurrent: usize) -> Self {
        let (requests, queue) = async_channel::unbounded();
        let (sender, receiver) = mpsc::channel();

        let workers = max_concurrent.max(1);
        for _ in 0..workers {
            let queue = queue.clone();
            let results = sender.clone();
            let recognizer = Arc::clone(&recognizer);
            thread::spawn(move || run_worker(&queue, &results, &*recognizer));
        }
        debug!(workers, "OCR workers started");

        Self { requests, sender, receiver, outstanding: AtomicUsize::new(0) }
    }

    /// Queues recognition of `image` and returns without waiting for it.
    pub fn submit(&self, job: OcrJob, image: &RgbaImage) {
        let request = OcrRequest { job, image: prepare_image(image) };
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        debug!(page = job.bubble.page, local_index = job.bubble.local_index, "OCR submitted");

        if let Err(async_channel::SendError(request)) = self.requests.send_blocking(request) {
            warn!("OCR workers are gone");
            let _ = self.sender.send(OcrOutcome { job: request.job, result: Err(OcrError::Disconnected) });
        }
    }

    /// Results that have arrived so far.
    pub fn drain(&self) -> Vec<OcrOutcome> {
        let outcomes: Vec<OcrOutcome> = self.receiver.try_iter().collect();
        self.outstanding.fetch_sub(outcomes.len(), Ordering::SeqCst);
        outcomes
    }

    /// Waits up to `timeout` for the next result.
    pub fn wait(&self, timeout: Duration) -> Option<OcrOutcome> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Jobs whose outcome has not been taken yet.
    pub fn in_flight(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Runs until the dispatcher, and with it the request queue, is dropped.
fn run_worker(
    queue: &async_channel::Receiver<OcrRequest>,
    results: &Sender<OcrOutcome>,
    recognizer: &dyn Recognizer,
) {
    while let Ok(OcrRequest { job, image }) = queue.recv_blocking() {
        let result = recognizer.recognize(&image).map(|text| text.trim().to_owned());
        if results.send(OcrOutcome { job, result }).is_err() {
            break;
        }
    }
}
