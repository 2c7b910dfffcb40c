//! Bounded-concurrency downloader.
//!
//! A fixed set of worker threads pulls candidate indices from a shared queue,
//! downloads, decodes and stages each image, and sends the outcome back over a
//! channel drained by the calling thread. The caller is the only writer of the
//! result lists.

mod progress;
mod stage;
mod transport;

pub use progress::{CancelToken, Progress};
pub use transport::{HttpTransport, Transport};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::archive::remove_files;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::log_fetch_failure;
use crate::types::{CandidateUrl, DownloadResult, Failed, FetchFailure, Staged};

/// Download parameters taken from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Number of worker threads
    pub workers: usize,

    /// Directory the downloads are staged in
    pub temp_dir: PathBuf,

    /// Largest decoded image accepted, in pixels
    pub max_image_pixels: u64,

    /// Quality of staged JPEG files
    pub jpeg_quality: u8,
}

impl FetchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers,
            temp_dir: config.temp_dir.clone(),
            max_image_pixels: config.max_image_pixels,
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Largest response body read, in bytes: four bytes per allowed pixel
    /// plus a mebibyte for headers and metadata
    pub fn max_body_bytes(&self) -> u64 {
        self.max_image_pixels.saturating_mul(4).saturating_add(1 << 20)
    }
}

/// Outcome of a fetch batch: one entry per input URL, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub staged: Vec<Staged>,
    pub failed: Vec<Failed>,

    /// Whether the batch stopped early; unprocessed URLs are in `failed`
    pub cancelled: bool,
}

impl FetchReport {
    /// Number of outcomes, always the number of input URLs
    pub fn len(&self) -> usize {
        self.staged.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of every staged file
    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.staged.iter().map(|staged| staged.path.clone()).collect()
    }
}

/// Outcome sent by a worker: a per-item result, or a fatal error
type WorkerOutcome = (usize, Result<DownloadResult>);

/// Downloads candidate URLs into the staging directory
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    settings: FetchSettings,
    progress: Progress,
    cancel: CancelToken,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, settings: FetchSettings) -> Self {
        Self {
            transport,
            settings,
            progress: Progress::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report into an existing progress handle
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Handle on the completed-download counter
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Download and stage every URL.
    ///
    /// Per-item failures never abort the batch. Bodies longer than
    /// [`FetchSettings::max_body_bytes`] are cut off and reported as failures.
    /// A staging directory that cannot be created or written aborts the batch:
    /// in-flight downloads finish, everything staged by this call is removed
    /// and the error is returned.
    pub fn fetch(&self, urls: &[CandidateUrl]) -> Result<FetchReport> {
        let temp_dir = &self.settings.temp_dir;
        fs::create_dir_all(temp_dir).map_err(|e| Error::fatal(temp_dir, e))?;

        self.progress.schedule(urls.len());
        let workers = self.settings.workers.clamp(1, urls.len().max(1));
        info!(
            "Downloading {} images with {} workers into {}",
            urls.len(),
            workers,
            temp_dir.display()
        );

        let (job_tx, job_rx) = channel::unbounded::<usize>();
        for index in 0..urls.len() {
            // The receiver is alive until the workers are spawned
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        let abort = AtomicBool::new(false);
        let mut outcomes: Vec<Option<DownloadResult>> = vec![None; urls.len()];
        let mut fatal: Option<Error> = None;

        let scope_result = crossbeam::scope(|scope| {
            let (result_tx, result_rx) = channel::unbounded::<WorkerOutcome>();

            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let abort = &abort;
                scope.spawn(move |_| self.run_worker(worker, urls, job_rx, result_tx, abort));
            }
            drop(result_tx);

            for (index, outcome) in result_rx.iter() {
                match outcome {
                    Ok(result) => outcomes[index] = Some(result),
                    Err(e) => {
                        error!("Aborting downloads: {}", e);
                        abort.store(true, Ordering::SeqCst);
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    }
                }
            }
        });

        if scope_result.is_err() {
            fatal.get_or_insert_with(|| {
                Error::Io(io::Error::new(io::ErrorKind::Other, "download worker panicked"))
            });
        }

        let mut report = FetchReport {
            cancelled: self.cancel.is_cancelled(),
            ..FetchReport::default()
        };

        for (candidate, outcome) in urls.iter().zip(outcomes) {
            match outcome {
                Some(DownloadResult::Staged(staged)) => report.staged.push(staged),
                Some(DownloadResult::Failed(failed)) => report.failed.push(failed),
                None => {
                    report.cancelled = true;
                    report.failed.push(Failed {
                        source_url: candidate.url.clone(),
                        post_url: candidate.post_url.clone(),
                        reason: FetchFailure::Cancelled,
                    });
                }
            }
        }

        if let Some(e) = fatal {
            let orphans = remove_files(&report.staged_paths());
            if !orphans.is_empty() {
                error!("{} staged files could not be cleaned up", orphans.len());
            }
            return Err(e);
        }

        info!(
            "Staged {} images, {} failed{}",
            report.staged.len(),
            report.failed.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );

        Ok(report)
    }

    fn run_worker(
        &self,
        worker: usize,
        urls: &[CandidateUrl],
        jobs: Receiver<usize>,
        results: Sender<WorkerOutcome>,
        abort: &AtomicBool,
    ) {
        for index in jobs.iter() {
            // Stop pulling work; in-flight items have already finished
            if abort.load(Ordering::SeqCst) || self.cancel.is_cancelled() {
                debug!("Worker {} stopping early", worker);
                break;
            }

            let outcome = self.stage_one(&urls[index]);
            self.progress.complete_one();
            if outcome.is_err() {
                abort.store(true, Ordering::SeqCst);
            }

            if results.send((index, outcome)).is_err() {
                break;
            }
        }
    }

    /// Download, decode and stage one image; `Err` only for fatal errors
    fn stage_one(&self, candidate: &CandidateUrl) -> Result<DownloadResult> {
        let failed = |reason: FetchFailure| {
            let failed = Failed {
                source_url: candidate.url.clone(),
                post_url: candidate.post_url.clone(),
                reason,
            };
            log_fetch_failure(&failed);
            Ok(DownloadResult::Failed(failed))
        };

        let bytes = match self.download(&candidate.url) {
            Ok(bytes) => bytes,
            Err(reason) => return failed(reason),
        };

        let image = match stage::decode(&bytes, self.settings.max_image_pixels) {
            Ok(image) => image,
            Err(reason) => return failed(reason),
        };

        let encoded = match stage::encode(&image, &candidate.extension, self.settings.jpeg_quality) {
            Ok(encoded) => encoded,
            Err(reason) => return failed(reason),
        };

        let (path, byte_size) =
            stage::write_staged(&self.settings.temp_dir, &candidate.file_name, &encoded)?;
        debug!("Staged {} as {}", candidate.url, path.display());

        Ok(DownloadResult::Staged(Staged {
            path,
            byte_size,
            extension: candidate.extension.clone(),
            source_url: candidate.url.clone(),
        }))
    }

    fn download(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
        let limit = self.settings.max_body_bytes();
        let body = self.transport.get(url)?;

        // One byte past the limit tells a full body from an overlong one
        let mut bytes = Vec::new();
        body.take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| FetchFailure::Network(e.to_string()))?;

        if bytes.len() as u64 > limit {
            return Err(FetchFailure::BodyTooLarge { limit });
        }
        Ok(bytes)
    }
}
