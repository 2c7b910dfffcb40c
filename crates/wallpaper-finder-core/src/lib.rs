//! Core functionality for collecting wallpapers from image feeds.
//!
//! A run moves through five stages:
//! - Link resolution: post records become candidate image URLs
//! - Fetching: candidates are downloaded, decoded and staged concurrently
//! - Picking: a curator keeps a subset of the staged files
//! - Deduplication: average-hash fingerprints reject repeats of archived images
//! - Commit: survivors are moved into the archive without overwriting

// -- External Dependencies --
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

// -- Internal Modules --
mod error;
mod report;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use report::RunReport;
pub use types::*;

// -- Public Modules --
pub mod archive;
pub mod config;
pub mod deduplication;
pub mod fetch;
pub mod links;
pub mod listing;
pub mod logging;
pub mod picker;
pub mod processing;
pub mod types;

use archive::ArchiveCommitter;
use deduplication::DuplicateResolver;
use fetch::{CancelToken, FetchSettings, Fetcher, HttpTransport, Progress, Transport};
use links::LinkResolver;
use listing::{Listing, RedditFeed};
use picker::Picker;
use processing::Fingerprinter;

/// Main entry point for a wallpaper run
pub struct WallpaperFinder {
    config: Config,
    listing: Box<dyn Listing>,
    transport: Arc<dyn Transport>,
    cancel: CancelToken,
    progress: Progress,
}

impl WallpaperFinder {
    /// Create a finder that lists the public feed and downloads over HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let listing = RedditFeed::new(&config)?;
        let transport = HttpTransport::new(&config)?;
        Self::with_parts(config, Box::new(listing), Arc::new(transport))
    }

    /// Create a finder from explicit listing and transport implementations
    pub fn with_parts(
        config: Config,
        listing: Box<dyn Listing>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            listing,
            transport,
            cancel: CancelToken::new(),
            progress: Progress::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Share an existing cancellation flag
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run at the next safe point
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Download counter, shared with the fetch stage
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Run every stage once.
    ///
    /// Per-item problems are recorded in the report. A fatal file system error
    /// is returned after every file this run staged has been removed.
    pub fn run(&self, picker: &mut dyn Picker) -> Result<RunReport> {
        let config = &self.config;
        let mut report = RunReport::default();

        let committer = ArchiveCommitter::new(&config.archive_dir);
        committer.ensure_dir()?;

        // -- Listing --
        let mut posts = Vec::new();
        for collection in &config.listing.collections {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            match self.listing.posts(&config.listing.query(collection)) {
                Ok(found) => posts.extend(found),
                Err(e) => {
                    warn!("{}", e);
                    report.listing_errors.push(e.to_string());
                }
            }
        }
        report.posts = posts.len();

        // -- Link resolution --
        let classification = LinkResolver::new(config).classify_all(&posts);
        report.candidates = classification.candidates.len();
        report.skipped = classification.skipped;
        info!(
            "{} posts gave {} candidates, {} links skipped",
            report.posts,
            report.candidates,
            report.skipped.len()
        );

        // -- Fetch --
        let fetcher = Fetcher::new(self.transport.clone(), FetchSettings::from_config(config))
            .with_cancel_token(self.cancel.clone())
            .with_progress(self.progress.clone());
        let fetched = fetcher.fetch(&classification.candidates)?;

        let staged = fetched.staged_paths();
        report.staged = staged.len();
        report.failed = fetched.failed;

        if fetched.cancelled || self.cancel.is_cancelled() {
            info!("Run cancelled, removing {} staged files", staged.len());
            report.cancelled = true;
            report.cleanup_failures = committer.remove(&staged);
            return Ok(report);
        }

        // -- Pick --
        let chosen = match picker.pick(&staged) {
            Ok(chosen) => chosen,
            Err(e) => {
                committer.remove(&staged);
                return Err(e);
            }
        };

        // Ctrl-C during review drops the whole batch
        if self.cancel.is_cancelled() {
            info!("Run cancelled during review, removing {} staged files", staged.len());
            report.cancelled = true;
            report.cleanup_failures = committer.remove(&staged);
            return Ok(report);
        }

        // Anything the picker returns that this run did not stage is ignored
        let (picked, discarded): (Vec<PathBuf>, Vec<PathBuf>) =
            staged.into_iter().partition(|path| chosen.contains(path));
        report.picked = picked.len();
        report.discarded = discarded.len();
        report.cleanup_failures.extend(committer.remove(&discarded));

        // -- Deduplication --
        let keep = if config.remove_duplicates && !picked.is_empty() {
            let resolver = DuplicateResolver::new(Fingerprinter::new(config.hash_size));
            let resolution = match resolver.resolve(&picked, &config.archive_dir) {
                Ok(resolution) => resolution,
                Err(e) => {
                    committer.remove(&picked);
                    return Err(e);
                }
            };

            let rejected: Vec<PathBuf> = resolution
                .duplicates
                .iter()
                .map(|duplicate| duplicate.path.clone())
                .chain(resolution.undecodable.iter().cloned())
                .collect();
            report.cleanup_failures.extend(committer.remove(&rejected));

            report.duplicates = resolution.duplicates;
            report.undecodable = resolution.undecodable;
            report.archive_skipped = resolution.archive_skipped;
            resolution.keep
        } else {
            picked
        };

        if self.cancel.is_cancelled() {
            info!("Run cancelled before commit, removing {} files", keep.len());
            report.cancelled = true;
            report.cleanup_failures.extend(committer.remove(&keep));
            return Ok(report);
        }

        // -- Commit --
        let commit = match committer.commit(&keep) {
            Ok(commit) => commit,
            Err(e) => {
                committer.remove(&keep);
                return Err(e);
            }
        };

        let uncommitted: Vec<PathBuf> = commit
            .leftover
            .iter()
            .chain(commit.failed.iter().map(|(path, _)| path))
            .cloned()
            .collect();
        report.cleanup_failures.extend(committer.remove(&uncommitted));
        report.cleanup_failures.extend(commit.stranded);

        report.committed = commit.committed;
        report.leftover = commit.leftover;
        report.commit_failures = commit.failed;

        info!(
            "Committed {} images to {}",
            report.committed.len(),
            committer.archive_dir().display()
        );

        Ok(report)
    }
}
