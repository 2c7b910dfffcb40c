use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::deduplication::Duplicate;
use crate::types::{Failed, UnsupportedLink};

/// Summary of one run, from listing to commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Posts returned by every collection listing
    pub posts: usize,

    /// Collections whose listing failed, with the reason
    pub listing_errors: Vec<String>,

    /// Candidate URLs handed to the fetcher
    pub candidates: usize,

    /// Links that could not be turned into a candidate
    pub skipped: Vec<UnsupportedLink>,

    /// Files staged by the fetcher
    pub staged: usize,

    /// URLs that were not staged
    pub failed: Vec<Failed>,

    /// Staged files the picker kept
    pub picked: usize,

    /// Staged files the picker dropped
    pub discarded: usize,

    pub duplicates: Vec<Duplicate>,
    pub undecodable: Vec<PathBuf>,
    pub archive_skipped: Vec<PathBuf>,

    /// Final archive paths
    pub committed: Vec<PathBuf>,

    /// Files not committed because the archive already had the name
    pub leftover: Vec<PathBuf>,
    pub commit_failures: Vec<(PathBuf, String)>,

    /// Run files that could not be removed from the staging directory
    pub cleanup_failures: Vec<PathBuf>,

    pub cancelled: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Posts:        {}", self.posts)?;
        writeln!(
            f,
            "Candidates:   {} ({} links skipped)",
            self.candidates,
            self.skipped.len()
        )?;
        writeln!(
            f,
            "Downloads:    {} staged, {} failed",
            self.staged,
            self.failed.len()
        )?;
        writeln!(
            f,
            "Picked:       {} ({} discarded)",
            self.picked, self.discarded
        )?;
        writeln!(
            f,
            "Duplicates:   {} ({} undecodable)",
            self.duplicates.len(),
            self.undecodable.len()
        )?;
        write!(
            f,
            "Committed:    {} ({} name clashes, {} errors)",
            self.committed.len(),
            self.leftover.len(),
            self.commit_failures.len()
        )?;

        if !self.listing_errors.is_empty() {
            write!(f, "\nListing errors: {}", self.listing_errors.len())?;
        }
        if !self.cleanup_failures.is_empty() {
            write!(f, "\nFiles left in staging: {}", self.cleanup_failures.len())?;
        }
        if self.cancelled {
            write!(f, "\nRun was cancelled")?;
        }
        Ok(())
    }
}
