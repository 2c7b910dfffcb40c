//! Partition of a batch into kept files and duplicates, against the archive
//! and against earlier files of the same batch.

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::archive::list_files;
use crate::error::{Error, Result};
use crate::processing::{Fingerprint, Fingerprinter};

/// A batch file whose fingerprint was already seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duplicate {
    /// The rejected batch file
    pub path: PathBuf,

    /// The first-seen file with the same fingerprint, from the archive or the batch
    pub original: PathBuf,
}

/// Result of resolving a batch against the archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Batch files with a fingerprint not seen before, in input order
    pub keep: Vec<PathBuf>,

    /// Batch files matching an archive file or an earlier batch file
    pub duplicates: Vec<Duplicate>,

    /// Batch files that could not be decoded
    pub undecodable: Vec<PathBuf>,

    /// Archive files that could not be decoded and were left out of the comparison
    pub archive_skipped: Vec<PathBuf>,
}

/// Finds exact fingerprint duplicates
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateResolver {
    fingerprinter: Fingerprinter,
}

impl DuplicateResolver {
    pub fn new(fingerprinter: Fingerprinter) -> Self {
        Self { fingerprinter }
    }

    /// Fingerprint the archive (sorted by file name) and then the batch (in
    /// input order); the first path seen for a fingerprint wins.
    pub fn resolve(&self, batch: &[PathBuf], archive_dir: &Path) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        let mut first_seen: HashMap<Fingerprint, PathBuf> = HashMap::new();

        let archive_files = list_files(archive_dir)?;
        info!(
            "Fingerprinting {} archived and {} picked images",
            archive_files.len(),
            batch.len()
        );

        for path in archive_files {
            // A batch file that already sits in the archive is not its own original
            if batch.contains(&path) {
                continue;
            }

            match self.fingerprinter.fingerprint(&path) {
                Ok(fingerprint) => {
                    first_seen.entry(fingerprint).or_insert(path);
                }
                Err(Error::UndecodableImage { reason, .. }) => {
                    warn!("Skipping undecodable archive file {}: {}", path.display(), reason);
                    resolution.archive_skipped.push(path);
                }
                Err(e) => return Err(e),
            }
        }

        for path in batch {
            let fingerprint = match self.fingerprinter.fingerprint(path) {
                Ok(fingerprint) => fingerprint,
                Err(Error::UndecodableImage { reason, .. }) => {
                    warn!("Cannot fingerprint {}: {}", path.display(), reason);
                    resolution.undecodable.push(path.clone());
                    continue;
                }
                Err(e) => return Err(e),
            };

            match first_seen.get(&fingerprint) {
                Some(original) => {
                    debug!(
                        "{} is a duplicate of {}",
                        path.display(),
                        original.display()
                    );
                    resolution.duplicates.push(Duplicate {
                        path: path.clone(),
                        original: original.clone(),
                    });
                }
                None => {
                    first_seen.insert(fingerprint, path.clone());
                    resolution.keep.push(path.clone());
                }
            }
        }

        info!(
            "Kept {}, {} duplicates, {} undecodable",
            resolution.keep.len(),
            resolution.duplicates.len(),
            resolution.undecodable.len()
        );

        Ok(resolution)
    }
}
