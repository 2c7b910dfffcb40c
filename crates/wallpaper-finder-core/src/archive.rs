use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::logging::{log_file_error, log_fs_modification};

/// Outcome of a commit pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Archive paths of the files that were moved in
    pub committed: Vec<PathBuf>,

    /// Files left in place because the archive already holds their name
    pub leftover: Vec<PathBuf>,

    /// Files that could not be moved for another reason
    pub failed: Vec<(PathBuf, String)>,

    /// Staged copies of committed files that could not be removed
    pub stranded: Vec<PathBuf>,
}

/// Moves kept files into the archive without ever replacing archive content
#[derive(Debug, Clone)]
pub struct ArchiveCommitter {
    archive_dir: PathBuf,
}

impl ArchiveCommitter {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Create the archive directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.archive_dir).map_err(|e| Error::fatal(&self.archive_dir, e))
    }

    /// Move each path into the archive under its base name.
    ///
    /// A path whose name is already taken in the archive is not moved and is
    /// returned in `leftover`; the archive file is left untouched.
    pub fn commit(&self, paths: &[PathBuf]) -> Result<CommitReport> {
        self.commit_with(paths, |source| fs::remove_file(source))
    }

    fn commit_with<F>(&self, paths: &[PathBuf], mut remove_source: F) -> Result<CommitReport>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        self.ensure_dir()?;

        let mut report = CommitReport::default();

        for path in paths {
            let Some(file_name) = path.file_name() else {
                report
                    .failed
                    .push((path.clone(), "path has no file name".to_string()));
                continue;
            };
            let destination = self.archive_dir.join(file_name);

            // Cheap pre-check; the move itself is also no-clobber
            if fs::symlink_metadata(&destination).is_ok() {
                debug!("{} already exists in the archive", destination.display());
                report.leftover.push(path.clone());
                continue;
            }

            match link_no_clobber(path, &destination) {
                Ok(()) => {
                    log_fs_modification("commit", &destination, Some(&path.display().to_string()));
                    match remove_source(path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => {
                            warn!(
                                "Committed {} but could not remove the staged copy: {}",
                                destination.display(),
                                e
                            );
                            report.stranded.push(path.clone());
                        }
                    }
                    report.committed.push(destination);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("{} appeared in the archive during commit", destination.display());
                    report.leftover.push(path.clone());
                }
                Err(e) => {
                    log_file_error(path, "commit", &e);
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Clean up rejected files; returns the ones that could not be removed
    pub fn remove(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        remove_files(paths)
    }
}

/// Place a file at `destination` without replacing an existing one.
///
/// The source is left in place.
fn link_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    // A hard link fails on an existing destination, unlike rename
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            debug!(
                "Hard link {} -> {} failed ({}), copying instead",
                source.display(),
                destination.display(),
                e
            );
            copy_no_clobber(source, destination)?;
        }
    }

    Ok(())
}

fn copy_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    if let Err(e) = io::copy(&mut input, &mut output).and_then(|_| output.sync_all()) {
        // Only the file created above is removed
        drop(output);
        let _ = fs::remove_file(destination);
        return Err(e);
    }

    Ok(())
}

/// Best-effort removal; a file that is already gone counts as removed.
///
/// Returns the paths that could not be removed.
pub fn remove_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut failed = Vec::new();

    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => log_fs_modification("remove", path, None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                log_file_error(path, "remove", &e);
                failed.push(path.clone());
            }
        }
    }

    failed
}

/// Regular files directly inside `dir`, sorted by file name.
///
/// A missing directory has no files.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
