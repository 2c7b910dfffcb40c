use std::path::PathBuf;

use crate::error::Result;

/// Lets a curator choose which staged files to keep
pub trait Picker {
    /// Return the subset of `staged` to keep; may be empty
    fn pick(&mut self, staged: &[PathBuf]) -> Result<Vec<PathBuf>>;
}

/// Keeps every staged file
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl Picker for KeepAll {
    fn pick(&mut self, staged: &[PathBuf]) -> Result<Vec<PathBuf>> {
        Ok(staged.to_vec())
    }
}

impl<F> Picker for F
where
    F: FnMut(&[PathBuf]) -> Result<Vec<PathBuf>>,
{
    fn pick(&mut self, staged: &[PathBuf]) -> Result<Vec<PathBuf>> {
        self(staged)
    }
}
