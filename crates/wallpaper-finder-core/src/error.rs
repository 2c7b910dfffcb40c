use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the wallpaper-finder library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A collection could not be listed
    #[error("Failed to list '{collection}': {reason}")]
    Listing { collection: String, reason: String },

    /// A staged or archived file could not be decoded for fingerprinting
    #[error("Undecodable image {}: {reason}", path.display())]
    UndecodableImage { path: PathBuf, reason: String },

    /// A required directory could not be created or written; aborts the run
    #[error("File system failure at {}: {source}", path.display())]
    FileSystemFatal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl Error {
    /// Wrap an I/O error on a required directory as a fatal error
    pub fn fatal(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileSystemFatal {
            path: path.into(),
            source,
        }
    }
}
