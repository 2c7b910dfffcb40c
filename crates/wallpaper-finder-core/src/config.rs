use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::listing::{ListingQuery, SortMode, TimeWindow};

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Which collections to list and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Collections (subreddits) to pull posts from
    pub collections: Vec<String>,

    /// Sort mode of the listing
    pub sort: SortMode,

    /// Maximum number of posts per collection
    pub limit: u32,

    /// Time window, only used with `SortMode::Top`
    pub time_window: TimeWindow,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            collections: vec!["wallpaper".to_string()],
            sort: SortMode::Top,
            limit: 10,
            time_window: TimeWindow::Month,
        }
    }
}

impl ListingConfig {
    /// Build the listing query for one collection
    pub fn query(&self, collection: &str) -> ListingQuery {
        ListingQuery {
            collection: collection.to_string(),
            sort: self.sort,
            limit: self.limit,
            time_window: self.time_window,
        }
    }
}

/// Configuration for the fetch, dedup and archive pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Staging directory for downloads awaiting review
    pub temp_dir: PathBuf,

    /// Durable directory holding kept images
    pub archive_dir: PathBuf,

    /// Extensions (lowercase, no dot) that may be staged
    pub allowed_extensions: Vec<String>,

    /// Hosts that already serve raw image bytes
    pub raw_image_hosts: Vec<String>,

    /// Number of download workers
    pub workers: usize,

    /// Largest decoded image accepted, in pixels
    pub max_image_pixels: u64,

    /// Side length of the fingerprint grid
    pub hash_size: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// JPEG quality used when staging JPEG files
    pub jpeg_quality: u8,

    /// Whether to drop picked images that are already archived
    pub remove_duplicates: bool,

    /// User agent sent with every request
    pub user_agent: String,

    /// Listing parameters
    pub listing: ListingConfig,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("./temp"),
            archive_dir: PathBuf::from("./saved"),
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            raw_image_hosts: vec![
                "i.redd.it".to_string(),
                "i.imgur.com".to_string(),
                "preview.redd.it".to_string(),
                "external-preview.redd.it".to_string(),
            ],
            workers: 4,
            // Matches the usual decompression-bomb ceiling of image libraries
            max_image_pixels: 178_956_970,
            hash_size: 10,
            request_timeout_secs: 30,
            jpeg_quality: 95,
            remove_duplicates: true,
            user_agent: "Wallpaper finder".to_string(),
            listing: ListingConfig::default(),
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Per-request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Configuration(
                "At least one download worker is required".to_string(),
            ));
        }

        if self.hash_size == 0 || self.hash_size > 64 {
            return Err(Error::Configuration(
                "Fingerprint grid size must be between 1 and 64".to_string(),
            ));
        }

        if self.max_image_pixels == 0 {
            return Err(Error::Configuration(
                "Pixel ceiling must be greater than zero".to_string(),
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(Error::Configuration(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(Error::Configuration(
                "At least one allowed extension is required".to_string(),
            ));
        }

        // Extensions are stored bare, "png" rather than ".png"
        if let Some(ext) = self
            .allowed_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.contains('.'))
        {
            return Err(Error::Configuration(format!(
                "Invalid extension '{}': expected a bare extension such as 'png'",
                ext
            )));
        }

        if self.listing.collections.is_empty() {
            return Err(Error::Configuration(
                "At least one collection must be listed".to_string(),
            ));
        }

        if self.listing.limit == 0 {
            return Err(Error::Configuration(
                "Listing limit must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let config = Config {
            allowed_extensions: vec![".png".to_string()],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut config = Config::default();
        config.workers = 8;
        config.listing.sort = SortMode::New;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "workers": 2, "listing": { "limit": 25 } }"#).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.workers, 2);
        assert_eq!(loaded.listing.limit, 25);
        assert_eq!(loaded.listing.collections, vec!["wallpaper".to_string()]);
        assert_eq!(loaded.hash_size, 10);
    }
}
