use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One entry of a gallery post: a hosted media id and its declared format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    /// Media id as listed by the aggregator
    pub media_id: String,

    /// Declared format, either a bare extension ("jpg") or a mime type ("image/jpg")
    pub format: String,
}

impl GalleryItem {
    pub fn new(media_id: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            format: format.into(),
        }
    }
}

/// Post as delivered by a listing source, with all optional fields still optional
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPost {
    pub url: String,
    pub is_gallery: bool,
    pub is_video: bool,
    pub gallery_items: Option<Vec<GalleryItem>>,
    pub cross_post_parent: Option<Box<RawPost>>,
}

/// A post record normalised into the shapes the link resolver understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostRecord {
    /// A single link to (possibly) an image
    Direct { url: String },

    /// A gallery of hosted items
    Gallery { url: String, items: Vec<GalleryItem> },

    /// A cross-post whose parent is a gallery
    CrossPostGallery {
        url: String,
        parent_url: String,
        items: Vec<GalleryItem>,
    },

    /// A post that can never yield an image
    Unsupported { url: String, reason: SkipReason },
}

impl PostRecord {
    /// The link the post was submitted with
    pub fn url(&self) -> &str {
        match self {
            Self::Direct { url }
            | Self::Gallery { url, .. }
            | Self::CrossPostGallery { url, .. }
            | Self::Unsupported { url, .. } => url,
        }
    }
}

impl From<RawPost> for PostRecord {
    fn from(raw: RawPost) -> Self {
        if raw.is_video {
            return PostRecord::Unsupported {
                url: raw.url,
                reason: SkipReason::Video,
            };
        }

        // A cross-post carries its gallery on the parent, one level deep
        if let Some(parent) = raw.cross_post_parent {
            if let Some(items) = parent.gallery_items.filter(|items| !items.is_empty()) {
                return PostRecord::CrossPostGallery {
                    url: raw.url,
                    parent_url: parent.url,
                    items,
                };
            }
        }

        match raw.gallery_items {
            Some(items) if raw.is_gallery || !items.is_empty() => PostRecord::Gallery {
                url: raw.url,
                items,
            },
            _ => PostRecord::Direct { url: raw.url },
        }
    }
}

/// A resolved, directly fetchable image address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUrl {
    /// Absolute URL, query string removed
    pub url: String,

    /// Expected extension, lowercase and without a dot
    pub extension: String,

    /// Base name used when staging the download
    pub file_name: String,

    /// Link of the post this candidate came from
    pub post_url: String,
}

/// Why a link was skipped during classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// Video or other non-raster media
    Video,

    /// Whole-gallery index page on an image aggregator
    GalleryIndex,

    /// Host is neither a raw image host nor a known aggregator
    UnrecognizedHost(String),

    /// Resolved extension is not in the allow-list
    DisallowedExtension(String),

    /// Link on a raw image host without any file extension
    MissingExtension,

    /// Link could not be parsed
    InvalidUrl(String),

    /// Gallery post without any items
    EmptyGallery,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video link"),
            Self::GalleryIndex => write!(f, "gallery index page"),
            Self::UnrecognizedHost(host) => write!(f, "unrecognized host '{}'", host),
            Self::DisallowedExtension(ext) => write!(f, "extension '{}' not allowed", ext),
            Self::MissingExtension => write!(f, "no file extension"),
            Self::InvalidUrl(reason) => write!(f, "invalid url: {}", reason),
            Self::EmptyGallery => write!(f, "gallery without items"),
        }
    }
}

/// Diagnostic entry for a link that produced no candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedLink {
    pub url: String,
    pub post_url: String,
    pub reason: SkipReason,
}

/// Reason a single download did not produce a staged file
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchFailure {
    #[error("network failure: {0}")]
    Network(String),

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("image of {width}x{height} exceeds the {limit} pixel limit")]
    Oversize { width: u32, height: u32, limit: u64 },

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("encode failure: {0}")]
    Encode(String),

    #[error("cancelled before download")]
    Cancelled,
}

/// A download written to the staging directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staged {
    /// Path of the staged file
    pub path: PathBuf,

    /// Number of bytes written
    pub byte_size: u64,

    /// Extension the file was encoded as
    pub extension: String,

    /// URL the image was downloaded from
    pub source_url: String,
}

/// A download that failed without leaving anything on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failed {
    pub source_url: String,
    pub post_url: String,
    pub reason: FetchFailure,
}

/// Outcome of fetching one candidate URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadResult {
    Staged(Staged),
    Failed(Failed),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_post_is_unsupported() {
        let raw = RawPost {
            url: "https://v.redd.it/abc".to_string(),
            is_video: true,
            ..Default::default()
        };

        let post = PostRecord::from(raw);
        assert_eq!(
            post,
            PostRecord::Unsupported {
                url: "https://v.redd.it/abc".to_string(),
                reason: SkipReason::Video
            }
        );
    }

    #[test]
    fn test_gallery_post() {
        let raw = RawPost {
            url: "https://www.reddit.com/gallery/xyz".to_string(),
            is_gallery: true,
            gallery_items: Some(vec![GalleryItem::new("a1", "image/jpg")]),
            ..Default::default()
        };

        match PostRecord::from(raw) {
            PostRecord::Gallery { items, .. } => assert_eq!(items.len(), 1),
            other => panic!("unexpected post shape: {:?}", other),
        }
    }

    #[test]
    fn test_cross_post_uses_parent_items() {
        let parent = RawPost {
            url: "https://www.reddit.com/gallery/parent".to_string(),
            is_gallery: true,
            gallery_items: Some(vec![
                GalleryItem::new("p1", "png"),
                GalleryItem::new("p2", "jpg"),
            ]),
            ..Default::default()
        };
        let raw = RawPost {
            url: "https://www.reddit.com/r/x/comments/child".to_string(),
            cross_post_parent: Some(Box::new(parent)),
            ..Default::default()
        };

        match PostRecord::from(raw) {
            PostRecord::CrossPostGallery {
                parent_url, items, ..
            } => {
                assert_eq!(parent_url, "https://www.reddit.com/gallery/parent");
                assert_eq!(items.len(), 2);
            }
            other => panic!("unexpected post shape: {:?}", other),
        }
    }

    #[test]
    fn test_plain_post_is_direct() {
        let raw = RawPost {
            url: "https://i.redd.it/a.png".to_string(),
            ..Default::default()
        };
        assert_eq!(
            PostRecord::from(raw),
            PostRecord::Direct {
                url: "https://i.redd.it/a.png".to_string()
            }
        );
    }
}
