//! Classification of post links into directly fetchable image URLs.
//!
//! Classification never performs I/O. Every link either yields candidates or
//! a [`SkipReason`] diagnostic; skips are routine outcomes, not errors.

use log::debug;
use url::Url;

use crate::config::Config;
use crate::types::{CandidateUrl, GalleryItem, PostRecord, SkipReason, UnsupportedLink};

/// Hosts of the image aggregator whose pages wrap a single image
const AGGREGATOR_HOSTS: &[&str] = &["imgur.com", "www.imgur.com", "m.imgur.com"];

/// Direct-content subdomain of the aggregator
const AGGREGATOR_CONTENT_HOST: &str = "i.imgur.com";

/// Extension appended to aggregator links that have none
const AGGREGATOR_DEFAULT_EXTENSION: &str = "png";

/// Host serving gallery media by id
const GALLERY_CONTENT_HOST: &str = "i.redd.it";

const VIDEO_HOSTS: &[&str] = &[
    "v.redd.it",
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtu.be",
    "gfycat.com",
    "redgifs.com",
    "www.redgifs.com",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "gifv", "mov", "mkv", "avi"];

/// Candidates and diagnostics produced by classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub candidates: Vec<CandidateUrl>,
    pub skipped: Vec<UnsupportedLink>,
}

impl Classification {
    /// Append another classification, keeping order
    pub fn extend(&mut self, other: Classification) {
        self.candidates.extend(other.candidates);
        self.skipped.extend(other.skipped);
    }
}

/// Result of resolving a single link
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkOutcome {
    Resolved(ResolvedLink),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedLink {
    url: String,
    extension: String,
    file_name: String,
}

/// Maps post records to candidate image URLs
#[derive(Debug, Clone)]
pub struct LinkResolver {
    allowed_extensions: Vec<String>,
    raw_image_hosts: Vec<String>,
}

impl LinkResolver {
    /// Create a resolver from the configured allow-list and raw hosts
    pub fn new(config: &Config) -> Self {
        Self {
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            raw_image_hosts: config
                .raw_image_hosts
                .iter()
                .map(|host| host.to_lowercase())
                .collect(),
        }
    }

    /// Classify a batch of posts, in order
    pub fn classify_all(&self, posts: &[PostRecord]) -> Classification {
        let mut classification = Classification::default();
        for post in posts {
            classification.extend(self.classify(post));
        }
        classification
    }

    /// Classify one post into zero or more candidates
    pub fn classify(&self, post: &PostRecord) -> Classification {
        let post_url = post.url();
        let mut classification = Classification::default();

        let outcomes: Vec<(String, LinkOutcome)> = match post {
            PostRecord::Unsupported { url, reason } => {
                vec![(url.clone(), LinkOutcome::Skip(reason.clone()))]
            }
            PostRecord::Direct { url } => vec![(url.clone(), self.resolve_link(url))],
            PostRecord::Gallery { url, items } | PostRecord::CrossPostGallery { url, items, .. } => {
                // A gallery post that links straight to an image is handled like a direct link
                match self.resolve_link(url) {
                    resolved @ LinkOutcome::Resolved(_) => vec![(url.clone(), resolved)],
                    LinkOutcome::Skip(_) if items.is_empty() => {
                        vec![(url.clone(), LinkOutcome::Skip(SkipReason::EmptyGallery))]
                    }
                    LinkOutcome::Skip(_) => items
                        .iter()
                        .map(|item| {
                            let outcome = resolve_gallery_item(item);
                            let link = match &outcome {
                                LinkOutcome::Resolved(link) => link.url.clone(),
                                LinkOutcome::Skip(_) => item.media_id.clone(),
                            };
                            (link, outcome)
                        })
                        .collect(),
                }
            }
        };

        for (link, outcome) in outcomes {
            // The allow-list is the final filter
            let outcome = match outcome {
                LinkOutcome::Resolved(resolved) if !self.is_allowed(&resolved.extension) => {
                    LinkOutcome::Skip(SkipReason::DisallowedExtension(resolved.extension))
                }
                other => other,
            };

            match outcome {
                LinkOutcome::Resolved(resolved) => {
                    classification.candidates.push(CandidateUrl {
                        url: resolved.url,
                        extension: resolved.extension,
                        file_name: resolved.file_name,
                        post_url: post_url.to_string(),
                    });
                }
                LinkOutcome::Skip(reason) => {
                    debug!("Skipping {}: {}", link, reason);
                    classification.skipped.push(UnsupportedLink {
                        url: link,
                        post_url: post_url.to_string(),
                        reason,
                    });
                }
            }
        }

        classification
    }

    fn is_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed == extension)
    }

    fn is_raw_host(&self, host: &str) -> bool {
        self.raw_image_hosts.iter().any(|raw| raw == host)
    }

    fn resolve_link(&self, raw: &str) -> LinkOutcome {
        let mut url = match Url::parse(&unescape_entities(raw)) {
            Ok(url) => url,
            Err(e) => return LinkOutcome::Skip(SkipReason::InvalidUrl(e.to_string())),
        };

        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return LinkOutcome::Skip(SkipReason::InvalidUrl("missing host".to_string())),
        };

        let extension = path_extension(url.path());

        if VIDEO_HOSTS.contains(&host.as_str())
            || extension
                .as_deref()
                .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext))
        {
            return LinkOutcome::Skip(SkipReason::Video);
        }

        // Query strings and fragments never affect the content
        url.set_query(None);
        url.set_fragment(None);

        if self.is_raw_host(&host) {
            return match extension {
                Some(extension) => LinkOutcome::Resolved(ResolvedLink {
                    file_name: file_name_of(url.path(), &extension),
                    url: url.to_string(),
                    extension,
                }),
                None => LinkOutcome::Skip(SkipReason::MissingExtension),
            };
        }

        if AGGREGATOR_HOSTS.contains(&host.as_str()) {
            return resolve_aggregator_link(url, extension);
        }

        LinkOutcome::Skip(SkipReason::UnrecognizedHost(host))
    }
}

fn resolve_aggregator_link(mut url: Url, extension: Option<String>) -> LinkOutcome {
    let path = url.path().to_string();
    if path.starts_with("/a/") || path.starts_with("/gallery/") || path.contains("/a/") {
        return LinkOutcome::Skip(SkipReason::GalleryIndex);
    }

    if url.set_host(Some(AGGREGATOR_CONTENT_HOST)).is_err() {
        return LinkOutcome::Skip(SkipReason::InvalidUrl(
            "cannot rewrite aggregator host".to_string(),
        ));
    }

    let extension = match extension {
        Some(extension) => extension,
        None => {
            url.set_path(&format!(
                "{}.{}",
                path.trim_end_matches('/'),
                AGGREGATOR_DEFAULT_EXTENSION
            ));
            AGGREGATOR_DEFAULT_EXTENSION.to_string()
        }
    };

    LinkOutcome::Resolved(ResolvedLink {
        file_name: file_name_of(url.path(), &extension),
        url: url.to_string(),
        extension,
    })
}

fn resolve_gallery_item(item: &GalleryItem) -> LinkOutcome {
    let format = item.format.trim().to_lowercase();
    let extension = format.strip_prefix("image/").unwrap_or(&format).to_string();

    let raw = format!(
        "https://{}/{}.{}",
        GALLERY_CONTENT_HOST,
        item.media_id.trim(),
        extension
    );

    match Url::parse(&unescape_entities(&raw)) {
        Ok(url) => LinkOutcome::Resolved(ResolvedLink {
            file_name: file_name_of(url.path(), &extension),
            url: url.to_string(),
            extension,
        }),
        Err(e) => LinkOutcome::Skip(SkipReason::InvalidUrl(e.to_string())),
    }
}

/// Undo HTML entity escaping left in raw listing strings
pub fn unescape_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Lowercase extension of the last path segment, if it has one
fn path_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next().unwrap_or_default();
    let (stem, extension) = segment.rsplit_once('.')?;

    if stem.is_empty() || extension.is_empty() {
        return None;
    }

    Some(extension.to_lowercase())
}

/// Filesystem-safe base name for a URL path
fn file_name_of(path: &str, extension: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or_default();
    let sanitized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('.').is_empty() {
        format!("image.{}", extension)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LinkResolver {
        LinkResolver::new(&Config::default())
    }

    fn direct(url: &str) -> PostRecord {
        PostRecord::Direct {
            url: url.to_string(),
        }
    }

    #[test]
    fn test_direct_link_strips_query() {
        let result = resolver().classify(&direct("https://i.redd.it/abc.jpg?width=640&s=xyz"));

        assert!(result.skipped.is_empty());
        assert_eq!(result.candidates.len(), 1);
        let candidate = &result.candidates[0];
        assert_eq!(candidate.url, "https://i.redd.it/abc.jpg");
        assert_eq!(candidate.extension, "jpg");
        assert_eq!(candidate.file_name, "abc.jpg");
        assert_eq!(
            candidate.post_url,
            "https://i.redd.it/abc.jpg?width=640&s=xyz"
        );
    }

    #[test]
    fn test_extension_is_lowercased() {
        let result = resolver().classify(&direct("https://i.imgur.com/Abc.JPG"));
        assert_eq!(result.candidates[0].extension, "jpg");
        assert_eq!(result.candidates[0].file_name, "Abc.JPG");
    }

    #[test]
    fn test_aggregator_link_is_rewritten() {
        let result = resolver().classify(&direct("https://imgur.com/xYz12"));

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].url, "https://i.imgur.com/xYz12.png");
        assert_eq!(result.candidates[0].extension, "png");
        assert_eq!(result.candidates[0].file_name, "xYz12.png");
    }

    #[test]
    fn test_aggregator_link_keeps_extension() {
        let result = resolver().classify(&direct("https://imgur.com/xYz12.jpg"));
        assert_eq!(result.candidates[0].url, "https://i.imgur.com/xYz12.jpg");
        assert_eq!(result.candidates[0].extension, "jpg");
    }

    #[test]
    fn test_gallery_items_yield_one_candidate_each() {
        let post = PostRecord::Gallery {
            url: "https://www.reddit.com/gallery/g1".to_string(),
            items: vec![
                GalleryItem::new("m1", "jpg"),
                GalleryItem::new("m2", "png"),
                GalleryItem::new("m3", "jpg"),
            ],
        };

        let result = resolver().classify(&post);

        assert!(result.skipped.is_empty());
        let extensions: Vec<&str> = result
            .candidates
            .iter()
            .map(|c| c.extension.as_str())
            .collect();
        assert_eq!(extensions, vec!["jpg", "png", "jpg"]);
        assert_eq!(result.candidates[1].url, "https://i.redd.it/m2.png");
        assert!(result
            .candidates
            .iter()
            .all(|c| c.post_url == "https://www.reddit.com/gallery/g1"));
    }

    #[test]
    fn test_gallery_mime_formats() {
        let post = PostRecord::Gallery {
            url: "https://www.reddit.com/gallery/g1".to_string(),
            items: vec![GalleryItem::new("m1", "image/JPEG")],
        };

        let result = resolver().classify(&post);
        assert_eq!(result.candidates[0].url, "https://i.redd.it/m1.jpeg");
    }

    #[test]
    fn test_cross_post_gallery_uses_parent_items() {
        let post = PostRecord::CrossPostGallery {
            url: "https://www.reddit.com/r/a/comments/child".to_string(),
            parent_url: "https://www.reddit.com/gallery/parent".to_string(),
            items: vec![GalleryItem::new("p1", "png"), GalleryItem::new("p2", "gif")],
        };

        let result = resolver().classify(&post);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].url, "https://i.redd.it/p1.png");
        assert_eq!(
            result.skipped[0].reason,
            SkipReason::DisallowedExtension("gif".to_string())
        );
    }

    #[test]
    fn test_escaped_ampersand_is_unescaped() {
        let result = resolver().classify(&direct(
            "https://preview.redd.it/abc.png?width=1080&amp;format=png&amp;auto=webp",
        ));
        assert_eq!(result.candidates[0].url, "https://preview.redd.it/abc.png");

        assert_eq!(unescape_entities("a&amp;b&amp;amp;c"), "a&b&amp;c");
    }

    #[test]
    fn test_video_and_gallery_index_are_distinct_skips() {
        let resolver = resolver();
        let mut result = resolver.classify(&direct("https://v.redd.it/abcdef"));
        result.extend(resolver.classify(&direct("https://imgur.com/a/album1")));

        assert!(result.candidates.is_empty());
        assert_eq!(result.skipped.len(), 2);
        assert_eq!(result.skipped[0].reason, SkipReason::Video);
        assert_eq!(result.skipped[1].reason, SkipReason::GalleryIndex);
    }

    #[test]
    fn test_video_extension_is_skipped() {
        let result = resolver().classify(&direct("https://i.imgur.com/clip.gifv"));
        assert_eq!(result.skipped[0].reason, SkipReason::Video);
    }

    #[test]
    fn test_unrecognized_host_is_skipped() {
        let result = resolver().classify(&direct("https://example.com/picture.jpg"));
        assert_eq!(
            result.skipped[0].reason,
            SkipReason::UnrecognizedHost("example.com".to_string())
        );
    }

    #[test]
    fn test_disallowed_extension_is_dropped() {
        let result = resolver().classify(&direct("https://i.redd.it/anim.gif"));
        assert!(result.candidates.is_empty());
        assert_eq!(
            result.skipped[0].reason,
            SkipReason::DisallowedExtension("gif".to_string())
        );
    }

    #[test]
    fn test_custom_allow_list() {
        let config = Config {
            allowed_extensions: vec!["gif".to_string()],
            ..Config::default()
        };
        let result = LinkResolver::new(&config).classify(&direct("https://i.redd.it/anim.gif"));
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn test_empty_gallery_and_invalid_url() {
        let resolver = resolver();
        let empty = PostRecord::Gallery {
            url: "https://www.reddit.com/gallery/none".to_string(),
            items: vec![],
        };
        assert_eq!(
            resolver.classify(&empty).skipped[0].reason,
            SkipReason::EmptyGallery
        );

        let invalid = resolver.classify(&direct("/r/wallpaper/comments/abc"));
        assert!(matches!(
            invalid.skipped[0].reason,
            SkipReason::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_unsupported_post_is_recorded() {
        let post = PostRecord::Unsupported {
            url: "https://v.redd.it/x".to_string(),
            reason: SkipReason::Video,
        };
        let result = resolver().classify(&post);
        assert!(result.candidates.is_empty());
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let resolver = resolver();
        let post = direct("https://imgur.com/abc");
        assert_eq!(resolver.classify(&post), resolver.classify(&post));
    }
}
