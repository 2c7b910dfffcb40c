//! Listing sources that turn a collection name into post records.
//!
//! The pipeline only depends on the [`Listing`] trait. [`RedditFeed`] is the
//! anonymous JSON feed implementation used by the command line tool.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{GalleryItem, PostRecord, RawPost};

/// Default base URL of the anonymous feed
pub const DEFAULT_FEED_URL: &str = "https://www.reddit.com";

/// Sort mode of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Hot,
    New,
    Top,
    Rising,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::New => "new",
            Self::Top => "top",
            Self::Rising => "rising",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "new" => Ok(Self::New),
            "top" => Ok(Self::Top),
            "rising" => Ok(Self::Rising),
            other => Err(format!(
                "unknown sort mode '{}': expected hot, new, top or rising",
                other
            )),
        }
    }
}

/// Time window of a `top` listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown time window '{}': expected hour, day, week, month, year or all",
                other
            )),
        }
    }
}

/// One listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub collection: String,
    pub sort: SortMode,
    pub limit: u32,
    pub time_window: TimeWindow,
}

/// A source of post records
pub trait Listing {
    /// List the posts of one collection
    fn posts(&self, query: &ListingQuery) -> Result<Vec<PostRecord>>;
}

/// Anonymous JSON feed listing
pub struct RedditFeed {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl RedditFeed {
    /// Create a feed client from the configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_FEED_URL.to_string(),
        })
    }

    /// Point the feed at another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of the listing for a query; the collection is escaped as one path segment
    pub fn listing_url(&self, query: &ListingQuery) -> Result<String> {
        let listing_error = |reason: String| Error::Listing {
            collection: query.collection.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| listing_error(format!("invalid feed URL '{}': {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| listing_error(format!("feed URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push("r")
            .push(&query.collection)
            .push(&format!("{}.json", query.sort));

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());

            // The window is only meaningful for top listings
            if query.sort == SortMode::Top {
                pairs.append_pair("t", &query.time_window.to_string());
            }
        }

        Ok(url.into())
    }
}

impl Listing for RedditFeed {
    fn posts(&self, query: &ListingQuery) -> Result<Vec<PostRecord>> {
        let url = self.listing_url(query)?;
        info!("Listing r/{} from {}", query.collection, url);

        let listing_error = |reason: String| Error::Listing {
            collection: query.collection.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| listing_error(e.to_string()))?;

        let body = response.text().map_err(|e| listing_error(e.to_string()))?;
        let raw_posts = parse_listing(&body).map_err(|e| listing_error(e.to_string()))?;

        debug!("r/{} returned {} posts", query.collection, raw_posts.len());
        Ok(raw_posts.into_iter().map(PostRecord::from).collect())
    }
}

#[derive(Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PostData {
    url: Option<String>,
    is_gallery: Option<bool>,
    is_video: Option<bool>,
    gallery_data: Option<GalleryData>,
    media_metadata: Option<HashMap<String, MediaMetadata>>,
    crosspost_parent_list: Option<Vec<PostData>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GalleryData {
    items: Vec<GalleryDataItem>,
}

#[derive(Deserialize)]
struct GalleryDataItem {
    media_id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MediaMetadata {
    /// Mime type, e.g. "image/jpg"
    m: Option<String>,
}

/// Parse a listing body into raw posts, in listing order
pub fn parse_listing(body: &str) -> serde_json::Result<Vec<RawPost>> {
    let response: ListingResponse = serde_json::from_str(body)?;

    Ok(response
        .data
        .children
        .into_iter()
        .map(|child| raw_post(child.data, true))
        .collect())
}

fn raw_post(data: PostData, follow_parent: bool) -> RawPost {
    let gallery_items = data.gallery_data.map(|gallery| {
        let metadata = data.media_metadata.unwrap_or_default();

        gallery
            .items
            .into_iter()
            .filter_map(|item| {
                // Items whose media failed processing carry no mime type
                let format = metadata.get(&item.media_id).and_then(|meta| meta.m.clone());
                match format {
                    Some(format) => Some(GalleryItem::new(item.media_id, format)),
                    None => {
                        debug!("Gallery item {} has no media metadata", item.media_id);
                        None
                    }
                }
            })
            .collect()
    });

    // Only one level of cross-post parent is followed
    let cross_post_parent = if follow_parent {
        data.crosspost_parent_list
            .and_then(|parents| parents.into_iter().next())
            .map(|parent| Box::new(raw_post(parent, false)))
    } else {
        None
    };

    RawPost {
        url: data.url.unwrap_or_default(),
        is_gallery: data.is_gallery.unwrap_or(false),
        is_video: data.is_video.unwrap_or(false),
        gallery_items,
        cross_post_parent,
    }
}
