#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use wallpaper_finder_core::fetch::{CancelToken, Transport};
use wallpaper_finder_core::listing::{Listing, ListingQuery};
use wallpaper_finder_core::{CandidateUrl, Error, FetchFailure, PostRecord, Result};

/// In-memory transport keyed by URL; unknown URLs answer 404
#[derive(Default)]
pub struct StubTransport {
    responses: HashMap<String, std::result::Result<Vec<u8>, FetchFailure>>,
    requests: Mutex<Vec<String>>,
    cancel_after: Option<(usize, CancelToken)>,
    served: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), Ok(body));
        self
    }

    pub fn with_failure(mut self, url: &str, failure: FetchFailure) -> Self {
        self.responses.insert(url.to_string(), Err(failure));
        self
    }

    /// Trip `token` once `count` requests have been served
    pub fn cancel_after(mut self, count: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn get(&self, url: &str) -> std::result::Result<Box<dyn Read + Send>, FetchFailure> {
        self.requests.lock().unwrap().push(url.to_string());

        let served = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((count, token)) = &self.cancel_after {
            if served >= *count {
                token.cancel();
            }
        }

        match self.responses.get(url) {
            Some(Ok(body)) => Ok(Box::new(Cursor::new(body.clone()))),
            Some(Err(failure)) => Err(failure.clone()),
            None => Err(FetchFailure::Network("HTTP 404 Not Found".to_string())),
        }
    }
}

/// Listing that answers from a fixed table of collections
#[derive(Default)]
pub struct StubListing {
    collections: HashMap<String, std::result::Result<Vec<PostRecord>, String>>,
}

impl StubListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(mut self, collection: &str, posts: Vec<PostRecord>) -> Self {
        self.collections.insert(collection.to_string(), Ok(posts));
        self
    }

    pub fn with_error(mut self, collection: &str, reason: &str) -> Self {
        self.collections
            .insert(collection.to_string(), Err(reason.to_string()));
        self
    }
}

impl Listing for StubListing {
    fn posts(&self, query: &ListingQuery) -> Result<Vec<PostRecord>> {
        match self.collections.get(&query.collection) {
            Some(Ok(posts)) => Ok(posts.clone()),
            Some(Err(reason)) => Err(Error::Listing {
                collection: query.collection.clone(),
                reason: reason.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// A checkerboard whose layout depends on `seed`, so different seeds hash differently
pub fn pattern(width: u32, height: u32, seed: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        let cell = (x * 5 / width) + (y * 5 / height) * 5;
        if (cell * 7 + seed * 3) % 5 < 2 {
            Rgb([240, 240, 240])
        } else {
            Rgb([15, 15, 15])
        }
    }))
}

pub fn encode(image: &DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, format).unwrap();
    cursor.into_inner()
}

pub fn png(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(&pattern(width, height, seed), ImageOutputFormat::Png)
}

pub fn jpeg(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(&pattern(width, height, seed), ImageOutputFormat::Jpeg(95))
}

pub fn candidate(url: &str, file_name: &str, extension: &str) -> CandidateUrl {
    CandidateUrl {
        url: url.to_string(),
        extension: extension.to_string(),
        file_name: file_name.to_string(),
        post_url: format!("https://www.reddit.com/post/{}", file_name),
    }
}
