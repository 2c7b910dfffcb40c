//! Content fingerprinting of decoded images.

pub mod average_hash;

pub use average_hash::{Fingerprint, Fingerprinter, DEFAULT_HASH_SIZE};
