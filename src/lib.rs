//! Groups visually near-duplicate images.
//!
//! Every candidate is decoded once on a worker pool and reduced to a fingerprint,
//! either an average hash (exact bucket matching) or a grey level histogram
//! (pairwise correlation against a threshold). Only groups of two or more images
//! are returned. Images that fail to decode are reported through the progress
//! callback and otherwise ignored.

pub mod cluster;
pub mod finder;
pub mod image_error;
pub mod imagehash;
pub mod mapper;
pub mod source;

pub use cluster::Group;
pub use finder::{find, Config, DuplicateFinder, FingerprintResult, ProgressFn, Strategy, DEFAULT_HASH_SIZE, DEFAULT_THRESHOLD, MAX_HASH_SIZE};
pub use image_error::{ConfigError, ExtractError};
pub use imagehash::{similarity, Fingerprint, Histogram};
pub use source::{ImageSource, MemoryImage};
