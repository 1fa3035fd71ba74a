// src/feed/mod.rs
pub mod cache;
pub mod fetcher;
pub mod parser;
pub mod types;

pub use cache::{Clock, FeedCache, SystemClock, DEFAULT_TTL};
pub use fetcher::{FeedSource, HttpFeedSource};
pub use types::{FeedError, FeedSnapshot, PaperRecord, SharedSnapshot, SnapshotOutcome};
