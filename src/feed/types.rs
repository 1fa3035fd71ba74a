// src/feed/types.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One paper from the feed, already normalized for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaperRecord {
    pub id: String,
    pub published_date: String, // "YYYY-MM-DD", no tz normalization
    pub title: String,
    pub summary: String,
    pub link: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
}

impl PaperRecord {
    /// Authors in feed order, joined for display.
    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

/// Result of one successful fetch cycle. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    fetched_at: DateTime<Utc>,
    records: Vec<PaperRecord>,
}

impl FeedSnapshot {
    pub fn new(records: Vec<PaperRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at,
            records,
        }
    }

    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub type SharedSnapshot = Arc<FeedSnapshot>;

/// Why a fetch cycle produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Transport(String),
    #[error("feed endpoint returned HTTP {0}")]
    HttpStatus(u16),
    #[error("feed document could not be parsed: {0}")]
    Malformed(String),
    #[error("feed returned no entries")]
    EmptyFeed,
}

impl FeedError {
    /// Short stable tag for logs, metric labels and JSON.
    pub fn reason(&self) -> &'static str {
        match self {
            FeedError::Transport(_) => "transport",
            FeedError::HttpStatus(_) => "http_status",
            FeedError::Malformed(_) => "malformed",
            FeedError::EmptyFeed => "empty",
        }
    }
}

/// What the presentation layer receives: a snapshot or the AbsentResult.
pub type SnapshotOutcome = Result<SharedSnapshot, FeedError>;
