// src/feed/cache.rs
//! Time-bounded cache over the remote paper listing.
//!
//! The cache owns at most one snapshot. A snapshot younger than the TTL is
//! handed out as the same `Arc`; otherwise one fetch cycle runs. Failed cycles
//! never replace a good snapshot and never advance the clock, so the next
//! call after a failure tries again.
//!
//! Fetches are single-flight: callers that queued behind an in-flight attempt
//! take its outcome, success or failure, instead of fetching again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::fetcher::FeedSource;
use super::parser::parse_feed;
use super::types::{FeedError, FeedSnapshot, SharedSnapshot, SnapshotOutcome};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of the most recent fetch attempt, guarded by the fetch lock.
#[derive(Debug, Default)]
struct LastAttempt {
    seq: u64,
    failure: Option<FeedError>,
}

pub struct FeedCache {
    source: Arc<dyn FeedSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    // Short-held; never locked across an await.
    slot: RwLock<Option<SharedSnapshot>>,
    // Held across the fetch so concurrent misses share one request.
    fetch: Mutex<LastAttempt>,
    // Count of finished attempts, readable without the fetch lock.
    attempts_done: AtomicU64,
}

impl FeedCache {
    pub fn new(source: Arc<dyn FeedSource>, ttl: Duration) -> Self {
        Self::with_clock(source, Arc::new(SystemClock), ttl)
    }

    pub fn with_clock(source: Arc<dyn FeedSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        gauge!("feed_cache_ttl_secs").set(ttl.as_secs_f64());
        Self {
            source,
            clock,
            ttl,
            slot: RwLock::new(None),
            fetch: Mutex::new(LastAttempt::default()),
            attempts_done: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot, refreshing it first if it is missing or expired.
    ///
    /// `Err` is the AbsentResult: nothing usable was produced by this call.
    /// A previously stored snapshot stays in place (see [`FeedCache::last_good`]).
    pub async fn get_snapshot(&self) -> SnapshotOutcome {
        if let Some(snap) = self.fresh_snapshot() {
            return Ok(snap);
        }

        let seen = self.attempts_done.load(Ordering::SeqCst);
        let mut attempt = self.fetch.lock().await;

        // Someone else refreshed while we waited.
        if let Some(snap) = self.fresh_snapshot() {
            return Ok(snap);
        }
        // An attempt finished (and failed) while we waited: share it.
        if attempt.seq > seen {
            if let Some(e) = &attempt.failure {
                debug!(target: "feed", reason = e.reason(), "sharing failed attempt");
                return Err(e.clone());
            }
        }

        let outcome = self.fetch_cycle().await;
        attempt.seq += 1;
        match &outcome {
            Ok(snap) => {
                *self.slot.write().unwrap_or_else(|p| p.into_inner()) = Some(Arc::clone(snap));
                attempt.failure = None;
            }
            Err(e) => {
                counter!("feed_fetch_errors_total", "reason" => e.reason()).increment(1);
                warn!(
                    target: "feed",
                    source = self.source.name(),
                    reason = e.reason(),
                    error = %e,
                    kept_previous = self.last_good().is_some(),
                    "feed fetch failed"
                );
                attempt.failure = Some(e.clone());
            }
        }
        self.attempts_done.store(attempt.seq, Ordering::SeqCst);
        outcome
    }

    /// Last successfully fetched snapshot, regardless of age.
    /// Does not wait for an in-flight fetch.
    pub fn last_good(&self) -> Option<SharedSnapshot> {
        self.slot.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn fresh_snapshot(&self) -> Option<SharedSnapshot> {
        let snap = self.last_good()?;
        if !self.is_fresh(&snap) {
            return None;
        }
        counter!("feed_cache_hits_total").increment(1);
        debug!(target: "feed", records = snap.len(), "cache hit");
        Some(snap)
    }

    fn is_fresh(&self, snap: &FeedSnapshot) -> bool {
        // A clock that moved backwards yields a negative age; treat as fresh.
        let age = (self.clock.now() - snap.fetched_at())
            .to_std()
            .unwrap_or(Duration::ZERO);
        age < self.ttl
    }

    async fn fetch_cycle(&self) -> Result<SharedSnapshot, FeedError> {
        let t0 = Instant::now();
        counter!("feed_fetch_total").increment(1);

        let body = self.source.fetch().await?;
        let records = parse_feed(&body)?;
        if records.is_empty() {
            return Err(FeedError::EmptyFeed);
        }

        let snap = Arc::new(FeedSnapshot::new(records, self.clock.now()));
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_fetch_ms").record(ms);
        gauge!("feed_snapshot_records").set(snap.len() as f64);
        info!(
            target: "feed",
            source = self.source.name(),
            records = snap.len(),
            elapsed_ms = ms,
            "feed refreshed"
        );
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    const ONE_ENTRY: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
<entry><id>http://arxiv.org/abs/1</id><published>2024-05-01T12:00:00Z</published>
<title>First</title><summary>s</summary><author><name>A</name></author>
<link href="http://arxiv.org/abs/1" rel="alternate"/></entry></feed>"#;

    const OTHER_ENTRY: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
<entry><id>http://arxiv.org/abs/2</id><published>2024-05-02T12:00:00Z</published>
<title>Second</title><summary>s</summary><author><name>B</name></author>
<link href="http://arxiv.org/abs/2" rel="alternate"/></entry></feed>"#;

    const NO_ENTRIES: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>q</title></feed>"#;

    struct ScriptedSource {
        replies: StdMutex<VecDeque<Result<String, FeedError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<&str, FeedError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch(&self) -> Result<String, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Transport("script exhausted".into())))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn at_epoch() -> Arc<Self> {
            Arc::new(Self(StdMutex::new(
                Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            )))
        }

        fn advance(&self, secs: i64) {
            let mut t = self.0.lock().unwrap();
            *t += chrono::TimeDelta::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn cache(source: Arc<ScriptedSource>, clock: Arc<ManualClock>) -> FeedCache {
        FeedCache::with_clock(source, clock, DEFAULT_TTL)
    }

    #[tokio::test]
    async fn fresh_snapshot_is_reused_until_ttl() {
        let src = ScriptedSource::new(vec![Ok(ONE_ENTRY), Ok(OTHER_ENTRY)]);
        let clock = ManualClock::at_epoch();
        let c = cache(src.clone(), clock.clone());

        let s1 = c.get_snapshot().await.unwrap();
        assert_eq!(src.calls(), 1);

        clock.advance(3599);
        let again = c.get_snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&s1, &again));
        assert_eq!(src.calls(), 1);

        clock.advance(2); // T + 3601
        let s2 = c.get_snapshot().await.unwrap();
        assert_eq!(src.calls(), 2);
        assert!(!Arc::ptr_eq(&s1, &s2));
        assert_eq!(s2.records()[0].title, "Second");
    }

    #[tokio::test]
    async fn snapshot_is_stamped_with_fetch_time() {
        let src = ScriptedSource::new(vec![Ok(ONE_ENTRY)]);
        let clock = ManualClock::at_epoch();
        let c = cache(src, clock.clone());
        let s = c.get_snapshot().await.unwrap();
        assert_eq!(s.fetched_at(), clock.now());
    }

    #[tokio::test]
    async fn empty_feed_is_absent_and_not_stored() {
        let src = ScriptedSource::new(vec![Ok(NO_ENTRIES)]);
        let c = cache(src, ManualClock::at_epoch());
        assert_eq!(c.get_snapshot().await.unwrap_err(), FeedError::EmptyFeed);
        assert!(c.last_good().is_none());
    }

    #[tokio::test]
    async fn failure_keeps_last_good_snapshot() {
        let src = ScriptedSource::new(vec![
            Ok(ONE_ENTRY),
            Err(FeedError::Transport("connection reset".into())),
            Ok(NO_ENTRIES),
            Ok("<not-xml"),
            Ok(OTHER_ENTRY),
        ]);
        let clock = ManualClock::at_epoch();
        let c = cache(src.clone(), clock.clone());

        let s1 = c.get_snapshot().await.unwrap();
        clock.advance(3600);

        let err = c.get_snapshot().await.unwrap_err();
        assert_eq!(err.reason(), "transport");
        assert!(Arc::ptr_eq(&c.last_good().unwrap(), &s1));

        assert_eq!(c.get_snapshot().await.unwrap_err(), FeedError::EmptyFeed);
        assert!(matches!(
            c.get_snapshot().await,
            Err(FeedError::Malformed(_))
        ));
        assert!(Arc::ptr_eq(&c.last_good().unwrap(), &s1));

        // Failures do not advance the clock: each call retried immediately.
        assert_eq!(src.calls(), 4);
        let s2 = c.get_snapshot().await.unwrap();
        assert_eq!(src.calls(), 5);
        assert_eq!(s2.records()[0].title, "Second");
        assert!(Arc::ptr_eq(&c.last_good().unwrap(), &s2));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let src = Arc::new(ScriptedSource {
            replies: StdMutex::new(VecDeque::from(vec![Ok(ONE_ENTRY.to_string())])),
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let c = Arc::new(cache(src.clone(), ManualClock::at_epoch()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&c);
            handles.push(tokio::spawn(async move { c.get_snapshot().await }));
        }
        let mut snaps = Vec::new();
        for h in handles {
            snaps.push(h.await.unwrap().unwrap());
        }

        assert_eq!(src.calls(), 1);
        assert!(snaps.iter().all(|s| Arc::ptr_eq(s, &snaps[0])));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_failure() {
        let src = Arc::new(ScriptedSource {
            replies: StdMutex::new(VecDeque::from(vec![
                Err(FeedError::Transport("connection reset".into())),
                Ok(ONE_ENTRY.to_string()),
            ])),
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let c = Arc::new(cache(src.clone(), ManualClock::at_epoch()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&c);
            handles.push(tokio::spawn(async move { c.get_snapshot().await }));
        }
        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert_eq!(err.reason(), "transport");
        }
        assert_eq!(src.calls(), 1);

        // A later request is a new attempt.
        let snap = c.get_snapshot().await.unwrap();
        assert_eq!(snap.records()[0].title, "First");
        assert_eq!(src.calls(), 2);
    }

    #[tokio::test]
    async fn last_good_does_not_wait_for_inflight_fetch() {
        let src = Arc::new(ScriptedSource {
            replies: StdMutex::new(VecDeque::from(vec![
                Ok(ONE_ENTRY.to_string()),
                Ok(OTHER_ENTRY.to_string()),
            ])),
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(200),
        });
        let clock = ManualClock::at_epoch();
        let c = Arc::new(cache(src.clone(), clock.clone()));
        let s1 = c.get_snapshot().await.unwrap();
        clock.advance(3600);

        let refresh = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.get_snapshot().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(src.calls(), 2);

        let started = Instant::now();
        let during = c.last_good().unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(Arc::ptr_eq(&during, &s1));
        assert!(!refresh.is_finished());

        let s2 = refresh.await.unwrap().unwrap();
        assert_eq!(s2.records()[0].title, "Second");
        assert!(Arc::ptr_eq(&c.last_good().unwrap(), &s2));
    }

    #[tokio::test]
    async fn clock_going_backwards_keeps_snapshot() {
        let src = ScriptedSource::new(vec![Ok(ONE_ENTRY)]);
        let clock = ManualClock::at_epoch();
        let c = cache(src.clone(), clock.clone());
        let s1 = c.get_snapshot().await.unwrap();
        clock.advance(-120);
        let s2 = c.get_snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&s1, &s2));
        assert_eq!(src.calls(), 1);
    }
}
