// crates/core/src/stats.rs
//! Process-wide stats collector and time-series ring.
//!
//! One `StatsCollector` is created per run and passed by handle; there is
//! no global singleton. Writers take the write lock briefly per counter
//! bump; readers obtain a consistent [`StatsSnapshot`] clone and never hold
//! the lock past the snapshot window.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use nomenorm_types::ProcessingLevel;

#[derive(Debug, Default, Clone, Serialize)]
struct AiStats {
    requests: u64,
    successes: u64,
    failures: u64,
    total_latency_ms: u64,
}

#[derive(Debug, Default, Clone, Serialize)]
struct CacheStats {
    hits: u64,
    misses: u64,
    size: u64,
    approx_bytes: u64,
}

#[derive(Debug, Default, Clone, Serialize)]
struct BatchStats {
    batches: u64,
    total_items: u64,
}

#[derive(Debug, Default, Clone, Serialize)]
struct TierStats {
    basic: u64,
    ai_enhanced: u64,
    benchmark: u64,
    total_quality: f64,
}

#[derive(Debug, Default, Clone, Serialize)]
struct ErrorStats {
    total: u64,
    by_type: HashMap<String, u64>,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
struct TimingStats {
    start_time: DateTime<Utc>,
    total_processing_ms: u64,
    items_processed: u64,
}

#[derive(Debug, Clone)]
struct StatsInner {
    ai: AiStats,
    cache: CacheStats,
    batch: BatchStats,
    tiers: TierStats,
    errors: ErrorStats,
    timing: TimingStats,
}

/// Consistent point-in-time copy with the derived figures filled in.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub taken_at: DateTime<Utc>,

    pub ai_requests: u64,
    pub ai_successes: u64,
    pub ai_failures: u64,
    pub ai_total_latency_ms: u64,
    pub ai_mean_latency_ms: f64,

    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub cache_size: u64,
    pub cache_approx_bytes: u64,

    pub batches: u64,
    pub batch_total_items: u64,
    pub batch_mean_items: f64,

    pub tier_basic: u64,
    pub tier_ai_enhanced: u64,
    pub tier_benchmark: u64,
    pub mean_quality: f64,

    pub errors_total: u64,
    pub errors_by_type: HashMap<String, u64>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,

    pub start_time: DateTime<Utc>,
    pub total_processing_ms: u64,
    pub items_processed: u64,
    pub mean_item_ms: f64,
}

/// Cheaply clonable handle to the per-run stats sink.
#[derive(Clone)]
pub struct StatsCollector {
    inner: Arc<RwLock<StatsInner>>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatsInner {
                ai: AiStats::default(),
                cache: CacheStats::default(),
                batch: BatchStats::default(),
                tiers: TierStats::default(),
                errors: ErrorStats::default(),
                timing: TimingStats {
                    start_time: Utc::now(),
                    total_processing_ms: 0,
                    items_processed: 0,
                },
            })),
        }
    }

    pub fn record_ai_request(&self, latency: Duration, success: bool) {
        let mut inner = self.write();
        inner.ai.requests += 1;
        inner.ai.total_latency_ms += latency.as_millis() as u64;
        if success {
            inner.ai.successes += 1;
        } else {
            inner.ai.failures += 1;
        }
    }

    pub fn record_cache_hit(&self) {
        self.write().cache.hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.write().cache.misses += 1;
    }

    pub fn set_cache_size(&self, entries: u64, approx_bytes: u64) {
        let mut inner = self.write();
        inner.cache.size = entries;
        inner.cache.approx_bytes = approx_bytes;
    }

    pub fn record_batch(&self, items: u64) {
        let mut inner = self.write();
        inner.batch.batches += 1;
        inner.batch.total_items += items;
    }

    pub fn record_tier(&self, level: ProcessingLevel) {
        let mut inner = self.write();
        match level {
            ProcessingLevel::Basic => inner.tiers.basic += 1,
            ProcessingLevel::AiEnhanced => inner.tiers.ai_enhanced += 1,
            ProcessingLevel::Benchmark => inner.tiers.benchmark += 1,
        }
    }

    pub fn record_quality(&self, score: f64) {
        self.write().tiers.total_quality += score;
    }

    /// Every absorbed error lands here; no catch path is silent.
    pub fn record_error(&self, error_type: &str, message: impl Into<String>) {
        let mut inner = self.write();
        inner.errors.total += 1;
        *inner.errors.by_type.entry(error_type.to_string()).or_insert(0) += 1;
        inner.errors.last_error = Some(message.into());
        inner.errors.last_error_at = Some(Utc::now());
    }

    pub fn record_item(&self, elapsed: Duration) {
        let mut inner = self.write();
        inner.timing.items_processed += 1;
        inner.timing.total_processing_ms += elapsed.as_millis() as u64;
    }

    /// Consistent copy with derived means/rates.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner()).clone();

        let lookups = inner.cache.hits + inner.cache.misses;
        StatsSnapshot {
            taken_at: Utc::now(),
            ai_requests: inner.ai.requests,
            ai_successes: inner.ai.successes,
            ai_failures: inner.ai.failures,
            ai_total_latency_ms: inner.ai.total_latency_ms,
            ai_mean_latency_ms: mean(inner.ai.total_latency_ms, inner.ai.requests),
            cache_hits: inner.cache.hits,
            cache_misses: inner.cache.misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.cache.hits as f64 / lookups as f64
            },
            cache_size: inner.cache.size,
            cache_approx_bytes: inner.cache.approx_bytes,
            batches: inner.batch.batches,
            batch_total_items: inner.batch.total_items,
            batch_mean_items: mean(inner.batch.total_items, inner.batch.batches),
            tier_basic: inner.tiers.basic,
            tier_ai_enhanced: inner.tiers.ai_enhanced,
            tier_benchmark: inner.tiers.benchmark,
            mean_quality: {
                let scored = inner.tiers.basic + inner.tiers.ai_enhanced + inner.tiers.benchmark;
                if scored == 0 {
                    0.0
                } else {
                    inner.tiers.total_quality / scored as f64
                }
            },
            errors_total: inner.errors.total,
            errors_by_type: inner.errors.by_type,
            last_error: inner.errors.last_error,
            last_error_at: inner.errors.last_error_at,
            start_time: inner.timing.start_time,
            total_processing_ms: inner.timing.total_processing_ms,
            items_processed: inner.timing.items_processed,
            mean_item_ms: mean(inner.timing.total_processing_ms, inner.timing.items_processed),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StatsInner> {
        // A poisoned lock only means a writer panicked mid-bump; counters
        // remain usable.
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn mean(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

// ============================================================================
// Time series
// ============================================================================

/// Bounded ring of periodic snapshots for graphing.
#[derive(Clone)]
pub struct StatsTimeSeries {
    ring: Arc<Mutex<VecDeque<StatsSnapshot>>>,
    capacity: usize,
}

impl StatsTimeSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, snapshot: StatsSnapshot) {
        let mut ring = self.ring.lock().unwrap_or_else(|e| e.into_inner());
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(snapshot);
    }

    pub fn samples(&self) -> Vec<StatsSnapshot> {
        self.ring
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodic sampler task: snapshots `stats` into `series` every `interval`
/// until cancelled.
pub fn spawn_sampler(
    stats: StatsCollector,
    series: StatsTimeSeries,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so samples are spaced.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => series.push(stats.snapshot()),
            }
        }
    })
}
