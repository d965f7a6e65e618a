//! Metrics sink interface and the in-process registry implementation.
//!
//! Pools publish through the [`StatsSink`] trait so a deployment can route
//! metrics wherever it likes; [`StatsRegistry`] is the default name-keyed
//! in-process implementation, and [`global()`] is the instance pools bind
//! to unless told otherwise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

/// Callback producing the current value of a gauge.
pub type GaugeCallback = Box<dyn Fn() -> f64 + Send + Sync>;

/// The metrics interface the pool consumes. Every operation is safe to
/// call from worker threads.
pub trait StatsSink: Send + Sync {
    /// Register a gauge by name. Idempotent; re-registration resets it.
    fn register_gauge(&self, name: &str);
    /// Bind the callback that produces the gauge value on read.
    fn set_gauge_callback(&self, name: &str, callback: GaugeCallback);
    /// Register a monotonically increasing counter.
    fn register_counter(&self, name: &str);
    /// Add one to a registered counter. Unknown names are ignored.
    fn increment_counter(&self, name: &str);
    /// Register an event (sample) series.
    fn register_event(&self, name: &str);
    /// Record one sample into a registered event series.
    fn record_event(&self, name: &str, value: f64);
}

/// Aggregate view of an event series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventSeries {
    /// Number of recorded samples.
    pub count: u64,
    /// Sum of the recorded samples.
    pub sum: f64,
}

impl EventSeries {
    /// Mean of the recorded samples, or zero when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

enum Metric {
    Counter(AtomicU64),
    Gauge(RwLock<Option<GaugeCallback>>),
    Event(Mutex<EventSeries>),
}

/// Name-keyed in-process metrics registry.
///
/// Counters are lock-free atomics; gauges invoke their registered callback
/// at read time; events accumulate count and sum.
#[derive(Default)]
pub struct StatsRegistry {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl StatsRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value, if `name` is a registered counter.
    #[must_use]
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        match self.metrics.read().get(name) {
            Some(Metric::Counter(value)) => Some(value.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    /// Current gauge value, if `name` is a registered gauge. A gauge with
    /// no callback bound yet reads as zero.
    #[must_use]
    pub fn gauge_value(&self, name: &str) -> Option<f64> {
        match self.metrics.read().get(name) {
            Some(Metric::Gauge(callback)) => {
                Some(callback.read().as_ref().map_or(0.0, |produce| produce()))
            }
            _ => None,
        }
    }

    /// Aggregate of a registered event series.
    #[must_use]
    pub fn event_stats(&self, name: &str) -> Option<EventSeries> {
        match self.metrics.read().get(name) {
            Some(Metric::Event(series)) => Some(*series.lock()),
            _ => None,
        }
    }

    /// Whether any metric is registered under `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.metrics.read().contains_key(name)
    }
}

impl StatsSink for StatsRegistry {
    fn register_gauge(&self, name: &str) {
        self.metrics
            .write()
            .insert(name.to_string(), Metric::Gauge(RwLock::new(None)));
    }

    fn set_gauge_callback(&self, name: &str, callback: GaugeCallback) {
        if let Some(Metric::Gauge(slot)) = self.metrics.read().get(name) {
            *slot.write() = Some(callback);
        }
    }

    fn register_counter(&self, name: &str) {
        self.metrics
            .write()
            .insert(name.to_string(), Metric::Counter(AtomicU64::new(0)));
    }

    fn increment_counter(&self, name: &str) {
        if let Some(Metric::Counter(value)) = self.metrics.read().get(name) {
            value.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn register_event(&self, name: &str) {
        self.metrics
            .write()
            .insert(name.to_string(), Metric::Event(Mutex::new(EventSeries::default())));
    }

    fn record_event(&self, name: &str, value: f64) {
        if let Some(Metric::Event(series)) = self.metrics.read().get(name) {
            let mut series = series.lock();
            series.count += 1;
            series.sum += value;
        }
    }
}

static GLOBAL: Lazy<Arc<StatsRegistry>> = Lazy::new(|| Arc::new(StatsRegistry::new()));

/// The process-wide registry that pools publish to by default.
#[must_use]
pub fn global() -> Arc<StatsRegistry> {
    Arc::clone(&GLOBAL)
}
