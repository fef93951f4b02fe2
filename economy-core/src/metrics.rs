//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the economy. Each engine owns its
//! registry; the host decides how to expose it.
//!
//! # Metrics
//!
//! - `economy_transactions_total{kind}` - Applied transactions
//! - `economy_rejections_total{kind,reason}` - Rejected transactions
//! - `economy_circulating_gold` - GOLD held across all accounts
//! - `economy_inflation_rate` - Rate computed on the last tick
//! - `economy_inflation_ticks_total` - Recalibrations run
//! - `economy_persist_failures_total` - Failed snapshot saves
//! - `economy_persist_duration_seconds` - Snapshot save latency

use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Applied transactions by kind
    pub transactions_total: IntCounterVec,

    /// Rejected transactions by kind and reason
    pub rejections_total: IntCounterVec,

    /// Circulating GOLD
    pub circulating_gold: Gauge,

    /// Current inflation rate
    pub inflation_rate: Gauge,

    /// Recalibrations run
    pub inflation_ticks_total: IntCounter,

    /// Failed snapshot saves
    pub persist_failures_total: IntCounter,

    /// Snapshot save latency
    pub persist_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounterVec::new(
            Opts::new("economy_transactions_total", "Applied transactions"),
            &["kind"],
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("economy_rejections_total", "Rejected transactions"),
            &["kind", "reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let circulating_gold = Gauge::new("economy_circulating_gold", "GOLD held across all accounts")?;
        registry.register(Box::new(circulating_gold.clone()))?;

        let inflation_rate = Gauge::new("economy_inflation_rate", "Inflation rate of the last tick")?;
        registry.register(Box::new(inflation_rate.clone()))?;

        let inflation_ticks_total =
            IntCounter::new("economy_inflation_ticks_total", "Recalibrations run")?;
        registry.register(Box::new(inflation_ticks_total.clone()))?;

        let persist_failures_total =
            IntCounter::new("economy_persist_failures_total", "Failed snapshot saves")?;
        registry.register(Box::new(persist_failures_total.clone()))?;

        let persist_duration = Histogram::with_opts(
            HistogramOpts::new("economy_persist_duration_seconds", "Snapshot save latency")
                .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(persist_duration.clone()))?;

        Ok(Self {
            transactions_total,
            rejections_total,
            circulating_gold,
            inflation_rate,
            inflation_ticks_total,
            persist_failures_total,
            persist_duration,
            registry,
        })
    }

    /// Record an applied transaction
    pub fn record_transaction(&self, kind: &str) {
        self.transactions_total.with_label_values(&[kind]).inc();
    }

    /// Record a rejected transaction
    pub fn record_rejection(&self, kind: &str, reason: &str) {
        self.rejections_total.with_label_values(&[kind, reason]).inc();
    }

    /// Update supply and inflation gauges
    pub fn update_economy(&self, circulating_gold: Decimal, inflation_rate: Decimal) {
        self.circulating_gold.set(circulating_gold.to_f64().unwrap_or(f64::NAN));
        self.inflation_rate.set(inflation_rate.to_f64().unwrap_or(f64::NAN));
    }

    /// Record an inflation tick
    pub fn record_inflation_tick(&self) {
        self.inflation_ticks_total.inc();
    }

    /// Record a snapshot save
    pub fn record_persist(&self, duration_seconds: f64, ok: bool) {
        self.persist_duration.observe(duration_seconds);
        if !ok {
            self.persist_failures_total.inc();
        }
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
