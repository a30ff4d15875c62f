//! Metrics for the degraded-mode coordinator
//!
//! Prometheus-compatible counters for:
//! - Static mode transitions and the current mode, per node
//! - Cluster reloads (count, errors, latency)
//! - Quorum-loss errors absorbed per operation
//! - Leadership asserted from the cached snapshot

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for DCS call latency (in milliseconds)
const LATENCY_BUCKETS: [f64; 10] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    pub fn with_buckets(boundaries: &[f64]) -> Self {
        Self {
            buckets: (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect(),
            boundaries: boundaries.to_vec(),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let idx = self
            .boundaries
            .iter()
            .position(|&b| value <= b)
            .unwrap_or(self.boundaries.len());

        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(le, count)` pairs, ending with `+Inf`
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.buckets.len());
        for (i, bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            let le = self.boundaries.get(i).copied().unwrap_or(f64::INFINITY);
            result.push((le, cumulative));
        }
        result
    }

    pub fn sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Static mode accounting for one coordinator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StaticModeStats {
    /// Served from the cached snapshot right now
    pub active: bool,
    pub entered: u64,
    pub exited: u64,
}

/// Coordinator metrics registry
#[derive(Debug)]
pub struct DcsMetrics {
    /// Node name → static mode accounting
    static_mode: Mutex<BTreeMap<String, StaticModeStats>>,

    pub reloads: Counter,
    pub reload_errors: Counter,
    pub reload_latency: Histogram,

    pub static_leader_acquired: Counter,

    /// Operation name → absorbed quorum-loss count
    absorbed: Mutex<BTreeMap<&'static str, u64>>,

    start_time: Instant,
}

impl DcsMetrics {
    pub fn new() -> Self {
        Self {
            static_mode: Mutex::new(BTreeMap::new()),
            reloads: Counter::new(),
            reload_errors: Counter::new(),
            reload_latency: Histogram::new(),
            static_leader_acquired: Counter::new(),
            absorbed: Mutex::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_reload(&self, duration: Duration, success: bool) {
        self.reloads.inc();
        self.reload_latency
            .observe(duration.as_secs_f64() * 1000.0);
        if !success {
            self.reload_errors.inc();
        }
    }

    pub fn record_static_mode(&self, node: &str, active: bool) {
        let mut nodes = self.static_mode.lock().unwrap_or_else(|e| e.into_inner());
        let stats = nodes.entry(node.to_string()).or_default();
        if active {
            stats.entered += 1;
        } else {
            stats.exited += 1;
        }
        stats.active = active;
    }

    /// Static mode accounting for `node`; all zero if it never changed mode.
    pub fn static_mode(&self, node: &str) -> StaticModeStats {
        let nodes = self.static_mode.lock().unwrap_or_else(|e| e.into_inner());
        nodes.get(node).copied().unwrap_or_default()
    }

    pub fn record_absorbed_quorum_loss(&self, op: &'static str) {
        let mut absorbed = self.absorbed.lock().unwrap_or_else(|e| e.into_inner());
        *absorbed.entry(op).or_insert(0) += 1;
    }

    pub fn absorbed_quorum_loss(&self, op: &str) -> u64 {
        let absorbed = self.absorbed.lock().unwrap_or_else(|e| e.into_inner());
        absorbed.get(op).copied().unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();

        let mut scalar = |name: &str, kind: &str, help: &str, value: u64| {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} {}", name, kind);
            let _ = writeln!(out, "{} {}", name, value);
        };

        scalar(
            "dcs2node_reloads_total",
            "counter",
            "Cluster reloads",
            self.reloads.get(),
        );
        scalar(
            "dcs2node_reload_errors_total",
            "counter",
            "Cluster reloads that propagated an error",
            self.reload_errors.get(),
        );
        scalar(
            "dcs2node_static_leader_acquired_total",
            "counter",
            "Leadership asserted from the cached snapshot",
            self.static_leader_acquired.get(),
        );
        scalar(
            "dcs2node_uptime_seconds",
            "gauge",
            "Process uptime in seconds",
            self.uptime_seconds(),
        );

        {
            let nodes = self.static_mode.lock().unwrap_or_else(|e| e.into_inner());
            let families: [(&str, &str, &str, fn(&StaticModeStats) -> u64); 3] = [
                (
                    "dcs2node_static_mode_active",
                    "gauge",
                    "Whether the node serves the cluster from its cached snapshot",
                    |s| s.active as u64,
                ),
                (
                    "dcs2node_static_mode_entered_total",
                    "counter",
                    "Transitions into static mode",
                    |s| s.entered,
                ),
                (
                    "dcs2node_static_mode_exited_total",
                    "counter",
                    "Transitions out of static mode",
                    |s| s.exited,
                ),
            ];
            for (name, kind, help, value) in families {
                let _ = writeln!(out, "# HELP {} {}", name, help);
                let _ = writeln!(out, "# TYPE {} {}", name, kind);
                for (node, stats) in nodes.iter() {
                    let _ = writeln!(out, "{}{{node=\"{}\"}} {}", name, node, value(stats));
                }
            }
        }

        out.push_str("# HELP dcs2node_quorum_loss_absorbed_total Quorum-loss errors absorbed per operation\n");
        out.push_str("# TYPE dcs2node_quorum_loss_absorbed_total counter\n");
        {
            let absorbed = self.absorbed.lock().unwrap_or_else(|e| e.into_inner());
            for (op, count) in absorbed.iter() {
                let _ = writeln!(
                    out,
                    "dcs2node_quorum_loss_absorbed_total{{op=\"{}\"}} {}",
                    op, count
                );
            }
        }

        out.push_str("# HELP dcs2node_reload_duration_ms Cluster reload duration in milliseconds\n");
        out.push_str("# TYPE dcs2node_reload_duration_ms histogram\n");
        for (le, count) in self.reload_latency.get_buckets() {
            if le.is_infinite() {
                let _ = writeln!(out, "dcs2node_reload_duration_ms_bucket{{le=\"+Inf\"}} {}", count);
            } else {
                let _ = writeln!(out, "dcs2node_reload_duration_ms_bucket{{le=\"{}\"}} {}", le, count);
            }
        }
        let _ = writeln!(out, "dcs2node_reload_duration_ms_sum {}", self.reload_latency.sum());
        let _ = writeln!(out, "dcs2node_reload_duration_ms_count {}", self.reload_latency.count());

        out
    }
}

impl Default for DcsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
pub static METRICS: once_cell::sync::Lazy<DcsMetrics> =
    once_cell::sync::Lazy::new(DcsMetrics::new);
