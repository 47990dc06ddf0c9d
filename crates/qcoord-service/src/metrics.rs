//! Prometheus metrics exposed by the coordinator.

use prometheus::{Encoder, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use qcoord_types::Priority;

/// Coordinator-wide metric registry plus the handful of gauges/counters the
/// RPC and background-loop layers update directly. Collection- and
/// task-level detail lives in the managers themselves; this struct only
/// tracks what the facade aggregates for `GetMetrics`.
pub struct Metrics {
    registry: Registry,
    pub collections_loaded: IntGauge,
    pub tasks_outstanding: IntGaugeVec,
    pub jobs_completed_total: IntCounter,
    pub jobs_failed_total: IntCounter,
    pub tasks_canceled_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let collections_loaded =
            IntGauge::with_opts(Opts::new("qcoord_collections_loaded", "Number of collections currently loaded")).unwrap();
        let tasks_outstanding = IntGaugeVec::new(
            Opts::new("qcoord_tasks_outstanding", "Number of in-flight reconciliation tasks"),
            &["priority"],
        )
        .unwrap();
        let jobs_completed_total =
            IntCounter::with_opts(Opts::new("qcoord_jobs_completed_total", "Total jobs that completed successfully")).unwrap();
        let jobs_failed_total =
            IntCounter::with_opts(Opts::new("qcoord_jobs_failed_total", "Total jobs that failed")).unwrap();
        let tasks_canceled_total =
            IntCounter::with_opts(Opts::new("qcoord_tasks_canceled_total", "Total reconciliation tasks canceled")).unwrap();

        registry.register(Box::new(collections_loaded.clone())).unwrap();
        registry.register(Box::new(tasks_outstanding.clone())).unwrap();
        registry.register(Box::new(jobs_completed_total.clone())).unwrap();
        registry.register(Box::new(jobs_failed_total.clone())).unwrap();
        registry.register(Box::new(tasks_canceled_total.clone())).unwrap();

        Self {
            registry,
            collections_loaded,
            tasks_outstanding,
            jobs_completed_total,
            jobs_failed_total,
            tasks_canceled_total,
        }
    }

    pub fn set_tasks_outstanding(&self, priority: Priority, count: i64) {
        let label = match priority {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        self.tasks_outstanding.with_label_values(&[label]).set(count);
    }

    /// Renders the registry in Prometheus text-exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("prometheus text encoding is infallible for our metric types");
        String::from_utf8(buf).expect("prometheus text encoder always emits valid utf-8")
    }

    /// Renders only the metric families whose name matches `glob` (`*` as a
    /// wildcard, per `ShowConfigurations`/`GetMetrics`'s shared filtering
    /// convention).
    pub fn render_matching(&self, glob: &str) -> String {
        if glob.is_empty() || glob == "*" {
            return self.render();
        }
        let pattern = glob_to_regex(glob);
        let encoder = TextEncoder::new();
        let families: Vec<_> = self.registry.gather().into_iter().filter(|f| pattern.is_match(f.get_name())).collect();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("prometheus text encoding is infallible for our metric types");
        String::from_utf8(buf).expect("prometheus text encoder always emits valid utf-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal glob-to-substring matcher: `*` matches any run of characters,
/// everything else is literal. Good enough for metric-name and config-key
/// filters, which never need full regex.
struct SimpleGlob {
    segments: Vec<String>,
    anchored_start: bool,
    anchored_end: bool,
}

impl SimpleGlob {
    fn is_match(&self, haystack: &str) -> bool {
        if self.segments.is_empty() {
            return true;
        }
        let mut rest = haystack;
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.is_empty() {
                continue;
            }
            if i == 0 && self.anchored_start {
                if !rest.starts_with(seg.as_str()) {
                    return false;
                }
                rest = &rest[seg.len()..];
            } else if let Some(pos) = rest.find(seg.as_str()) {
                rest = &rest[pos + seg.len()..];
            } else {
                return false;
            }
        }
        if self.anchored_end {
            let last = self.segments.last().unwrap();
            if !last.is_empty() && !haystack.ends_with(last.as_str()) {
                return false;
            }
        }
        true
    }
}

fn glob_to_regex(glob: &str) -> SimpleGlob {
    SimpleGlob {
        segments: glob.split('*').map(str::to_string).collect(),
        anchored_start: !glob.starts_with('*'),
        anchored_end: !glob.ends_with('*'),
    }
}
