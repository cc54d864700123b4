use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use super::{TraceEvent, TraceEventKind, Tracer};

#[derive(Debug, Default)]
struct MetricsInner {
    started: u64,
    succeeded: u64,
    failed: u64,
    cancelled: u64,
    tool_successes: u64,
    tool_failures: u64,
    durations: Vec<Duration>,
}

/// Aggregates execution outcomes into success rate and latency
/// percentiles. Can be driven directly or plugged into a
/// [`CompositeTracer`](super::CompositeTracer) as a sink.
#[derive(Default)]
pub struct MetricsCollector {
    inner: Mutex<MetricsInner>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub tool_successes: u64,
    pub tool_failures: u64,
    /// succeeded / (succeeded + failed); 1.0 when nothing finished.
    pub success_rate: f64,
    pub average_duration: Duration,
    pub p95_duration: Duration,
    pub p99_duration: Duration,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self) {
        self.lock().started += 1;
    }

    pub fn record_success(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.succeeded += 1;
        inner.durations.push(duration);
    }

    pub fn record_failure(&self, duration: Duration) {
        let mut inner = self.lock();
        inner.failed += 1;
        inner.durations.push(duration);
    }

    pub fn record_cancelled(&self) {
        self.lock().cancelled += 1;
    }

    pub fn record_tool_outcome(&self, success: bool) {
        let mut inner = self.lock();
        if success {
            inner.tool_successes += 1;
        } else {
            inner.tool_failures += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();

        let finished = inner.succeeded + inner.failed;
        let success_rate = if finished == 0 {
            1.0
        } else {
            inner.succeeded as f64 / finished as f64
        };

        let average_duration = if inner.durations.is_empty() {
            Duration::ZERO
        } else {
            inner.durations.iter().sum::<Duration>() / inner.durations.len() as u32
        };

        let mut sorted = inner.durations.clone();
        sorted.sort();

        MetricsSnapshot {
            started: inner.started,
            succeeded: inner.succeeded,
            failed: inner.failed,
            cancelled: inner.cancelled,
            tool_successes: inner.tool_successes,
            tool_failures: inner.tool_failures,
            success_rate,
            average_duration,
            p95_duration: percentile(&sorted, 0.95),
            p99_duration: percentile(&sorted, 0.99),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsInner> {
        self.inner.lock().expect("metrics state poisoned")
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl Tracer for MetricsCollector {
    fn record(&self, event: TraceEvent) {
        let duration = event
            .metadata
            .get("duration_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or_default();

        match event.kind {
            TraceEventKind::AgentStart => self.record_start(),
            TraceEventKind::AgentComplete => {
                if event.error.is_some() {
                    self.record_failure(duration);
                } else {
                    self.record_success(duration);
                }
            }
            TraceEventKind::ToolResult => self.record_tool_outcome(event.error.is_none()),
            _ => {}
        }
    }
}
