use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use super::{TraceEvent, Tracer};

/// Buffers events and forwards them to an inner tracer in batches.
///
/// Flushes when the buffer reaches its high-water mark and on a fixed
/// interval (driven by a background task that stops once the tracer is
/// dropped).
pub struct BufferedTracer {
    inner: Arc<dyn Tracer>,
    buffer: Mutex<Vec<TraceEvent>>,
    high_water: usize,
}

impl BufferedTracer {
    /// `high_water` must be at least 1.
    pub fn spawn(
        inner: Arc<dyn Tracer>,
        high_water: usize,
        flush_interval: Duration,
    ) -> Arc<Self> {
        let tracer = Arc::new(Self {
            inner,
            buffer: Mutex::new(Vec::new()),
            high_water: high_water.max(1),
        });

        let weak: Weak<Self> = Arc::downgrade(&tracer);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(tracer) => tracer.flush(),
                    None => break,
                }
            }
        });

        tracer
    }

    fn drain(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.buffer.lock().expect("trace buffer poisoned"))
    }
}

impl Tracer for BufferedTracer {
    fn record(&self, event: TraceEvent) {
        let should_flush = {
            let mut buffer = self.buffer.lock().expect("trace buffer poisoned");
            buffer.push(event);
            buffer.len() >= self.high_water
        };

        if should_flush {
            self.flush();
        }
    }

    fn flush(&self) {
        for event in self.drain() {
            self.inner.record(event);
        }
        self.inner.flush();
    }
}
