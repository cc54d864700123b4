use std::sync::Arc;

use super::{TraceEvent, Tracer};

/// Fans one event out to several tracers.
///
/// Sequential dispatch preserves per-sink ordering; parallel dispatch
/// spawns a task per sink and gives up cross-sink ordering in exchange
/// for never blocking the caller on a slow sink.
pub struct CompositeTracer {
    tracers: Vec<Arc<dyn Tracer>>,
    parallel: bool,
}

impl CompositeTracer {
    pub fn sequential(tracers: Vec<Arc<dyn Tracer>>) -> Self {
        Self {
            tracers,
            parallel: false,
        }
    }

    pub fn parallel(tracers: Vec<Arc<dyn Tracer>>) -> Self {
        Self {
            tracers,
            parallel: true,
        }
    }
}

impl Tracer for CompositeTracer {
    fn record(&self, event: TraceEvent) {
        if self.parallel {
            for tracer in &self.tracers {
                let tracer = Arc::clone(tracer);
                let event = event.clone();
                tokio::spawn(async move {
                    tracer.record(event);
                });
            }
        } else {
            for tracer in &self.tracers {
                tracer.record(event.clone());
            }
        }
    }

    fn flush(&self) {
        for tracer in &self.tracers {
            tracer.flush();
        }
    }
}
