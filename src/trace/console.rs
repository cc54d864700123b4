use super::{TraceEvent, TraceLevel, Tracer};

/// Forwards trace events to the `log` facade, one line per event.
pub struct ConsoleTracer {
    min_level: TraceLevel,
}

impl ConsoleTracer {
    pub fn new() -> Self {
        Self {
            min_level: TraceLevel::Info,
        }
    }

    pub fn with_min_level(min_level: TraceLevel) -> Self {
        Self { min_level }
    }
}

impl Default for ConsoleTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for ConsoleTracer {
    fn record(&self, event: TraceEvent) {
        if event.level < self.min_level {
            return;
        }

        let line = match &event.error {
            Some(error) => format!(
                "[{:?}] {} (span {}): {}",
                event.kind, event.name, event.span_id, error.message
            ),
            None => format!("[{:?}] {} (span {})", event.kind, event.name, event.span_id),
        };

        match event.level {
            TraceLevel::Debug => log::debug!("{line}"),
            TraceLevel::Info => log::info!("{line}"),
            TraceLevel::Warn => log::warn!("{line}"),
            TraceLevel::Error => log::error!("{line}"),
        }
    }
}
