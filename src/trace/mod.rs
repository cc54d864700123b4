mod tracer;
pub use tracer::*;

mod console;
pub use console::*;

mod buffered;
pub use buffered::*;

mod composite;
pub use composite::*;

mod noop;
pub use noop::*;

mod metrics;
pub use metrics::*;
