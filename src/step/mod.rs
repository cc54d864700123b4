#[allow(clippy::module_inception)]
mod step;
pub use step::*;

mod executor;
pub use executor::*;

mod retry;
pub use retry::*;

mod timeout;
pub use timeout::*;

mod named;
pub use named::*;

mod logged;
pub use logged::*;
