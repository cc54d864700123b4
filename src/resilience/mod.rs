mod retry;
pub use retry::*;

mod circuit_breaker;
pub use circuit_breaker::*;

mod rate_limiter;
pub use rate_limiter::*;

mod fallback_chain;
pub use fallback_chain::*;
