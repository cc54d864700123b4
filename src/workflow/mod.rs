mod sequential;
pub use sequential::*;

mod parallel;
pub use parallel::*;

mod loop_step;
pub use loop_step::*;

mod fallback;
pub use fallback::*;

mod route;
pub use route::*;

mod supervisor;
pub use supervisor::*;

mod interrupt;
pub use interrupt::*;
