pub mod dispatcher;
pub mod runner;
pub mod stale_reaper;

pub use dispatcher::{JobDispatcher, ProcessOutcome};
pub use runner::{dispatch_channel, DispatchHandle};
pub use stale_reaper::StaleJobReaper;
