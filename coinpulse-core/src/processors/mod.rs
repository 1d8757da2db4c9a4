//! Background processors for the two process roles.
//!
//! - `Scheduler`: producer side, publishes trigger events on a cron schedule
//! - `UpdateConsumer`: consumer side, receives trigger events and runs the
//!   refresh pipeline once per message
//! - `Refresher`: the fetch-and-persist pipeline itself, shared by the
//!   consumer and the manual trigger endpoint

pub mod consumer;
pub mod refresher;
pub mod scheduler;

pub use consumer::UpdateConsumer;
pub use refresher::{RefreshError, RefreshReport, Refresher};
pub use scheduler::Scheduler;
