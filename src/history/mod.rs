//! Access history.
//!
//! - [`access_log`]: durable event log of every block access
//! - [`global`]: bounded rolling history feeding the prefetch service
//! - [`query`]: per-query histories owned by the scheduler

pub mod access_log;
pub mod global;
pub mod query;

pub use access_log::{AccessEvent, AccessLogError, AccessLogger};
pub use global::GlobalHistory;
pub use query::QueryHistory;
