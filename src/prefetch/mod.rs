//! Predictive prefetching.
//!
//! - [`mapping`]: block id ↔ model token vocabulary
//! - [`model`]: the sequence model seam and a transition-count model
//! - [`scheduler`]: ranks likely next blocks from recent accesses
//! - [`prefetcher`]: loads suggested blocks into the cache
//! - [`service`]: background loop tying history, scheduler and prefetcher together

pub mod mapping;
pub mod model;
pub mod prefetcher;
pub mod scheduler;
pub mod service;

pub use mapping::{MappingError, PredictionMapping, Token, UNKNOWN_TOKEN};
pub use model::{SequenceModel, TransitionModel};
pub use prefetcher::{PrefetchStatus, PrefetchSummary, Prefetcher};
pub use scheduler::{PrefetchScheduler, SchedulerError, Suggestion};
pub use service::{CycleOutcome, PrefetchService};
