//! FILENAME: core/pivot-pipeline/src/lib.rs
//! Asynchronous computation pipeline for pivot-engine.
//!
//! Wraps the synchronous engine with two bounded LRU caches, an optional
//! offload channel to an isolated worker, and a debounced driver task
//! that discards results overtaken by newer requests.

pub mod error;
pub mod settings;
pub mod fingerprint;
pub mod cache;
pub mod protocol;
pub mod worker;
pub mod pipeline;
pub mod driver;

pub use cache::{BoundedCache, InputCache, ResultCache};
pub use driver::{PipelineDriver, PipelineHandle, PipelineStatus};
pub use error::PipelineError;
pub use fingerprint::{InputFingerprint, ResultFingerprint};
pub use pipeline::{PipelineStats, PivotPipeline, StatsSnapshot};
pub use settings::PipelineSettings;
pub use worker::{handle_request, OffloadChannel, WorkerChannel};
