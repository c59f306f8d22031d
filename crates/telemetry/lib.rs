//! Fleet telemetry summaries: load per-drive records, drop invalid rows,
//! split them into buckets and report per-bucket and per-vehicle averages.

pub mod aggregate;
pub mod bucket;
pub mod error;
pub mod filter;
pub mod load;
pub mod pipeline;
pub mod report;

pub use error::{PipelineError, Warning, WriteError};
pub use pipeline::{run, RunResult};
