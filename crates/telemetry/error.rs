use std::fmt;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::aggregate::Metric;

/// Fatal errors: any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{}: missing required column(s): {}", .path.display(), .columns.join(", "))]
    MalformedInput { path: PathBuf, columns: Vec<String> },
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: PolarsError },
    #[error("no telemetry input file given")]
    MissingInput,
    #[error("a lookup grouping is configured but no lookup file was given")]
    MissingLookup,
    #[error("bucket key `{0}` clashes with another bucket or the metric column")]
    DuplicateBucket(String),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// A single output artifact that could not be written.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl WriteError {
    pub fn new<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        WriteError {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Non-fatal conditions collected during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    EmptyBucket { bucket: String },
    DivideByMissing { bucket: String, metric: Metric },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::EmptyBucket { bucket } => {
                write!(f, "bucket {} has no rows, all metrics missing", bucket)
            }
            Warning::DivideByMissing { bucket, metric } => write!(
                f,
                "bucket {}: `{}` missing, denominator mean is zero or missing",
                bucket,
                metric.label()
            ),
        }
    }
}
