use std::fs;
use std::path::PathBuf;

use chrono::Local;
use config::{Config, Grouping};
use log::{error, info, warn};
use polars::prelude::*;

use crate::aggregate::{summarize, summarize_vehicles, summary_frame, vehicle_frame, BucketSummary};
use crate::bucket::bucketize;
use crate::error::{PipelineError, Warning, WriteError};
use crate::filter::RowFilter;
use crate::load::{load_lookup, load_records};
use crate::report::{write_frame, write_membership, OutputNames};

#[derive(Debug, Clone, PartialEq)]
pub struct BucketOutcome {
    pub key: String,
    pub rows: usize,
    pub hostnames: Vec<String>,
}

#[derive(Debug)]
pub struct RunResult {
    pub label: String,
    pub buckets: Vec<BucketOutcome>,
    pub summaries: Vec<BucketSummary>,
    pub summary: DataFrame,
    pub vehicles: Option<DataFrame>,
    pub written: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
    pub write_errors: Vec<WriteError>,
}

impl RunResult {
    /// Every artifact was written.
    pub fn is_complete(&self) -> bool {
        self.write_errors.is_empty()
    }
}

/// Columns the telemetry table must carry for this configuration.
pub fn required_columns(config: &Config, filter: &RowFilter) -> Vec<String> {
    let c = &config.columns;
    let mut required = vec![c.hostname.clone(), c.date.clone()];
    required.extend(filter.columns());
    for group in &config.groups {
        if let Grouping::Direct { column, .. } = group {
            required.push(column.clone());
        }
        required.extend(group.exclude().iter().map(|e| e.column.clone()));
    }
    required.extend([
        c.activate_time.clone(),
        c.gear_time.clone(),
        c.total_km.clone(),
        c.auto_km.clone(),
        c.takeover.clone(),
    ]);
    if !config.vehicles.is_empty() {
        required.push(c.total_time.clone());
    }
    let mut unique: Vec<String> = vec![];
    for column in required {
        if !unique.contains(&column) {
            unique.push(column);
        }
    }
    unique
}

/// 一次完整的批处理：读取、过滤、分桶、汇总、写出
///
/// Fatal problems (bad input, bad grouping) return `Err`. Problems confined
/// to one bucket or one output file are reported in the `RunResult`.
pub fn run(config: &Config) -> Result<RunResult, PipelineError> {
    let input = config.input.as_ref().ok_or(PipelineError::MissingInput)?;
    let columns = &config.columns;
    let filter = RowFilter::from_config(&config.filters);

    let records = load_records(input, &columns.date, &required_columns(config, &filter))?;
    let lookup = if config.uses_lookup() {
        let path = config.lookup.as_ref().ok_or(PipelineError::MissingLookup)?;
        Some(load_lookup(path)?)
    } else {
        None
    };

    let filtered = filter.apply(&records)?;
    if config.groups.is_empty() {
        warn!("no groups configured, the summary will have no bucket columns");
    }
    let buckets = bucketize(&filtered, &config.groups, lookup.as_ref(), columns)?;

    let mut warnings = vec![];
    let mut summaries = vec![];
    let mut outcomes = vec![];
    for bucket in &buckets {
        let (summary, bucket_warnings) = summarize(bucket, columns);
        warnings.extend(bucket_warnings);
        summaries.push(summary);
        outcomes.push(BucketOutcome {
            key: bucket.key().to_string(),
            rows: bucket.height(),
            hostnames: bucket.hostnames(&columns.hostname)?,
        });
    }
    let summary = summary_frame(&summaries)?;
    let vehicle_summaries = summarize_vehicles(&filtered, &config.vehicles, columns)?;
    let vehicles = if vehicle_summaries.is_empty() {
        if !config.vehicles.is_empty() {
            warn!("no roster vehicle has rows, skipping the vehicle summary");
        }
        None
    } else {
        Some(vehicle_frame(&vehicle_summaries)?)
    };

    let label = config
        .label
        .clone()
        .unwrap_or_else(|| Local::now().format("%Y%m%d_%H%M%S").to_string());
    let names = OutputNames::new(&config.output_dir, label.as_str());
    if let Err(e) = fs::create_dir_all(names.dir()) {
        error!("cannot create output directory {:?}: {}", names.dir(), e);
    }

    let mut artifacts: Vec<(PathBuf, Result<(), WriteError>)> = vec![];
    for bucket in &buckets {
        let path = names.bucket(bucket.key());
        let result = write_frame(&path, bucket.frame());
        artifacts.push((path, result));
    }
    let path = names.membership();
    let result = write_membership(&path, &buckets, &columns.hostname);
    artifacts.push((path, result));
    let path = names.summary();
    let result = write_frame(&path, &summary);
    artifacts.push((path, result));
    if let Some(df) = &vehicles {
        let path = names.vehicles();
        let result = write_frame(&path, df);
        artifacts.push((path, result));
    }

    let mut written = vec![];
    let mut write_errors = vec![];
    for (path, result) in artifacts {
        match result {
            Ok(()) => written.push(path),
            Err(e) => {
                error!("{}", e);
                write_errors.push(e);
            }
        }
    }
    info!(
        "run {} done: {} buckets, {} files written, {} failed, {} warnings",
        label,
        buckets.len(),
        written.len(),
        write_errors.len(),
        warnings.len()
    );

    Ok(RunResult {
        label,
        buckets: outcomes,
        summaries,
        summary,
        vehicles,
        written,
        warnings,
        write_errors,
    })
}
