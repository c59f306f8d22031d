use std::collections::HashSet;

use config::{ColumnNames, Grouping};
use log::{debug, info, warn};
use polars::prelude::*;

use crate::aggregate::METRIC_COLUMN;
use crate::error::PipelineError;
use crate::filter::{exclusions, Predicate, RowFilter};
use crate::load::LookupTable;
use crate::report::sanitize;

const LABEL_COLUMN: &str = "__bucket_label";

/// A named partition of filtered records.
#[derive(Debug, Clone)]
pub struct Bucket {
    key: String,
    frame: DataFrame,
}

impl Bucket {
    pub fn new(key: impl Into<String>, frame: DataFrame) -> Self {
        Bucket {
            key: key.into(),
            frame,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Distinct values of `column`, first-seen order.
    pub fn hostnames(&self, column: &str) -> PolarsResult<Vec<String>> {
        let values = self.frame.column(column)?.cast(&DataType::String)?;
        let mut seen = HashSet::new();
        let mut hostnames = vec![];
        for v in values.str()?.into_iter().flatten() {
            if seen.insert(v) {
                hostnames.push(v.to_string());
            }
        }
        Ok(hostnames)
    }
}

fn matching(df: &DataFrame, column: &str, value: &str) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .filter(col(column).cast(DataType::String).eq(lit(value)))
        .collect()
}

fn direct(df: &DataFrame, column: &str, allow: &[String], prefix: &str) -> PolarsResult<Vec<Bucket>> {
    let mut buckets = Vec::with_capacity(allow.len());
    for value in allow {
        let frame = matching(df, column, value)?;
        buckets.push(Bucket::new(format!("{}{}", prefix, value), frame));
    }
    Ok(buckets)
}

fn lookup_joined(
    df: &DataFrame,
    lookup: &LookupTable,
    columns: &ColumnNames,
    prefix: &str,
    labels: &[String],
) -> PolarsResult<Vec<Bucket>> {
    let hosts = df.column(&columns.hostname)?.cast(&DataType::String)?;
    let dates = df.column(&columns.date)?.cast(&DataType::String)?;
    let assigned: Vec<Option<String>> = hosts
        .str()?
        .into_iter()
        .zip(dates.str()?.into_iter())
        .map(|(h, d)| match (h, d) {
            (Some(h), Some(d)) => lookup.label_for(h.trim(), d).map(String::from),
            _ => None,
        })
        .collect();
    let matched = assigned.iter().filter(|l| l.is_some()).count();
    info!(
        "lookup join: {} of {} rows matched an assignment",
        matched,
        df.height()
    );
    if matched == 0 && df.height() > 0 && !lookup.is_empty() {
        warn!("lookup join matched no rows, record and sheet dates probably differ in format");
    }

    let mut tagged = df.clone();
    tagged.with_column(Series::new(LABEL_COLUMN, assigned))?;

    let explicit = !labels.is_empty();
    let wanted = if explicit { labels } else { lookup.labels() };
    let mut buckets = vec![];
    for label in wanted {
        let frame = matching(&tagged, LABEL_COLUMN, label)?.drop(LABEL_COLUMN)?;
        if !explicit && frame.height() == 0 {
            debug!("lookup label {} matched no rows, skipped", label);
            continue;
        }
        buckets.push(Bucket::new(format!("{}{}", prefix, label), frame));
    }
    Ok(buckets)
}

/// 按 groups 的顺序把过滤后的表切成各个 bucket
pub fn bucketize(
    df: &DataFrame,
    groups: &[Grouping],
    lookup: Option<&LookupTable>,
    columns: &ColumnNames,
) -> Result<Vec<Bucket>, PipelineError> {
    let mut buckets: Vec<Bucket> = vec![];
    let mut keys: HashSet<String> = HashSet::new();
    // keys name both a summary column and an output file
    let mut file_keys: HashSet<String> = HashSet::new();
    for group in groups {
        let base = RowFilter::new(exclusions(group.exclude())).apply(df)?;
        let produced = match group {
            Grouping::Direct {
                column,
                allow,
                prefix,
                ..
            } => direct(&base, column, allow, prefix)?,
            Grouping::Hostnames { key, hostnames, .. } => {
                let frame = RowFilter::new(vec![Predicate::Include {
                    column: columns.hostname.clone(),
                    values: hostnames.clone(),
                }])
                .apply(&base)?;
                vec![Bucket::new(key.as_str(), frame)]
            }
            Grouping::Lookup { prefix, labels, .. } => {
                let lookup = lookup.ok_or(PipelineError::MissingLookup)?;
                lookup_joined(&base, lookup, columns, prefix, labels)?
            }
        };
        for bucket in produced {
            if bucket.key == METRIC_COLUMN
                || !keys.insert(bucket.key.clone())
                || !file_keys.insert(sanitize(&bucket.key))
            {
                return Err(PipelineError::DuplicateBucket(bucket.key));
            }
            info!("bucket {}: {} rows", bucket.key, bucket.height());
            buckets.push(bucket);
        }
    }
    Ok(buckets)
}
