use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;

use crate::error::PipelineError;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// 把各种日期写法统一成 `YYYY-MM-DD`，记录和 lookup 表才能按字符串精确匹配
pub fn normalize_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.format("%Y-%m-%d").to_string());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date().format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// `infer_schema_length` of `Some(0)` reads every column as a string.
pub(crate) fn read_csv(
    path: &Path,
    infer_schema_length: Option<usize>,
) -> Result<DataFrame, PipelineError> {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(infer_schema_length)
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })
}

pub fn require_columns(path: &Path, df: &DataFrame, required: &[String]) -> Result<(), PipelineError> {
    let present: HashSet<&str> = df.get_column_names().into_iter().collect();
    let mut missing: Vec<String> = vec![];
    for column in required {
        if !present.contains(column.as_str()) && !missing.contains(column) {
            missing.push(column.clone());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MalformedInput {
            path: path.to_path_buf(),
            columns: missing,
        })
    }
}

/// Load the telemetry table, check its schema and normalize the date column.
pub fn load_records(
    path: &Path,
    date_column: &str,
    required: &[String],
) -> Result<DataFrame, PipelineError> {
    let df = read_csv(path, None)?;
    require_columns(path, &df, required)?;
    let df = normalize_date_column(df, date_column)?;
    info!(
        "records loaded: {:?}, {} rows, {} columns",
        path,
        df.height(),
        df.width()
    );
    Ok(df)
}

fn normalize_date_column(mut df: DataFrame, name: &str) -> Result<DataFrame, PipelineError> {
    let raw = df.column(name)?.cast(&DataType::String)?;
    let mut unparsed = 0usize;
    let mut normalized: Vec<Option<String>> = Vec::with_capacity(raw.len());
    for value in raw.str()?.into_iter() {
        normalized.push(value.map(|s| match normalize_date(s) {
            Some(d) => d,
            None => {
                unparsed += 1;
                s.trim().to_string()
            }
        }));
    }
    if unparsed > 0 {
        warn!(
            "{} value(s) in column {} are not recognised dates, kept as is",
            unparsed, name
        );
    }
    df.with_column(Series::new(name, normalized))?;
    Ok(df)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupEntry {
    pub hostname: String,
    pub date: String,
    pub label: String,
}

/// (hostname, date) → test label, taken from an assignment sheet.
#[derive(Debug, Default)]
pub struct LookupTable {
    entries: HashMap<(String, String), String>,
    labels: Vec<String>,
}

impl LookupTable {
    pub fn from_entries(entries: impl IntoIterator<Item = LookupEntry>) -> Self {
        let mut table = LookupTable::default();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    fn insert(&mut self, entry: LookupEntry) {
        let key = (entry.hostname, entry.date);
        if let Some(existing) = self.entries.get(&key) {
            if *existing != entry.label {
                warn!(
                    "lookup: {} on {} already assigned to {}, ignoring {}",
                    key.0, key.1, existing, entry.label
                );
            }
            return;
        }
        if !self.labels.contains(&entry.label) {
            self.labels.push(entry.label.clone());
        }
        self.entries.insert(key, entry.label);
    }

    pub fn label_for(&self, hostname: &str, date: &str) -> Option<&str> {
        self.entries
            .get(&(hostname.to_string(), date.to_string()))
            .map(String::as_str)
    }

    /// Labels in first-seen order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 读取分配表：第一列是车辆，其余列头是日期，单元格是测试标签或为空
pub fn load_lookup(path: &Path) -> Result<LookupTable, PipelineError> {
    let df = read_csv(path, Some(0))?;
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let Some((host_column, date_columns)) = names.split_first() else {
        return Err(PipelineError::MalformedInput {
            path: path.to_path_buf(),
            columns: vec!["<vehicle identifier>".to_string()],
        });
    };

    let hosts = df.column(host_column)?.cast(&DataType::String)?;
    let hosts = hosts.str()?;
    let mut dates = vec![];
    let mut cells = vec![];
    for column in date_columns {
        let date = normalize_date(column).unwrap_or_else(|| {
            warn!("lookup column {:?} is not a recognised date", column);
            column.trim().to_string()
        });
        dates.push(date);
        cells.push(df.column(column)?.cast(&DataType::String)?);
    }

    let mut entries = vec![];
    for row in 0..df.height() {
        let Some(hostname) = hosts.get(row).map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        for (date, column) in dates.iter().zip(cells.iter()) {
            let label = column.str()?.get(row).map(str::trim).unwrap_or("");
            if label.is_empty() {
                continue;
            }
            entries.push(LookupEntry {
                hostname: hostname.to_string(),
                date: date.clone(),
                label: label.to_string(),
            });
        }
    }
    let table = LookupTable::from_entries(entries);
    info!(
        "lookup loaded: {:?}, {} entries, labels {:?}",
        path,
        table.len(),
        table.labels()
    );
    debug!("lookup dates: {:?}", dates);
    Ok(table)
}
