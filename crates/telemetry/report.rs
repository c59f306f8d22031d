use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::info;
use polars::prelude::*;

use crate::bucket::Bucket;
use crate::error::WriteError;

/// File names of one run, all suffixed with the run label.
#[derive(Debug, Clone)]
pub struct OutputNames {
    dir: PathBuf,
    label: String,
}

impl OutputNames {
    pub fn new(dir: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        OutputNames {
            dir: dir.into(),
            label: label.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, stem: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", sanitize(stem), sanitize(&self.label)))
    }

    pub fn bucket(&self, key: &str) -> PathBuf {
        self.file(&format!("output_data_{}", key))
    }

    pub fn membership(&self) -> PathBuf {
        self.file("membership")
    }

    pub fn summary(&self) -> PathBuf {
        self.file("summary")
    }

    pub fn vehicles(&self) -> PathBuf {
        self.file("vehicle_summary")
    }
}

pub(crate) fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Never truncates: an existing file is a write error.
fn create_new(path: &Path) -> Result<File, WriteError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| WriteError::new(path, e))
}

pub fn write_frame(path: &Path, df: &DataFrame) -> Result<(), WriteError> {
    let mut file = create_new(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .map_err(|e| WriteError::new(path, e))?;
    info!("CSV file written successfully: {:?}", path);
    Ok(())
}

/// 写入csv文件
///
/// # 参数
/// * `path` - 文件名
/// * `header` - csv文件头
/// * `data` - csv文件数据
pub fn write_csv(path: &Path, header: &[&str], data: Vec<Vec<String>>) -> Result<(), WriteError> {
    let file = create_new(path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(header).map_err(|e| WriteError::new(path, e))?;
    for record in data {
        wtr.write_record(&record).map_err(|e| WriteError::new(path, e))?;
    }
    wtr.flush().map_err(|e| WriteError::new(path, e))?;
    info!("CSV file written successfully: {:?}", path);

    Ok(())
}

/// `(bucket key, hostname)` pairs, hostnames unique within a bucket.
pub fn membership_rows(buckets: &[Bucket], hostname_column: &str) -> PolarsResult<Vec<Vec<String>>> {
    let mut rows = vec![];
    for bucket in buckets {
        for hostname in bucket.hostnames(hostname_column)? {
            rows.push(vec![bucket.key().to_string(), hostname]);
        }
    }
    Ok(rows)
}

pub fn write_membership(
    path: &Path,
    buckets: &[Bucket],
    hostname_column: &str,
) -> Result<(), WriteError> {
    let rows = membership_rows(buckets, hostname_column).map_err(|e| WriteError::new(path, e))?;
    write_csv(path, &["Bucket", "Hostname"], rows)
}
