use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open config file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub lookup: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub columns: ColumnNames,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub groups: Vec<Grouping>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: None,
            lookup: None,
            output_dir: default_output_dir(),
            label: None,
            columns: ColumnNames::default(),
            filters: Filters::default(),
            groups: vec![],
            vehicles: vec![],
        }
    }
}

impl Config {
    pub fn new(filename: &str) -> Result<Config, ConfigError> {
        let reader = File::open(filename).map_err(|source| ConfigError::Open {
            path: PathBuf::from(filename),
            source,
        })?;
        let config: Config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn uses_lookup(&self) -> bool {
        self.groups
            .iter()
            .any(|g| matches!(g, Grouping::Lookup { .. }))
    }
}

/// Header names of the telemetry export.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColumnNames {
    pub hostname: String,
    pub date: String,
    pub total_km: String,
    pub auto_km: String,
    pub manual_km: String,
    pub activate_time: String,
    pub total_time: String,
    pub auto_time: String,
    pub manual_time: String,
    pub gear_time: String,
    pub takeover: String,
}

// The export really does spell it "Autononous".
impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            hostname: "Hostname".into(),
            date: "Date".into(),
            total_km: "Total mileage (km)".into(),
            auto_km: "Autononous driving mileage (km)".into(),
            manual_km: "Manual driving mileage (km)".into(),
            activate_time: "Activate time (hr)".into(),
            total_time: "Total driving time (hr)".into(),
            auto_time: "Autononous driving time (hr)".into(),
            manual_time: "Manual driving time (hr)".into(),
            gear_time: "D gear time (hr)".into(),
            takeover: "Takeover".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Threshold {
    pub column: String,
    pub value: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ColumnValues {
    pub column: String,
    pub values: Vec<String>,
}

/// Row predicates applied to the whole table before bucketing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Filters {
    /// rows with an exact zero in any of these columns are dropped
    pub nonzero: Vec<String>,
    /// rows must be strictly above each threshold
    pub above: Vec<Threshold>,
    pub exclude: Vec<ColumnValues>,
    pub include: Vec<ColumnValues>,
}

impl Default for Filters {
    fn default() -> Self {
        let columns = ColumnNames::default();
        Filters {
            nonzero: vec![
                columns.total_km.clone(),
                columns.auto_km.clone(),
                columns.manual_km,
                columns.total_time,
                columns.auto_time,
                columns.manual_time,
                columns.gear_time,
            ],
            above: vec![
                Threshold {
                    column: columns.total_km,
                    value: 20.0,
                },
                Threshold {
                    column: columns.auto_km,
                    value: 10.0,
                },
            ],
            exclude: vec![],
            include: vec![],
        }
    }
}

/// One entry of the `groups` list, each producing one or more buckets.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Grouping {
    /// One bucket per allowed value of an intrinsic column.
    Direct {
        column: String,
        allow: Vec<String>,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        exclude: Vec<ColumnValues>,
    },
    /// One bucket of the listed hostnames.
    Hostnames {
        key: String,
        hostnames: Vec<String>,
        #[serde(default)]
        exclude: Vec<ColumnValues>,
    },
    /// Buckets named by the labels of the (hostname, date) lookup sheet.
    Lookup {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        labels: Vec<String>,
        #[serde(default)]
        exclude: Vec<ColumnValues>,
    },
}

impl Grouping {
    pub fn exclude(&self) -> &[ColumnValues] {
        match self {
            Grouping::Direct { exclude, .. }
            | Grouping::Hostnames { exclude, .. }
            | Grouping::Lookup { exclude, .. } => exclude,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Vehicle {
    pub hostname: String,
    pub label: String,
}
