use config::{ColumnNames, Vehicle};
use log::{debug, warn};
use polars::prelude::*;

use crate::bucket::Bucket;
use crate::error::Warning;

/// Metrics reported for a bucket or a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    OnlineTimeMin,
    OnlineTimeHr,
    DriveTimeMin,
    DriveTimeHr,
    /// D gear time over activate time
    GearRatioPct,
    TotalKm,
    AutoKm,
    AutoKmRatioPct,
    Takeovers,
    /// total driving time over activate time
    DrivingRatioPct,
}

impl Metric {
    /// Row order of the summary table.
    pub const SUMMARY_ORDER: [Metric; 9] = [
        Metric::OnlineTimeMin,
        Metric::OnlineTimeHr,
        Metric::DriveTimeMin,
        Metric::DriveTimeHr,
        Metric::GearRatioPct,
        Metric::TotalKm,
        Metric::AutoKm,
        Metric::AutoKmRatioPct,
        Metric::Takeovers,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::OnlineTimeMin => "average total online time (min)",
            Metric::OnlineTimeHr => "average total online time (hr)",
            Metric::DriveTimeMin => "average total D drive time (min)",
            Metric::DriveTimeHr => "average total D drive time (hr)",
            Metric::GearRatioPct => "D/total time (%)",
            Metric::TotalKm => "average total km/day",
            Metric::AutoKm => "average autonomous km/day",
            Metric::AutoKmRatioPct => "auto/total km (%)",
            Metric::Takeovers => "average takeover No.",
            Metric::DrivingRatioPct => "driving/online time (%)",
        }
    }
}

/// Mean of the non-null values of `column`; `None` when there are none or
/// the column is not numeric.
pub fn column_mean(frame: &DataFrame, column: &str) -> Option<f64> {
    let series = match frame.column(column) {
        Ok(s) => s,
        Err(e) => {
            warn!("mean of {}: {}", column, e);
            return None;
        }
    };
    match series.cast(&DataType::Float64) {
        Ok(s) => s.mean(),
        Err(e) => {
            warn!("mean of {}: {}", column, e);
            None
        }
    }
}

/// `None` when either side is missing or the denominator is zero.
pub fn percent(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d * 100.0),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Means {
    pub activate_hr: Option<f64>,
    pub gear_hr: Option<f64>,
    pub total_km: Option<f64>,
    pub auto_km: Option<f64>,
    pub takeover: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub key: String,
    pub rows: usize,
    pub means: Means,
}

impl BucketSummary {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        let m = &self.means;
        match metric {
            Metric::OnlineTimeMin => m.activate_hr.map(|v| v * 60.0),
            Metric::OnlineTimeHr => m.activate_hr,
            Metric::DriveTimeMin => m.gear_hr.map(|v| v * 60.0),
            Metric::DriveTimeHr => m.gear_hr,
            Metric::GearRatioPct => percent(m.gear_hr, m.activate_hr),
            Metric::TotalKm => m.total_km,
            Metric::AutoKm => m.auto_km,
            Metric::AutoKmRatioPct => percent(m.auto_km, m.total_km),
            Metric::Takeovers => m.takeover,
            Metric::DrivingRatioPct => None,
        }
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        Metric::SUMMARY_ORDER
            .iter()
            .map(|m| self.value(*m))
            .collect()
    }
}

/// 计算一个 bucket 的均值和比率，不会失败：取不到的指标记为缺失并返回警告
pub fn summarize(bucket: &Bucket, columns: &ColumnNames) -> (BucketSummary, Vec<Warning>) {
    let mut warnings = vec![];
    if bucket.is_empty() {
        let warning = Warning::EmptyBucket {
            bucket: bucket.key().to_string(),
        };
        warn!("{}", warning);
        warnings.push(warning);
        let summary = BucketSummary {
            key: bucket.key().to_string(),
            rows: 0,
            means: Means::default(),
        };
        return (summary, warnings);
    }

    let frame = bucket.frame();
    let summary = BucketSummary {
        key: bucket.key().to_string(),
        rows: frame.height(),
        means: Means {
            activate_hr: column_mean(frame, &columns.activate_time),
            gear_hr: column_mean(frame, &columns.gear_time),
            total_km: column_mean(frame, &columns.total_km),
            auto_km: column_mean(frame, &columns.auto_km),
            takeover: column_mean(frame, &columns.takeover),
        },
    };
    let ratios = [
        (Metric::GearRatioPct, summary.means.activate_hr),
        (Metric::AutoKmRatioPct, summary.means.total_km),
    ];
    for (metric, denominator) in ratios {
        if denominator.unwrap_or(0.0) == 0.0 {
            let warning = Warning::DivideByMissing {
                bucket: bucket.key().to_string(),
                metric,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
    }
    debug!("summary {}: {:?}", summary.key, summary.means);
    (summary, warnings)
}

/// Label column of the summary table, reserved as a bucket key.
pub const METRIC_COLUMN: &str = "metric";

/// Summary table: a `metric` column in fixed order plus one column per bucket.
pub fn summary_frame(summaries: &[BucketSummary]) -> PolarsResult<DataFrame> {
    let labels: Vec<&str> = Metric::SUMMARY_ORDER.iter().map(|m| m.label()).collect();
    let mut columns = vec![Series::new(METRIC_COLUMN, labels)];
    for summary in summaries {
        columns.push(Series::new(summary.key.as_str(), summary.values()));
    }
    DataFrame::new(columns)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSummary {
    pub label: String,
    pub hostname: String,
    pub rows: usize,
    pub gear_ratio_pct: Option<f64>,
    pub driving_ratio_pct: Option<f64>,
    pub auto_km_ratio_pct: Option<f64>,
}

impl VehicleSummary {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::GearRatioPct => self.gear_ratio_pct,
            Metric::DrivingRatioPct => self.driving_ratio_pct,
            Metric::AutoKmRatioPct => self.auto_km_ratio_pct,
            _ => None,
        }
    }
}

const VEHICLE_METRICS: [Metric; 3] = [
    Metric::GearRatioPct,
    Metric::DrivingRatioPct,
    Metric::AutoKmRatioPct,
];

/// Per-vehicle ratios over the filtered table. Vehicles without rows are
/// left out.
pub fn summarize_vehicles(
    df: &DataFrame,
    vehicles: &[Vehicle],
    columns: &ColumnNames,
) -> PolarsResult<Vec<VehicleSummary>> {
    let needed = [
        &columns.total_km,
        &columns.auto_km,
        &columns.activate_time,
        &columns.total_time,
        &columns.gear_time,
    ];
    let mut summaries = vec![];
    for vehicle in vehicles {
        let mut filter_expr = col(columns.hostname.as_str())
            .cast(DataType::String)
            .eq(lit(vehicle.hostname.as_str()));
        for column in needed {
            filter_expr = filter_expr.and(col(column.as_str()).cast(DataType::Float64).is_not_null());
        }
        let rows = df.clone().lazy().filter(filter_expr).collect()?;
        if rows.height() == 0 {
            debug!("vehicle {} ({}) has no rows", vehicle.label, vehicle.hostname);
            continue;
        }
        let activate = column_mean(&rows, &columns.activate_time);
        summaries.push(VehicleSummary {
            label: vehicle.label.clone(),
            hostname: vehicle.hostname.clone(),
            rows: rows.height(),
            gear_ratio_pct: percent(column_mean(&rows, &columns.gear_time), activate),
            driving_ratio_pct: percent(column_mean(&rows, &columns.total_time), activate),
            auto_km_ratio_pct: percent(
                column_mean(&rows, &columns.auto_km),
                column_mean(&rows, &columns.total_km),
            ),
        });
    }
    Ok(summaries)
}

pub fn vehicle_frame(summaries: &[VehicleSummary]) -> PolarsResult<DataFrame> {
    let labels: Vec<&str> = summaries.iter().map(|s| s.label.as_str()).collect();
    let hostnames: Vec<&str> = summaries.iter().map(|s| s.hostname.as_str()).collect();
    let mut columns = vec![Series::new("Vehicle", labels), Series::new("Hostname", hostnames)];
    for metric in VEHICLE_METRICS {
        let values: Vec<Option<f64>> = summaries.iter().map(|s| s.value(metric)).collect();
        columns.push(Series::new(metric.label(), values));
    }
    DataFrame::new(columns)
}
