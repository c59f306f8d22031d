use std::fs;
use std::path::Path;

use config::Config;
use polars::prelude::*;
use telemetry::aggregate::Metric;
use telemetry::{run, PipelineError, Warning};

const HEADER: &str = "Hostname,Date,Primary Category,Car City,Total mileage (km),Autononous driving mileage (km),Manual driving mileage (km),Activate time (hr),Total driving time (hr),Autononous driving time (hr),Manual driving time (hr),D gear time (hr),Takeover";

const ROWS: [&str; 6] = [
    "C1,2024-04-25,CP,上海,50,10,40,2,1.5,0.5,1,1,3",
    "C2,2024-04-25,CP,北京,50,20,30,1,0.5,0.5,0.5,0.5,1",
    "C3,2024-04-25,CP,斯图加特,80,40,40,2,2,1,1,1,0",
    "C4,2024-04-25,HNP,上海,0,0,0,0,0,0,0,0,0",
    "E1,4/25/2024,Others,Stuttgart,60,30,30,2,1.5,1,0.5,1,2",
    "E2,4/25/2024,Others,Munich,40,10,30,1,1,0.5,0.5,0.5,1",
];

const LOOKUP: &str = "Hostname,2024-04-25,2024-04-26\nE1,CP,\nE2,,HNP\n";

const CONFIG: &str = r##"label: test
filters:
  above: []
groups:
  - strategy: direct
    column: Primary Category
    allow: [CP, HNP]
    prefix: CN-
    exclude:
      - column: Car City
        values: [斯图加特, 法兰克福, 密西根州]
  - strategy: lookup
    prefix: EU-
    labels: [CP, HNP]
vehicles:
  - hostname: E1
    label: ATGB1
  - hostname: E9
    label: Shark
"##;

fn setup(dir: &Path, header: &str) -> Config {
    let input = dir.join("telemetry.csv");
    let mut content = format!("{}\n", header);
    for row in ROWS {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&input, content).unwrap();
    let lookup = dir.join("filter_data.csv");
    fs::write(&lookup, LOOKUP).unwrap();

    let mut config = Config::from_yaml(CONFIG).unwrap();
    config.input = Some(input);
    config.lookup = Some(lookup);
    config.output_dir = dir.join("filtered_results");
    config
}

#[test]
fn test_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), HEADER);
    let result = run(&config).unwrap();

    assert!(result.is_complete());
    assert_eq!(result.label, "test");
    let keys: Vec<&str> = result.buckets.iter().map(|b| b.key.as_str()).collect();
    assert_eq!(keys, vec!["CN-CP", "CN-HNP", "EU-CP", "EU-HNP"]);
    assert_eq!(result.buckets[0].hostnames, vec!["C1", "C2"]);
    assert_eq!(result.buckets[1].rows, 0);
    assert_eq!(result.buckets[2].hostnames, vec!["E1"]);
    assert_eq!(result.buckets[3].rows, 0);

    let summary = &result.summary;
    assert_eq!(summary.shape(), (9, 5));
    let cn_cp = summary.column("CN-CP").unwrap().f64().unwrap();
    assert_eq!(cn_cp.get(0), Some(90.0));
    assert_eq!(cn_cp.get(4), Some(50.0));
    assert_eq!(cn_cp.get(7), Some(30.0));
    assert_eq!(cn_cp.get(8), Some(2.0));
    assert_eq!(summary.column("CN-HNP").unwrap().null_count(), 9);
    assert_eq!(summary.column("EU-HNP").unwrap().null_count(), 9);
    assert_eq!(
        summary.column("EU-CP").unwrap().f64().unwrap().get(7),
        Some(50.0)
    );

    assert!(result.warnings.contains(&Warning::EmptyBucket {
        bucket: "CN-HNP".into()
    }));
    assert!(result.warnings.contains(&Warning::EmptyBucket {
        bucket: "EU-HNP".into()
    }));
    assert!(!result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::DivideByMissing { .. })));
    assert_eq!(result.summaries[0].value(Metric::AutoKmRatioPct), Some(30.0));

    let vehicles = result.vehicles.as_ref().unwrap();
    assert_eq!(vehicles.height(), 1);
    assert_eq!(
        vehicles.column("driving/online time (%)").unwrap().f64().unwrap().get(0),
        Some(75.0)
    );
    assert_eq!(
        vehicles.column("D/total time (%)").unwrap().f64().unwrap().get(0),
        Some(50.0)
    );

    let out = dir.path().join("filtered_results");
    assert_eq!(result.written.len(), 7);
    for name in [
        "output_data_CN-CP_test.csv",
        "output_data_CN-HNP_test.csv",
        "output_data_EU-CP_test.csv",
        "output_data_EU-HNP_test.csv",
        "membership_test.csv",
        "summary_test.csv",
        "vehicle_summary_test.csv",
    ] {
        assert!(out.join(name).exists(), "{} missing", name);
    }
    assert_eq!(
        fs::read_to_string(out.join("membership_test.csv")).unwrap(),
        "Bucket,Hostname\nCN-CP,C1\nCN-CP,C2\nEU-CP,E1\n"
    );

    let cn_cp_rows = LazyCsvReader::new(out.join("output_data_CN-CP_test.csv"))
        .with_has_header(true)
        .finish()
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(cn_cp_rows.height(), 2);
    assert_eq!(cn_cp_rows.width(), 13);
    let eu_cp_rows = fs::read_to_string(out.join("output_data_EU-CP_test.csv")).unwrap();
    assert!(eu_cp_rows.contains("E1,2024-04-25,Others,Stuttgart"));
}

#[test]
fn test_existing_artifact_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), HEADER);
    let out = dir.path().join("filtered_results");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("summary_test.csv"), "keep me").unwrap();

    let result = run(&config).unwrap();
    assert!(!result.is_complete());
    assert_eq!(result.write_errors.len(), 1);
    assert_eq!(result.write_errors[0].path, out.join("summary_test.csv"));
    assert_eq!(result.written.len(), 6);
    assert_eq!(
        fs::read_to_string(out.join("summary_test.csv")).unwrap(),
        "keep me"
    );
    assert!(out.join("membership_test.csv").exists());
}

#[test]
fn test_missing_column_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let header = HEADER.replace("Takeover", "Takeovers");
    let config = setup(dir.path(), &header);
    match run(&config) {
        Err(PipelineError::MalformedInput { columns, .. }) => {
            assert_eq!(columns, vec!["Takeover"]);
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.label)),
    }
    assert!(!dir.path().join("filtered_results").exists());
}

#[test]
fn test_lookup_grouping_needs_lookup_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), HEADER);
    config.lookup = None;
    assert!(matches!(run(&config), Err(PipelineError::MissingLookup)));
}

#[test]
fn test_roster_without_rows_skips_vehicle_summary() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), HEADER);
    config.vehicles.retain(|v| v.hostname == "E9");

    let result = run(&config).unwrap();
    assert!(result.is_complete());
    assert!(result.vehicles.is_none());
    assert_eq!(result.written.len(), 6);
    let out = dir.path().join("filtered_results");
    assert!(!out.join("vehicle_summary_test.csv").exists());
    assert!(out.join("summary_test.csv").exists());
}
