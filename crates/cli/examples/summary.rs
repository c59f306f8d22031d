use polars::prelude::*;

// Quick look at a telemetry export: per-category means, no filtering.
fn main() {
    let path = std::env::args().nth(1).unwrap_or("telemetry.csv".to_string());
    let q = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()
        .unwrap()
        .select(vec![
            col("Primary Category"),
            col("Total mileage (km)"),
            col("Autononous driving mileage (km)"),
            col("Activate time (hr)"),
            col("D gear time (hr)"),
            col("Takeover"),
        ])
        .group_by(vec![col("Primary Category")])
        .agg([col("*").mean(), col("Takeover").count().alias("rows")]);

    let df = q.collect().unwrap();

    println!("{}", df)
}
