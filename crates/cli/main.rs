use config::Config;
use telemetry::{run, RunResult};

use clap::builder::PossibleValuesParser;
use clap::Parser;
use env_logger::Env;
use polars::prelude::*;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{debug, error, info, warn};

enum OutputType {
    POLAR,
    JSON,
    NONE,
}

impl OutputType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "polar" => Some(OutputType::POLAR),
            "json" => Some(OutputType::JSON),
            "none" => Some(OutputType::NONE),
            _ => None,
        }
    }
}

trait Output {
    fn output(&self) -> Result<(), Box<dyn Error>>;
}

struct PolarOutput {
    df: DataFrame,
}

impl PolarOutput {
    fn new(df: DataFrame) -> Self {
        PolarOutput { df }
    }
}

impl Output for PolarOutput {
    fn output(&self) -> Result<(), Box<dyn Error>> {
        println!("{}", self.df);
        Ok(())
    }
}

struct JsonOutput {
    df: DataFrame,
}

impl JsonOutput {
    fn new(df: DataFrame) -> Self {
        JsonOutput { df }
    }
}

impl Output for JsonOutput {
    fn output(&self) -> Result<(), Box<dyn Error>> {
        let mut d = self.df.clone();
        let mut j = Vec::<u8>::new();
        JsonWriter::new(&mut j)
            .with_json_format(JsonFormat::Json)
            .finish(&mut d)?;
        println!("{}", String::from_utf8(j)?);
        Ok(())
    }
}

struct NoOutput;

impl Output for NoOutput {
    fn output(&self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// Daily fleet telemetry summary: filter drive records, bucket them and
/// report per-bucket and per-vehicle averages
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(
        short = 'c',
        long = "config",
        default_value = ".fleet-stat.yml",
        help = "config file"
    )]
    config: String,

    #[arg(long = "input", help = "telemetry csv file, overrides `input` in config")]
    input: Option<PathBuf>,

    #[arg(
        long = "lookup",
        help = "assignment sheet (hostname x date -> test), overrides `lookup` in config"
    )]
    lookup: Option<PathBuf>,

    #[arg(long = "output-dir", help = "directory for all output files")]
    output_dir: Option<PathBuf>,

    #[arg(long = "label", help = "suffix of output file names, default is current time")]
    label: Option<String>,

    #[arg(
        short = 'F',
        long = "format",
        value_parser = PossibleValuesParser::new(["polar", "json", "none"]),
        default_value = "polar",
        help = "how to print the summary table"
    )]
    format: String,
}

impl Args {
    fn apply(&self, mut conf: Config) -> Config {
        if let Some(input) = &self.input {
            conf.input = Some(input.clone());
        }
        if let Some(lookup) = &self.lookup {
            conf.lookup = Some(lookup.clone());
        }
        if let Some(dir) = &self.output_dir {
            conf.output_dir = dir.clone();
        }
        if let Some(label) = &self.label {
            conf.label = Some(label.clone());
        }
        conf
    }
}

fn get_output(output_type: OutputType, df: DataFrame) -> Box<dyn Output> {
    match output_type {
        OutputType::POLAR => Box::new(PolarOutput::new(df)),
        OutputType::JSON => Box::new(JsonOutput::new(df)),
        OutputType::NONE => Box::new(NoOutput),
    }
}

fn load_config(args: &Args) -> Result<Config, config::ConfigError> {
    match Config::new(args.config.as_str()) {
        Ok(conf) => Ok(args.apply(conf)),
        // a missing default config is fine when everything comes from flags
        Err(config::ConfigError::Open { path, .. })
            if args.config == ".fleet-stat.yml" && !path.exists() =>
        {
            info!("no {:?}, using defaults", path);
            Ok(args.apply(Config::default()))
        }
        Err(e) => Err(e),
    }
}

fn report(result: &RunResult) {
    if !result.warnings.is_empty() {
        warn!("run {} finished with {} warning(s)", result.label, result.warnings.len());
    }
    for bucket in &result.buckets {
        info!(
            "{}: {} rows, hostnames {:?}",
            bucket.key, bucket.rows, bucket.hostnames
        );
    }
    for path in &result.written {
        debug!("written: {:?}", path);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let conf = match load_config(&args) {
        Ok(conf) => conf,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };
    debug!("config: {:?}", conf);

    let result = match run(&conf) {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };
    report(&result);

    let out_type = OutputType::from_str(args.format.as_str()).unwrap_or(OutputType::POLAR);
    if let Err(e) = get_output(out_type, result.summary.clone()).output() {
        error!("print summary failed: {}", e);
    }

    if result.is_complete() {
        ExitCode::SUCCESS
    } else {
        error!("{} output file(s) not written", result.write_errors.len());
        ExitCode::from(2)
    }
}
