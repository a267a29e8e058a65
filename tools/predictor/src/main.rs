/// Soil-slip prediction tool: loads a run configuration and a JSON bundle
/// (trained model + feature table), runs the forecaster for one or more
/// reference times and writes the prediction records as JSON.
///
/// Reference times are independent, so they run in parallel.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;
use rayon::prelude::*;
use serde::Deserialize;
use sliper_core::time_window::{floor_to, TimeWindow};
use sliper_core::{FeatureTable, Forecaster, RunConfig, RunOutput, TrainedModel};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sliper-predict",
    about = "Predict soil-slip counts and alert levels per alert area"
)]
struct Args {
    /// Run configuration (methods, partition, analysis, areas, styles)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input bundle with "model" and "features"
    #[arg(short, long)]
    input: PathBuf,

    /// Reference time, e.g. "2025-01-10 06:00". Repeat for several runs.
    /// Defaults to the current hour.
    #[arg(short = 't', long = "time-run", value_parser = parse_time)]
    time_run: Vec<NaiveDateTime>,

    /// Output directory, one file per run. Prints to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

// ── Input bundle ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct InputBundle {
    model: TrainedModel,
    features: FeatureTable,
}

const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn parse_time(s: &str) -> std::result::Result<NaiveDateTime, String> {
    let s = s.trim();
    for format in TIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("cannot parse \"{s}\" as a time (expected e.g. 2025-01-10 06:00)"))
}

fn load_bundle(path: &Path) -> Result<InputBundle> {
    let text = fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let bundle: InputBundle =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    bundle.model.validate().context("Trained model is inconsistent")?;
    bundle.features.validate().context("Feature table is inconsistent")?;
    Ok(bundle)
}

fn write_output(output: &RunOutput, dir: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    match dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = dir.join(format!(
                "sliper_predictions_{}.json",
                output.time_run.format("%Y%m%d%H%M")
            ));
            fs::write(&path, json).with_context(|| format!("Cannot write {}", path.display()))?;
            info!(path = %path.display(), records = output.records.len(), "predictions written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => RunConfig::from_path(path).with_context(|| format!("Invalid configuration {}", path.display()))?,
        None => {
            warn!("no configuration given, using defaults");
            RunConfig::default()
        }
    };
    let forecaster = Forecaster::new(config).context("Cannot configure the forecaster")?;
    let bundle = load_bundle(&args.input)?;

    let time_runs = if args.time_run.is_empty() {
        vec![floor_to(chrono::Local::now().naive_local(), &TimeWindow::hours(1))]
    } else {
        args.time_run.clone()
    };
    info!(runs = time_runs.len(), rows = bundle.features.len(), "starting");

    let results: Vec<(NaiveDateTime, sliper_core::Result<RunOutput>)> = time_runs
        .par_iter()
        .map(|&t| (t, forecaster.run(t, &bundle.features, &bundle.model)))
        .collect();

    let mut failed = 0usize;
    for (time_run, result) in results {
        match result {
            Ok(output) => {
                for warning in &output.diagnostics.warnings {
                    warn!(time_run = %time_run, "{warning}");
                }
                write_output(&output, args.output.as_deref())?;
            }
            Err(e) => {
                error!(time_run = %time_run, "run failed: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} runs failed", time_runs.len());
    }
    info!("done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_time_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert_eq!(parse_time("2025-01-10 06:00").unwrap(), expected);
        assert_eq!(parse_time("2025-01-10T06:00:00").unwrap(), expected);
        assert_eq!(
            parse_time("2025-01-10").unwrap(),
            expected.date().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(parse_time("10/01/2025").is_err());
    }

    #[test]
    fn cli_accepts_repeated_time_runs() {
        let args = Args::try_parse_from([
            "sliper-predict",
            "--input",
            "bundle.json",
            "-t",
            "2025-01-10 06:00",
            "-t",
            "2025-01-11 06:00",
        ])
        .unwrap();
        assert_eq!(args.time_run.len(), 2);
        assert!(args.config.is_none());
    }

    #[test]
    fn bundle_round_trips_through_the_forecaster() {
        let text = r#"{
            "model": {
                "center": {"data": [1.0, 0.0], "rows": 1, "cols": 2},
                "scale": [1.0, 1.0], "mean": [0.0, 0.0], "coefficients": [1.0],
                "kernel_kind": "linear", "exponent": 1
            },
            "features": {
                "columns": ["rain"],
                "records": [
                    {"domain": "a", "timestamp": "2025-01-10T00:00:00", "values": [4.0], "day_of_year": 10}
                ]
            }
        }"#;
        let bundle: InputBundle = serde_json::from_str(text).unwrap();
        let config = RunConfig::from_json_str(
            r#"{"methods": {"kernel": {"active": true, "include_day_of_year": false}},
                "areas": {"a": {"white": [0, 0], "green": [1, 2], "yellow": [3, 5],
                                "orange": [6, 13], "red": [14, null]}}}"#,
        )
        .unwrap();
        let forecaster = Forecaster::new(config).unwrap();
        let out = forecaster
            .run(parse_time("2025-01-10 06:00").unwrap(), &bundle.features, &bundle.model)
            .unwrap();
        assert_eq!(out.records[0].predicted_count, 4);
        assert_eq!(out.records[0].alert_color.as_deref(), Some("yellow"));
    }
}
