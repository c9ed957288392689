//! Standalone anomaly detector: watches the live host through the same probe
//! the collector uses and raises severity-graded alerts until interrupted.

mod detector;
mod severity;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use faultop::{Probe, ProbeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use detector::{AnomalyDetector, DetectorConfig, ThresholdClassifier};

#[derive(Debug, PartialEq)]
struct ParsedArgs {
    out_dir: PathBuf,
    cpu_threshold: f32,
    mem_threshold: f32,
    excluded: Vec<String>,
}

impl Default for ParsedArgs {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("detector_out"),
            cpu_threshold: 90.0,
            mem_threshold: 90.0,
            excluded: ["time_ms", "datetime", "mem_total", "injector"]
                .map(String::from)
                .to_vec(),
        }
    }
}

fn usage() -> String {
    [
        "faultop_detector - live anomaly detection over host telemetry",
        "",
        "Options:",
        "  --out-dir <DIR>          where prediction logs land (default detector_out)",
        "  --cpu-threshold <PCT>    global CPU percent flagged as anomalous (default 90)",
        "  --mem-threshold <PCT>    memory percent flagged as anomalous (default 90)",
        "  --exclude <KEY>          snapshot key withheld from the classifier (repeatable)",
        "  -h, --help               show this help",
    ]
    .join("\n")
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut parsed = ParsedArgs::default();
    let mut extra_excludes: Vec<String> = Vec::new();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--out-dir" => {
                let v = it.next().ok_or("--out-dir requires a value")?;
                parsed.out_dir = PathBuf::from(v);
            }
            "--cpu-threshold" => {
                let v = it.next().ok_or("--cpu-threshold requires a value")?;
                parsed.cpu_threshold =
                    v.parse().map_err(|_| format!("invalid --cpu-threshold: {v}"))?;
            }
            "--mem-threshold" => {
                let v = it.next().ok_or("--mem-threshold requires a value")?;
                parsed.mem_threshold =
                    v.parse().map_err(|_| format!("invalid --mem-threshold: {v}"))?;
            }
            "--exclude" => {
                let v = it.next().ok_or("--exclude requires a value")?;
                extra_excludes.push(v);
            }
            "-h" | "--help" => return Err(usage()),
            other => return Err(format!("unknown argument: {other}\n\n{}", usage())),
        }
    }
    if !extra_excludes.is_empty() {
        parsed.excluded = extra_excludes;
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(msg) => {
            println!("{msg}");
            let is_help = std::env::args().any(|a| a == "-h" || a == "--help");
            std::process::exit(if is_help { 0 } else { 2 });
        }
    };

    let probe = Probe::new(ProbeConfig {
        monitor_cpu: true,
        monitor_memory: true,
        times_interval: Duration::from_millis(100),
        usage_interval: Duration::from_millis(900),
    });
    let classifier = Arc::new(ThresholdClassifier {
        cpu_pct: args.cpu_threshold,
        mem_pct: args.mem_threshold,
    });
    let cfg = DetectorConfig { excluded: args.excluded, out_dir: args.out_dir };

    let mut detector = AnomalyDetector::new(probe, classifier, cfg);
    detector.start();
    info!("detecting anomalies, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    detector.stop();
    Ok(())
}
