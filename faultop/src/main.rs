//! Entry point for the faultop collector. Parses args, builds the
//! probe/manager/orchestrator pipeline, and runs it to completion (or a
//! clean ctrl-c shutdown).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use faultop::{
    load_entries, CsvSink, InjectionManager, Orchestrator, Probe, ProbeConfig,
};

struct ParsedArgs {
    injectors: String,
    normal_obs: usize,
    injection_obs: usize,
    injections: Option<usize>,
    shuffle: bool,
    pause_ms: u64,
    out: PathBuf,
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} --injectors JSON_OR_PATH [--normal-obs N] [--injection-obs N] \
         [--injections COUNT] [--shuffle] [--pause-ms MS] [--out CSV_PATH]"
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "faultop".into());

    let mut injectors: Option<String> = None;
    let mut normal_obs = 120usize;
    let mut injection_obs = 80usize;
    let mut injections: Option<usize> = None;
    let mut shuffle = false;
    let mut pause_ms = 100u64;
    let mut out = PathBuf::from("faultop_dataset.csv");

    fn want<T: std::str::FromStr>(flag: &str, v: Option<String>) -> Result<T, String> {
        v.and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("{flag} expects a value"))
    }

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(usage(&prog)),
            "--injectors" | "-i" => injectors = it.next(),
            "--normal-obs" => normal_obs = want("--normal-obs", it.next())?,
            "--injection-obs" => injection_obs = want("--injection-obs", it.next())?,
            "--injections" => injections = Some(want("--injections", it.next())?),
            "--shuffle" => shuffle = true,
            "--pause-ms" => pause_ms = want("--pause-ms", it.next())?,
            "--out" | "-o" => out = PathBuf::from(want::<String>("--out", it.next())?),
            _ => return Err(format!("Unexpected argument '{arg}'. {}", usage(&prog))),
        }
    }

    let injectors = injectors.ok_or_else(|| usage(&prog))?;
    if normal_obs == 0 || injection_obs == 0 {
        return Err("window sizes must be at least 1".into());
    }
    Ok(ParsedArgs { injectors, normal_obs, injection_obs, injections, shuffle, pause_ms, out })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    let probe = Probe::new(ProbeConfig::default());
    let pause = Duration::from_millis(parsed.pause_ms);
    // duration budget per injection: observation count x effective tick
    let tick = pause + probe.sampling_latency();
    let duration = tick * parsed.injection_obs as u32;

    let entries = load_entries(&parsed.injectors).context("loading injector configuration")?;
    let manager = InjectionManager::read_injectors(&entries, duration, parsed.injections, parsed.shuffle)
        .context("building the injection queue")?;

    if let Some(parent) = parsed.out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    let sink = CsvSink::create(&parsed.out)
        .with_context(|| format!("creating {}", parsed.out.display()))?;

    let mut orchestrator = Orchestrator::new(
        probe,
        manager,
        sink,
        parsed.normal_obs,
        parsed.injection_obs,
        pause,
    );

    let interrupted = {
        let run = orchestrator.run();
        tokio::pin!(run);
        tokio::select! {
            res = &mut run => {
                let total = res?;
                info!(total, out = %parsed.out.display(), "dataset written");
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        }
    };
    if interrupted {
        warn!("interrupted; stopping any active injection");
        orchestrator.shutdown();
    }
    Ok(())
}
