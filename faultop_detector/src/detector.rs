//! Run-time anomaly detection loop: samples the probe, classifies each
//! datapoint, tracks severity, and logs both streams to CSV. A trained
//! model can plug in behind the `Classifier` trait.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Local;
use faultop::Probe;
use tracing::{debug, error, info, warn};

use crate::severity::{SeverityLevel, SeverityTracker};

#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub anomalous: bool,
    pub probability: f64,
}

/// Binary classifier over a snapshot's feature rows (excluded keys already
/// removed).
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, features: &[(String, String)]) -> Classification;
}

/// Shipped baseline: flags a datapoint when global CPU or memory percent
/// crosses a threshold. Stands in where no trained model is available.
pub struct ThresholdClassifier {
    pub cpu_pct: f32,
    pub mem_pct: f32,
}

impl Classifier for ThresholdClassifier {
    fn classify(&self, features: &[(String, String)]) -> Classification {
        let get = |key: &str| {
            features
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<f32>().ok())
                .unwrap_or(0.0)
        };
        let cpu_score = get("cpu_pct") / self.cpu_pct.max(f32::EPSILON);
        let mem_score = get("mem_pct") / self.mem_pct.max(f32::EPSILON);
        let score = cpu_score.max(mem_score);
        Classification {
            anomalous: score >= 1.0,
            probability: f64::from(score.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Snapshot keys withheld from the classifier.
    pub excluded: Vec<String>,
    pub out_dir: PathBuf,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            excluded: ["time_ms", "datetime", "mem_total", "injector"]
                .map(String::from)
                .to_vec(),
            out_dir: PathBuf::from("detector_out"),
        }
    }
}

/// Single-producer detection loop with its own start/stop lifecycle,
/// structurally the same shape as the orchestrator's sampling loop.
pub struct AnomalyDetector {
    probe: Probe,
    classifier: Arc<dyn Classifier>,
    cfg: DetectorConfig,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnomalyDetector {
    pub fn new(probe: Probe, classifier: Arc<dyn Classifier>, cfg: DetectorConfig) -> Self {
        Self {
            probe,
            classifier,
            cfg,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Launch the detection thread. Double-start is a logged no-op.
    pub fn start(&mut self) {
        if self.is_detecting() {
            warn!("anomaly detector is already running; start ignored");
            return;
        }
        self.stop = Arc::new(AtomicBool::new(false));
        let probe = self.probe.clone();
        let classifier = Arc::clone(&self.classifier);
        let cfg = self.cfg.clone();
        let stop = Arc::clone(&self.stop);
        match thread::Builder::new()
            .name("anomaly-detector".into())
            .spawn(move || detection_loop(probe, classifier, cfg, stop))
        {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("anomaly detector started");
            }
            Err(e) => error!("failed to spawn detection thread: {e}"),
        }
    }

    /// Signal the loop and block until the thread exits. No-op when idle.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            debug!("anomaly detector is not running; stop ignored");
            return;
        };
        self.stop.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            warn!("detection thread panicked before joining");
        }
        info!("anomaly detector stopped");
    }

    pub fn is_detecting(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

fn detection_loop(
    probe: Probe,
    classifier: Arc<dyn Classifier>,
    cfg: DetectorConfig,
    stop: Arc<AtomicBool>,
) {
    if let Err(e) = std::fs::create_dir_all(&cfg.out_dir) {
        error!("cannot create detector output dir {}: {e}", cfg.out_dir.display());
        return;
    }
    let dp_path = cfg.out_dir.join("datapoints_with_predictions.csv");
    let sl_path = cfg.out_dir.join("predictions_with_severity.csv");
    let (mut dp_log, mut sl_log) = match (open_writer(&dp_path), open_writer(&sl_path)) {
        (Ok(dp), Ok(sl)) => (dp, sl),
        (Err(e), _) | (_, Err(e)) => {
            error!("cannot open detector log: {e}");
            return;
        }
    };

    let mut tracker = SeverityTracker::new();
    let mut first = true;
    while !stop.load(Ordering::Relaxed) {
        // sample() blocks for the probe's intervals, which paces this loop
        let snapshot = probe.sample();
        let features: Vec<(String, String)> = snapshot
            .rows()
            .into_iter()
            .filter(|(k, _)| !cfg.excluded.iter().any(|e| e == k))
            .collect();

        let result = classifier.classify(&features);
        let level = tracker.observe(result.anomalous);
        raise_alert(result.anomalous, level);

        let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let prediction = if result.anomalous { "ANOMALY DETECTED" } else { "NORMAL STATE" };
        let probability = format!("{:.4}", result.probability);

        if first {
            let mut header = vec!["date_and_time", "prediction", "predicted_proba"];
            header.extend(features.iter().map(|(k, _)| k.as_str()));
            log_record(&mut dp_log, &dp_path, header.iter().copied());
            log_record(
                &mut sl_log,
                &sl_path,
                ["date_and_time", "prediction", "predicted_proba", "severity_level"],
            );
            first = false;
        }
        let mut dp_row = vec![now.as_str(), prediction, probability.as_str()];
        dp_row.extend(features.iter().map(|(_, v)| v.as_str()));
        log_record(&mut dp_log, &dp_path, dp_row.iter().copied());
        log_record(
            &mut sl_log,
            &sl_path,
            [now.as_str(), prediction, probability.as_str(), level.describe()],
        );
    }
    let _ = dp_log.flush();
    let _ = sl_log.flush();
}

fn raise_alert(anomalous: bool, level: SeverityLevel) {
    let state = if anomalous { "ANOMALY DETECTED" } else { "NORMAL STATE" };
    match level {
        SeverityLevel::Critical | SeverityLevel::High => {
            warn!("{state} - {} {}", level.describe(), level.advice());
        }
        _ => info!("{state} - {} {}", level.describe(), level.advice()),
    }
}

fn open_writer(path: &std::path::Path) -> Result<csv::Writer<std::fs::File>, csv::Error> {
    csv::WriterBuilder::new().has_headers(false).from_path(path)
}

fn log_record<'a, I>(writer: &mut csv::Writer<std::fs::File>, path: &std::path::Path, record: I)
where
    I: IntoIterator<Item = &'a str>,
{
    if let Err(e) = writer.write_record(record) {
        error!("failed to append to {}: {e}", path.display());
    }
    let _ = writer.flush();
}
