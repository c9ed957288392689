//! Memory stress injector: grows a synthetic buffer under a feedback loop
//! that releases part of it before host memory runs out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error};

use crate::injector::{Feedback, InjectionInterval, InjectorSpec, RunState, StressWorker};
use crate::probe::{Probe, ProbeConfig};

/// Elements per synthetic chunk when the configuration names none.
pub const DEFAULT_CHUNK_ITEMS: usize = 1_234_567;

/// Pause between growth steps.
const GROW_PAUSE: Duration = Duration::from_millis(1);
/// Coarser interval the feedback loop samples memory percent at.
const FEEDBACK_INTERVAL: Duration = Duration::from_millis(500);
/// Above this percent-used the stress loop sheds part of its buffer.
const RELEASE_THRESHOLD_PCT: f32 = 90.0;

#[derive(Debug)]
pub struct MemoryStressInjector {
    spec: InjectorSpec,
    worker: StressWorker,
}

impl MemoryStressInjector {
    pub fn new(spec: InjectorSpec) -> Self {
        Self { spec, worker: StressWorker::new() }
    }

    pub fn validate(&self) -> bool {
        self.spec.chunk_items > 0
    }

    pub fn start(&mut self) {
        let chunk_items = self.spec.chunk_items;
        self.worker.begin(&self.name(), move |stop| grow_loop(chunk_items, &stop));
    }

    pub fn stop(&mut self) {
        self.worker.finish(&self.name());
    }

    pub fn name(&self) -> String {
        format!(
            "[{}]MemoryStressInjector(d{}-i{})",
            self.spec.tag,
            self.spec.duration.as_millis(),
            self.spec.chunk_items
        )
    }

    pub fn state(&self) -> RunState {
        self.worker.state()
    }

    pub fn intervals(&self) -> &[InjectionInterval] {
        self.worker.intervals()
    }

    pub fn spec(&self) -> &InjectorSpec {
        &self.spec
    }
}

/// Append one chunk per step; whenever the latest feedback reading crosses
/// the release threshold, first drop a random 20–80 % of the held chunks.
/// Keeps pressure on without driving the host out of memory.
fn grow_loop(chunk_items: usize, stop: &AtomicBool) {
    let probe = Probe::new(ProbeConfig {
        monitor_cpu: false,
        monitor_memory: true,
        ..ProbeConfig::default()
    });
    let feedback: Arc<Feedback<f32>> = Arc::new(Feedback::new());
    let monitor_stop = Arc::new(AtomicBool::new(false));

    let monitor = {
        let feedback = Arc::clone(&feedback);
        let monitor_stop = Arc::clone(&monitor_stop);
        thread::Builder::new()
            .name("mem-feedback".into())
            .spawn(move || {
                while !monitor_stop.load(Ordering::Relaxed) {
                    feedback.publish(probe.memory_percent());
                    // sleep in short slices so stop latency stays well under
                    // the sampling interval
                    let mut slept = Duration::ZERO;
                    while slept < FEEDBACK_INTERVAL && !monitor_stop.load(Ordering::Relaxed) {
                        let step = Duration::from_millis(50);
                        thread::sleep(step);
                        slept += step;
                    }
                }
            })
    };
    let monitor = match monitor {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to spawn memory feedback thread: {e}");
            return;
        }
    };

    if feedback.wait_first(stop).is_some() {
        let mut rng = rand::thread_rng();
        let mut held: Vec<Vec<i64>> = Vec::new();
        while !stop.load(Ordering::Relaxed) {
            let used_pct = feedback.latest().unwrap_or(0.0);
            if used_pct > RELEASE_THRESHOLD_PCT {
                let before = held.len();
                release_chunks(&mut held, rng.gen_range(0.2..=0.8));
                debug!("memory pressure at {used_pct:.1}%: released {} of {before} chunks", before - held.len());
            }
            held.push(vec![999; chunk_items]);
            thread::sleep(GROW_PAUSE);
        }
        drop(held);
    }

    monitor_stop.store(true, Ordering::Relaxed);
    let _ = monitor.join();
}

/// Drop `fraction` of the oldest held chunks.
pub(crate) fn release_chunks(held: &mut Vec<Vec<i64>>, fraction: f64) {
    let n = (held.len() as f64 * fraction) as usize;
    held.drain(..n);
}
