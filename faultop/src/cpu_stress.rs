//! CPU stress injector: whole-machine saturation, or a single logical core
//! driven by an adaptive feedback loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::burn;
use crate::injector::{Feedback, InjectionInterval, InjectorSpec, RunState, StressWorker};
use crate::probe::{Probe, ProbeConfig};

/// Burst at full saturation.
const FULL_BURST: Duration = Duration::from_millis(800);
/// Burst at the proportional target (single-core variant).
const PARTIAL_BURST: Duration = Duration::from_millis(400);
/// Interval the single-core feedback loop samples other cores at.
const FEEDBACK_USAGE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct CpuStressInjector {
    spec: InjectorSpec,
    worker: StressWorker,
}

impl CpuStressInjector {
    pub fn new(spec: InjectorSpec) -> Self {
        Self { spec, worker: StressWorker::new() }
    }

    /// A targeted core must exist on this host.
    pub fn validate(&self) -> bool {
        match self.spec.core {
            Some(core) => core < logical_core_count(),
            None => true,
        }
    }

    pub fn start(&mut self) {
        let core = self.spec.core;
        self.worker.begin(&self.name(), move |stop| match core {
            None => whole_machine(&stop),
            Some(core) => single_core(core, &stop),
        });
    }

    pub fn stop(&mut self) {
        self.worker.finish(&self.name());
    }

    pub fn name(&self) -> String {
        format!("[{}]CpuStressInjector(d{})", self.spec.tag, self.spec.duration.as_millis())
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

fn logical_core_count() -> usize {
    thread::available_parallelism().map(usize::from).unwrap_or(1)
}

/// Saturate every core until stopped: each burst runs at 100 % or somewhere
/// in the 90–100 % band, coin-flipped per iteration.
fn whole_machine(stop: &AtomicBool) {
    let mut rng = rand::thread_rng();
    while !stop.load(Ordering::Relaxed) {
        let duty = if rng.gen_bool(0.5) { 1.0 } else { rng.gen_range(0.9..=1.0) };
        burn::spin_all(duty, FULL_BURST, stop);
    }
}

/// Stress one logical core, adapting to what the rest of the machine is
/// doing. A feedback thread publishes all cores' usage into a shared cell;
/// the stress loop waits for the first sample, then per iteration targets
/// `min(100, max(other cores) + uniform(50, 80))`.
///
/// The stress thread is bound to the target core. Without the binding the
/// scheduler can place the spin load on a core the feedback loop still
/// counts as "other", which drags `others_max` toward 100 and flattens the
/// proportional branch into constant full load.
fn single_core(core: usize, stop: &AtomicBool) {
    let probe = Probe::new(ProbeConfig {
        monitor_cpu: true,
        monitor_memory: false,
        times_interval: Duration::ZERO,
        usage_interval: FEEDBACK_USAGE_INTERVAL,
    });
    let feedback: Arc<Feedback<Vec<f32>>> = Arc::new(Feedback::new());
    let monitor_stop = Arc::new(AtomicBool::new(false));

    let monitor = {
        let feedback = Arc::clone(&feedback);
        let monitor_stop = Arc::clone(&monitor_stop);
        thread::Builder::new()
            .name("cpu-feedback".into())
            .spawn(move || {
                while !monitor_stop.load(Ordering::Relaxed) {
                    // per_core_usage blocks for the usage interval, which
                    // paces this loop
                    feedback.publish(probe.per_core_usage());
                }
            })
    };
    let monitor = match monitor {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to spawn cpu feedback thread: {e}");
            return;
        }
    };

    // bind after the monitor is spawned: child threads inherit the caller's
    // affinity mask, and the feedback loop must stay free to roam
    if !burn::pin_to_core(core) {
        warn!("could not bind stress thread to core {core}; adaptive target may saturate");
    }

    // the stress loop must not run ahead of the first feedback sample
    if feedback.wait_first(stop).is_some() {
        let mut rng = rand::thread_rng();
        while !stop.load(Ordering::Relaxed) {
            let usage = feedback.latest().unwrap_or_default();
            let others_max = usage
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != core)
                .map(|(_, v)| *v)
                .fold(0.0f32, f32::max);
            let target = single_core_target(others_max, rng.gen_range(50.0..=80.0));
            if rng.gen_bool(0.5) {
                burn::spin_one(1.0, FULL_BURST, stop);
            } else {
                burn::spin_one(f64::from(target) / 100.0, PARTIAL_BURST, stop);
            }
        }
    }

    monitor_stop.store(true, Ordering::Relaxed);
    let _ = monitor.join();
}

/// Target utilization for the stressed core given the busiest other core.
pub(crate) fn single_core_target(others_max: f32, offset: f32) -> f32 {
    (others_max + offset).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::InjectorKind;

    fn spec(core: Option<usize>) -> InjectorSpec {
        InjectorSpec {
            kind: InjectorKind::Cpu,
            tag: "CPU_default".into(),
            duration: Duration::from_millis(100),
            chunk_items: 0,
            core,
        }
    }

    #[test]
    fn target_is_clamped_to_one_hundred() {
        for (others_max, offset) in [(0.0, 50.0), (12.5, 63.0), (40.0, 80.0), (95.0, 50.0)] {
            let target = single_core_target(others_max, offset);
            assert_eq!(target, (others_max + offset).min(100.0));
            assert!(target <= 100.0);
        }
    }

    #[test]
    fn whole_machine_spec_validates() {
        assert!(CpuStressInjector::new(spec(None)).validate());
    }

    #[test]
    fn out_of_range_core_fails_closed() {
        assert!(!CpuStressInjector::new(spec(Some(usize::MAX))).validate());
        assert!(CpuStressInjector::new(spec(Some(0))).validate());
    }

    #[test]
    fn name_carries_tag_and_duration() {
        assert_eq!(
            CpuStressInjector::new(spec(None)).name(),
            "[CPU_default]CpuStressInjector(d100)"
        );
    }
}
