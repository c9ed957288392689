//! Alternation control loop: fixed-length normal and injection observation
//! windows, one probe sample per tick, injections started and stopped at
//! window boundaries.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::Error;
use crate::manager::InjectionManager;
use crate::probe::Probe;
use crate::sink::SnapshotSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NormalWindow,
    InjectionWindow,
}

pub struct Orchestrator<S: SnapshotSink> {
    probe: Probe,
    manager: InjectionManager,
    sink: S,
    normal_obs: usize,
    injection_obs: usize,
    pause: Duration,
}

impl<S: SnapshotSink> Orchestrator<S> {
    pub fn new(
        probe: Probe,
        manager: InjectionManager,
        sink: S,
        normal_obs: usize,
        injection_obs: usize,
        pause: Duration,
    ) -> Self {
        Self { probe, manager, sink, normal_obs, injection_obs, pause }
    }

    /// Pause plus probe latency: what one observation actually costs.
    pub fn effective_tick(&self) -> Duration {
        self.pause + self.probe.sampling_latency()
    }

    /// Drive the alternation until the injector queue is exhausted.
    /// Returns the total number of observations written.
    ///
    /// This task never runs concurrently with itself; it is the single
    /// caller of the manager and of the probe's fault-state mutations.
    pub async fn run(&mut self) -> Result<usize, Error> {
        let mut phase = Phase::NormalWindow;
        let mut done = 0usize;
        let mut target = self.normal_obs;
        let mut total = 0usize;

        info!(
            normal_obs = self.normal_obs,
            injection_obs = self.injection_obs,
            queued = self.manager.queued(),
            "orchestration started"
        );

        loop {
            if done < target {
                // sample() blocks for the probe's measurement intervals;
                // keep it off the async workers
                let probe = self.probe.clone();
                let snapshot = tokio::task::spawn_blocking(move || probe.sample())
                    .await
                    .map_err(|e| Error::Probe(e.to_string()))?;
                self.sink.write(&snapshot)?;
                done += 1;
                total += 1;
                sleep(self.pause).await;
                continue;
            }

            match phase {
                Phase::NormalWindow => match self.manager.inject_fault() {
                    Some(name) => {
                        self.probe.set_injection_state(&name);
                        phase = Phase::InjectionWindow;
                        target = self.injection_obs;
                        done = 0;
                        debug!("entering injection window");
                    }
                    // queue exhausted where an injection would start: halt
                    None => break,
                },
                Phase::InjectionWindow => {
                    self.manager.stop_injection();
                    self.probe.clear_injection_state();
                    phase = Phase::NormalWindow;
                    target = self.normal_obs;
                    done = 0;
                    debug!("entering normal window");
                    if self.manager.queue_empty() {
                        break;
                    }
                }
            }
        }

        info!(
            total,
            injections = self.manager.performed(),
            "monitoring finished; all fault injections performed"
        );
        Ok(total)
    }

    /// Interrupted-shutdown path: stop any active injection and clear the
    /// probe's fault state so the workload cannot outlive the run.
    pub fn shutdown(&mut self) {
        self.manager.stop_injection();
        self.probe.clear_injection_state();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
