//! Injection sequencing: a FIFO queue of specs and at most one active
//! injector. Only the orchestrator thread touches this state, so no internal
//! locking is needed.

use std::collections::VecDeque;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::InjectorEntry;
use crate::error::Error;
use crate::injector::{Injector, InjectorSpec};

#[derive(Debug)]
pub struct InjectionManager {
    queue: VecDeque<InjectorSpec>,
    current: Option<Injector>,
    performed: usize,
}

impl InjectionManager {
    /// Build the queue from configuration entries.
    ///
    /// Entries that fail the synonym table or variant validation are skipped
    /// with a warning; zero surviving specs is fatal. A `target_count` below
    /// the surviving count falls back to "use all valid specs" (warned, not
    /// fatal); above it, randomly chosen valid specs are replicated (each
    /// with a fresh duration assignment) until the target is reached. The
    /// final ordering is optionally shuffled.
    pub fn read_injectors(
        entries: &[InjectorEntry],
        duration: Duration,
        target_count: Option<usize>,
        shuffle: bool,
    ) -> Result<Self, Error> {
        let mut specs: Vec<InjectorSpec> = Vec::new();
        for entry in entries {
            match InjectorSpec::from_entry(entry, duration) {
                Some(spec) => {
                    let injector = Injector::from_spec(spec.clone());
                    if injector.validate() {
                        debug!("loaded injector spec '{}'", injector.name());
                        specs.push(spec);
                    } else {
                        warn!("injector spec '{}' failed validation; skipped", spec.tag);
                    }
                }
                None => warn!("unknown injector type '{}'; entry skipped", entry.kind),
            }
        }
        if specs.is_empty() {
            return Err(Error::NoValidInjectors);
        }

        let base_len = specs.len();
        let mut rng = rand::thread_rng();
        match target_count {
            Some(target) if target < base_len => {
                warn!("target count {target} is below the {base_len} valid specs; using all of them");
            }
            Some(target) => {
                while specs.len() < target {
                    let mut replica = specs[rng.gen_range(0..base_len)].clone();
                    replica.duration = duration;
                    debug!("replicated injector spec '{}' to reach target count", replica.tag);
                    specs.push(replica);
                }
            }
            None => {}
        }

        if shuffle {
            specs.shuffle(&mut rng);
            debug!("injector queue shuffled");
        }
        info!("{} injections queued", specs.len());

        Ok(Self { queue: specs.into(), current: None, performed: 0 })
    }

    /// Start the next injection if none is active. Returns the started
    /// injector's descriptor, or None while one is active or when the queue
    /// is empty. An empty queue is the caller's termination signal, not a
    /// failure.
    pub fn inject_fault(&mut self) -> Option<String> {
        if self.current.is_some() {
            info!("an injection is already active; none started");
            return None;
        }
        while let Some(spec) = self.queue.pop_front() {
            let mut injector = Injector::from_spec(spec);
            // validated at read time; re-checked so an invalid spec can
            // never reach start()
            if !injector.validate() {
                warn!("'{}' failed validation at start; skipped", injector.name());
                continue;
            }
            let name = injector.name();
            info!("injecting with '{name}'");
            injector.start();
            self.current = Some(injector);
            self.performed += 1;
            return Some(name);
        }
        info!("all injectors have been consumed; none available for injection");
        None
    }

    /// Stop and discard the active injector. No-op while idle.
    pub fn stop_injection(&mut self) {
        match self.current.take() {
            Some(mut injector) => {
                info!("stopping injection '{}'", injector.name());
                injector.stop();
            }
            None => debug!("there is no ongoing injection to stop"),
        }
    }

    pub fn queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn performed(&self) -> usize {
        self.performed
    }

    pub fn active(&self) -> Option<&Injector> {
        self.current.as_ref()
    }
}
