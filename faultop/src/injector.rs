//! Injector core: spec + kind table, the shared worker lifecycle, the
//! feedback cell the adaptive variants synchronize through, and the
//! [`Injector`] sum type over the two stress variants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::InjectorEntry;
use crate::cpu_stress::CpuStressInjector;
use crate::mem_stress::{MemoryStressInjector, DEFAULT_CHUNK_ITEMS};

/// Fault variants an [`InjectorSpec`] can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectorKind {
    Cpu,
    Memory,
}

impl InjectorKind {
    /// Documented synonym table for configuration `type` strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CPU" | "Proc" | "CPUUsage" | "CPUStress" => Some(Self::Cpu),
            "Memory" | "RAM" | "MemoryUsage" | "Mem" | "MemoryStress" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Immutable description of one injection, built from configuration at
/// startup with the externally derived duration budget injected.
#[derive(Debug, Clone)]
pub struct InjectorSpec {
    pub kind: InjectorKind,
    pub tag: String,
    pub duration: Duration,
    /// Memory variant: elements per synthetic allocation chunk.
    pub chunk_items: usize,
    /// CPU variant: logical core to target; whole machine when absent.
    pub core: Option<usize>,
}

impl InjectorSpec {
    /// Build a spec from a configuration entry, or None when the type string
    /// matches no known synonym. The core index may be given explicitly;
    /// otherwise the first integer embedded in the tag is the fallback.
    pub fn from_entry(entry: &InjectorEntry, duration: Duration) -> Option<Self> {
        let kind = InjectorKind::parse(&entry.kind)?;
        Some(Self {
            kind,
            tag: entry.tag.clone(),
            duration,
            chunk_items: entry.chunk_items.unwrap_or(DEFAULT_CHUNK_ITEMS),
            core: entry.core.or_else(|| first_uint(&entry.tag)),
        })
    }
}

/// First unsigned integer embedded in a string, if any.
pub(crate) fn first_uint(s: &str) -> Option<usize> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// One recorded injection window, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionInterval {
    pub start_ms: i64,
    pub end_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

/// Mutex-guarded shared reading with a one-shot readiness signal. The
/// feedback thread publishes; the stress loop blocks until the first sample
/// exists, then reads the latest value each iteration.
pub struct Feedback<T> {
    cell: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T: Clone> Feedback<T> {
    pub fn new() -> Self {
        Self { cell: Mutex::new(None), ready: Condvar::new() }
    }

    pub fn publish(&self, value: T) {
        *self.cell.lock().unwrap() = Some(value);
        self.ready.notify_all();
    }

    pub fn latest(&self) -> Option<T> {
        self.cell.lock().unwrap().clone()
    }

    /// Block until the first sample is published. Returns None when `stop`
    /// is raised before that happens.
    pub fn wait_first(&self, stop: &AtomicBool) -> Option<T> {
        let mut guard = self.cell.lock().unwrap();
        loop {
            if let Some(v) = guard.as_ref() {
                return Some(v.clone());
            }
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let (g, _) = self
                .ready
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = g;
        }
    }
}

impl<T: Clone> Default for Feedback<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Start/stop plumbing shared by both injector variants: the dedicated OS
/// thread, the cooperative stop flag, and the recorded intervals.
#[derive(Debug)]
pub(crate) struct StressWorker {
    state: RunState,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    start_ms: i64,
    intervals: Vec<InjectionInterval>,
}

impl StressWorker {
    pub(crate) fn new() -> Self {
        Self {
            state: RunState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
            start_ms: 0,
            intervals: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn intervals(&self) -> &[InjectionInterval] {
        &self.intervals
    }

    /// Launch `body` on a dedicated thread. Double-start is a logged no-op.
    pub(crate) fn begin<F>(&mut self, name: &str, body: F)
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        if self.state != RunState::Idle {
            warn!("'{name}' is already running; start ignored");
            return;
        }
        // fresh flag per run so a stopped injector could be started again
        self.stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&self.stop);
        match thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop))
        {
            Ok(handle) => {
                self.start_ms = Utc::now().timestamp_millis();
                self.handle = Some(handle);
                self.state = RunState::Running;
                info!("'{name}' started");
            }
            Err(e) => error!("failed to spawn stress worker for '{name}': {e}"),
        }
    }

    /// Signal cooperative termination and block until the thread has fully
    /// exited, then record exactly one [start,end] interval. Double-stop is
    /// a logged no-op.
    pub(crate) fn finish(&mut self, name: &str) {
        if self.state != RunState::Running {
            debug!("'{name}' is not running; stop ignored");
            return;
        }
        self.state = RunState::Stopping;
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("stress worker for '{name}' panicked before joining");
            }
        }
        let end_ms = Utc::now().timestamp_millis();
        self.intervals.push(InjectionInterval { start_ms: self.start_ms, end_ms });
        self.state = RunState::Idle;
        info!("'{name}' stopped");
    }
}

/// Polymorphic injector: a tagged sum over the two stress variants, sharing
/// the {validate, start, stop, name} capability surface.
#[derive(Debug)]
pub enum Injector {
    Cpu(CpuStressInjector),
    Memory(MemoryStressInjector),
}

impl Injector {
    /// Factory: spec kind decides the variant.
    pub fn from_spec(spec: InjectorSpec) -> Self {
        match spec.kind {
            InjectorKind::Cpu => Self::Cpu(CpuStressInjector::new(spec)),
            InjectorKind::Memory => Self::Memory(MemoryStressInjector::new(spec)),
        }
    }

    /// Fails closed: a spec that does not validate is never scheduled.
    pub fn validate(&self) -> bool {
        match self {
            Self::Cpu(i) => i.validate(),
            Self::Memory(i) => i.validate(),
        }
    }

    pub fn start(&mut self) {
        match self {
            Self::Cpu(i) => i.start(),
            Self::Memory(i) => i.start(),
        }
    }

    pub fn stop(&mut self) {
        match self {
            Self::Cpu(i) => i.stop(),
            Self::Memory(i) => i.stop(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Cpu(i) => i.name(),
            Self::Memory(i) => i.name(),
        }
    }

    pub fn state(&self) -> RunState {
        match self {
            Self::Cpu(i) => i.state(),
            Self::Memory(i) => i.state(),
        }
    }

    pub fn intervals(&self) -> &[InjectionInterval] {
        match self {
            Self::Cpu(i) => i.intervals(),
            Self::Memory(i) => i.intervals(),
        }
    }

    pub fn spec(&self) -> &InjectorSpec {
        match self {
            Self::Cpu(i) => i.spec(),
            Self::Memory(i) => i.spec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_synonym_table() {
        for s in ["CPU", "Proc", "CPUUsage", "CPUStress"] {
            assert_eq!(InjectorKind::parse(s), Some(InjectorKind::Cpu), "{s}");
        }
        for s in ["Memory", "RAM", "MemoryUsage", "Mem", "MemoryStress"] {
            assert_eq!(InjectorKind::parse(s), Some(InjectorKind::Memory), "{s}");
        }
        assert_eq!(InjectorKind::parse("Disk"), None);
        assert_eq!(InjectorKind::parse("cpu"), None); // synonyms are exact
    }

    #[test]
    fn first_uint_finds_the_embedded_core_index() {
        assert_eq!(first_uint("CPU_3"), Some(3));
        assert_eq!(first_uint("core12_stress"), Some(12));
        assert_eq!(first_uint("CPU_default"), None);
    }

    #[test]
    fn spec_falls_back_to_the_tag_for_the_core_index() {
        let entry = InjectorEntry {
            kind: "CPU".into(),
            tag: "CPU_2".into(),
            chunk_items: None,
            core: None,
        };
        let spec = InjectorSpec::from_entry(&entry, Duration::from_millis(100)).unwrap();
        assert_eq!(spec.core, Some(2));

        let explicit = InjectorEntry { core: Some(0), ..entry };
        let spec = InjectorSpec::from_entry(&explicit, Duration::from_millis(100)).unwrap();
        assert_eq!(spec.core, Some(0));
    }

    #[test]
    fn unknown_type_yields_no_spec() {
        let entry = InjectorEntry {
            kind: "Network".into(),
            tag: "net".into(),
            chunk_items: None,
            core: None,
        };
        assert!(InjectorSpec::from_entry(&entry, Duration::ZERO).is_none());
    }

    #[test]
    fn feedback_wait_first_sees_a_published_value() {
        let fb = Arc::new(Feedback::new());
        let stop = AtomicBool::new(false);
        let publisher = {
            let fb = Arc::clone(&fb);
            thread::spawn(move || fb.publish(7u32))
        };
        assert_eq!(fb.wait_first(&stop), Some(7));
        publisher.join().unwrap();
        assert_eq!(fb.latest(), Some(7));
    }

    #[test]
    fn feedback_wait_first_unblocks_on_stop() {
        let fb: Feedback<u32> = Feedback::new();
        let stop = AtomicBool::new(true);
        assert_eq!(fb.wait_first(&stop), None);
    }

    #[test]
    fn worker_records_one_interval_per_run() {
        let mut worker = StressWorker::new();
        worker.begin("test-worker", |stop| {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
            }
        });
        assert_eq!(worker.state(), RunState::Running);
        worker.finish("test-worker");
        assert_eq!(worker.state(), RunState::Idle);
        assert_eq!(worker.intervals().len(), 1);
        let iv = worker.intervals()[0];
        assert!(iv.end_ms >= iv.start_ms);

        // double stop: no second interval, no panic
        worker.finish("test-worker");
        assert_eq!(worker.intervals().len(), 1);
    }

    #[test]
    fn worker_double_start_is_a_no_op() {
        let mut worker = StressWorker::new();
        worker.begin("w", |stop| {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
            }
        });
        worker.begin("w", |_| panic!("second body must never run"));
        worker.finish("w");
        assert_eq!(worker.intervals().len(), 1);
    }
}
