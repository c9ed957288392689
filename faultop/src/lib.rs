//! faultop synthesizes labeled telemetry: it alternates a host between
//! normal operation and controlled CPU/memory fault injection, writing one
//! resource snapshot per tick tagged with the ground-truth fault state.

pub mod burn;
pub mod config;
pub mod cpu_stress;
pub mod error;
pub mod injector;
pub mod manager;
pub mod mem_stress;
pub mod orchestrator;
pub mod probe;
pub mod sink;
pub mod types;

pub use config::{load_entries, InjectorEntry};
pub use error::Error;
pub use injector::{InjectionInterval, Injector, InjectorKind, InjectorSpec, RunState};
pub use manager::InjectionManager;
pub use orchestrator::Orchestrator;
pub use probe::{Probe, ProbeConfig};
pub use sink::{CsvSink, SnapshotSink, VecSink};
pub use types::{FaultState, Snapshot};
