//! Blocking resource probe built on sysinfo. One instance drives the
//! orchestrator's sampling; injectors build their own lighter instances for
//! feedback loops.
//!
//! CPU usage needs two refreshes separated by a sleep, so `sample()` is a
//! bounded blocking call: its latency is the sum of the configured intervals
//! and is exposed via [`Probe::sampling_latency`].

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{Local, Utc};
use once_cell::sync::OnceCell;
use sysinfo::{Components, CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

use crate::types::{CoreTimes, CoreUsage, FaultState, MemoryUsage, Snapshot};

// Opt-out for temperature columns (set FAULTOP_TEMPS=0); sensor enumeration
// can be slow or misleading inside containers.
fn temps_enabled() -> bool {
    static ON: OnceCell<bool> = OnceCell::new();
    *ON.get_or_init(|| {
        std::env::var("FAULTOP_TEMPS")
            .map(|v| v != "0")
            .unwrap_or(true)
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    pub monitor_cpu: bool,
    pub monitor_memory: bool,
    /// Interval the per-core time-share delta is measured over.
    pub times_interval: Duration,
    /// Interval between the two CPU refreshes that yield per-core usage.
    pub usage_interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            monitor_cpu: true,
            monitor_memory: true,
            times_interval: Duration::from_millis(100),
            usage_interval: Duration::from_millis(500),
        }
    }
}

/// What the host turned out to support. Detected once at construction so the
/// snapshot key set stays fixed for the whole run.
#[derive(Debug, Clone, Copy)]
struct Capabilities {
    core_times: bool,
    temp_sensors: bool,
}

#[derive(Clone)]
pub struct Probe {
    cfg: ProbeConfig,
    sys: Arc<Mutex<System>>,
    components: Arc<Mutex<Components>>,
    fault: Arc<Mutex<FaultState>>,
    caps: Capabilities,
}

impl Probe {
    pub fn new(cfg: ProbeConfig) -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        let mut sys = System::new_with_specifics(refresh);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let mut components = Components::new();
        components.refresh(true);

        let caps = Capabilities {
            core_times: cfg.monitor_cpu && host_has_core_times(),
            temp_sensors: cfg.monitor_cpu
                && temps_enabled()
                && !core_temps(&components).is_empty(),
        };

        Self {
            cfg,
            sys: Arc::new(Mutex::new(sys)),
            components: Arc::new(Mutex::new(components)),
            fault: Arc::new(Mutex::new(FaultState::Normal)),
            caps,
        }
    }

    /// Take one full reading. Blocks for roughly `sampling_latency()`.
    pub fn sample(&self) -> Snapshot {
        let time_ms = Utc::now().timestamp_millis();
        let datetime = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let (core_times, cores, cpu_pct, core_temps) = if self.cfg.monitor_cpu {
            self.cpu_probe()
        } else {
            (Vec::new(), Vec::new(), 0.0, Vec::new())
        };

        let memory = if self.cfg.monitor_memory {
            self.memory_probe()
        } else {
            MemoryUsage::default()
        };

        let injector = self.fault.lock().unwrap().label().to_string();

        Snapshot {
            time_ms,
            datetime,
            core_times,
            cores,
            cpu_pct,
            core_temps,
            memory,
            injector,
        }
    }

    fn cpu_probe(&self) -> (Vec<CoreTimes>, Vec<CoreUsage>, f32, Vec<f32>) {
        let core_times = if self.caps.core_times {
            match sample_core_times(self.cfg.times_interval) {
                Ok(v) => v,
                Err(e) => {
                    warn!("per-core time-share sampling failed: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        {
            let mut sys = self.sys.lock().unwrap();
            sys.refresh_cpu_usage();
        }
        thread::sleep(self.cfg.usage_interval);
        let (cores, cpu_pct) = {
            let mut sys = self.sys.lock().unwrap();
            sys.refresh_cpu_usage();
            let cores: Vec<CoreUsage> = sys
                .cpus()
                .iter()
                .map(|c| CoreUsage {
                    usage_pct: c.cpu_usage(),
                    freq_mhz: c.frequency(),
                })
                .collect();
            let n = cores.len().max(1) as f32;
            let cpu_pct = cores.iter().map(|c| c.usage_pct).sum::<f32>() / n;
            (cores, cpu_pct)
        };

        let temps = if self.caps.temp_sensors {
            let mut components = self.components.lock().unwrap();
            components.refresh(false);
            core_temps(&components)
        } else {
            Vec::new()
        };

        (core_times, cores, cpu_pct, temps)
    }

    fn memory_probe(&self) -> MemoryUsage {
        let mut sys = self.sys.lock().unwrap();
        sys.refresh_memory();
        let total = sys.total_memory();
        let used = sys.used_memory();
        MemoryUsage {
            total,
            available: sys.available_memory(),
            used,
            free: sys.free_memory(),
            used_pct: if total > 0 {
                used as f32 / total as f32 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Per-logical-core usage percentages. The cheaper reading the CPU
    /// injector's feedback loop runs on.
    pub fn per_core_usage(&self) -> Vec<f32> {
        {
            let mut sys = self.sys.lock().unwrap();
            sys.refresh_cpu_usage();
        }
        thread::sleep(self.cfg.usage_interval);
        let mut sys = self.sys.lock().unwrap();
        sys.refresh_cpu_usage();
        sys.cpus().iter().map(|c| c.cpu_usage()).collect()
    }

    /// Virtual-memory percent used. The reading the memory injector's
    /// feedback loop runs on.
    pub fn memory_percent(&self) -> f32 {
        self.memory_probe().used_pct
    }

    pub fn set_injection_state(&self, tag: &str) {
        *self.fault.lock().unwrap() = FaultState::UnderInjection { tag: tag.to_string() };
    }

    pub fn clear_injection_state(&self) {
        *self.fault.lock().unwrap() = FaultState::Normal;
    }

    pub fn fault_state(&self) -> FaultState {
        self.fault.lock().unwrap().clone()
    }

    /// Expected blocking time of one `sample()` call; callers add their own
    /// pause to compute the effective tick period.
    pub fn sampling_latency(&self) -> Duration {
        if self.cfg.monitor_cpu {
            self.cfg.times_interval + self.cfg.usage_interval
        } else {
            Duration::ZERO
        }
    }
}

fn core_temps(components: &Components) -> Vec<f32> {
    components
        .iter()
        .filter(|c| c.label().to_ascii_lowercase().contains("core"))
        .filter_map(|c| c.temperature())
        .collect()
}

// --- per-core time shares from /proc/stat deltas (Linux) ---

#[cfg(target_os = "linux")]
fn host_has_core_times() -> bool {
    read_core_jiffies().map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn host_has_core_times() -> bool {
    false
}

// user nice system idle iowait irq softirq steal
#[cfg(target_os = "linux")]
fn read_core_jiffies() -> std::io::Result<Vec<[u64; 8]>> {
    let s = std::fs::read_to_string("/proc/stat")?;
    let mut out = Vec::new();
    for line in s.lines() {
        let mut it = line.split_whitespace();
        let Some(label) = it.next() else { continue };
        // per-core lines are "cpu0", "cpu1", ...; skip the aggregate "cpu"
        if label.len() > 3 && label.starts_with("cpu") {
            let mut row = [0u64; 8];
            for slot in row.iter_mut() {
                *slot = it.next().and_then(|t| t.parse().ok()).unwrap_or(0);
            }
            out.push(row);
        }
    }
    Ok(out)
}

#[cfg(target_os = "linux")]
fn sample_core_times(interval: Duration) -> std::io::Result<Vec<CoreTimes>> {
    let before = read_core_jiffies()?;
    thread::sleep(interval);
    let after = read_core_jiffies()?;
    Ok(before
        .iter()
        .zip(after.iter())
        .map(|(b, a)| {
            let delta: Vec<u64> = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.saturating_sub(*y))
                .collect();
            let total = delta.iter().sum::<u64>().max(1) as f32;
            let pct = |i: usize| delta[i] as f32 / total * 100.0;
            CoreTimes {
                user_pct: pct(0),
                nice_pct: pct(1),
                system_pct: pct(2),
                idle_pct: pct(3),
                iowait_pct: pct(4),
                irq_pct: pct(5),
                softirq_pct: pct(6),
                steal_pct: pct(7),
            }
        })
        .collect())
}

#[cfg(not(target_os = "linux"))]
fn sample_core_times(_interval: Duration) -> std::io::Result<Vec<CoreTimes>> {
    Ok(Vec::new())
}
