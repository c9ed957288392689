//! Snapshot record and its ordered row form. Keep this module minimal and
//! stable; it defines the dataset schema downstream training reads.

/// Whether the host is currently under synthetic fault injection.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FaultState {
    #[default]
    Normal,
    UnderInjection {
        tag: String,
    },
}

impl FaultState {
    /// Label written into every snapshot: the active injector descriptor,
    /// or the explicit "None" sentinel.
    pub fn label(&self) -> &str {
        match self {
            FaultState::Normal => "None",
            FaultState::UnderInjection { tag } => tag,
        }
    }
}

/// Per-core time-share breakdown (percent of the sampling interval),
/// derived from /proc/stat deltas on Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreTimes {
    pub user_pct: f32,
    pub nice_pct: f32,
    pub system_pct: f32,
    pub idle_pct: f32,
    pub iowait_pct: f32,
    pub irq_pct: f32,
    pub softirq_pct: f32,
    pub steal_pct: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct CoreUsage {
    pub usage_pct: f32,
    pub freq_mhz: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryUsage {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    pub used_pct: f32,
}

/// One immutable resource-usage reading plus the current fault tag.
/// Produced once per sampling tick; the producer does not retain it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub time_ms: i64,
    pub datetime: String,
    /// Empty when the host offers no per-core time accounting.
    pub core_times: Vec<CoreTimes>,
    pub cores: Vec<CoreUsage>,
    /// Arithmetic mean of the per-core usage percentages.
    pub cpu_pct: f32,
    /// Physical-core temperatures; empty when no sensors were detected.
    pub core_temps: Vec<f32>,
    pub memory: MemoryUsage,
    /// Active injector descriptor, or "None".
    pub injector: String,
}

impl Snapshot {
    /// Ordered key/value pairs for tabular persistence. The key set is
    /// host-dependent (core count, sensors) but deterministic within a run
    /// because capability detection happens once at probe construction.
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = Vec::with_capacity(8 + self.cores.len() * 10);
        rows.push(("time_ms".into(), self.time_ms.to_string()));
        rows.push(("datetime".into(), self.datetime.clone()));
        for (i, t) in self.core_times.iter().enumerate() {
            rows.push((format!("core_{i}_user_pct"), fmt_pct(t.user_pct)));
            rows.push((format!("core_{i}_nice_pct"), fmt_pct(t.nice_pct)));
            rows.push((format!("core_{i}_system_pct"), fmt_pct(t.system_pct)));
            rows.push((format!("core_{i}_idle_pct"), fmt_pct(t.idle_pct)));
            rows.push((format!("core_{i}_iowait_pct"), fmt_pct(t.iowait_pct)));
            rows.push((format!("core_{i}_irq_pct"), fmt_pct(t.irq_pct)));
            rows.push((format!("core_{i}_softirq_pct"), fmt_pct(t.softirq_pct)));
            rows.push((format!("core_{i}_steal_pct"), fmt_pct(t.steal_pct)));
        }
        rows.push(("cpu_pct".into(), fmt_pct(self.cpu_pct)));
        for (i, c) in self.cores.iter().enumerate() {
            rows.push((format!("core_{i}_pct"), fmt_pct(c.usage_pct)));
            rows.push((format!("core_{i}_freq_mhz"), c.freq_mhz.to_string()));
        }
        for (i, t) in self.core_temps.iter().enumerate() {
            rows.push((format!("physical_core_{i}_temp_c"), fmt_pct(*t)));
        }
        rows.push(("mem_total".into(), self.memory.total.to_string()));
        rows.push(("mem_available".into(), self.memory.available.to_string()));
        rows.push(("mem_used".into(), self.memory.used.to_string()));
        rows.push(("mem_free".into(), self.memory.free.to_string()));
        rows.push(("mem_pct".into(), fmt_pct(self.memory.used_pct)));
        rows.push(("injector".into(), self.injector.clone()));
        rows
    }
}

fn fmt_pct(v: f32) -> String {
    format!("{v:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot {
            time_ms: 1_700_000_000_000,
            datetime: "2026-08-26 12:00:00".into(),
            core_times: vec![CoreTimes::default(); 2],
            cores: vec![
                CoreUsage { usage_pct: 10.0, freq_mhz: 2400 },
                CoreUsage { usage_pct: 30.0, freq_mhz: 2600 },
            ],
            cpu_pct: 20.0,
            core_temps: vec![41.5],
            memory: MemoryUsage {
                total: 100,
                available: 60,
                used: 40,
                free: 50,
                used_pct: 40.0,
            },
            injector: "None".into(),
        }
    }

    #[test]
    fn rows_keep_a_stable_order_and_terminate_with_the_fault_tag() {
        let rows = snapshot().rows();
        assert_eq!(rows.first().unwrap().0, "time_ms");
        assert_eq!(rows.last().unwrap(), &("injector".to_string(), "None".to_string()));
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"cpu_pct"));
        assert!(keys.contains(&"core_1_freq_mhz"));
        assert!(keys.contains(&"physical_core_0_temp_c"));
        assert!(keys.contains(&"mem_pct"));
    }

    #[test]
    fn key_set_is_deterministic_for_a_fixed_host_shape() {
        let a: Vec<String> = snapshot().rows().into_iter().map(|(k, _)| k).collect();
        let b: Vec<String> = snapshot().rows().into_iter().map(|(k, _)| k).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn fault_state_label() {
        assert_eq!(FaultState::Normal.label(), "None");
        let under = FaultState::UnderInjection { tag: "[mem]MemoryStressInjector(d100-i8)".into() };
        assert!(under.label().starts_with("[mem]"));
    }
}
