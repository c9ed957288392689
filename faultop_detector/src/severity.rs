//! 5-level severity scale driven by a decaying count of recent anomalous
//! observations.

use std::fmt;

/// Level 1 (Critical) down to level 5 (Informational). Declaration order
/// gives the derived ordering: Critical compares lowest, so a falling level
/// value means rising severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityLevel {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

impl SeverityLevel {
    pub fn from_anomaly_count(count: u32) -> Self {
        match count {
            n if n >= 15 => Self::Critical,
            n if n >= 10 => Self::High,
            n if n >= 4 => Self::Medium,
            n if n >= 1 => Self::Low,
            _ => Self::Informational,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Critical => "LEVEL 1 - Critical anomaly detected",
            Self::High => "LEVEL 2 - High anomaly detected",
            Self::Medium => "LEVEL 3 - Moderate anomaly detected",
            Self::Low => "LEVEL 4 - Low-level anomaly detected",
            Self::Informational => "LEVEL 5 - System is operating normally",
        }
    }

    pub fn advice(self) -> &'static str {
        match self {
            Self::Critical => "Immediate action is mandatory to avoid system failure.",
            Self::High => "Action is required to prevent potential issues.",
            Self::Medium => "Investigate potential causes and take preemptive measures.",
            Self::Low => "Monitor the system closely for any changes.",
            Self::Informational => "No action required.",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Consecutive normal observations after an anomaly streak needed before the
/// anomaly count resets outright.
const RESET_STREAK: u32 = 5;

/// Sliding anomaly counter with decay: each normal observation after a streak
/// decrements the count by one; once `RESET_STREAK` consecutive normals
/// accumulate, the count resets to zero.
#[derive(Debug, Default)]
pub struct SeverityTracker {
    anomalies: u32,
    normal_streak: u32,
}

impl SeverityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, anomalous: bool) -> SeverityLevel {
        if anomalous {
            self.anomalies += 1;
            self.normal_streak = 0;
        } else if self.normal_streak >= RESET_STREAK {
            self.normal_streak = 0;
            self.anomalies = 0;
        } else if self.anomalies > 0 {
            self.normal_streak += 1;
            self.anomalies -= 1;
        }
        SeverityLevel::from_anomaly_count(self.anomalies)
    }

    pub fn anomaly_count(&self) -> u32 {
        self.anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_map_to_levels() {
        assert_eq!(SeverityLevel::from_anomaly_count(0), SeverityLevel::Informational);
        assert_eq!(SeverityLevel::from_anomaly_count(1), SeverityLevel::Low);
        assert_eq!(SeverityLevel::from_anomaly_count(3), SeverityLevel::Low);
        assert_eq!(SeverityLevel::from_anomaly_count(4), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_anomaly_count(9), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_anomaly_count(10), SeverityLevel::High);
        assert_eq!(SeverityLevel::from_anomaly_count(14), SeverityLevel::High);
        assert_eq!(SeverityLevel::from_anomaly_count(15), SeverityLevel::Critical);
    }

    #[test]
    fn levels_order_from_critical_to_informational() {
        assert!(SeverityLevel::Critical < SeverityLevel::High);
        assert!(SeverityLevel::High < SeverityLevel::Medium);
        assert!(SeverityLevel::Medium < SeverityLevel::Low);
        assert!(SeverityLevel::Low < SeverityLevel::Informational);
    }

    #[test]
    fn anomalies_raise_the_level_monotonically() {
        let mut tracker = SeverityTracker::new();
        let mut last = tracker.observe(true);
        for _ in 0..20 {
            let level = tracker.observe(true);
            assert!(level <= last, "{level:?} regressed past {last:?}");
            last = level;
        }
        assert_eq!(last, SeverityLevel::Critical);
    }

    #[test]
    fn normals_decay_the_count_one_by_one() {
        let mut tracker = SeverityTracker::new();
        for _ in 0..6 {
            tracker.observe(true);
        }
        assert_eq!(tracker.anomaly_count(), 6);
        tracker.observe(false);
        assert_eq!(tracker.anomaly_count(), 5);
        tracker.observe(false);
        assert_eq!(tracker.anomaly_count(), 4);
    }

    #[test]
    fn a_long_normal_run_resets_the_count() {
        let mut tracker = SeverityTracker::new();
        for _ in 0..20 {
            tracker.observe(true);
        }
        // five normals decay one each and arm the reset; the sixth resets
        for _ in 0..5 {
            tracker.observe(false);
        }
        assert_eq!(tracker.anomaly_count(), 15);
        let level = tracker.observe(false);
        assert_eq!(tracker.anomaly_count(), 0);
        assert_eq!(level, SeverityLevel::Informational);
    }

    #[test]
    fn an_anomaly_breaks_the_normal_streak() {
        let mut tracker = SeverityTracker::new();
        for _ in 0..8 {
            tracker.observe(true);
        }
        for _ in 0..3 {
            tracker.observe(false);
        }
        tracker.observe(true); // streak back to zero
        assert_eq!(tracker.anomaly_count(), 6);
        for _ in 0..4 {
            tracker.observe(false);
        }
        assert_eq!(tracker.anomaly_count(), 2); // decayed, not reset
    }
}
