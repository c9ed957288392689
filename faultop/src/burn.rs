//! Duty-cycle CPU spinners used by the stress injectors.
//!
//! Load is generated in 100 ms slices: spin for `duty` of the slice, sleep
//! the remainder. The stop flag is checked once per slice, which bounds stop
//! latency for CPU bursts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLICE: Duration = Duration::from_millis(100);

/// Spin one thread at `duty` (0.0..=1.0) for `duration`, or until `stop`.
pub fn spin_one(duty: f64, duration: Duration, stop: &AtomicBool) {
    let duty = duty.clamp(0.0, 1.0);
    let deadline = Instant::now() + duration;
    let mut x = 0x9e37_79b9_7f4a_7c15u64;
    while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
        let busy = SLICE.mul_f64(duty);
        let busy_until = Instant::now() + busy;
        while Instant::now() < busy_until {
            // keep the ALU honestly busy; black_box defeats the optimizer
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            std::hint::black_box(x);
        }
        let idle = SLICE.saturating_sub(busy);
        if !idle.is_zero() {
            thread::sleep(idle);
        }
    }
}

/// Spin every logical core at `duty` for `duration`, or until `stop`.
/// One thread per core; scheduling (not pinning) spreads them out.
pub fn spin_all(duty: f64, duration: Duration, stop: &AtomicBool) {
    let n = thread::available_parallelism().map(usize::from).unwrap_or(1);
    thread::scope(|s| {
        for _ in 0..n {
            s.spawn(|| spin_one(duty, duration, stop));
        }
    });
}

/// Bind the calling thread to one logical core so its load lands where a
/// feedback loop expects it. Returns false when the kernel refuses.
#[cfg(target_os = "linux")]
pub fn pin_to_core(core: usize) -> bool {
    if core >= libc::CPU_SETSIZE as usize {
        return false;
    }
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        // pid 0: the calling thread only
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_core(_core: usize) -> bool {
    false
}
