use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source for all duration-based decisions. Timestamps are
/// nanoseconds elapsed from the clock's anchor instant; wall-clock values
/// never participate in expiry or interval checks.
pub trait Clock: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
}

/// Instant-backed clock with a high-precision sleep for the host tick loop.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "windows")]
        self.windows_sleep(duration);
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(target_os = "macos")]
        self.macos_sleep(duration);
        #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "windows")]
    fn windows_sleep(&self, duration: Duration) {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::Foundation::FILETIME;
        use windows::Win32::System::Threading::{
            CreateWaitableTimerW, SetWaitableTimer, WaitForSingleObject,
        };

        unsafe {
            let timer = match CreateWaitableTimerW(None, true, None) {
                Ok(t) => t,
                Err(_) => {
                    std::thread::sleep(duration);
                    return;
                }
            };

            let intervals = -(duration.as_nanos() as i64 / 100);
            let due_time = FILETIME {
                dwLowDateTime: intervals as u32,
                dwHighDateTime: (intervals >> 32) as u32,
            };

            if SetWaitableTimer(timer, &due_time, 0, None, None, false).is_ok() {
                WaitForSingleObject(timer, u32::MAX);
            }

            let _ = CloseHandle(timer);
        }
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    #[cfg(target_os = "macos")]
    fn macos_sleep(&self, duration: Duration) {
        use mach2::mach_time::{mach_absolute_time, mach_timebase_info, mach_timebase_info_data_t};

        if duration.as_nanos() < 100_000 {
            unsafe {
                let start = mach_absolute_time();
                let mut timebase = mach_timebase_info_data_t { numer: 0, denom: 0 };
                mach_timebase_info(&mut timebase);

                let target_ticks =
                    duration.as_nanos() as u64 * timebase.denom as u64 / timebase.numer as u64;

                while mach_absolute_time() - start < target_ticks {
                    std::hint::spin_loop();
                }
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

/// Hand-advanced clock for deterministic tests. `sleep` advances the clock
/// instead of blocking.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    type Timestamp = u64;

    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn manual_clock_is_deterministic() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), 250_000_000);
        assert_eq!(clock.elapsed(100_000_000), Duration::from_millis(150));
        clock.sleep(Duration::from_millis(10));
        assert_eq!(clock.now(), 260_000_000);
    }
}
