//! Process memory usage probes for the memory trigger.
//!
//! The memory trigger compares the probe's reading against
//! `max_memory_bytes`. Readings are process-wide and approximate; treat them
//! as advisory.
//!
//! - [`ProcessMemory`]: resident set size of the current process via
//!   `sysinfo`, re-read at most once per refresh interval.
//! - [`FixedMemory`]: settable reading for tests and simulations.
//! - Any `Fn() -> u64 + Send + Sync` closure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// Source of the current memory usage in bytes.
pub trait MemoryProbe: Send + Sync {
    fn used_bytes(&self) -> u64;
}

impl<F> MemoryProbe for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn used_bytes(&self) -> u64 {
        self()
    }
}

// ---------------------------------------------------------------------------
// ProcessMemory
// ---------------------------------------------------------------------------

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(50);

struct ProcessState {
    system: System,
    last: Option<(Instant, u64)>,
}

/// Resident memory of the running process.
pub struct ProcessMemory {
    pid: Option<Pid>,
    refresh_interval: Duration,
    state: Mutex<ProcessState>,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self::with_refresh_interval(DEFAULT_REFRESH_INTERVAL)
    }

    /// Re-reads the process at most once per `interval`.
    pub fn with_refresh_interval(interval: Duration) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                tracing::debug!(error = err, "current pid unavailable, memory probe reads 0");
                None
            },
        };
        Self {
            pid,
            refresh_interval: interval,
            state: Mutex::new(ProcessState {
                system: System::new(),
                last: None,
            }),
        }
    }

    fn read(system: &mut System, pid: Pid) -> u64 {
        if !system.refresh_process(pid) {
            tracing::debug!(pid = %pid, "could not refresh current process");
            return 0;
        }
        system.process(pid).map_or(0, |process| process.memory())
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemory {
    fn used_bytes(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut state = self.state.lock();
        if let Some((at, bytes)) = state.last {
            if at.elapsed() < self.refresh_interval {
                return bytes;
            }
        }
        let bytes = Self::read(&mut state.system, pid);
        state.last = Some((Instant::now(), bytes));
        bytes
    }
}

impl std::fmt::Debug for ProcessMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMemory")
            .field("pid", &self.pid)
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FixedMemory
// ---------------------------------------------------------------------------

/// Probe returning a value set by the caller.
#[derive(Debug, Default)]
pub struct FixedMemory(AtomicU64);

impl FixedMemory {
    pub fn new(bytes: u64) -> Self {
        Self(AtomicU64::new(bytes))
    }

    pub fn set(&self, bytes: u64) {
        self.0.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemory {
    fn used_bytes(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
