//! Process CPU sampling for growth decisions.

use parking_lot::Mutex;
use sysinfo::{Pid, Process, ProcessRefreshKind, System};

/// A cheap, non-blocking probe of the enclosing process's CPU use.
pub trait CpuProbe: Send + Sync {
    /// Current utilization as a percentage in `[0, 100]`.
    fn cpu_usage(&self) -> f32;
}

/// Probe backed by a zero-interval `sysinfo` refresh.
///
/// sysinfo reports process CPU summed across cores, so the raw figure is
/// normalized by the core count onto the `[0, 100]` scale the growth
/// ceiling operates on. The first sample after construction reads as zero;
/// later samples cover the interval since the previous call.
pub struct ProcessCpuProbe {
    pid: Option<Pid>,
    cores: f32,
    system: Mutex<System>,
}

impl ProcessCpuProbe {
    /// Probe for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            cores: num_cpus::get().max(1) as f32,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for ProcessCpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProbe for ProcessCpuProbe {
    fn cpu_usage(&self) -> f32 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        let mut system = self.system.lock();
        system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_cpu());
        let raw = system.process(pid).map_or(0.0, Process::cpu_usage);
        (raw / self.cores).clamp(0.0, 100.0)
    }
}
