//! Resource measurement for the governor.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use crate::types::errors::ProbeError;
use crate::types::resource::{ResourceMeasurement, ResourceSample};
use crate::types::tab::Tab;

#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Process-wide memory and load reading.
    async fn measure(&self) -> Result<ResourceMeasurement, ProbeError>;

    /// Per-tab samples, when the host can attribute usage to tabs.
    async fn tab_samples(&self, _tabs: &[Tab]) -> Vec<ResourceSample> {
        Vec::new()
    }
}

/// Measures the current process with `sysinfo`.
pub struct ProcessProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    cpu_count: usize,
}

impl ProcessProbe {
    pub fn new() -> Self {
        let system =
            System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
        let cpu_count = match system.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };
        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            cpu_count,
        }
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProbe for ProcessProbe {
    async fn measure(&self) -> Result<ResourceMeasurement, ProbeError> {
        let pid = self
            .pid
            .ok_or_else(|| ProbeError::Unavailable("current pid unknown".to_string()))?;

        let resident_bytes = {
            let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_memory(),
            );
            system
                .process(pid)
                .map(|p| p.memory())
                .ok_or_else(|| ProbeError::Unavailable(format!("process {} not found", pid)))?
        };

        let load = System::load_average();
        Ok(ResourceMeasurement {
            resident_memory_mb: resident_bytes as f64 / (1024.0 * 1024.0),
            load_average: [load.one, load.five, load.fifteen],
            cpu_count: self.cpu_count,
        })
    }
}
