use std::num::NonZeroUsize;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::version;

/// What a result table needs to say about the machine it came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub timestamp_unix_secs: u64,
    pub kdfbench_version: String,
    pub git_commit: Option<String>,
    pub os: Option<String>,
    pub cpu_brand: Option<String>,
    pub logical_cores: usize,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    /// Container ceilings, when a cgroup sets one.
    pub cgroup_total_memory_bytes: Option<u64>,
    pub cgroup_free_memory_bytes: Option<u64>,
}

impl Environment {
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();

        let (cgroup_total, cgroup_free) = match sys.cgroup_limits() {
            Some(limits) => (nonzero(limits.total_memory), nonzero(limits.free_memory)),
            None => (None, None),
        };
        let cpu_brand = sys
            .cpus()
            .iter()
            .map(|cpu| cpu.brand().trim())
            .find(|brand| !brand.is_empty())
            .map(str::to_string);
        let logical_cores = std::thread::available_parallelism()
            .map_or_else(|_| sys.cpus().len(), NonZeroUsize::get);

        Self {
            timestamp_unix_secs: unix_now(),
            kdfbench_version: version::RELEASE_VERSION.to_string(),
            git_commit: version::GIT_COMMIT.map(str::to_string),
            os: System::long_os_version().or_else(System::name),
            cpu_brand,
            logical_cores,
            total_memory_bytes: sys.total_memory(),
            available_memory_bytes: sys.available_memory(),
            cgroup_total_memory_bytes: cgroup_total,
            cgroup_free_memory_bytes: cgroup_free,
        }
    }

    /// One line for result headers:
    /// `<N>x <cpu model>,<os release>,<tool version>,<RAM> GB RAM`.
    pub fn hardware_string(&self) -> String {
        // Decimal gigabytes, as `free --giga` reports them.
        let ram_gb = (self.total_memory_bytes as f64 / 1e9).round() as u64;
        format!(
            "{}x {},{},kdfbench {},{} GB RAM",
            self.logical_cores,
            self.cpu_brand.as_deref().unwrap_or("unknown cpu"),
            self.os.as_deref().unwrap_or(std::env::consts::OS),
            self.kdfbench_version,
            ram_gb,
        )
        .replace(['\n', '\r'], " ")
    }

    /// Usable RAM after applying any cgroup ceiling.
    pub fn effective_available_bytes(&self) -> u64 {
        let mut available = if self.available_memory_bytes == 0 {
            self.total_memory_bytes
        } else {
            self.available_memory_bytes
        };
        if let Some(free) = self.cgroup_free_memory_bytes {
            available = available.min(free);
        }
        if let Some(total) = self.cgroup_total_memory_bytes {
            available = available.min(total);
        }
        available
    }
}

fn nonzero(value: u64) -> Option<u64> {
    (value > 0).then_some(value)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
