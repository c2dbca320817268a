//! Host metrics collection via sysinfo.
//!
//! Each host-metrics session owns one `HostMonitor`; every snapshot
//! refreshes CPU, memory, filesystem and network counters and builds the
//! wire frame. CPU load and network deltas are computed between
//! successive refreshes, which the poll interval keeps comfortably apart.

use sysinfo::{Disks, Networks, System};
use tokio::sync::Mutex;

use bosun_core::telemetry::{CpuLoad, FsUsage, IfaceStats, MemoryUsage};
use bosun_core::{BosunResult, HostStats};

pub struct HostMonitor {
    inner: Mutex<MonitorState>,
}

struct MonitorState {
    system: System,
    disks: Disks,
    networks: Networks,
}

impl HostMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime the CPU counters so the first tick has a baseline.
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            inner: Mutex::new(MonitorState {
                system,
                disks: Disks::new_with_refreshed_list(),
                networks: Networks::new_with_refreshed_list(),
            }),
        }
    }

    /// Collect one full host snapshot.
    pub async fn snapshot(&self) -> BosunResult<HostStats> {
        let mut state = self.inner.lock().await;
        state.system.refresh_cpu_usage();
        state.system.refresh_memory();
        state.disks.refresh(true);
        state.networks.refresh(true);

        let cpu = CpuLoad {
            current_load: state.system.global_cpu_usage(),
            cpus: state.system.cpus().iter().map(|c| c.cpu_usage()).collect(),
        };

        let mem = MemoryUsage {
            total: state.system.total_memory(),
            free: state.system.free_memory(),
            used: state.system.used_memory(),
            available: state.system.available_memory(),
        };

        let fs_size = state
            .disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let size = d.total_space();
                let available = d.available_space();
                let used = size.saturating_sub(available);
                FsUsage {
                    fs: d.name().to_string_lossy().into_owned(),
                    size,
                    used,
                    available,
                    used_percent: used as f32 / size as f32 * 100.0,
                    mount: d.mount_point().to_string_lossy().into_owned(),
                }
            })
            .collect();

        let network_stats = state
            .networks
            .iter()
            .map(|(iface, data)| IfaceStats {
                iface: iface.clone(),
                rx_bytes: data.total_received(),
                tx_bytes: data.total_transmitted(),
                rx_sec: data.received(),
                tx_sec: data.transmitted(),
            })
            .collect();

        Ok(HostStats {
            cpu,
            mem,
            fs_size,
            network_stats,
        })
    }
}

impl Default for HostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_has_real_memory_and_cpu_rows() {
        let monitor = HostMonitor::new();
        let stats = monitor.snapshot().await.unwrap();
        assert!(stats.mem.total > 0);
        assert!(!stats.cpu.cpus.is_empty());
        for fs in &stats.fs_size {
            assert!(fs.size >= fs.used);
            assert!(!fs.mount.is_empty());
        }
    }

    #[tokio::test]
    async fn consecutive_snapshots_work() {
        let monitor = HostMonitor::new();
        let first = monitor.snapshot().await.unwrap();
        let second = monitor.snapshot().await.unwrap();
        // Totals are monotonic between ticks.
        let total =
            |s: &HostStats| s.network_stats.iter().map(|n| n.rx_bytes).sum::<u64>();
        assert!(total(&second) >= total(&first));
    }
}
