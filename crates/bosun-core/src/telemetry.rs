//! Serializable telemetry snapshots pushed by poller sessions.
//!
//! Each tick fully replaces the previous view on the client side; nothing
//! here is persisted or diffed.

use serde::{Deserialize, Serialize};

/// One container row in the container-list frame.
///
/// Field casing matches what the dashboard front end consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Status")]
    pub status: String,
    /// Rendered port mapping string, e.g. `0.0.0.0:8080->80/tcp`.
    #[serde(rename = "Ports")]
    pub ports: String,
}

/// Enveloped frames sent on the container-list channel.
///
/// Wire shape: `{"type":"all-containers","payload":[…]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum TelemetryFrame {
    AllContainers(Vec<ContainerSummary>),
}

/// Host metrics frame, sent unenveloped each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStats {
    pub cpu: CpuLoad,
    pub mem: MemoryUsage,
    pub fs_size: Vec<FsUsage>,
    pub network_stats: Vec<IfaceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuLoad {
    /// Aggregate load over all cores, percent.
    pub current_load: f32,
    /// Per-core load, percent.
    pub cpus: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsUsage {
    /// Filesystem device or label.
    pub fs: String,
    pub size: u64,
    pub used: u64,
    pub available: u64,
    /// Used capacity, percent.
    #[serde(rename = "use")]
    pub used_percent: f32,
    pub mount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfaceStats {
    pub iface: String,
    /// Totals since boot.
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Bytes moved since the previous tick.
    pub rx_sec: u64,
    pub tx_sec: u64,
}
