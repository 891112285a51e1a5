use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod messages;

// --- Enums ---

/// Machine lifecycle as reported by the provisioning service.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Pending,     // Request accepted, machine not yet allocated
    Starting,    // Machine allocated, booting
    Running,     // Up and reachable
    Terminating, // Shutdown requested
    Terminated,  // Gone
}

/// Container lifecycle on a running instance. Wire names carry the
/// "Container" prefix to stay distinguishable from InstanceState values.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    ContainerPending,
    ContainerStarting,
    ContainerRunning,
    ContainerStopping,
    ContainerStopped,
}

// --- Entities ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DockerImage {
    pub repo: String,
    pub tag: String,
}

impl std::fmt::Display for DockerImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repo, self.tag)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub instance_type: String,
    pub state: InstanceState,
    pub container_state: ContainerState,
    pub ip_address: Option<String>,
    pub subnet: Option<String>,
    pub terminated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub owner: String,
    pub docker_image: DockerImage,
    pub master: Instance,
    #[serde(default)]
    pub workers: Vec<Instance>,
    pub ttl: Option<String>,
    pub idle_timeout: Option<String>,
    pub launched_at: Option<DateTime<Utc>>,
    pub master_instance_type: String,
    pub worker_instance_type: String,
    pub worker_bid_price: Option<f64>,
    pub subnet_id: Option<String>,
    pub placement_group: Option<String>,
    #[serde(default)]
    pub image_change_in_progress: bool,
    // Local-only: set when the service rejects an image change, cleared on
    // the next successful change. Never present on the wire.
    #[serde(skip)]
    pub last_image_change_error: Option<String>,
}

/// Launch request body, sent inside LaunchCluster / LaunchSpotCluster.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub id: String,
    pub docker_image: DockerImage,
    pub owner: String,
    pub ttl: Option<String>,
    pub idle_timeout: Option<String>,
    pub master_instance_type: String,
    pub worker_instance_type: String,
    pub num_workers: u32,
    pub subnet_id: Option<String>,
    pub placement_group: Option<String>,
}

// --- Reference data (read-only lookup lists) ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStorage {
    pub devices: u32,
    pub storage_per_device: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub instance_type: String,
    pub cores: u32,
    pub memory: u64,
    pub storage: InstanceStorage,
    pub hourly_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub id: String,
    pub availability_zone: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementGroup {
    pub name: String,
    pub strategy: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpotPrice {
    pub instance_type: String,
    pub price: f64,
    pub timestamp: Option<DateTime<Utc>>,
}
