use serde::{Deserialize, Serialize};

use crate::{Cluster, ClusterSpec, ContainerState, DockerImage, Instance, InstanceState};

// -----------------------------------------------------------------------------
// Inbound live messages
// -----------------------------------------------------------------------------

/// Every frame on the messaging channel is a flat JSON object discriminated
/// by `$type`. Unrecognized kinds deserialize to `Unknown` so a newer server
/// never breaks an older console.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "$type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ClustersAdded {
        clusters: Vec<Cluster>,
    },
    ClustersRemoved {
        cluster_ids: Vec<String>,
    },
    WorkersAdded {
        cluster_id: String,
        workers: Vec<Instance>,
    },
    WorkersRemoved {
        cluster_id: String,
        worker_ids: Vec<String>,
    },
    InstanceState {
        instance_id: String,
        state: InstanceState,
    },
    InstanceContainerState {
        instance_id: String,
        container_state: ContainerState,
    },
    InstanceIpAddress {
        instance_id: String,
        ip_address: String,
    },
    InstanceSubnet {
        instance_id: String,
        subnet: String,
    },
    InstanceTerminatedAt {
        instance_id: String,
        terminated_at: chrono::DateTime<chrono::Utc>,
    },
    DockerImageChangeRequest {
        cluster_id: String,
    },
    DockerImageChangeAttempt {
        cluster_id: String,
        docker_image: Option<DockerImage>,
        error: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Per-connection sequencing fields carried by every frame, plus the payload.
/// The envelope parses even when the payload kind is unknown, so sequence
/// accounting never loses a frame.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub server_id: String,
    pub message_no: u64,
    #[serde(flatten)]
    pub message: ServerMessage,
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|source| ProtocolError::Malformed {
            raw: truncate_raw(text),
            source,
        })
    }
}

fn truncate_raw(text: &str) -> String {
    const LIMIT: usize = 512;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

// -----------------------------------------------------------------------------
// Outbound commands
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "$type", rename_all_fields = "camelCase")]
pub enum Command {
    LaunchCluster {
        cluster_spec: ClusterSpec,
    },
    LaunchSpotCluster {
        cluster_spec: ClusterSpec,
        bid_price: f64,
    },
    AddWorkers {
        cluster_id: String,
        count: u32,
    },
    TerminateWorker {
        instance_id: String,
    },
    TerminateCluster {
        cluster_id: String,
    },
    ChangeDockerImage {
        cluster_id: String,
        docker_image: DockerImage,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame ({source}): {raw}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("non-text frame on messaging channel")]
    NonText,
}
