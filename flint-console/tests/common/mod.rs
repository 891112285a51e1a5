// Shared fixtures for the console integration tests.
#![allow(dead_code)]

use flint_common::messages::{Envelope, ServerMessage};
use flint_common::{Cluster, ContainerState, DockerImage, Instance, InstanceState};
use flint_console::sync::Clusters;

pub fn instance(id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        instance_type: "m4.large".to_string(),
        state: InstanceState::Pending,
        container_state: ContainerState::ContainerPending,
        ip_address: None,
        subnet: None,
        terminated_at: None,
    }
}

pub fn cluster(id: &str, master_id: &str) -> Cluster {
    Cluster {
        id: id.to_string(),
        owner: "alice".to_string(),
        docker_image: DockerImage {
            repo: "videoamp/spark".to_string(),
            tag: "build-1".to_string(),
        },
        master: instance(master_id),
        workers: Vec::new(),
        ttl: Some("PT10H".to_string()),
        idle_timeout: Some("PT60M".to_string()),
        launched_at: None,
        master_instance_type: "m4.large".to_string(),
        worker_instance_type: "m4.large".to_string(),
        worker_bid_price: None,
        subnet_id: None,
        placement_group: None,
        image_change_in_progress: false,
        last_image_change_error: None,
    }
}

pub fn clusters_of(entries: Vec<Cluster>) -> Clusters {
    entries
        .into_iter()
        .map(|cluster| (cluster.id.clone(), cluster))
        .collect()
}

pub fn envelope(server_id: &str, message_no: u64, message: ServerMessage) -> Envelope {
    Envelope {
        server_id: server_id.to_string(),
        message_no,
        message,
    }
}
