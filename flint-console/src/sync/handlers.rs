use std::collections::{HashMap, HashSet};

use tracing::warn;

use flint_common::messages::ServerMessage;
use flint_common::{Cluster, DockerImage, Instance};

/// The canonical in-memory view, keyed by cluster id. Keys always equal
/// `cluster.id` of the mapped value.
pub type Clusters = HashMap<String, Cluster>;

/// Single reducer entry point. Every handler is total: a message naming a
/// cluster or instance the map does not track is logged and dropped, the
/// input map comes back unchanged.
pub fn apply_message(clusters: Clusters, message: &ServerMessage) -> Clusters {
    match message {
        ServerMessage::ClustersAdded { clusters: added } => clusters_added(clusters, added),
        ServerMessage::ClustersRemoved { cluster_ids } => clusters_removed(clusters, cluster_ids),
        ServerMessage::WorkersAdded {
            cluster_id,
            workers,
        } => workers_added(clusters, cluster_id, workers),
        ServerMessage::WorkersRemoved {
            cluster_id,
            worker_ids,
        } => workers_removed(clusters, cluster_id, worker_ids),
        ServerMessage::InstanceState { instance_id, state } => {
            patch_instance(clusters, instance_id, |instance| instance.state = *state)
        }
        ServerMessage::InstanceContainerState {
            instance_id,
            container_state,
        } => patch_instance(clusters, instance_id, |instance| {
            instance.container_state = *container_state
        }),
        ServerMessage::InstanceIpAddress {
            instance_id,
            ip_address,
        } => patch_instance(clusters, instance_id, |instance| {
            instance.ip_address = Some(ip_address.clone())
        }),
        ServerMessage::InstanceSubnet {
            instance_id,
            subnet,
        } => patch_instance(clusters, instance_id, |instance| {
            instance.subnet = Some(subnet.clone())
        }),
        ServerMessage::InstanceTerminatedAt {
            instance_id,
            terminated_at,
        } => patch_instance(clusters, instance_id, |instance| {
            instance.terminated_at = Some(*terminated_at)
        }),
        ServerMessage::DockerImageChangeRequest { cluster_id } => {
            image_change_requested(clusters, cluster_id)
        }
        ServerMessage::DockerImageChangeAttempt {
            cluster_id,
            docker_image,
            error,
        } => image_change_attempted(clusters, cluster_id, docker_image.as_ref(), error.as_deref()),
        ServerMessage::Unknown => clusters,
    }
}

/// Merge new clusters by id. An existing entry with the same id is
/// overwritten: the message carries the fresher object.
pub fn clusters_added(mut clusters: Clusters, added: &[Cluster]) -> Clusters {
    for cluster in added {
        clusters.insert(cluster.id.clone(), cluster.clone());
    }
    clusters
}

pub fn clusters_removed(mut clusters: Clusters, cluster_ids: &[String]) -> Clusters {
    for cluster_id in cluster_ids {
        clusters.remove(cluster_id);
    }
    clusters
}

/// Union by worker id; a worker the cluster already tracks wins over the
/// incoming copy, which makes re-delivery of the same message a no-op.
pub fn workers_added(mut clusters: Clusters, cluster_id: &str, workers: &[Instance]) -> Clusters {
    let Some(cluster) = clusters.get_mut(cluster_id) else {
        warn!("Cluster with id {} not found, dropping WorkersAdded", cluster_id);
        return clusters;
    };
    let known: HashSet<String> = cluster.workers.iter().map(|w| w.id.clone()).collect();
    for worker in workers {
        if !known.contains(&worker.id) {
            cluster.workers.push(worker.clone());
        }
    }
    clusters
}

pub fn workers_removed(
    mut clusters: Clusters,
    cluster_id: &str,
    worker_ids: &[String],
) -> Clusters {
    let Some(cluster) = clusters.get_mut(cluster_id) else {
        warn!("Cluster with id {} not found, dropping WorkersRemoved", cluster_id);
        return clusters;
    };
    cluster.workers.retain(|worker| !worker_ids.contains(&worker.id));
    clusters
}

fn image_change_requested(mut clusters: Clusters, cluster_id: &str) -> Clusters {
    let Some(cluster) = clusters.get_mut(cluster_id) else {
        warn!(
            "Cluster with id {} not found, dropping DockerImageChangeRequest",
            cluster_id
        );
        return clusters;
    };
    cluster.image_change_in_progress = true;
    clusters
}

fn image_change_attempted(
    mut clusters: Clusters,
    cluster_id: &str,
    docker_image: Option<&DockerImage>,
    error: Option<&str>,
) -> Clusters {
    let Some(cluster) = clusters.get_mut(cluster_id) else {
        warn!(
            "Cluster with id {} not found, dropping DockerImageChangeAttempt",
            cluster_id
        );
        return clusters;
    };
    match (error, docker_image) {
        (Some(error), _) => {
            warn!(
                "Failed to change Docker image for cluster with id {}: {}",
                cluster_id, error
            );
            cluster.image_change_in_progress = false;
            cluster.last_image_change_error = Some(error.to_string());
        }
        (None, Some(docker_image)) => {
            cluster.docker_image = docker_image.clone();
            cluster.image_change_in_progress = false;
            cluster.last_image_change_error = None;
        }
        (None, None) => {
            warn!(
                "DockerImageChangeAttempt for cluster with id {} carried neither image nor error",
                cluster_id
            );
        }
    }
    clusters
}

/// Map every tracked instance id (master and workers, across all clusters)
/// to its owning cluster id.
fn owning_cluster_ids(clusters: &Clusters) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for (cluster_id, cluster) in clusters {
        index.insert(cluster.master.id.clone(), cluster_id.clone());
        for worker in &cluster.workers {
            index.insert(worker.id.clone(), cluster_id.clone());
        }
    }
    index
}

/// Shared targeting rule for the per-field instance updates: resolve the
/// instance to its owning cluster, patch the master on id match, otherwise
/// patch the matching worker in place.
fn patch_instance<F>(mut clusters: Clusters, instance_id: &str, patch: F) -> Clusters
where
    F: FnOnce(&mut Instance),
{
    let Some(cluster_id) = owning_cluster_ids(&clusters).remove(instance_id) else {
        warn!("Instance with id {} not found, dropping update", instance_id);
        return clusters;
    };
    if let Some(cluster) = clusters.get_mut(&cluster_id) {
        if cluster.master.id == instance_id {
            patch(&mut cluster.master);
        } else if let Some(worker) = cluster.workers.iter_mut().find(|w| w.id == instance_id) {
            patch(worker);
        }
    }
    clusters
}
