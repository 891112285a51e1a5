use flint_common::{Cluster, Instance, InstanceState};

use crate::sync::ClusterStore;

// Pure formatting of the cluster map into terminal lines. Nothing here has
// invariants; the store is the source of truth.

pub fn render(store: &ClusterStore) -> String {
    let clusters = store.sorted();
    let mut out = format!("flint — {} cluster(s)\n", clusters.len());
    for cluster in clusters {
        out.push_str(&render_cluster(cluster));
    }
    out
}

pub fn render_cluster(cluster: &Cluster) -> String {
    let mut out = format!(
        "  {}  owner={}  image={}\n    master {} {:?}/{:?}{}\n    workers: {}{}\n",
        cluster.id,
        cluster.owner,
        cluster.docker_image,
        cluster.master.id,
        cluster.master.state,
        cluster.master.container_state,
        cluster
            .master
            .ip_address
            .as_deref()
            .map(|ip| format!(" ip={}", ip))
            .unwrap_or_default(),
        cluster.workers.len(),
        worker_breakdown(&cluster.workers),
    );
    let mut details: Vec<String> = Vec::new();
    if let Some(launched_at) = cluster.launched_at {
        details.push(format!("launched={}", launched_at.format("%Y-%m-%d %H:%MZ")));
    }
    if let Some(ttl) = &cluster.ttl {
        details.push(format!("ttl={}", ttl));
    }
    if let Some(idle) = &cluster.idle_timeout {
        details.push(format!("idle={}", idle));
    }
    if let Some(bid) = cluster.worker_bid_price {
        details.push(format!("bid=${}", bid));
    }
    if let Some(subnet) = &cluster.subnet_id {
        details.push(format!("subnet={}", subnet));
    }
    if let Some(group) = &cluster.placement_group {
        details.push(format!("group={}", group));
    }
    if !details.is_empty() {
        out.push_str(&format!("    {}\n", details.join("  ")));
    }
    if cluster.image_change_in_progress {
        out.push_str("    image change in progress…\n");
    }
    if let Some(error) = &cluster.last_image_change_error {
        out.push_str(&format!("    image change failed: {}\n", error));
    }
    out
}

fn worker_breakdown(workers: &[Instance]) -> String {
    if workers.is_empty() {
        return String::new();
    }
    let count = |state: InstanceState| workers.iter().filter(|w| w.state == state).count();
    let mut parts: Vec<String> = Vec::new();
    for state in [
        InstanceState::Pending,
        InstanceState::Starting,
        InstanceState::Running,
        InstanceState::Terminating,
        InstanceState::Terminated,
    ] {
        let n = count(state);
        if n > 0 {
            parts.push(format!("{:?} {}", state, n));
        }
    }
    format!(" ({})", parts.join(", "))
}

pub fn service_unavailable(error: &anyhow::Error) -> String {
    format!(
        "There was a problem reaching the Flint service.\n{:#}\nCheck endpoints.json (or FLINT_SERVER_URL / FLINT_MESSAGING_URL) and try again.",
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flint_common::{ContainerState, DockerImage};

    fn instance(id: &str, state: InstanceState) -> Instance {
        Instance {
            id: id.to_string(),
            instance_type: "m4.large".to_string(),
            state,
            container_state: ContainerState::ContainerPending,
            ip_address: None,
            subnet: None,
            terminated_at: None,
        }
    }

    #[test]
    fn empty_store_renders_a_header() {
        let store = ClusterStore::new();
        assert_eq!(render(&store), "flint — 0 cluster(s)\n");
    }

    #[test]
    fn cluster_card_shows_owner_image_and_worker_breakdown() {
        let cluster = Cluster {
            id: "c1".to_string(),
            owner: "alice".to_string(),
            docker_image: DockerImage {
                repo: "videoamp/spark".to_string(),
                tag: "build-9".to_string(),
            },
            master: instance("m1", InstanceState::Running),
            workers: vec![
                instance("w1", InstanceState::Running),
                instance("w2", InstanceState::Pending),
            ],
            ttl: Some("PT10H".to_string()),
            idle_timeout: None,
            launched_at: None,
            master_instance_type: "m4.large".to_string(),
            worker_instance_type: "m4.large".to_string(),
            worker_bid_price: None,
            subnet_id: None,
            placement_group: None,
            image_change_in_progress: false,
            last_image_change_error: None,
        };
        let card = render_cluster(&cluster);
        assert!(card.contains("owner=alice"));
        assert!(card.contains("videoamp/spark:build-9"));
        assert!(card.contains("workers: 2 (Pending 1, Running 1)"));
        assert!(card.contains("ttl=PT10H"));
    }
}
