use tracing::{info, warn};

use flint_common::messages::Envelope;
use flint_common::Cluster;

use super::handlers::{apply_message, Clusters};
use super::sequence::SequenceState;

/// Outcome of applying one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// The message revealed a sequence violation; the caller must re-fetch
    /// the authoritative snapshot and call [`ClusterStore::resync`].
    pub resync_required: bool,
}

/// Owns the canonical cluster map and the connection sequence state.
///
/// A message that fails sequence validation is still applied: the sequence
/// is reseeded from it and the snapshot fetched by the caller overwrites
/// whatever the stale view held, so applying keeps the view fresher in the
/// window between the violation and the snapshot landing.
#[derive(Debug, Default)]
pub struct ClusterStore {
    clusters: Clusters,
    sequence: SequenceState,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, envelope: &Envelope) -> Applied {
        let resync_required = if !self.sequence.is_tracking() {
            info!(
                "No server id tracked, initializing message sequence from {} / {}",
                envelope.server_id, envelope.message_no
            );
            self.sequence.initialize(&envelope.server_id, envelope.message_no);
            false
        } else {
            match self.sequence.validate(&envelope.server_id, envelope.message_no) {
                Ok(()) => {
                    self.sequence.advance(envelope.message_no);
                    false
                }
                Err(violation) => {
                    warn!("{}, refreshing clusters", violation);
                    self.sequence.initialize(&envelope.server_id, envelope.message_no);
                    true
                }
            }
        };

        let clusters = std::mem::take(&mut self.clusters);
        self.clusters = apply_message(clusters, &envelope.message);
        Applied { resync_required }
    }

    /// Replace the whole view from an authoritative snapshot.
    pub fn resync(&mut self, snapshot: Vec<Cluster>) {
        self.clusters = snapshot
            .into_iter()
            .map(|cluster| (cluster.id.clone(), cluster))
            .collect();
    }

    /// Forget the tracked connection identity; the next message
    /// re-initializes it. Called when the channel reconnects.
    pub fn reset_sequence(&mut self) {
        self.sequence.reset();
    }

    /// Locally-optimistic edit: mutate one cluster before the service
    /// confirms. A later authoritative message overwrites whatever this
    /// writes.
    pub fn update_cluster<F>(&mut self, cluster_id: &str, update: F)
    where
        F: FnOnce(&mut Cluster),
    {
        match self.clusters.get_mut(cluster_id) {
            Some(cluster) => update(cluster),
            None => warn!(
                "Cluster with id {} not found, skipping local update",
                cluster_id
            ),
        }
    }

    pub fn clusters(&self) -> &Clusters {
        &self.clusters
    }

    pub fn get(&self, cluster_id: &str) -> Option<&Cluster> {
        self.clusters.get(cluster_id)
    }

    /// Clusters in a stable display order (by id).
    pub fn sorted(&self) -> Vec<&Cluster> {
        let mut clusters: Vec<&Cluster> = self.clusters.values().collect();
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        clusters
    }

    pub fn sequence(&self) -> &SequenceState {
        &self.sequence
    }
}
