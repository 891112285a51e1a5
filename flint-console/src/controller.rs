use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use flint_common::messages::Command;
use flint_common::{
    Cluster, ClusterSpec, DockerImage, InstanceSpec, PlacementGroup, SpotPrice, Subnet,
};

use crate::api::FlintApi;
use crate::channel::{ChannelEvent, MessagingChannel};
use crate::ops::{LaunchRequest, OperatorCommand, USAGE};
use crate::prefs::PrefsStore;
use crate::sync::ClusterStore;

/// Static lookup lists, fetched once at startup.
#[derive(Debug, Default)]
pub struct ReferenceData {
    pub instance_specs: Vec<InstanceSpec>,
    pub placement_groups: Vec<PlacementGroup>,
    pub subnets: Vec<Subnet>,
    pub docker_images: Vec<DockerImage>,
    pub spot_prices: Vec<SpotPrice>,
}

impl ReferenceData {
    pub async fn fetch(api: &FlintApi) -> anyhow::Result<Self> {
        let (instance_specs, placement_groups, subnets, docker_images, spot_prices) = tokio::try_join!(
            api.get_instance_specs(),
            api.get_placement_groups(),
            api.get_subnets(),
            api.get_docker_images(),
            api.get_spot_prices(),
        )?;
        Ok(Self {
            instance_specs,
            placement_groups,
            subnets,
            docker_images,
            spot_prices,
        })
    }
}

/// Root controller: owns the store, bridges the messaging channel to it and
/// turns operator commands into outbound messages.
pub struct Controller {
    api: FlintApi,
    channel: Arc<dyn MessagingChannel>,
    prefs: PrefsStore,
    pub store: ClusterStore,
    pub reference: ReferenceData,
}

impl Controller {
    /// Fetch reference data and the initial snapshot. Failure here means
    /// the service is unreachable and the console cannot start.
    pub async fn bootstrap(
        api: FlintApi,
        channel: Arc<dyn MessagingChannel>,
        prefs: PrefsStore,
    ) -> anyhow::Result<Self> {
        let reference = ReferenceData::fetch(&api).await?;
        let snapshot = api.get_clusters().await?;
        let mut store = ClusterStore::new();
        store.resync(snapshot);
        Ok(Self {
            api,
            channel,
            prefs,
            store,
            reference,
        })
    }

    /// Process one channel event. Returns true when the view changed.
    /// Snapshot refetch failures degrade to a stale view plus a warning;
    /// they never stop the loop.
    pub async fn handle_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Connected => {
                self.store.reset_sequence();
                self.refetch_snapshot().await;
                true
            }
            ChannelEvent::Message(envelope) => {
                let applied = self.store.apply(&envelope);
                if applied.resync_required {
                    self.refetch_snapshot().await;
                }
                true
            }
            ChannelEvent::Disconnected => {
                warn!("Messaging channel dropped, reconnect pending");
                false
            }
        }
    }

    async fn refetch_snapshot(&mut self) {
        match self.api.get_clusters().await {
            Ok(snapshot) => self.store.resync(snapshot),
            Err(error) => warn!("Cluster refresh failed, keeping stale view: {:#}", error),
        }
    }

    /// Execute an operator command; the returned line is user feedback.
    /// Only transport-level failures (channel task gone) are errors.
    pub async fn handle_operator(&mut self, command: OperatorCommand) -> anyhow::Result<String> {
        match command {
            OperatorCommand::Launch(request) => self.launch(request).await,
            OperatorCommand::AddWorkers { cluster_id, count } => {
                self.channel
                    .send(&Command::AddWorkers {
                        cluster_id: cluster_id.clone(),
                        count,
                    })
                    .await?;
                Ok(format!("requested {} worker(s) for cluster {}", count, cluster_id))
            }
            OperatorCommand::TerminateWorker { instance_id } => {
                self.channel
                    .send(&Command::TerminateWorker {
                        instance_id: instance_id.clone(),
                    })
                    .await?;
                Ok(format!("requested termination of worker {}", instance_id))
            }
            OperatorCommand::TerminateCluster { cluster_id } => {
                self.channel
                    .send(&Command::TerminateCluster {
                        cluster_id: cluster_id.clone(),
                    })
                    .await?;
                Ok(format!("requested termination of cluster {}", cluster_id))
            }
            OperatorCommand::ChangeImage { cluster_id, tag } => {
                self.change_image(cluster_id, tag).await
            }
            OperatorCommand::Refresh => {
                self.refetch_snapshot().await;
                Ok("refreshed cluster snapshot".to_string())
            }
            OperatorCommand::Help => Ok(USAGE.to_string()),
            OperatorCommand::Quit => Ok(String::new()),
        }
    }

    async fn launch(&mut self, request: LaunchRequest) -> anyhow::Result<String> {
        let Some(owner) = request
            .owner
            .or_else(|| self.prefs.last_owner().map(str::to_string))
        else {
            return Ok("an owner is required (owner=NAME)".to_string());
        };
        let Some(docker_image) = self.resolve_image(request.tag.as_deref()) else {
            return Ok("no docker images known; is the service reachable?".to_string());
        };
        let Some(default_type) = self
            .reference
            .instance_specs
            .first()
            .map(|spec| spec.instance_type.clone())
        else {
            return Ok("no instance specs known; is the service reachable?".to_string());
        };
        let master_instance_type = request.master_instance_type.unwrap_or_else(|| default_type.clone());
        let worker_instance_type = request.worker_instance_type.unwrap_or(default_type);

        let lifetime_hours = request.lifetime_hours.unwrap_or(10);
        let idle_timeout_minutes = request.idle_timeout_minutes.unwrap_or(60);
        let spec = ClusterSpec {
            id: Uuid::new_v4().to_string(),
            docker_image,
            owner: owner.clone(),
            ttl: (lifetime_hours > 0).then(|| format!("PT{}H", lifetime_hours)),
            idle_timeout: (idle_timeout_minutes > 0).then(|| format!("PT{}M", idle_timeout_minutes)),
            master_instance_type,
            worker_instance_type: worker_instance_type.clone(),
            num_workers: request.num_workers.unwrap_or(1),
            subnet_id: request.subnet_id,
            placement_group: request.placement_group,
        };

        let command = if request.spot {
            let Some(bid_price) = request
                .bid_price
                .or_else(|| self.hourly_price(&worker_instance_type))
            else {
                return Ok(format!(
                    "no bid given and no known hourly price for {}",
                    worker_instance_type
                ));
            };
            Command::LaunchSpotCluster {
                cluster_spec: spec,
                bid_price,
            }
        } else {
            Command::LaunchCluster { cluster_spec: spec }
        };
        self.channel.send(&command).await?;

        if let Err(error) = self.prefs.record_owner(&owner) {
            warn!("Could not persist owner history: {:#}", error);
        }
        Ok(format!("launch requested for {}", owner))
    }

    async fn change_image(&mut self, cluster_id: String, tag: String) -> anyhow::Result<String> {
        let Some(cluster) = self.store.get(&cluster_id) else {
            return Ok(format!("no cluster with id {}", cluster_id));
        };
        let repo = self
            .reference
            .docker_images
            .iter()
            .find(|image| image.tag == tag)
            .map(|image| image.repo.clone())
            .unwrap_or_else(|| cluster.docker_image.repo.clone());
        let docker_image = DockerImage {
            repo,
            tag: tag.clone(),
        };
        self.channel
            .send(&Command::ChangeDockerImage {
                cluster_id: cluster_id.clone(),
                docker_image,
            })
            .await?;
        // Optimistic: mark the change in flight now; the service's own
        // DockerImageChangeRequest / Attempt messages overwrite this.
        self.store.update_cluster(&cluster_id, |cluster: &mut Cluster| {
            cluster.image_change_in_progress = true;
        });
        Ok(format!("image change to {} requested for {}", tag, cluster_id))
    }

    fn resolve_image(&self, tag: Option<&str>) -> Option<DockerImage> {
        match tag {
            Some(tag) => {
                let repo = self
                    .reference
                    .docker_images
                    .iter()
                    .find(|image| image.tag == tag)
                    .map(|image| image.repo.clone())
                    .or_else(|| self.reference.docker_images.first().map(|i| i.repo.clone()))?;
                Some(DockerImage {
                    repo,
                    tag: tag.to_string(),
                })
            }
            // Newest build; get_docker_images sorts descending.
            None => self.reference.docker_images.first().cloned(),
        }
    }

    fn hourly_price(&self, instance_type: &str) -> Option<f64> {
        self.reference
            .instance_specs
            .iter()
            .find(|spec| spec.instance_type == instance_type)
            .map(|spec| spec.hourly_price)
    }
}
