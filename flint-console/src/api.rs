use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use flint_common::{Cluster, DockerImage, InstanceSpec, PlacementGroup, SpotPrice, Subnet};

/// Service endpoints, read from endpoints.json next to the binary (path
/// overridable via FLINT_ENDPOINTS_FILE) with env-var fallback for
/// containerized deployments.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub server_url: String,
    pub messaging_url: String,
}

impl Endpoints {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("FLINT_ENDPOINTS_FILE")
            .unwrap_or_else(|_| "endpoints.json".to_string());
        if let Ok(raw) = std::fs::read_to_string(&path) {
            let endpoints: Endpoints = serde_json::from_str(&raw)
                .with_context(|| format!("invalid endpoints file {}", path))?;
            return Ok(endpoints);
        }
        let server_url = std::env::var("FLINT_SERVER_URL")
            .with_context(|| format!("no {} and FLINT_SERVER_URL not set", path))?;
        let messaging_url = std::env::var("FLINT_MESSAGING_URL")
            .with_context(|| format!("no {} and FLINT_MESSAGING_URL not set", path))?;
        Ok(Endpoints {
            server_url,
            messaging_url,
        })
    }
}

/// Read-only client for the Flint service's reference endpoints.
#[derive(Debug, Clone)]
pub struct FlintApi {
    http: reqwest::Client,
    server_url: String,
}

impl FlintApi {
    pub fn new(endpoints: &Endpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: endpoints.server_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}/{}", self.server_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;
        response
            .json()
            .await
            .with_context(|| format!("GET {} returned malformed JSON", url))
    }

    pub async fn get_clusters(&self) -> anyhow::Result<Vec<Cluster>> {
        self.get_json("clusters").await
    }

    pub async fn get_instance_specs(&self) -> anyhow::Result<Vec<InstanceSpec>> {
        self.get_json("instanceSpecs").await
    }

    pub async fn get_placement_groups(&self) -> anyhow::Result<Vec<PlacementGroup>> {
        self.get_json("placementGroups").await
    }

    pub async fn get_subnets(&self) -> anyhow::Result<Vec<Subnet>> {
        self.get_json("subnets").await
    }

    pub async fn get_spot_prices(&self) -> anyhow::Result<Vec<SpotPrice>> {
        self.get_json("spotPrices").await
    }

    /// Images come back newest build first.
    pub async fn get_docker_images(&self) -> anyhow::Result<Vec<DockerImage>> {
        let images = self.get_json("dockerImages").await?;
        Ok(sort_images_by_build_number(images))
    }
}

/// Builds are tagged `<name>-<number>`; sort by that number, newest first.
/// Tags without a numeric suffix sort last.
pub fn sort_images_by_build_number(mut images: Vec<DockerImage>) -> Vec<DockerImage> {
    images.sort_by_key(|image| std::cmp::Reverse(build_number(&image.tag)));
    images
}

fn build_number(tag: &str) -> Option<u64> {
    tag.rsplit('-').next().and_then(|suffix| suffix.parse().ok())
}
