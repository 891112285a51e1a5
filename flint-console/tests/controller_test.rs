// Controller wiring: bootstrap, operator commands, optimistic updates, and
// resync on sequence violations, against a stub service and a recording
// channel.

mod common;

use std::sync::{Arc, Mutex};

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use common::{cluster, envelope};
use flint_common::messages::{Command, ServerMessage};
use flint_console::api::{Endpoints, FlintApi};
use flint_console::channel::{ChannelEvent, MessagingChannel};
use flint_console::controller::Controller;
use flint_console::ops::{LaunchRequest, OperatorCommand};
use flint_console::prefs::PrefsStore;

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<Command>>,
}

#[async_trait::async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send(&self, command: &Command) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(command.clone());
        Ok(())
    }
}

/// Stub service: one cluster ("c7") in the snapshot, one instance spec, two
/// docker builds (build-5 newest).
async fn serve_stub() -> String {
    let app = Router::new()
        .route(
            "/clusters",
            get(|| async {
                Json(json!([{
                    "id": "c7",
                    "owner": "alice",
                    "dockerImage": {"repo": "videoamp/spark", "tag": "build-4"},
                    "master": {
                        "id": "m7",
                        "instanceType": "m4.large",
                        "state": "Running",
                        "containerState": "ContainerRunning"
                    },
                    "workers": [],
                    "masterInstanceType": "m4.large",
                    "workerInstanceType": "m4.large"
                }]))
            }),
        )
        .route(
            "/instanceSpecs",
            get(|| async {
                Json(json!([{
                    "instanceType": "m4.large",
                    "cores": 2,
                    "memory": 8,
                    "storage": {"devices": 1, "storagePerDevice": 34359738368u64},
                    "hourlyPrice": 0.25
                }]))
            }),
        )
        .route("/placementGroups", get(|| async { Json(json!([])) }))
        .route("/subnets", get(|| async { Json(json!([])) }))
        .route(
            "/dockerImages",
            get(|| async {
                Json(json!([
                    {"repo": "videoamp/spark", "tag": "build-4"},
                    {"repo": "videoamp/spark", "tag": "build-5"}
                ]))
            }),
        )
        .route("/spotPrices", get(|| async { Json(json!([])) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn controller_with_recorder() -> (Controller, Arc<RecordingChannel>, tempfile::TempDir) {
    let api = FlintApi::new(&Endpoints {
        server_url: serve_stub().await,
        messaging_url: "ws://unused".to_string(),
    });
    let recorder = Arc::new(RecordingChannel::default());
    let dir = tempfile::tempdir().unwrap();
    let prefs = PrefsStore::open(dir.path().join("prefs.json"));
    let controller = Controller::bootstrap(api, recorder.clone(), prefs)
        .await
        .unwrap();
    (controller, recorder, dir)
}

#[tokio::test]
async fn bootstrap_loads_reference_data_and_snapshot() {
    let (controller, _recorder, _dir) = controller_with_recorder().await;
    assert_eq!(controller.store.clusters().len(), 1);
    assert!(controller.store.get("c7").is_some());
    // Newest build first.
    assert_eq!(controller.reference.docker_images[0].tag, "build-5");
    assert_eq!(controller.reference.instance_specs.len(), 1);
}

#[tokio::test]
async fn launch_fills_defaults_from_reference_data() {
    let (mut controller, recorder, _dir) = controller_with_recorder().await;

    let request = LaunchRequest {
        owner: Some("bob".to_string()),
        ..Default::default()
    };
    controller
        .handle_operator(OperatorCommand::Launch(request))
        .await
        .unwrap();

    let sent = recorder.sent.lock().unwrap();
    let Command::LaunchCluster { cluster_spec } = &sent[0] else {
        panic!("expected an on-demand launch");
    };
    assert_eq!(cluster_spec.owner, "bob");
    assert_eq!(cluster_spec.docker_image.tag, "build-5");
    assert_eq!(cluster_spec.master_instance_type, "m4.large");
    assert_eq!(cluster_spec.num_workers, 1);
    assert_eq!(cluster_spec.ttl.as_deref(), Some("PT10H"));
    assert_eq!(cluster_spec.idle_timeout.as_deref(), Some("PT60M"));
}

#[tokio::test]
async fn spot_launch_defaults_the_bid_to_the_hourly_price() {
    let (mut controller, recorder, _dir) = controller_with_recorder().await;

    let request = LaunchRequest {
        owner: Some("bob".to_string()),
        spot: true,
        ..Default::default()
    };
    controller
        .handle_operator(OperatorCommand::Launch(request))
        .await
        .unwrap();

    let sent = recorder.sent.lock().unwrap();
    let Command::LaunchSpotCluster { bid_price, .. } = &sent[0] else {
        panic!("expected a spot launch");
    };
    assert_eq!(*bid_price, 0.25);
}

#[tokio::test]
async fn launch_without_an_owner_is_refused_until_history_exists() {
    let (mut controller, recorder, _dir) = controller_with_recorder().await;

    let feedback = controller
        .handle_operator(OperatorCommand::Launch(LaunchRequest::default()))
        .await
        .unwrap();
    assert!(feedback.contains("owner"));
    assert!(recorder.sent.lock().unwrap().is_empty());

    // After one named launch the owner is remembered.
    controller
        .handle_operator(OperatorCommand::Launch(LaunchRequest {
            owner: Some("bob".to_string()),
            ..Default::default()
        }))
        .await
        .unwrap();
    controller
        .handle_operator(OperatorCommand::Launch(LaunchRequest::default()))
        .await
        .unwrap();
    assert_eq!(recorder.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn change_image_is_optimistic_and_resolves_the_repo() {
    let (mut controller, recorder, _dir) = controller_with_recorder().await;

    controller
        .handle_operator(OperatorCommand::ChangeImage {
            cluster_id: "c7".to_string(),
            tag: "build-5".to_string(),
        })
        .await
        .unwrap();

    assert!(controller.store.get("c7").unwrap().image_change_in_progress);
    let sent = recorder.sent.lock().unwrap();
    let Command::ChangeDockerImage { docker_image, .. } = &sent[0] else {
        panic!("expected a change-image command");
    };
    assert_eq!(docker_image.repo, "videoamp/spark");
    assert_eq!(docker_image.tag, "build-5");
}

#[tokio::test]
async fn change_image_for_an_unknown_cluster_sends_nothing() {
    let (mut controller, recorder, _dir) = controller_with_recorder().await;

    let feedback = controller
        .handle_operator(OperatorCommand::ChangeImage {
            cluster_id: "ghost".to_string(),
            tag: "build-5".to_string(),
        })
        .await
        .unwrap();
    assert!(feedback.contains("no cluster"));
    assert!(recorder.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sequence_violation_triggers_a_snapshot_resync() {
    let (mut controller, _recorder, _dir) = controller_with_recorder().await;

    // Live messages add c1, then skip a messageNo.
    controller
        .handle_event(ChannelEvent::Message(envelope(
            "srv-a",
            5,
            ServerMessage::ClustersAdded {
                clusters: vec![cluster("c1", "m1")],
            },
        )))
        .await;
    assert!(controller.store.get("c1").is_some());

    controller
        .handle_event(ChannelEvent::Message(envelope(
            "srv-a",
            7,
            ServerMessage::ClustersAdded {
                clusters: vec![cluster("c2", "m2")],
            },
        )))
        .await;

    // The authoritative snapshot (just c7) replaced the live-built view.
    assert!(controller.store.get("c1").is_none());
    assert!(controller.store.get("c2").is_none());
    assert!(controller.store.get("c7").is_some());
}

#[tokio::test]
async fn reconnect_refetches_the_snapshot_and_resets_sequencing() {
    let (mut controller, _recorder, _dir) = controller_with_recorder().await;

    controller
        .handle_event(ChannelEvent::Message(envelope(
            "srv-a",
            5,
            ServerMessage::ClustersAdded {
                clusters: vec![cluster("c1", "m1")],
            },
        )))
        .await;

    controller.handle_event(ChannelEvent::Connected).await;

    // Fresh server identity and arbitrary counter: no violation after the
    // reset.
    controller
        .handle_event(ChannelEvent::Message(envelope(
            "srv-b",
            90,
            ServerMessage::ClustersAdded {
                clusters: vec![cluster("c3", "m3")],
            },
        )))
        .await;
    assert!(controller.store.get("c3").is_some());
    assert!(controller.store.get("c7").is_some());
}
