//! ClusterClient against an in-process mock of the cluster REST API and
//! IPFS gateway.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use peerfs_content::{ClusterClient, ClusterDirectory, ContentStore, Replication, StoreError};
use peerfs_types::{ContentId, PeerId};
use serde_json::{json, Value};
use tokio::sync::oneshot;

const ROOT_CID: &str = "QmVGp7rNegQrd86YNViYzuLMBYPHiqE3usij9AuZAJzdSn";

#[derive(Clone, Default)]
struct MockClusterState {
    blobs: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    pins: Arc<RwLock<BTreeMap<String, Value>>>,
    uploads: Arc<RwLock<Vec<Vec<u8>>>>,
}

struct MockCluster {
    address: String,
    state: MockClusterState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockCluster {
    async fn start() -> Self {
        let state = MockClusterState::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock cluster listener");
        let addr = listener.local_addr().expect("listener addr lookup");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = Router::new()
            .route("/id", get(local_id))
            .route("/peers", get(peers))
            .route("/add", post(add))
            .route("/pins", get(list_pins))
            .route("/pins/:cid", get(pin_status).post(pin).delete(unpin))
            .route("/ipfs/:cid", get(gateway))
            .with_state(state.clone());

        tokio::spawn(async move {
            let server = axum::serve(listener, app);
            let graceful = server.with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            let _ = graceful.await;
        });

        Self {
            address: format!("http://{}", addr),
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    fn client(&self) -> ClusterClient {
        ClusterClient::new(&self.address, &self.address).expect("valid mock urls")
    }
}

impl Drop for MockCluster {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn peer_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "addresses": [format!("/ip4/127.0.0.1/tcp/9096/p2p/{id}")],
        "cluster_peers": ["12D3KooWEH7H", "12D3KooWEhnf"],
        "peername": name,
        "version": "1.1.1",
        "error": ""
    })
}

async fn local_id() -> Json<Value> {
    Json(peer_json("12D3KooWEH7H", "cluster1"))
}

async fn peers() -> impl IntoResponse {
    // Newer clusters stream peers as newline-delimited objects.
    format!(
        "{}\n{}\n",
        peer_json("12D3KooWEH7H", "cluster1"),
        peer_json("12D3KooWEhnf", "cluster2")
    )
}

async fn add(State(state): State<MockClusterState>, body: Bytes) -> impl IntoResponse {
    state.uploads.write().push(body.to_vec());
    state
        .blobs
        .write()
        .insert(ROOT_CID.to_string(), b"quarterly numbers".to_vec());
    // One line per added node, root last.
    format!(
        "{}\n{}\n",
        json!({"name": "chunk", "cid": {"/": "QmChunk"}, "size": 9}),
        json!({"name": "report.txt", "cid": {"/": ROOT_CID}, "size": 17})
    )
}

async fn pin(
    State(state): State<MockClusterState>,
    Path(cid): Path<String>,
    Json(replication): Json<Value>,
) -> StatusCode {
    state.pins.write().insert(cid, replication);
    StatusCode::OK
}

async fn unpin(State(state): State<MockClusterState>, Path(cid): Path<String>) -> StatusCode {
    let pinned = state.pins.write().remove(&cid).is_some();
    let stored = state.blobs.write().remove(&cid).is_some();
    if pinned || stored {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

fn status_json(cid: &str) -> Value {
    json!({
        "cid": {"/": cid},
        "name": "report.txt",
        "peer_map": {
            "12D3KooWEH7H": {"peername": "cluster1", "status": "pinned", "timestamp": "2024-11-08T03:34:42Z", "error": ""},
            "12D3KooWEhnf": {"peername": "cluster2", "status": "pinning", "timestamp": "2024-11-08T03:34:42Z", "error": ""}
        }
    })
}

async fn pin_status(
    State(state): State<MockClusterState>,
    Path(cid): Path<String>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if state.pins.read().contains_key(&cid) {
        Ok(Json(status_json(&cid)))
    } else {
        Err((StatusCode::NOT_FOUND, "pin not found".to_string()))
    }
}

async fn list_pins(State(state): State<MockClusterState>) -> Json<Vec<Value>> {
    Json(state.pins.read().keys().map(|cid| status_json(cid)).collect())
}

async fn gateway(
    State(state): State<MockClusterState>,
    Path(cid): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    state
        .blobs
        .read()
        .get(&cid)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

#[tokio::test]
async fn test_put_uses_root_of_streamed_add_response() {
    let cluster = MockCluster::start().await;
    let client = cluster.client();

    let cid = client
        .put("report.txt", b"quarterly numbers".to_vec())
        .await
        .unwrap();
    assert_eq!(cid.as_str(), ROOT_CID);

    let uploads = cluster.state.uploads.read();
    assert_eq!(uploads.len(), 1);
    let body = String::from_utf8_lossy(&uploads[0]);
    assert!(body.contains("filename=\"report.txt\""));
    assert!(body.contains("quarterly numbers"));
}

#[tokio::test]
async fn test_get_and_remove_through_gateway() {
    let cluster = MockCluster::start().await;
    let client = cluster.client();
    let cid = client.put("report.txt", b"quarterly numbers".to_vec()).await.unwrap();

    assert_eq!(client.get(&cid).await.unwrap(), b"quarterly numbers");

    client.remove(&cid).await.unwrap();
    assert!(matches!(client.get(&cid).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_remove_of_unpinned_content_succeeds() {
    let cluster = MockCluster::start().await;
    let client = cluster.client();
    let cid = client.put("report.txt", b"quarterly numbers".to_vec()).await.unwrap();

    client.remove(&cid).await.unwrap();
    // The cluster answers 404 now; a retried delete must still go through.
    client.remove(&cid).await.unwrap();
    client.remove(&ContentId::new("QmNeverAdded")).await.unwrap();
}

#[tokio::test]
async fn test_pin_sends_replication_and_reports_status() {
    let cluster = MockCluster::start().await;
    let client = cluster.client();
    let cid = ContentId::new(ROOT_CID);

    client
        .pin(&cid, Replication { min: 1, max: 2 })
        .await
        .unwrap();
    assert_eq!(
        cluster.state.pins.read().get(ROOT_CID),
        Some(&json!({"replication-min": 1, "replication-max": 2}))
    );

    let status = client.pin_status(&cid).await.unwrap();
    assert_eq!(status.cid, cid);
    assert_eq!(status.pinned_on().collect::<Vec<_>>(), vec!["12D3KooWEH7H"]);

    let pins = client.pins().await.unwrap();
    assert_eq!(pins.len(), 1);
}

#[tokio::test]
async fn test_unknown_pin_maps_to_status_error() {
    let cluster = MockCluster::start().await;
    let client = cluster.client();

    let err = client
        .pin_status(&ContentId::new("QmUnknown"))
        .await
        .unwrap_err();
    match err {
        StoreError::Status { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "pin not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_directory_reads_identity_and_peers() {
    let cluster = MockCluster::start().await;
    let client = cluster.client();

    let local = client.local_peer().await.unwrap();
    assert_eq!(local.id, PeerId::new("12D3KooWEH7H"));
    assert_eq!(local.cluster_peers.len(), 2);

    let peers = client.peers().await.unwrap();
    assert_eq!(peers.len(), 2);
    assert_eq!(
        client.peer_name(&PeerId::new("12D3KooWEhnf")).await.unwrap(),
        Some("cluster2".to_string())
    );
}

#[tokio::test]
async fn test_unreachable_cluster_is_an_http_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}");
    let client = ClusterClient::new(&url, &url).unwrap();
    assert!(matches!(client.peers().await, Err(StoreError::Http(_))));
}
