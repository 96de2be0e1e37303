//! REST clients against a local mock server: API level path dispatch,
//! error mapping, retries and JSON Patch content type.

use skyforge_providers::ApiLevel;
use skyforge_providers::config::{GoogleConfig, HttpConfig, KubernetesConfig};
use skyforge_providers::google::compute::{Address, ComputeApi, ComputeClient};
use skyforge_providers::kubernetes::{KubeClient, KubernetesApi, PatchOperation};
use skyforge_providers::operation::{Operation, OperationHandle, OperationPoller, OperationStatus};

use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        max_retries: 2,
        retry_delay_ms: 1,
        ..HttpConfig::default()
    }
}

fn google(server: &MockServer) -> GoogleConfig {
    GoogleConfig {
        project: Some("proj".to_string()),
        compute_endpoint: server.uri(),
        access_token: Some("token-1".to_string()),
        ..GoogleConfig::default()
    }
}

fn compute(server: &MockServer, level: ApiLevel) -> ComputeClient {
    ComputeClient::new(&google(server), &http(), level).expect("client")
}

fn kube(server: &MockServer) -> KubeClient {
    let config = KubernetesConfig {
        host: Some(server.uri()),
        token: Some("kube-token".to_string()),
        insecure: false,
    };
    KubeClient::new(&config, &http()).expect("client")
}

fn done_operation(name: &str) -> serde_json::Value {
    json!({"name": name, "status": "DONE", "region": "https://x/regions/us-central1"})
}

#[tokio::test]
async fn test_production_address_uses_v1_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/proj/regions/us-central1/addresses/ip-a"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "ip-a",
            "address": "10.0.0.5",
            "selfLink": "https://www.googleapis.com/compute/v1/projects/proj/regions/us-central1/addresses/ip-a",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let address = compute(&server, ApiLevel::Production)
        .get_address("proj", "us-central1", "ip-a")
        .await
        .expect("address");
    assert_eq!(address.name, "ip-a");
    // The production shape has no address field.
    assert_eq!(address.address, None);
}

#[tokio::test]
async fn test_beta_address_uses_beta_path_and_sends_ip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compute/beta/projects/proj/regions/us-central1/addresses"))
        .and(body_partial_json(json!({"name": "ip-b", "address": "127.0.0.1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(done_operation("op-1")))
        .expect(1)
        .mount(&server)
        .await;

    let request = Address {
        name: "ip-b".to_string(),
        address: Some("127.0.0.1".to_string()),
        ..Address::default()
    };
    let op = compute(&server, ApiLevel::Beta)
        .insert_address("proj", "us-central1", &request)
        .await
        .expect("operation");
    assert_eq!(op.name, "op-1");
    assert_eq!(op.status, OperationStatus::Done);

    let received = server.received_requests().await.expect("recording enabled");
    assert!(received[0].url.query().unwrap_or_default().contains("requestId="));
}

#[tokio::test]
async fn test_google_error_envelope_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/proj/regions/us-central1/addresses/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "The resource 'gone' was not found"}
        })))
        .mount(&server)
        .await;

    let err = compute(&server, ApiLevel::Production)
        .get_address("proj", "us-central1", "gone")
        .await
        .expect_err("404");
    assert!(err.is_not_found());
    assert!(err.to_string().contains("was not found"));
}

#[tokio::test]
async fn test_idempotent_get_retries_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/proj/zones"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/proj/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "us-central1-a"}, {"name": "us-central1-b"}]
        })))
        .mount(&server)
        .await;

    let zones = compute(&server, ApiLevel::Production)
        .list_zones("proj")
        .await
        .expect("zones after retry");
    assert_eq!(zones.len(), 2);
    assert_eq!(server.received_requests().await.expect("recording enabled").len(), 2);
}

#[tokio::test]
async fn test_kubernetes_create_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/namespaces/default/services"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "kind": "Status", "code": 503, "message": "etcd unavailable"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = kube(&server)
        .create_service("default", &Default::default())
        .await
        .expect_err("503");
    assert_eq!(err.api_status(), Some(503));
    assert!(err.to_string().contains("etcd unavailable"));
}

#[tokio::test]
async fn test_kubernetes_patch_sends_json_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/namespaces/default/services/web"))
        .and(header("content-type", "application/json-patch+json"))
        .and(header("authorization", "Bearer kube-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "web", "namespace": "default", "labels": {"app": "web"}},
            "spec": {"type": "ClusterIP"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let patch = vec![PatchOperation::Add {
        path: "/metadata/labels".to_string(),
        value: json!({"app": "web"}),
    }];
    let service = kube(&server)
        .patch_service("default", "web", &patch)
        .await
        .expect("patched service");
    assert_eq!(service.metadata.labels.get("app").map(String::as_str), Some("web"));

    let received = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).expect("JSON body");
    assert_eq!(body, json!([{"op": "add", "path": "/metadata/labels", "value": {"app": "web"}}]));
}

#[tokio::test]
async fn test_rate_limited_retry_waits_for_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/proj/regions/us-central1/addresses/ip-a"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/compute/v1/projects/proj/regions/us-central1/addresses/ip-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ip-a"})))
        .mount(&server)
        .await;

    let config = HttpConfig {
        retry_delay_ms: 10,
        ..http()
    };
    let client = ComputeClient::new(&google(&server), &config, ApiLevel::Production).expect("client");

    let started = Instant::now();
    let address = client
        .get_address("proj", "us-central1", "ip-a")
        .await
        .expect("address after rate limit");
    assert_eq!(address.name, "ip-a");
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(server.received_requests().await.expect("recording enabled").len(), 2);
}

fn pending(name: &str) -> Operation {
    Operation {
        name: name.to_string(),
        ..Operation::default()
    }
}

async fn assert_polled_at(handle: OperationHandle, expected_path: &str) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(expected_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": handle.name, "status": "DONE"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The handle's API level wins over the client's.
    let op = compute(&server, ApiLevel::Production)
        .poll(&handle)
        .await
        .expect("polled operation");
    assert_eq!(op.name, handle.name);
    assert!(op.is_done());
}

#[tokio::test]
async fn test_poll_zonal_operation_through_zone_endpoint() {
    for (level, version) in [(ApiLevel::Production, "v1"), (ApiLevel::Beta, "beta")] {
        let handle = OperationHandle::zonal("proj", "us-central1-a", &pending("op-z"), level);
        let expected = format!("/compute/{version}/projects/proj/zones/us-central1-a/operations/op-z");
        assert_polled_at(handle, &expected).await;
    }
}

#[tokio::test]
async fn test_poll_regional_operation_through_region_endpoint() {
    for (level, version) in [(ApiLevel::Production, "v1"), (ApiLevel::Beta, "beta")] {
        let handle = OperationHandle::regional("proj", "us-central1", &pending("op-r"), level);
        let expected = format!("/compute/{version}/projects/proj/regions/us-central1/operations/op-r");
        assert_polled_at(handle, &expected).await;
    }
}

#[tokio::test]
async fn test_poll_global_operation_through_global_endpoint() {
    for (level, version) in [(ApiLevel::Production, "v1"), (ApiLevel::Beta, "beta")] {
        let handle = OperationHandle::global("proj", &pending("op-g"), level);
        let expected = format!("/compute/{version}/projects/proj/global/operations/op-g");
        assert_polled_at(handle, &expected).await;
    }
}
