//! Exercises the HTTP client against a local axum server that records every
//! request it receives.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use dps_provisioning::{
    AddAllowedAddressRequest, AllowlistStatus, CreateConfigRequest, ProvisioningClient,
    ProvisioningError, ProvisioningErrorKind, ServiceStatus, UpdateServiceRequest,
};
use dps_provisioning_http::{ClientOptions, HttpProvisioningClient};
use parking_lot::Mutex;
use url::Url;

#[derive(Clone, Debug)]
struct Recorded {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: String,
}

type Responder = fn(&Method, &str) -> (StatusCode, String);

#[derive(Clone)]
struct TestState {
    recorded: Arc<Mutex<Vec<Recorded>>>,
    responder: Responder,
}

async fn handle(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let (status, response) = (state.responder)(&method, uri.path());
    state.recorded.lock().push(Recorded {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(ToString::to_string),
        headers,
        body,
    });
    (status, [(header::CONTENT_TYPE, "application/json")], response)
}

async fn serve(responder: Responder) -> (Url, Arc<Mutex<Vec<Recorded>>>) {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(handle).with_state(TestState {
        recorded: recorded.clone(),
        responder,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}")).unwrap(), recorded)
}

fn ok_service(_: &Method, _: &str) -> (StatusCode, String) {
    (
        StatusCode::OK,
        r#"{"id":"svc-123","name":"test","status":"ready","config_id":"cfg-1"}"#.to_string(),
    )
}

fn accepted(_: &Method, _: &str) -> (StatusCode, String) {
    (StatusCode::ACCEPTED, String::new())
}

#[tokio::test]
async fn test_api_key_and_org_headers_sent_on_every_request() {
    let (url, recorded) = serve(ok_service).await;
    let client =
        HttpProvisioningClient::new(ClientOptions::new(url, "my-secret-key").with_org_id("org-multi"))
            .unwrap();

    client.get_service("svc-123").await.unwrap();
    client.delete_service("svc-123").await.unwrap();

    let recorded = recorded.lock();
    assert_eq!(recorded.len(), 2);
    for request in recorded.iter() {
        assert_eq!(request.headers.get("x-api-key").unwrap(), "my-secret-key");
        assert_eq!(request.headers.get("x-mdb-org").unwrap(), "org-multi");
    }
}

#[tokio::test]
async fn test_org_header_absent_when_not_configured() {
    let (url, recorded) = serve(ok_service).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    client.get_service("svc-123").await.unwrap();

    let recorded = recorded.lock();
    assert!(recorded[0].headers.get("x-mdb-org").is_none());
}

#[tokio::test]
async fn test_get_service_decodes_status_and_config() {
    let (url, recorded) = serve(ok_service).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let service = client.get_service("svc-123").await.unwrap();

    assert_eq!(service.status, ServiceStatus::Ready);
    assert_eq!(service.attached_config_id(), Some("cfg-1"));
    let recorded = recorded.lock();
    assert_eq!(recorded[0].method, Method::GET);
    assert_eq!(recorded[0].path, "/provisioning/v1/services/svc-123");
}

#[tokio::test]
async fn test_set_value_carries_allow_restart_and_body() {
    let (url, recorded) = serve(accepted).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    client
        .set_config_value("cfg-1", "max_connections", "1000", true)
        .await
        .unwrap();
    client
        .unset_config_value("cfg-1", "wait_timeout", false)
        .await
        .unwrap();

    let recorded = recorded.lock();
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].path, "/provisioning/v1/configs/cfg-1/values/max_connections");
    assert_eq!(recorded[0].query.as_deref(), Some("allow_restart=true"));
    let body: serde_json::Value = serde_json::from_str(&recorded[0].body).unwrap();
    assert_eq!(body, serde_json::json!({ "value": "1000" }));

    assert_eq!(recorded[1].method, Method::DELETE);
    assert_eq!(recorded[1].path, "/provisioning/v1/configs/cfg-1/values/wait_timeout");
    assert_eq!(recorded[1].query.as_deref(), Some("allow_restart=false"));
}

#[tokio::test]
async fn test_apply_and_remove_service_config() {
    let (url, recorded) = serve(accepted).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    client.apply_service_config("svc-1", "cfg-9").await.unwrap();
    client.remove_service_config("svc-1").await.unwrap();

    let recorded = recorded.lock();
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].path, "/provisioning/v1/services/svc-1/config");
    let body: serde_json::Value = serde_json::from_str(&recorded[0].body).unwrap();
    assert_eq!(body, serde_json::json!({ "config_id": "cfg-9" }));
    assert_eq!(recorded[1].method, Method::DELETE);
    assert_eq!(recorded[1].path, "/provisioning/v1/services/svc-1/config");
}

#[tokio::test]
async fn test_update_service_sends_only_changed_fields() {
    let (url, recorded) = serve(ok_service).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let request = UpdateServiceRequest {
        storage: Some(200),
        volume_iops: Some(3000),
        ..UpdateServiceRequest::default()
    };
    client.update_service("svc-123", &request).await.unwrap();

    let recorded = recorded.lock();
    assert_eq!(recorded[0].method, Method::PATCH);
    let body: serde_json::Value = serde_json::from_str(&recorded[0].body).unwrap();
    assert_eq!(body, serde_json::json!({ "storage": 200, "volume_iops": 3000 }));
}

#[tokio::test]
async fn test_catalog_fetch_passes_version_query() {
    fn catalog(_: &Method, _: &str) -> (StatusCode, String) {
        (
            StatusCode::OK,
            r#"[{"name":"max_connections","requires_restart":false},
                {"name":"innodb_buffer_pool_size","tags":null,"allowed_values":null,
                 "default_value":null,"requires_restart":true}]"#
                .to_string(),
        )
    }

    let (url, recorded) = serve(catalog).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let keys = client.get_config_keys("es-single", "10.6.11-6-1").await.unwrap();

    assert_eq!(keys.len(), 2);
    assert!(keys[1].requires_restart);
    let recorded = recorded.lock();
    assert_eq!(recorded[0].path, "/provisioning/v1/topologies/es-single/configs");
    assert_eq!(recorded[0].query.as_deref(), Some("version=10.6.11-6-1"));
}

#[tokio::test]
async fn test_create_config_body() {
    fn created(_: &Method, _: &str) -> (StatusCode, String) {
        (
            StatusCode::CREATED,
            r#"{"id":"cfg-1","name":"tuned","topology_id":"t-1","version_id":"v-1"}"#.to_string(),
        )
    }

    let (url, recorded) = serve(created).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let config = client
        .create_config(&CreateConfigRequest {
            name: "tuned".to_string(),
            topology: "es-single".to_string(),
            version: "10.6.11-6-1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(config.topology_id, "t-1");
    let body: serde_json::Value = serde_json::from_str(&recorded.lock()[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "name": "tuned", "topology": "es-single", "version": "10.6.11-6-1" })
    );
}

#[tokio::test]
async fn test_allowlist_add_list_and_remove() {
    fn allowlist(method: &Method, _: &str) -> (StatusCode, String) {
        match *method {
            Method::POST => (
                StatusCode::CREATED,
                r#"{"ip_address":"203.0.113.7/32","comment":"office","status":"Pending"}"#
                    .to_string(),
            ),
            Method::GET => (
                StatusCode::OK,
                r#"[{"ip_address":"203.0.113.7/32","status":"Enforcing"}]"#.to_string(),
            ),
            _ => (StatusCode::NO_CONTENT, String::new()),
        }
    }

    let (url, recorded) = serve(allowlist).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let added = client
        .add_allowed_address(
            "svc-1",
            &AddAllowedAddressRequest {
                ip_address: "203.0.113.7/32".to_string(),
                comment: Some("office".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(added.status, AllowlistStatus::Pending);

    let entries = client.list_allowed_addresses("svc-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AllowlistStatus::Enforcing);

    client
        .remove_allowed_address("svc-1", "203.0.113.7/32")
        .await
        .unwrap();

    let recorded = recorded.lock();
    assert_eq!(recorded[0].method, Method::POST);
    assert_eq!(recorded[0].path, "/provisioning/v1/services/svc-1/security/allowlist");
    let body: serde_json::Value = serde_json::from_str(&recorded[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "ip_address": "203.0.113.7/32", "comment": "office" })
    );
    assert_eq!(recorded[1].method, Method::GET);
    assert_eq!(recorded[1].path, "/provisioning/v1/services/svc-1/security/allowlist");
    assert_eq!(recorded[2].method, Method::DELETE);
    assert_eq!(
        recorded[2].path,
        "/provisioning/v1/services/svc-1/security/allowlist/203.0.113.7%2F32"
    );
}

#[tokio::test]
async fn test_default_credentials() {
    fn credentials(_: &Method, _: &str) -> (StatusCode, String) {
        (
            StatusCode::OK,
            r#"{"username":"dbpgf00001","password":"s3cret"}"#.to_string(),
        )
    }

    let (url, recorded) = serve(credentials).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let credentials = client.get_default_credentials("svc-1").await.unwrap();

    assert_eq!(credentials.username, "dbpgf00001");
    assert_eq!(credentials.password, "s3cret");
    assert_eq!(
        recorded.lock()[0].path,
        "/provisioning/v1/services/svc-1/security/credentials"
    );
}

#[tokio::test]
async fn test_not_found_and_rejected_statuses_are_classified() {
    fn status_by_path(_: &Method, path: &str) -> (StatusCode, String) {
        if path.ends_with("missing") {
            (StatusCode::NOT_FOUND, r#"{"code":404}"#.to_string())
        } else {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"errors":[{"message":"variable requires restart"}]}"#.to_string(),
            )
        }
    }

    let (url, _) = serve(status_by_path).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let missing = client.get_service("missing").await.unwrap_err();
    assert!(missing.is_not_found());

    let rejected = client
        .set_config_value("cfg-1", "innodb_buffer_pool_size", "4G", false)
        .await
        .unwrap_err();
    assert_eq!(rejected.kind(), ProvisioningErrorKind::Rejected { status: 422 });
    assert!(rejected.to_string().contains("variable requires restart"));
}

#[tokio::test]
async fn test_connection_failure_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}")).unwrap();
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let error = client.get_service("svc-1").await.unwrap_err();
    assert_eq!(error.kind(), ProvisioningErrorKind::Unreachable);
    assert!(error.kind().is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    fn garbage(_: &Method, _: &str) -> (StatusCode, String) {
        (StatusCode::OK, "not json".to_string())
    }

    let (url, _) = serve(garbage).await;
    let client = HttpProvisioningClient::new(ClientOptions::new(url, "key")).unwrap();

    let error = client.get_service("svc-1").await.unwrap_err();
    assert_eq!(error.kind(), ProvisioningErrorKind::Decode);
}
