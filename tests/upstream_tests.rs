//! Upstream client integration tests: token resolution, query encoding on
//! the wire, and response normalization against a mock vendor.

use crmbridge::auth::{Credential, InMemoryTokenStore, TokenStore};
use crmbridge::config::Config;
use crmbridge::upstream::{UpstreamClient, UpstreamMethod};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Config {
    let mut config = Config::empty();
    config.crm.subdomain = "testco".to_string();
    config.crm.access_token = Some("configured-token".to_string());
    config
}

fn client_for(server: &MockServer, store: Arc<dyn TokenStore>) -> UpstreamClient {
    UpstreamClient::new(Arc::new(test_config()), store)
        .unwrap()
        .with_origin(server.uri())
}

fn client(server: &MockServer) -> UpstreamClient {
    client_for(server, Arc::new(InMemoryTokenStore::new()))
}

#[tokio::test]
async fn configured_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/account"))
        .and(header("Authorization", "Bearer configured-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .request(UpstreamMethod::Get, "/api/v4/account", None, None, None, None)
        .await
        .unwrap();
    assert_eq!(result["id"], json!(1));
}

#[tokio::test]
async fn session_credential_wins_over_configured_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/account"))
        .and(header("Authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    store
        .put(
            "s1",
            Credential::new("session-token".to_string(), "refresh".to_string(), 3600),
        )
        .await;

    client_for(&server, store)
        .request(
            UpstreamMethod::Get,
            "/api/v4/account",
            None,
            None,
            None,
            Some("s1"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_session_is_an_auth_error() {
    let server = MockServer::start().await;
    let err = client(&server)
        .request(
            UpstreamMethod::Get,
            "/api/v4/account",
            None,
            None,
            None,
            Some("ghost"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), "auth");
}

#[tokio::test]
async fn bracket_filter_keys_survive_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/events"))
        .and(query_param("filter[type][0]", "lead_added"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = Map::new();
    params.insert("filter[type][0]".to_string(), Value::from("lead_added"));
    params.insert("limit".to_string(), Value::from(50));

    client(&server)
        .request(
            UpstreamMethod::Get,
            "/api/v4/events",
            None,
            Some(&params),
            None,
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn get_204_normalizes_to_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/leads"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = client(&server)
        .request(UpstreamMethod::Get, "/api/v4/leads", None, None, None, None)
        .await
        .unwrap();
    assert_eq!(result["status"], json!("no_content"));
}

#[tokio::test]
async fn vendor_404_becomes_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/leads/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server)
        .request(UpstreamMethod::Get, "/api/v4/leads/999", None, None, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "not_found");
}

#[tokio::test]
async fn vendor_error_status_carries_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/leads"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
        .mount(&server)
        .await;

    let err = client(&server)
        .request(
            UpstreamMethod::Post,
            "/api/v4/leads",
            Some(&json!([{"name": 1}])),
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
    match err {
        crmbridge::ProxyError::Upstream { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("bad payload"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_json_success_body_is_wrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let result = client(&server)
        .request(UpstreamMethod::Get, "/api/v4/ping", None, None, None, None)
        .await
        .unwrap();
    assert_eq!(result["code"], json!(200));
    assert_eq!(result["text"], json!("pong"));
}
