//! Entity gateway integration tests
//!
//! Each test mounts a mock vendor API and verifies the gateway issues exactly
//! the upstream call the operation maps to: payload wrapping, default
//! injection, complex-creation routing, and validation short-circuits.

use crmbridge::auth::{InMemoryTokenStore, TokenStore};
use crmbridge::config::{Config, EntityDefaults};
use crmbridge::crm::{EntityGateway, EntityRequest};
use crmbridge::upstream::UpstreamClient;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Config {
    let mut config = Config::empty();
    config.crm.subdomain = "testco".to_string();
    config.crm.access_token = Some("test-token".to_string());
    config
}

fn gateway_for(server: &MockServer, defaults: EntityDefaults) -> EntityGateway {
    let config = Arc::new(test_config());
    let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let upstream = UpstreamClient::new(config, store)
        .unwrap()
        .with_origin(server.uri());
    EntityGateway::new(Arc::new(upstream), defaults)
}

fn create_request(entity_type: &str, data: serde_json::Value) -> EntityRequest {
    EntityRequest {
        entity_type: entity_type.to_string(),
        method: "create".to_string(),
        entity_id: None,
        data: Some(data),
        params: None,
    }
}

#[tokio::test]
async fn create_wraps_single_object_into_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/leads"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_json(json!([{"name": "Test Deal", "price": 5000}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"leads": [{"id": 101, "name": "Test Deal"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, EntityDefaults::default());
    let result = gateway
        .handle(
            create_request("leads", json!({"name": "Test Deal", "price": 5000})),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result["_embedded"]["leads"][0]["id"], json!(101));
}

#[tokio::test]
async fn create_keeps_list_payloads_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/contacts"))
        .and(body_json(json!([{"name": "a"}, {"name": "b"}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, EntityDefaults::default());
    gateway
        .handle(
            create_request("contacts", json!([{"name": "a"}, {"name": "b"}])),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn lead_defaults_are_injected_without_overriding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/leads"))
        .and(body_json(json!([{
            "name": "Deal",
            "pipeline_id": 99,
            "status_id": 7
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let defaults = EntityDefaults {
        pipeline_id: Some(3),
        status_id: Some(7),
        responsible_user_id: None,
    };
    let gateway = gateway_for(&server, defaults);
    gateway
        .handle(
            create_request("leads", json!({"name": "Deal", "pipeline_id": 99})),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn embedded_contacts_route_to_complex_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/leads/complex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 5}])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, EntityDefaults::default());
    gateway
        .handle(
            create_request(
                "leads",
                json!({
                    "name": "Deal",
                    "_embedded": {"contacts": [{"name": "Ivan"}]}
                }),
            ),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn update_wraps_payload_and_issues_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v4/leads/42"))
        .and(body_json(json!([{"price": 7000}])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, EntityDefaults::default());
    gateway
        .handle(
            EntityRequest {
                entity_type: "leads".to_string(),
                method: "update".to_string(),
                entity_id: Some(42),
                data: Some(json!({"price": 7000})),
                params: None,
            },
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn update_without_id_fails_before_any_upstream_call() {
    let server = MockServer::start().await;
    // No mocks mounted: an upstream call would 404 inside wiremock and the
    // error category would read "not_found" instead of "validation".
    let gateway = gateway_for(&server, EntityDefaults::default());
    let err = gateway
        .handle(
            EntityRequest {
                entity_type: "leads".to_string(),
                method: "update".to_string(),
                entity_id: None,
                data: Some(json!({"name": "x"})),
                params: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");
}

#[tokio::test]
async fn delete_maps_204_to_deleted_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v4/leads/123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, EntityDefaults::default());
    let result = gateway
        .handle(
            EntityRequest {
                entity_type: "leads".to_string(),
                method: "delete".to_string(),
                entity_id: Some(123),
                data: None,
                params: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(result["status"], json!("deleted"));
    assert_eq!(result["code"], json!(204));
}

#[tokio::test]
async fn delete_of_missing_record_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v4/leads/123"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, EntityDefaults::default());
    let err = gateway
        .handle(
            EntityRequest {
                entity_type: "leads".to_string(),
                method: "delete".to_string(),
                entity_id: Some(123),
                data: None,
                params: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), "not_found");
}

#[tokio::test]
async fn unknown_entity_type_is_rejected() {
    let server = MockServer::start().await;
    let gateway = gateway_for(&server, EntityDefaults::default());
    let err = gateway
        .handle(create_request("invoices", json!({"name": "x"})), None)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "validation");
}
