//! HTTP surface tests: route wiring, the bearer guard, and end-to-end flows
//! through the gateway and report endpoints against a mock vendor.

use actix_web::body::MessageBody;
use actix_web::{test, App};
use crmbridge::api::{configure, AppState};
use crmbridge::auth::{InMemoryTokenStore, OAuthClient, TokenStore};
use crmbridge::config::Config;
use crmbridge::crm::{CrmService, EntityGateway};
use crmbridge::mcp::{McpServer, ToolContext, ToolRegistry};
use crmbridge::upstream::UpstreamClient;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(api_token: Option<&str>) -> Config {
    let mut config = Config::empty();
    config.crm.subdomain = "testco".to_string();
    config.crm.access_token = Some("test-token".to_string());
    config.api_token = api_token.map(String::from);
    config
}

fn state_for(server: &MockServer, api_token: Option<&str>) -> AppState {
    let config = Arc::new(test_config(api_token));
    let tokens: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let upstream = Arc::new(
        UpstreamClient::new(config.clone(), tokens.clone())
            .unwrap()
            .with_origin(server.uri()),
    );
    let gateway = Arc::new(EntityGateway::new(upstream.clone(), config.defaults.clone()));
    let service = Arc::new(CrmService::new(upstream, gateway));
    let oauth = Arc::new(OAuthClient::new(config.clone(), tokens.clone()).unwrap());
    let mcp = Arc::new(McpServer::new(
        Arc::new(ToolRegistry::new()),
        ToolContext {
            service: service.clone(),
        },
    ));
    AppState {
        config,
        service,
        tokens,
        oauth,
        mcp,
    }
}

macro_rules! init_app {
    ($state:expr) => {{
        let state = $state;
        test::init_service(App::new().configure(move |cfg| configure(cfg, &state))).await
    }};
}

#[actix_rt::test]
async fn health_is_public() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, Some("sekrit")));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], json!("ok"));
}

#[actix_rt::test]
async fn index_lists_the_surfaces() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, None));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["name"], json!("crmbridge"));
    assert_eq!(body["endpoints"]["mcp_sse"], json!("/mcp/sse"));
}

#[actix_rt::test]
async fn guarded_route_rejects_missing_bearer() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, Some("sekrit")));

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/pipelines").to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/pipelines")
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_rt::test]
async fn entity_gateway_roundtrip_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"leads": [{"id": 42}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = init_app!(state_for(&server, Some("sekrit")));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/entities")
            .insert_header(("Authorization", "Bearer sekrit"))
            .set_json(json!({
                "entity_type": "leads",
                "method": "create",
                "data": {"name": "Test Deal", "price": 5000}
            }))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["_embedded"]["leads"][0]["id"], json!(42));
}

#[actix_rt::test]
async fn invalid_entity_verb_is_a_400() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, None));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/entities")
            .set_json(json!({"entity_type": "leads", "method": "put"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], json!("validation"));
}

#[actix_rt::test]
async fn deals_report_clamps_limit_and_sums_prices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/leads"))
        .and(query_param("limit", "250"))
        .and(query_param("with", "contacts,companies,loss_reason"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"leads": [
                {"id": 1, "price": 5000},
                {"id": 2, "price": 1500.5},
                {"id": 3}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = init_app!(state_for(&server, None));
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/report/deals?limit=500")
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_count"], json!(3));
    assert_eq!(body["total_amount"], json!(6500.5));
}

#[actix_rt::test]
async fn contact_check_exists_reshapes_the_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/contacts"))
        .and(query_param("query", "ivan@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"contacts": [{"id": 77, "name": "Ivan"}]}
        })))
        .mount(&server)
        .await;

    let app = init_app!(state_for(&server, None));
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/contacts/check-exists?query=ivan%40example.com")
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["exists"], json!(true));
    assert_eq!(body["contact_id"], json!(77));
}

#[actix_rt::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/leads/pipelines"))
        .respond_with(ResponseTemplate::new(500).set_body_string("vendor down"))
        .mount(&server)
        .await;

    let app = init_app!(state_for(&server, None));
    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/pipelines").to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 502);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], json!("upstream"));
    assert_eq!(body["upstream_status"], json!(500));
}

#[actix_rt::test]
async fn webhook_receiver_is_public_even_with_a_guard_configured() {
    // The vendor cannot present the proxy's bearer token, so the receiver
    // must accept unauthenticated posts even when api_token is set.
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, Some("sekrit")));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/webhooks/receive")
            .set_json(json!({"leads": {"add": [{"id": 1}]}}))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], json!("accepted"));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/webhooks/receive")
            .set_payload("leads%5Badd%5D%5B0%5D%5Bid%5D=1")
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
}

#[actix_rt::test]
async fn webhook_event_is_relayed_to_sse_subscribers() {
    let server = MockServer::start().await;
    let state = state_for(&server, None);
    let mut notifications = state.mcp.subscribe();
    let app = init_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/webhooks/receive")
            .set_json(json!({"leads": {"add": [{"id": 1}]}}))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let note = notifications.recv().await.unwrap();
    assert_eq!(note["method"], json!("notifications/webhook"));
    assert_eq!(note["params"]["payload"]["leads"]["add"][0]["id"], json!(1));
    assert!(note["params"]["event_id"].is_string());
}

#[actix_rt::test]
async fn sse_stream_opens_with_the_endpoint_event() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, None));

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mcp/sse").to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache");

    // The stream is unbounded; poll only the first frame.
    let mut body = resp.into_parts().1.into_body();
    let first = std::future::poll_fn(|cx| Pin::new(&mut body).poll_next(cx))
        .await
        .unwrap()
        .unwrap();
    let frame = String::from_utf8(first.to_vec()).unwrap();
    assert!(frame.starts_with("event: endpoint"));
    assert!(frame.contains("data: /mcp/messages"));
}

#[actix_rt::test]
async fn sse_stream_requires_the_bearer_when_configured() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, Some("sekrit")));

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mcp/sse").to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_rt::test]
async fn mcp_messages_serves_tools_list() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, None));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/mcp/messages")
            .set_json(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 24);
    assert!(tools.iter().any(|t| t["name"] == json!("crm_request")));
}

#[actix_rt::test]
async fn mcp_notification_returns_202() {
    let server = MockServer::start().await;
    let app = init_app!(state_for(&server, None));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/mcp/messages")
            .set_json(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 202);
}

#[actix_rt::test]
async fn mcp_tool_call_hits_the_vendor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/contacts"))
        .and(query_param("query", "ivan@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"contacts": [{"id": 7}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = init_app!(state_for(&server, None));
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/mcp/messages")
            .set_json(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {
                    "name": "search_contact",
                    "arguments": {"query": "ivan@example.com"}
                }
            }))
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["id"], json!(9));
    assert_eq!(body["result"]["isError"], json!(false));
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("\"id\": 7"));
}
