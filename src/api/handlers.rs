//! REST handlers
//!
//! Thin adapters: guard the route, pull the session id, hand off to the
//! gateway or service, and let `ProxyError`'s `ResponseError` impl shape
//! failures.

use crate::auth::{require_api_token, session_id, OAuthClient, TokenStore};
use crate::config::Config;
use crate::crm::{
    ContactQuery, CrmService, EntityRequest, EventsQuery, FilterParams, GetOrCreateContact,
    ReportQuery, SmartCreateRequest, TaskCreate, TasksQuery,
};
use crate::error::ProxyError;
use crate::mcp::McpServer;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

type HandlerResult = Result<HttpResponse, ProxyError>;

#[derive(Debug, Deserialize)]
pub struct WithQuery {
    pub with: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PipelinesQuery {
    pub pipeline_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ContactsListQuery {
    pub query: Option<String>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    #[allow(dead_code)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenExchangeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
    pub session_id: Option<String>,
}

/// GET / : service banner (public)
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "name": "crmbridge",
        "version": crate::VERSION,
        "endpoints": {
            "entities": "/api/entities",
            "mcp_sse": "/mcp/sse",
            "mcp_messages": "/mcp/messages",
            "health": "/health",
        }
    }))
}

/// GET /health (public)
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/account
pub async fn account(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<WithQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service.account(query.with.as_deref(), session.as_deref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/entities : the generic gateway
pub async fn entities(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    request: web::Json<EntityRequest>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .gateway()
        .handle(request.into_inner(), session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// DELETE /api/entities/{entity_type}/{id} : direct deletion shortcut
pub async fn delete_entity(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    path: web::Path<(String, i64)>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let (entity_type, entity_id) = path.into_inner();
    let result = service
        .gateway()
        .handle(
            EntityRequest {
                entity_type,
                method: "delete".to_string(),
                entity_id: Some(entity_id),
                data: None,
                params: None,
            },
            session.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/pipelines
pub async fn pipelines(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<PipelinesQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service.pipelines(query.pipeline_id, session.as_deref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/users
pub async fn users(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<UsersQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service.users(query.user_id, session.as_deref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/custom_fields/{entity_type}
pub async fn custom_fields(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    path: web::Path<String>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .custom_fields(&path.into_inner(), session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/events
pub async fn events(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<EventsQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service.events(query.into_inner(), session.as_deref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/tasks
pub async fn tasks(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<TasksQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service.tasks(query.into_inner(), session.as_deref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/tasks
pub async fn create_task(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    task: web::Json<TaskCreate>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .create_task(task.into_inner(), session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/contacts : listing, optionally filtered by free text
pub async fn contacts(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<ContactsListQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let query = query.into_inner();
    let params = FilterParams::new()
        .opt("query", query.query)
        .opt("page", query.page)
        .limit(query.limit)
        .build();
    let result = service
        .gateway()
        .handle(
            EntityRequest {
                entity_type: "contacts".to_string(),
                method: "get".to_string(),
                entity_id: None,
                data: None,
                params: Some(params),
            },
            session.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/contacts/search
pub async fn contact_search(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<ContactQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let query = query.into_inner();
    let result = service
        .contact_search(&query.query, query.limit, session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/contacts/check-exists
pub async fn contact_check_exists(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<ExistsQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .contact_check_exists(&query.query, session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/contacts/get-or-create
pub async fn contact_get_or_create(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    input: web::Json<GetOrCreateContact>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .contact_get_or_create(input.into_inner(), session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/contacts/smart-create-lead
pub async fn smart_create_lead(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    input: web::Json<SmartCreateRequest>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .smart_create_client_and_lead(input.into_inner(), session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/notes/{entity_type}/{entity_id}
pub async fn notes(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    path: web::Path<(String, i64)>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let (entity_type, entity_id) = path.into_inner();
    let result = service
        .notes(&entity_type, entity_id, session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/report/deals
pub async fn deals_report(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    service: web::Data<Arc<CrmService>>,
    query: web::Query<ReportQuery>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let session = session_id(&req);
    let result = service
        .deals_report(query.into_inner(), session.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /webhooks/receive : vendor event sink (public)
///
/// The vendor cannot present the proxy's inbound bearer token, so this route
/// carries no guard; any body shape (JSON or form-encoded) is accepted and
/// logged so a malformed payload cannot make the vendor disable the
/// subscription. Each event is re-broadcast to connected SSE subscribers.
pub async fn webhook_receive(
    mcp: web::Data<Arc<McpServer>>,
    body: web::Bytes,
) -> HandlerResult {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => json!({ "raw": String::from_utf8_lossy(&body) }),
    };

    let event_id = Uuid::new_v4().to_string();
    info!(
        "Webhook received: id={} bytes={} keys={:?}",
        event_id,
        body.len(),
        payload
            .as_object()
            .map(|o| o.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default()
    );

    mcp.notify(json!({
        "jsonrpc": "2.0",
        "method": "notifications/webhook",
        "params": { "event_id": event_id, "payload": payload },
    }));

    Ok(HttpResponse::Ok().json(json!({
        "status": "accepted",
        "event_id": event_id,
    })))
}

/// GET /auth/authorize : redirect to the vendor consent page (public)
pub async fn authorize(
    oauth: web::Data<Arc<OAuthClient>>,
    query: web::Query<AuthorizeQuery>,
) -> HandlerResult {
    let state = query
        .into_inner()
        .state
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let url = oauth.authorize_url(&state)?;
    Ok(HttpResponse::Found()
        .insert_header(("Location", url))
        .finish())
}

/// GET /callback : vendor redirect target after consent (public)
pub async fn callback(
    oauth: web::Data<Arc<OAuthClient>>,
    query: web::Query<CallbackQuery>,
) -> HandlerResult {
    let grant = oauth.exchange_code(&query.code).await?;
    Ok(HttpResponse::Ok().json(grant))
}

/// POST /auth/token : explicit code exchange
pub async fn token_exchange(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    oauth: web::Data<Arc<OAuthClient>>,
    input: web::Json<TokenExchangeRequest>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let grant = oauth.exchange_code(&input.code).await?;
    Ok(HttpResponse::Ok().json(grant))
}

/// POST /auth/refresh : refresh by token or by existing session
pub async fn token_refresh(
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    oauth: web::Data<Arc<OAuthClient>>,
    store: web::Data<Arc<dyn TokenStore>>,
    input: web::Json<RefreshRequest>,
) -> HandlerResult {
    require_api_token(&req, &config)?;
    let input = input.into_inner();

    let refresh_token = match (input.refresh_token, input.session_id) {
        (Some(token), _) => token,
        (None, Some(session)) => {
            let credential = store.get(&session).await.ok_or_else(|| {
                warn!("Refresh requested for unknown session {}", session);
                ProxyError::not_found(format!("Unknown session: {}", session))
            })?;
            credential.refresh_token
        }
        (None, None) => {
            return Err(ProxyError::validation(
                "Either refresh_token or session_id is required",
            ))
        }
    };

    let grant = oauth.exchange_refresh(&refresh_token).await?;
    Ok(HttpResponse::Ok().json(grant))
}
