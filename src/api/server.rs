//! HTTP server assembly: shared state wiring and the route table

use crate::api::handlers;
use crate::auth::{OAuthClient, TokenStore};
use crate::config::Config;
use crate::crm::CrmService;
use crate::mcp::{messages_handler, sse_handler, McpServer};
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::info;

/// Everything the handlers need, registered as individual `web::Data` items
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<CrmService>,
    pub tokens: Arc<dyn TokenStore>,
    pub oauth: Arc<OAuthClient>,
    pub mcp: Arc<McpServer>,
}

/// Register every route on an `App`; shared between the binary and tests
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.config.clone()))
        .app_data(web::Data::new(state.service.clone()))
        .app_data(web::Data::new(state.tokens.clone()))
        .app_data(web::Data::new(state.oauth.clone()))
        .app_data(web::Data::new(state.mcp.clone()))
        // Public routes
        .route("/", web::get().to(handlers::index))
        .route("/health", web::get().to(handlers::health))
        .route("/auth/authorize", web::get().to(handlers::authorize))
        .route("/callback", web::get().to(handlers::callback))
        // Token management
        .route("/auth/token", web::post().to(handlers::token_exchange))
        .route("/auth/refresh", web::post().to(handlers::token_refresh))
        // Entity gateway
        .route("/api/entities", web::post().to(handlers::entities))
        .route(
            "/api/entities/{entity_type}/{id}",
            web::delete().to(handlers::delete_entity),
        )
        // Resource endpoints
        .route("/api/account", web::get().to(handlers::account))
        .route("/api/pipelines", web::get().to(handlers::pipelines))
        .route("/api/users", web::get().to(handlers::users))
        .route(
            "/api/custom_fields/{entity_type}",
            web::get().to(handlers::custom_fields),
        )
        .route("/api/events", web::get().to(handlers::events))
        .route("/api/tasks", web::get().to(handlers::tasks))
        .route("/api/tasks", web::post().to(handlers::create_task))
        .route("/api/contacts", web::get().to(handlers::contacts))
        .route("/api/contacts/search", web::get().to(handlers::contact_search))
        .route(
            "/api/contacts/check-exists",
            web::get().to(handlers::contact_check_exists),
        )
        .route(
            "/api/contacts/get-or-create",
            web::post().to(handlers::contact_get_or_create),
        )
        .route(
            "/api/contacts/smart-create-lead",
            web::post().to(handlers::smart_create_lead),
        )
        .route(
            "/api/notes/{entity_type}/{entity_id}",
            web::get().to(handlers::notes),
        )
        .route("/api/report/deals", web::get().to(handlers::deals_report))
        // Webhook sink (public, the vendor cannot present our bearer token)
        .route("/webhooks/receive", web::post().to(handlers::webhook_receive))
        // MCP transports
        .route("/mcp/sse", web::get().to(sse_handler))
        .route("/mcp/messages", web::post().to(messages_handler));
}

/// HTTP API server
pub struct HttpApiServer {
    state: AppState,
}

impl HttpApiServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind and run until shutdown
    pub async fn start(self) -> std::io::Result<()> {
        let host = self.state.config.server.host.clone();
        let port = self.state.config.server.port;
        info!("Starting HTTP server on {}:{}", host, port);

        let state = self.state;
        HttpServer::new(move || {
            let state = state.clone();
            App::new().configure(move |cfg| configure(cfg, &state))
        })
        .bind((host.as_str(), port))?
        .run()
        .await
    }
}
