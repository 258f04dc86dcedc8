//! Generic entity operations funneled onto single upstream calls
//!
//! Every endpoint and tool that touches a vendor collection reduces to an
//! [`EntityRequest`]; the gateway turns one request into exactly one upstream
//! call, normalizing payload shape along the way.

use crate::config::EntityDefaults;
use crate::error::{ProxyError, Result};
use crate::upstream::{UpstreamClient, UpstreamMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Vendor resource categories this proxy forwards
pub const ENTITY_TYPES: &[&str] = &[
    "leads",
    "leads/complex",
    "contacts",
    "companies",
    "tasks",
    "customers",
];

/// Root of the vendor's entity collections
pub const ENTITIES_ROOT: &str = "/api/v4";

/// The canonical internal request shape all endpoints funnel into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRequest {
    /// Vendor resource category (must be on the allow-list)
    pub entity_type: String,
    /// Operation verb: get, create/post, update/patch, delete
    pub method: String,
    /// Target record id (required for update/delete)
    #[serde(default)]
    pub entity_id: Option<i64>,
    /// Payload for create/update; object or array of objects
    #[serde(default)]
    pub data: Option<Value>,
    /// Query parameters passed through verbatim (bracket keys intact)
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

/// Parsed operation verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityMethod {
    Get,
    Create,
    Update,
    Delete,
}

impl EntityMethod {
    /// Parse a verb, accepting the raw HTTP spellings the original callers use
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "get" => Ok(EntityMethod::Get),
            "create" | "post" => Ok(EntityMethod::Create),
            "update" | "patch" => Ok(EntityMethod::Update),
            "delete" => Ok(EntityMethod::Delete),
            other => Err(ProxyError::validation(format!(
                "Unsupported method: {} (expected get/create/update/delete)",
                other
            ))),
        }
    }
}

/// Wrap a single object into the one-element list the vendor expects
pub fn normalize_payload(data: Value) -> Value {
    match data {
        Value::Array(_) => data,
        other => Value::Array(vec![other]),
    }
}

/// Whether a leads payload needs the vendor's atomic parent+child endpoint
pub fn needs_complex_creation(items: &Value) -> bool {
    let Some(items) = items.as_array() else {
        return false;
    };
    items.iter().any(|item| {
        item.get("_embedded").is_some() || item.get("custom_fields_values").is_some()
    })
}

/// Inject configured fallback ids into a lead item when the caller omits them
pub fn apply_lead_defaults(item: &mut Value, defaults: &EntityDefaults) {
    let Some(object) = item.as_object_mut() else {
        return;
    };
    if let Some(pipeline_id) = defaults.pipeline_id {
        object
            .entry("pipeline_id")
            .or_insert_with(|| Value::from(pipeline_id));
    }
    if let Some(status_id) = defaults.status_id {
        object
            .entry("status_id")
            .or_insert_with(|| Value::from(status_id));
    }
    if let Some(user_id) = defaults.responsible_user_id {
        object
            .entry("responsible_user_id")
            .or_insert_with(|| Value::from(user_id));
    }
}

/// Maps one [`EntityRequest`] onto one upstream call
pub struct EntityGateway {
    upstream: Arc<UpstreamClient>,
    defaults: EntityDefaults,
}

impl EntityGateway {
    pub fn new(upstream: Arc<UpstreamClient>, defaults: EntityDefaults) -> Self {
        Self { upstream, defaults }
    }

    fn validate_entity_type(entity_type: &str) -> Result<()> {
        if ENTITY_TYPES.contains(&entity_type) {
            return Ok(());
        }
        Err(ProxyError::validation(format!(
            "Unknown entity type: {} (expected one of {})",
            entity_type,
            ENTITY_TYPES.join(", ")
        )))
    }

    fn collection_path(entity_type: &str) -> String {
        format!("{}/{}", ENTITIES_ROOT, entity_type)
    }

    fn item_path(entity_type: &str, entity_id: i64) -> String {
        format!("{}/{}/{}", ENTITIES_ROOT, entity_type, entity_id)
    }

    /// Handle an entity request, issuing exactly one upstream call
    pub async fn handle(&self, request: EntityRequest, session: Option<&str>) -> Result<Value> {
        Self::validate_entity_type(&request.entity_type)?;
        let method = EntityMethod::parse(&request.method)?;
        debug!(
            "Entity gateway: {:?} {} (id: {:?})",
            method, request.entity_type, request.entity_id
        );

        match method {
            EntityMethod::Get => {
                let path = match request.entity_id {
                    Some(id) => Self::item_path(&request.entity_type, id),
                    None => Self::collection_path(&request.entity_type),
                };
                self.upstream
                    .request(
                        UpstreamMethod::Get,
                        &path,
                        None,
                        request.params.as_ref(),
                        None,
                        session,
                    )
                    .await
            }
            EntityMethod::Create => {
                let data = request.data.ok_or_else(|| {
                    ProxyError::validation("create requires a data payload")
                })?;
                let mut items = normalize_payload(data);

                let mut entity_type = request.entity_type.clone();
                if entity_type == "leads" || entity_type == "leads/complex" {
                    if let Some(array) = items.as_array_mut() {
                        for item in array.iter_mut() {
                            apply_lead_defaults(item, &self.defaults);
                        }
                    }
                    // Embedded sub-entities require the vendor's atomic
                    // parent+child creation endpoint.
                    if entity_type == "leads" && needs_complex_creation(&items) {
                        entity_type = "leads/complex".to_string();
                    }
                }

                self.upstream
                    .request(
                        UpstreamMethod::Post,
                        &Self::collection_path(&entity_type),
                        Some(&items),
                        None,
                        None,
                        session,
                    )
                    .await
            }
            EntityMethod::Update => {
                let entity_id = request.entity_id.ok_or_else(|| {
                    ProxyError::validation("update requires entity_id")
                })?;
                let data = request.data.ok_or_else(|| {
                    ProxyError::validation("update requires a data payload")
                })?;
                let items = normalize_payload(data);
                self.upstream
                    .request(
                        UpstreamMethod::Patch,
                        &Self::item_path(&request.entity_type, entity_id),
                        Some(&items),
                        None,
                        None,
                        session,
                    )
                    .await
            }
            EntityMethod::Delete => {
                let entity_id = request.entity_id.ok_or_else(|| {
                    ProxyError::validation("delete requires entity_id")
                })?;
                self.upstream
                    .request(
                        UpstreamMethod::Delete,
                        &Self::item_path(&request.entity_type, entity_id),
                        None,
                        None,
                        None,
                        session,
                    )
                    .await
            }
        }
    }
}
