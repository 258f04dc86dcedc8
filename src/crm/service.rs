//! Resource-specific operations over the vendor API
//!
//! Thin specializations that pre-fill query parameters via the shared
//! [`FilterParams`] builder and post-process the handful of responses that
//! need reshaping (deal report summaries, contact existence checks, the
//! sequential contact/lead macros).

use crate::crm::gateway::{EntityGateway, EntityRequest};
use crate::crm::params::{parse_timestamp, FilterParams};
use crate::error::{ProxyError, Result};
use crate::upstream::{UpstreamClient, UpstreamMethod};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Entity types that carry custom field definitions and notes
const FIELDED_ENTITY_TYPES: &[&str] = &["leads", "contacts", "companies", "customers"];

/// Events endpoint filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated event type list
    #[serde(rename = "type")]
    pub event_types: Option<String>,
    /// Unix seconds or ISO-8601
    pub date_from: Option<String>,
    /// Unix seconds or ISO-8601
    pub date_to: Option<String>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
}

/// Task listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
}

/// Task creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreate {
    pub text: String,
    pub entity_id: i64,
    pub entity_type: String,
    pub task_type_id: Option<i64>,
    /// Unix deadline; defaults to 24h from now
    pub complete_till: Option<i64>,
}

/// Contact search input
#[derive(Debug, Clone, Deserialize)]
pub struct ContactQuery {
    /// Email, phone, or free text
    pub query: String,
    pub limit: Option<u64>,
}

/// Get-or-create contact input
#[derive(Debug, Clone, Deserialize)]
pub struct GetOrCreateContact {
    pub query: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Smart client+lead creation input
#[derive(Debug, Clone, Deserialize)]
pub struct SmartCreateRequest {
    pub contact_query: String,
    pub contact_name: String,
    pub lead_name: String,
    pub lead_price: Option<f64>,
    /// When true, skip lead creation if the contact already has leads
    #[serde(default)]
    pub check_open_leads: bool,
}

/// Deals report filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub query: Option<String>,
    pub created_at_from: Option<String>,
    pub created_at_to: Option<String>,
    pub updated_at_from: Option<String>,
    pub status_id: Option<i64>,
    pub pipeline_id: Option<i64>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
}

/// Items embedded under `_embedded.{kind}` in a vendor response
pub fn embedded<'a>(value: &'a Value, kind: &str) -> &'a [Value] {
    value
        .get("_embedded")
        .and_then(|e| e.get(kind))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Count returned leads and sum their `price` fields
pub fn summarize_leads(leads: &[Value]) -> (usize, f64) {
    let total: f64 = leads
        .iter()
        .filter_map(|lead| lead.get("price").and_then(Value::as_f64))
        .sum();
    (leads.len(), total)
}

/// Vendor custom-field entry for a contact email/phone
fn contact_custom_field(code: &str, value: &str) -> Value {
    json!({
        "field_code": code,
        "values": [{"value": value, "enum_code": "WORK"}]
    })
}

/// Resource-specific endpoint logic shared by the REST surface and MCP tools
pub struct CrmService {
    upstream: Arc<UpstreamClient>,
    gateway: Arc<EntityGateway>,
}

impl CrmService {
    pub fn new(upstream: Arc<UpstreamClient>, gateway: Arc<EntityGateway>) -> Self {
        Self { upstream, gateway }
    }

    pub fn gateway(&self) -> &EntityGateway {
        &self.gateway
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    async fn get(
        &self,
        path: &str,
        params: Option<&Map<String, Value>>,
        session: Option<&str>,
    ) -> Result<Value> {
        self.upstream
            .request(UpstreamMethod::Get, path, None, params, None, session)
            .await
    }

    /// Account information for the configured subdomain
    pub async fn account(&self, with: Option<&str>, session: Option<&str>) -> Result<Value> {
        let params = FilterParams::new().opt("with", with).build();
        let params = (!params.is_empty()).then_some(params);
        self.get("/api/v4/account", params.as_ref(), session).await
    }

    /// Sales pipelines; a numeric id selects one pipeline
    pub async fn pipelines(
        &self,
        pipeline_id: Option<i64>,
        session: Option<&str>,
    ) -> Result<Value> {
        let path = match pipeline_id {
            Some(id) => format!("/api/v4/leads/pipelines/{}", id),
            None => "/api/v4/leads/pipelines".to_string(),
        };
        self.get(&path, None, session).await
    }

    /// Account users; a numeric id selects one user
    pub async fn users(&self, user_id: Option<i64>, session: Option<&str>) -> Result<Value> {
        let path = match user_id {
            Some(id) => format!("/api/v4/users/{}", id),
            None => "/api/v4/users".to_string(),
        };
        self.get(&path, None, session).await
    }

    /// Custom field definitions for an entity type
    pub async fn custom_fields(&self, entity_type: &str, session: Option<&str>) -> Result<Value> {
        if !FIELDED_ENTITY_TYPES.contains(&entity_type) {
            return Err(ProxyError::validation(format!(
                "Entity type {} has no custom fields (expected one of {})",
                entity_type,
                FIELDED_ENTITY_TYPES.join(", ")
            )));
        }
        self.get(
            &format!("/api/v4/{}/custom_fields", entity_type),
            None,
            session,
        )
        .await
    }

    /// Account event feed with type and date filters
    pub async fn events(&self, query: EventsQuery, session: Option<&str>) -> Result<Value> {
        let params = FilterParams::new()
            .indexed_list_opt("filter[type]", query.event_types.as_deref())
            .timestamp_opt(
                "filter[created_at][from]",
                query.date_from.as_deref().map(Value::from).as_ref(),
            )?
            .timestamp_opt(
                "filter[created_at][to]",
                query.date_to.as_deref().map(Value::from).as_ref(),
            )?
            .opt("page", query.page)
            .limit(query.limit)
            .build();
        self.get("/api/v4/events", Some(&params), session).await
    }

    /// Task listing with entity filters
    pub async fn tasks(&self, query: TasksQuery, session: Option<&str>) -> Result<Value> {
        let params = FilterParams::new()
            .opt("filter[entity_type]", query.entity_type)
            .opt("filter[entity_id]", query.entity_id)
            .opt("page", query.page)
            .limit(query.limit)
            .build();
        self.get("/api/v4/tasks", Some(&params), session).await
    }

    /// Create a task attached to an entity
    pub async fn create_task(&self, task: TaskCreate, session: Option<&str>) -> Result<Value> {
        let complete_till = task
            .complete_till
            .unwrap_or_else(|| chrono::Utc::now().timestamp() + 86_400);
        let data = json!({
            "text": task.text,
            "entity_id": task.entity_id,
            "entity_type": task.entity_type,
            "task_type_id": task.task_type_id.unwrap_or(1),
            "complete_till": complete_till,
        });
        self.gateway
            .handle(
                EntityRequest {
                    entity_type: "tasks".to_string(),
                    method: "create".to_string(),
                    entity_id: None,
                    data: Some(data),
                    params: None,
                },
                session,
            )
            .await
    }

    /// Notes attached to an entity
    pub async fn notes(
        &self,
        entity_type: &str,
        entity_id: i64,
        session: Option<&str>,
    ) -> Result<Value> {
        if !FIELDED_ENTITY_TYPES.contains(&entity_type) {
            return Err(ProxyError::validation(format!(
                "Entity type {} has no notes",
                entity_type
            )));
        }
        self.get(
            &format!("/api/v4/{}/{}/notes", entity_type, entity_id),
            None,
            session,
        )
        .await
    }

    /// Search contacts by email/phone/free text
    pub async fn contact_search(
        &self,
        query: &str,
        limit: Option<u64>,
        session: Option<&str>,
    ) -> Result<Value> {
        let params = FilterParams::new().set("query", query).limit(limit).build();
        self.get("/api/v4/contacts", Some(&params), session).await
    }

    /// Existence check: `{exists, contact_id, query}`
    pub async fn contact_check_exists(&self, query: &str, session: Option<&str>) -> Result<Value> {
        let result = self.contact_search(query, Some(1), session).await?;
        let contact_id = embedded(&result, "contacts")
            .first()
            .and_then(|c| c.get("id"))
            .cloned();
        Ok(json!({
            "exists": contact_id.is_some(),
            "contact_id": contact_id,
            "query": query,
        }))
    }

    /// Leads attached to a contact
    pub async fn leads_by_contact(&self, contact_id: i64, session: Option<&str>) -> Result<Value> {
        let params = FilterParams::new()
            .set("filter[contacts][0]", contact_id)
            .set("with", "contacts")
            .build();
        self.get("/api/v4/leads", Some(&params), session).await
    }

    /// Fetch a contact when one matches the query, create it otherwise.
    ///
    /// Best-effort sequential macro, not a transaction: a failure after the
    /// create leaves the contact in place. The `steps` trace records which
    /// branch executed.
    pub async fn contact_get_or_create(
        &self,
        input: GetOrCreateContact,
        session: Option<&str>,
    ) -> Result<Value> {
        let mut steps = Vec::new();

        let search = self.contact_search(&input.query, Some(1), session).await?;
        let existing = embedded(&search, "contacts").first().cloned();
        steps.push(json!({
            "step": "search_contact",
            "query": input.query,
            "found": existing.is_some(),
        }));

        if let Some(contact) = existing {
            return Ok(json!({
                "found": true,
                "created": false,
                "contact": contact,
                "steps": steps,
            }));
        }

        let mut contact_data = json!({"name": input.name});
        let mut custom_fields = Vec::new();
        if let Some(email) = &input.email {
            custom_fields.push(contact_custom_field("EMAIL", email));
        }
        if let Some(phone) = &input.phone {
            custom_fields.push(contact_custom_field("PHONE", phone));
        }
        if !custom_fields.is_empty() {
            contact_data["custom_fields_values"] = Value::Array(custom_fields);
        }

        let created = self
            .gateway
            .handle(
                EntityRequest {
                    entity_type: "contacts".to_string(),
                    method: "create".to_string(),
                    entity_id: None,
                    data: Some(contact_data),
                    params: None,
                },
                session,
            )
            .await?;
        steps.push(json!({"step": "create_contact", "name": input.name}));

        Ok(json!({
            "found": false,
            "created": true,
            "contact": created,
            "steps": steps,
        }))
    }

    /// Smart creation: resolve the contact (create if absent), optionally
    /// skip when open leads already exist, then create the lead.
    pub async fn smart_create_client_and_lead(
        &self,
        input: SmartCreateRequest,
        session: Option<&str>,
    ) -> Result<Value> {
        let mut steps = Vec::new();

        let search = self
            .contact_search(&input.contact_query, Some(1), session)
            .await?;
        let mut contact_id = embedded(&search, "contacts")
            .first()
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64);
        let contact_existed = contact_id.is_some();
        steps.push(json!({
            "step": "search_contact",
            "query": input.contact_query,
            "found": contact_existed,
        }));

        if contact_id.is_none() {
            let created = self
                .gateway
                .handle(
                    EntityRequest {
                        entity_type: "contacts".to_string(),
                        method: "create".to_string(),
                        entity_id: None,
                        data: Some(json!({"name": input.contact_name})),
                        params: None,
                    },
                    session,
                )
                .await?;
            contact_id = embedded(&created, "contacts")
                .first()
                .and_then(|c| c.get("id"))
                .and_then(Value::as_i64);
            steps.push(json!({
                "step": "create_contact",
                "name": input.contact_name,
                "contact_id": contact_id,
            }));
        }

        let Some(contact_id) = contact_id else {
            debug!("Smart creation aborted: contact id missing from vendor response");
            return Ok(json!({
                "success": false,
                "error": "Failed to create contact",
                "steps": steps,
            }));
        };

        if input.check_open_leads {
            let leads = self.leads_by_contact(contact_id, session).await?;
            let existing = embedded(&leads, "leads");
            steps.push(json!({
                "step": "check_open_leads",
                "existing_leads": existing.len(),
            }));
            if !existing.is_empty() {
                return Ok(json!({
                    "success": true,
                    "contact_id": contact_id,
                    "contact_was_created": !contact_existed,
                    "lead_created": false,
                    "existing_leads": existing,
                    "steps": steps,
                }));
            }
        }

        let mut lead_data = json!({
            "name": input.lead_name,
            "_embedded": {"contacts": [{"id": contact_id}]},
        });
        if let Some(price) = input.lead_price {
            lead_data["price"] = json!(price);
        }
        let lead_result = self
            .gateway
            .handle(
                EntityRequest {
                    entity_type: "leads".to_string(),
                    method: "create".to_string(),
                    entity_id: None,
                    data: Some(lead_data),
                    params: None,
                },
                session,
            )
            .await?;
        steps.push(json!({"step": "create_lead", "name": input.lead_name}));

        Ok(json!({
            "success": true,
            "contact_id": contact_id,
            "contact_was_created": !contact_existed,
            "lead_created": true,
            "lead_result": lead_result,
            "steps": steps,
        }))
    }

    /// Deal report: filtered single-page lead listing with a price summary
    pub async fn deals_report(&self, query: ReportQuery, session: Option<&str>) -> Result<Value> {
        let params = FilterParams::new()
            .opt("query", query.query.clone())
            .timestamp_opt(
                "filter[created_at][from]",
                query.created_at_from.as_deref().map(Value::from).as_ref(),
            )?
            .timestamp_opt(
                "filter[created_at][to]",
                query.created_at_to.as_deref().map(Value::from).as_ref(),
            )?
            .timestamp_opt(
                "filter[updated_at][from]",
                query.updated_at_from.as_deref().map(Value::from).as_ref(),
            )?
            .opt("filter[statuses][0][status_id]", query.status_id)
            .opt("filter[statuses][0][pipeline_id]", query.pipeline_id)
            .set("with", "contacts,companies,loss_reason")
            .opt("page", query.page)
            .limit(query.limit)
            .build();

        let result = self.get("/api/v4/leads", Some(&params), session).await?;
        let leads = embedded(&result, "leads");
        let (total_count, total_amount) = summarize_leads(leads);

        Ok(json!({
            "total_count": total_count,
            "total_amount": total_amount,
            "filters": {
                "query": query.query,
                "created_at_from": query.created_at_from,
                "created_at_to": query.created_at_to,
                "updated_at_from": query.updated_at_from,
                "status_id": query.status_id,
                "pipeline_id": query.pipeline_id,
                "page": query.page,
            },
            "leads": leads,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summarize_leads() {
        let leads = vec![
            json!({"id": 1, "price": 5000}),
            json!({"id": 2, "price": 1500.5}),
            json!({"id": 3}),
        ];
        let (count, total) = summarize_leads(&leads);
        assert_eq!(count, 3);
        assert!((total - 6500.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summarize_empty() {
        let (count, total) = summarize_leads(&[]);
        assert_eq!(count, 0);
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_embedded_extraction() {
        let response = json!({"_embedded": {"contacts": [{"id": 7}]}});
        assert_eq!(embedded(&response, "contacts").len(), 1);
        assert!(embedded(&response, "leads").is_empty());
        assert!(embedded(&json!({}), "contacts").is_empty());
    }

    #[test]
    fn test_contact_custom_field_shape() {
        let field = contact_custom_field("EMAIL", "ivan@example.com");
        assert_eq!(field["field_code"], json!("EMAIL"));
        assert_eq!(field["values"][0]["value"], json!("ivan@example.com"));
        assert_eq!(field["values"][0]["enum_code"], json!("WORK"));
    }
}
