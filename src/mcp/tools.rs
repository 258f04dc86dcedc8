//! Tool handler implementations
//!
//! Each handler translates a tool's `arguments` object into one CRM service
//! or gateway call. Handlers share the exact request shapes the REST surface
//! uses, so a tool call and the matching HTTP endpoint hit the vendor
//! identically.

use crate::crm::{
    EntityRequest, FilterParams, GetOrCreateContact, ReportQuery, SmartCreateRequest, TaskCreate,
    TasksQuery,
};
use crate::error::{ProxyError, Result};
use crate::mcp::registry::{ToolContext, ToolFuture};
use crate::upstream::UpstreamMethod;
use serde_json::{json, Map, Value};

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::validation(format!("Missing required argument: {}", key)))
}

fn required_i64(args: &Value, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ProxyError::validation(format!("Missing required argument: {}", key)))
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn opt_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}

fn opt_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn opt_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

/// Timestamp argument rendered as a string for the shared parser
/// (tool callers pass either Unix seconds or ISO-8601 text)
fn opt_timestamp(args: &Value, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

async fn entity_get(
    ctx: &ToolContext,
    entity_type: &str,
    entity_id: Option<i64>,
    params: Option<Map<String, Value>>,
) -> Result<Value> {
    ctx.service
        .gateway()
        .handle(
            EntityRequest {
                entity_type: entity_type.to_string(),
                method: "get".to_string(),
                entity_id,
                data: None,
                params,
            },
            None,
        )
        .await
}

async fn entity_create(ctx: &ToolContext, entity_type: &str, data: Value) -> Result<Value> {
    ctx.service
        .gateway()
        .handle(
            EntityRequest {
                entity_type: entity_type.to_string(),
                method: "create".to_string(),
                entity_id: None,
                data: Some(data),
                params: None,
            },
            None,
        )
        .await
}

// ---- contacts -------------------------------------------------------------

pub fn search_contact(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let query = required_str(&args, "query")?;
        ctx.service.contact_search(query, Some(10), None).await
    })
}

pub fn get_contacts(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let params = FilterParams::new()
            .opt("query", opt_str(&args, "query"))
            .limit(Some(opt_u64(&args, "limit").unwrap_or(50)))
            .build();
        entity_get(ctx, "contacts", None, Some(params)).await
    })
}

pub fn get_contact_by_id(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let contact_id = required_i64(&args, "contact_id")?;
        entity_get(ctx, "contacts", Some(contact_id), None).await
    })
}

pub fn create_contact(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let mut contact = json!({"name": required_str(&args, "name")?});
        for key in ["first_name", "last_name"] {
            if let Some(value) = opt_str(&args, key) {
                contact[key] = json!(value);
            }
        }
        if let Some(fields) = args.get("custom_fields_values") {
            contact["custom_fields_values"] = fields.clone();
        }
        entity_create(ctx, "contacts", contact).await
    })
}

pub fn update_contact(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let contact_id = required_i64(&args, "contact_id")?;
        let data = args
            .get("data")
            .cloned()
            .ok_or_else(|| ProxyError::validation("Missing required argument: data"))?;
        ctx.service
            .gateway()
            .handle(
                EntityRequest {
                    entity_type: "contacts".to_string(),
                    method: "update".to_string(),
                    entity_id: Some(contact_id),
                    data: Some(data),
                    params: None,
                },
                None,
            )
            .await
    })
}

pub fn check_contact_exists(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let query = required_str(&args, "query")?;
        ctx.service.contact_check_exists(query, None).await
    })
}

pub fn get_or_create_contact(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let input = GetOrCreateContact {
            query: required_str(&args, "query")?.to_string(),
            name: required_str(&args, "name")?.to_string(),
            email: opt_str(&args, "email").map(String::from),
            phone: opt_str(&args, "phone").map(String::from),
        };
        ctx.service.contact_get_or_create(input, None).await
    })
}

// ---- leads ----------------------------------------------------------------

pub fn get_leads(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let params = FilterParams::new()
            .opt("query", opt_str(&args, "query"))
            .opt("filter[statuses][0][status_id]", opt_i64(&args, "status_id"))
            .opt(
                "filter[statuses][0][pipeline_id]",
                opt_i64(&args, "pipeline_id"),
            )
            .limit(Some(opt_u64(&args, "limit").unwrap_or(50)))
            .build();
        entity_get(ctx, "leads", None, Some(params)).await
    })
}

pub fn get_lead_by_id(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let lead_id = required_i64(&args, "lead_id")?;
        entity_get(ctx, "leads", Some(lead_id), None).await
    })
}

pub fn create_lead(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let mut lead = json!({"name": required_str(&args, "name")?});
        if let Some(price) = opt_f64(&args, "price") {
            lead["price"] = json!(price);
        }
        for key in ["pipeline_id", "status_id", "responsible_user_id"] {
            if let Some(value) = opt_i64(&args, key) {
                lead[key] = json!(value);
            }
        }
        entity_create(ctx, "leads", lead).await
    })
}

pub fn create_complex_lead(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let mut contact = json!({"name": required_str(&args, "contact_name")?});
        let mut custom_fields = Vec::new();
        if let Some(email) = opt_str(&args, "contact_email") {
            custom_fields.push(json!({
                "field_code": "EMAIL",
                "values": [{"value": email, "enum_code": "WORK"}]
            }));
        }
        if let Some(phone) = opt_str(&args, "contact_phone") {
            custom_fields.push(json!({
                "field_code": "PHONE",
                "values": [{"value": phone, "enum_code": "WORK"}]
            }));
        }
        if !custom_fields.is_empty() {
            contact["custom_fields_values"] = Value::Array(custom_fields);
        }

        let mut lead = json!({
            "name": required_str(&args, "lead_name")?,
            "_embedded": {"contacts": [contact]},
        });
        if let Some(price) = opt_f64(&args, "lead_price") {
            lead["price"] = json!(price);
        }
        // The embedded contact routes this through the complex creation path
        entity_create(ctx, "leads", lead).await
    })
}

pub fn update_lead(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let lead_id = required_i64(&args, "lead_id")?;
        let data = args
            .get("data")
            .cloned()
            .ok_or_else(|| ProxyError::validation("Missing required argument: data"))?;
        ctx.service
            .gateway()
            .handle(
                EntityRequest {
                    entity_type: "leads".to_string(),
                    method: "update".to_string(),
                    entity_id: Some(lead_id),
                    data: Some(data),
                    params: None,
                },
                None,
            )
            .await
    })
}

pub fn delete_lead(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let lead_id = required_i64(&args, "lead_id")?;
        ctx.service
            .gateway()
            .handle(
                EntityRequest {
                    entity_type: "leads".to_string(),
                    method: "delete".to_string(),
                    entity_id: Some(lead_id),
                    data: None,
                    params: None,
                },
                None,
            )
            .await
    })
}

pub fn get_leads_by_contact(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let contact_id = required_i64(&args, "contact_id")?;
        ctx.service.leads_by_contact(contact_id, None).await
    })
}

pub fn smart_create_client_and_lead(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let input = SmartCreateRequest {
            contact_query: required_str(&args, "contact_query")?.to_string(),
            contact_name: required_str(&args, "contact_name")?.to_string(),
            lead_name: required_str(&args, "lead_name")?.to_string(),
            lead_price: opt_f64(&args, "lead_price"),
            check_open_leads: args
                .get("check_open_leads")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        ctx.service.smart_create_client_and_lead(input, None).await
    })
}

// ---- companies ------------------------------------------------------------

pub fn get_companies(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let params = FilterParams::new()
            .opt("query", opt_str(&args, "query"))
            .limit(Some(opt_u64(&args, "limit").unwrap_or(50)))
            .build();
        entity_get(ctx, "companies", None, Some(params)).await
    })
}

pub fn create_company(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let company = json!({"name": required_str(&args, "name")?});
        entity_create(ctx, "companies", company).await
    })
}

// ---- tasks ----------------------------------------------------------------

pub fn create_task(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let task = TaskCreate {
            text: required_str(&args, "text")?.to_string(),
            entity_id: required_i64(&args, "entity_id")?,
            entity_type: required_str(&args, "entity_type")?.to_string(),
            task_type_id: opt_i64(&args, "task_type_id"),
            complete_till: opt_i64(&args, "complete_till"),
        };
        ctx.service.create_task(task, None).await
    })
}

pub fn get_tasks(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let query = TasksQuery {
            entity_type: opt_str(&args, "entity_type").map(String::from),
            entity_id: opt_i64(&args, "entity_id"),
            limit: opt_u64(&args, "limit"),
            page: opt_u64(&args, "page"),
        };
        ctx.service.tasks(query, None).await
    })
}

// ---- account and settings -------------------------------------------------

pub fn get_account_info(ctx: &ToolContext, _args: Value) -> ToolFuture<'_> {
    Box::pin(async move { ctx.service.account(None, None).await })
}

pub fn get_pipelines(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        ctx.service
            .pipelines(opt_i64(&args, "pipeline_id"), None)
            .await
    })
}

pub fn get_users(ctx: &ToolContext, _args: Value) -> ToolFuture<'_> {
    Box::pin(async move { ctx.service.users(None, None).await })
}

// ---- reports --------------------------------------------------------------

pub fn get_deals_report(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let query = ReportQuery {
            query: opt_str(&args, "query").map(String::from),
            created_at_from: opt_timestamp(&args, "created_at_from"),
            created_at_to: opt_timestamp(&args, "created_at_to"),
            updated_at_from: opt_timestamp(&args, "updated_at_from"),
            status_id: opt_i64(&args, "status_id"),
            pipeline_id: opt_i64(&args, "pipeline_id"),
            limit: opt_u64(&args, "limit"),
            page: opt_u64(&args, "page"),
        };
        ctx.service.deals_report(query, None).await
    })
}

// ---- generic passthrough ----------------------------------------------------

/// Normalize a caller-supplied vendor path: force a leading slash and prefix
/// the versioned API root when it is missing
pub fn normalize_passthrough_path(path: &str) -> String {
    let path = path.trim();
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if path.starts_with("/api/") {
        path
    } else {
        format!("/api/v4{}", path)
    }
}

/// Escape hatch for vendor endpoints without a dedicated tool
pub fn crm_request(ctx: &ToolContext, args: Value) -> ToolFuture<'_> {
    Box::pin(async move {
        let method = match required_str(&args, "method")?.to_uppercase().as_str() {
            "GET" => UpstreamMethod::Get,
            "POST" => UpstreamMethod::Post,
            "PATCH" => UpstreamMethod::Patch,
            "DELETE" => UpstreamMethod::Delete,
            other => {
                return Err(ProxyError::validation(format!(
                    "Unsupported method: {}",
                    other
                )))
            }
        };
        let path = normalize_passthrough_path(required_str(&args, "path")?);
        let query = args.get("query").and_then(Value::as_object).cloned();
        let body = args.get("body").cloned();
        ctx.service
            .upstream()
            .request(method, &path, body.as_ref(), query.as_ref(), None, None)
            .await
    })
}
