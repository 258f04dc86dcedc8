//! Tool registry: catalog + name-to-handler map built once at startup
//!
//! Dispatch is a single lookup; the catalog order is stable so `tools/list`
//! output does not shuffle between calls.

use crate::crm::CrmService;
use crate::error::Result;
use crate::mcp::tools;
use crate::mcp::types::{Tool, ToolCall};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Shared state handed to every tool handler
#[derive(Clone)]
pub struct ToolContext {
    pub service: Arc<CrmService>,
}

/// Boxed future returned by a tool handler
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// A tool handler: arguments in, normalized vendor JSON out
pub type ToolHandler = for<'a> fn(&'a ToolContext, Value) -> ToolFuture<'a>;

/// Catalog entry: descriptive metadata plus the handler
pub struct ToolSpec {
    pub tool: Tool,
    handler: ToolHandler,
}

/// All tools exposed through `tools/list` / `tools/call`
pub struct ToolRegistry {
    specs: HashMap<String, ToolSpec>,
    order: Vec<String>,
}

impl ToolRegistry {
    fn register(&mut self, name: &str, description: &str, schema: Value, handler: ToolHandler) {
        self.order.push(name.to_string());
        self.specs.insert(
            name.to_string(),
            ToolSpec {
                tool: Tool::new(name, description, schema),
                handler,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Catalog in registration order
    pub fn catalog(&self) -> Vec<&Tool> {
        self.order
            .iter()
            .filter_map(|name| self.specs.get(name))
            .map(|spec| &spec.tool)
            .collect()
    }

    /// Dispatch a tool call; `None` means the tool name is unknown
    pub async fn dispatch(&self, ctx: &ToolContext, call: &ToolCall) -> Option<Result<Value>> {
        let spec = self.specs.get(&call.name)?;
        Some((spec.handler)(ctx, call.arguments.clone()).await)
    }

    /// Build the registry with the full tool catalog
    pub fn new() -> Self {
        let mut registry = Self {
            specs: HashMap::new(),
            order: Vec::new(),
        };

        // ---- contacts ----
        registry.register(
            "search_contact",
            "Search for a contact by email or phone",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Email or phone to search for"}
                },
                "required": ["query"]
            }),
            tools::search_contact,
        );
        registry.register(
            "get_contacts",
            "List contacts with optional filtering",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "number", "description": "Number of contacts (default 50)", "default": 50},
                    "query": {"type": "string", "description": "Free-text filter"}
                }
            }),
            tools::get_contacts,
        );
        registry.register(
            "get_contact_by_id",
            "Fetch a contact by its id",
            json!({
                "type": "object",
                "properties": {
                    "contact_id": {"type": "number", "description": "Contact id"}
                },
                "required": ["contact_id"]
            }),
            tools::get_contact_by_id,
        );
        registry.register(
            "create_contact",
            "Create a new contact",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Contact name"},
                    "first_name": {"type": "string"},
                    "last_name": {"type": "string"},
                    "custom_fields_values": {
                        "type": "array",
                        "description": "Custom fields (email, phone, ...)",
                        "items": {"type": "object"}
                    }
                },
                "required": ["name"]
            }),
            tools::create_contact,
        );
        registry.register(
            "update_contact",
            "Update an existing contact",
            json!({
                "type": "object",
                "properties": {
                    "contact_id": {"type": "number", "description": "Contact id"},
                    "data": {"type": "object", "description": "Fields to update"}
                },
                "required": ["contact_id", "data"]
            }),
            tools::update_contact,
        );
        registry.register(
            "check_contact_exists",
            "Check whether a contact exists for an email or phone",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Email or phone to check"}
                },
                "required": ["query"]
            }),
            tools::check_contact_exists,
        );
        registry.register(
            "get_or_create_contact",
            "Fetch a contact if it exists, create it otherwise",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Email or phone"},
                    "name": {"type": "string", "description": "Name used when creating"},
                    "email": {"type": "string"},
                    "phone": {"type": "string"}
                },
                "required": ["query", "name"]
            }),
            tools::get_or_create_contact,
        );

        // ---- leads ----
        registry.register(
            "get_leads",
            "List leads with optional status/pipeline filters",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "number", "default": 50},
                    "query": {"type": "string"},
                    "status_id": {"type": "number", "description": "Lead status id"},
                    "pipeline_id": {"type": "number", "description": "Pipeline id"}
                }
            }),
            tools::get_leads,
        );
        registry.register(
            "get_lead_by_id",
            "Fetch a lead by its id",
            json!({
                "type": "object",
                "properties": {
                    "lead_id": {"type": "number", "description": "Lead id"}
                },
                "required": ["lead_id"]
            }),
            tools::get_lead_by_id,
        );
        registry.register(
            "create_lead",
            "Create a new lead",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Lead name"},
                    "price": {"type": "number", "description": "Budget"},
                    "pipeline_id": {"type": "number"},
                    "status_id": {"type": "number"},
                    "responsible_user_id": {"type": "number"}
                },
                "required": ["name"]
            }),
            tools::create_lead,
        );
        registry.register(
            "create_complex_lead",
            "Create a lead together with its contact in one atomic call",
            json!({
                "type": "object",
                "properties": {
                    "lead_name": {"type": "string"},
                    "lead_price": {"type": "number"},
                    "contact_name": {"type": "string"},
                    "contact_email": {"type": "string"},
                    "contact_phone": {"type": "string"}
                },
                "required": ["lead_name", "contact_name"]
            }),
            tools::create_complex_lead,
        );
        registry.register(
            "update_lead",
            "Update a lead",
            json!({
                "type": "object",
                "properties": {
                    "lead_id": {"type": "number"},
                    "data": {"type": "object", "description": "Fields to update"}
                },
                "required": ["lead_id", "data"]
            }),
            tools::update_lead,
        );
        registry.register(
            "delete_lead",
            "Delete a lead",
            json!({
                "type": "object",
                "properties": {
                    "lead_id": {"type": "number", "description": "Lead id to delete"}
                },
                "required": ["lead_id"]
            }),
            tools::delete_lead,
        );
        registry.register(
            "get_leads_by_contact",
            "List all leads attached to a contact",
            json!({
                "type": "object",
                "properties": {
                    "contact_id": {"type": "number", "description": "Contact id"}
                },
                "required": ["contact_id"]
            }),
            tools::get_leads_by_contact,
        );
        registry.register(
            "smart_create_client_and_lead",
            "Resolve the contact (create if absent), then create a lead for it",
            json!({
                "type": "object",
                "properties": {
                    "contact_query": {"type": "string", "description": "Email or phone to search for"},
                    "contact_name": {"type": "string", "description": "Name used when creating"},
                    "lead_name": {"type": "string"},
                    "lead_price": {"type": "number"},
                    "check_open_leads": {
                        "type": "boolean",
                        "description": "Skip lead creation when the contact already has leads",
                        "default": false
                    }
                },
                "required": ["contact_query", "contact_name", "lead_name"]
            }),
            tools::smart_create_client_and_lead,
        );

        // ---- companies ----
        registry.register(
            "get_companies",
            "List companies",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "number", "default": 50},
                    "query": {"type": "string"}
                }
            }),
            tools::get_companies,
        );
        registry.register(
            "create_company",
            "Create a new company",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Company name"}
                },
                "required": ["name"]
            }),
            tools::create_company,
        );

        // ---- tasks ----
        registry.register(
            "create_task",
            "Create a task attached to a lead, contact, or company",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "Task text"},
                    "entity_id": {"type": "number", "description": "Target entity id"},
                    "entity_type": {
                        "type": "string",
                        "description": "Target entity type",
                        "enum": ["leads", "contacts", "companies"]
                    },
                    "task_type_id": {"type": "number", "description": "1 = call, 2 = meeting", "default": 1},
                    "complete_till": {"type": "number", "description": "Deadline (Unix seconds)"}
                },
                "required": ["text", "entity_id", "entity_type"]
            }),
            tools::create_task,
        );
        registry.register(
            "get_tasks",
            "List tasks with optional entity filters",
            json!({
                "type": "object",
                "properties": {
                    "entity_type": {"type": "string", "enum": ["leads", "contacts", "companies"]},
                    "entity_id": {"type": "number"},
                    "limit": {"type": "number"},
                    "page": {"type": "number"}
                }
            }),
            tools::get_tasks,
        );

        // ---- account and settings ----
        registry.register(
            "get_account_info",
            "Account information for the configured subdomain",
            json!({"type": "object", "properties": {}}),
            tools::get_account_info,
        );
        registry.register(
            "get_pipelines",
            "List sales pipelines",
            json!({
                "type": "object",
                "properties": {
                    "pipeline_id": {"type": "number", "description": "Specific pipeline id (optional)"}
                }
            }),
            tools::get_pipelines,
        );
        registry.register(
            "get_users",
            "List account users",
            json!({"type": "object", "properties": {}}),
            tools::get_users,
        );

        // ---- reports ----
        registry.register(
            "get_deals_report",
            "Deal report with filters and a price summary",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Free-text filter"},
                    "created_at_from": {"type": "number", "description": "Created from (Unix seconds or ISO-8601)"},
                    "created_at_to": {"type": "number", "description": "Created to (Unix seconds or ISO-8601)"},
                    "updated_at_from": {"type": "number", "description": "Updated from (Unix seconds or ISO-8601)"},
                    "status_id": {"type": "number"},
                    "pipeline_id": {"type": "number"},
                    "limit": {"type": "number", "description": "Page size, capped at 250"},
                    "page": {"type": "number"}
                }
            }),
            tools::get_deals_report,
        );

        // ---- escape hatch ----
        registry.register(
            "crm_request",
            "Forward an arbitrary request to the vendor API (escape hatch for endpoints without a dedicated tool)",
            json!({
                "type": "object",
                "properties": {
                    "method": {"type": "string", "enum": ["GET", "POST", "PATCH", "DELETE"]},
                    "path": {"type": "string", "description": "Vendor path, e.g. /api/v4/leads or just leads"},
                    "query": {"type": "object", "description": "Query parameters"},
                    "body": {"description": "JSON body for POST/PATCH"}
                },
                "required": ["method", "path"]
            }),
            tools::crm_request,
        );

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_complete_and_stable() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.len(), 24);
        let catalog = registry.catalog();
        assert_eq!(catalog.len(), registry.len());
        // Registration order is preserved
        assert_eq!(catalog[0].name, "search_contact");
        assert_eq!(catalog.last().unwrap().name, "crm_request");
    }

    #[test]
    fn test_every_tool_has_an_object_schema() {
        let registry = ToolRegistry::new();
        for tool in registry.catalog() {
            assert_eq!(
                tool.input_schema["type"], "object",
                "tool {} schema must be an object",
                tool.name
            );
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn test_contains() {
        let registry = ToolRegistry::new();
        assert!(registry.contains("delete_lead"));
        assert!(registry.contains("crm_request"));
        assert!(!registry.contains("frobnicate"));
    }
}
