//! CRM domain layer: entity gateway, parameter builder, resource operations

pub mod gateway;
pub mod params;
pub mod service;

pub use gateway::{EntityGateway, EntityMethod, EntityRequest, ENTITY_TYPES};
pub use params::{parse_timestamp, FilterParams, VENDOR_PAGE_LIMIT};
pub use service::{
    ContactQuery, CrmService, EventsQuery, GetOrCreateContact, ReportQuery, SmartCreateRequest,
    TaskCreate, TasksQuery,
};
