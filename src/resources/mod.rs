//! Declarative resource configuration. Each module describes one resource;
//! the generic controller, service and repository are built from these.

pub mod definition;
pub mod departments;
pub mod jobs;
pub mod materials;
pub mod permissions;
pub mod roles;
pub mod schemas;
pub mod suppliers;
pub mod users;
pub mod warehouses;
pub mod workers;

pub use definition::{AssociationDefinition, ResourceDefinition, AUDIT_COLUMNS};
pub use schemas::operation_schema;

/// Every resource exposed by the API
pub fn all() -> Vec<ResourceDefinition> {
    vec![
        jobs::definition(),
        workers::definition(),
        materials::definition(),
        suppliers::definition(),
        warehouses::definition(),
        roles::definition(),
        departments::definition(),
        users::definition(),
        permissions::definition(),
    ]
}
