use super::definition::{AssociationDefinition, ResourceDefinition};
use super::workers;
use crate::schema::{FieldRule, SectionSchema};

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("name", FieldRule::string().required().min(1.0).max(120.0))
        .field("description", FieldRule::string().nullable())
        .field("budget", FieldRule::number().nullable().min(0.0))
}

pub fn department_worker_fields() -> SectionSchema {
    SectionSchema::new().field("position", FieldRule::string().nullable().max(120.0))
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("department", "departments")
        .fields(fields())
        .association(
            AssociationDefinition::new("workers", "worker", "department_workers", "department_worker")
                .keys("department_id", "worker_id")
                .target("workers", workers::fields())
                .join_fields(department_worker_fields()),
        )
}
