use serde_json::json;

use super::definition::{AssociationDefinition, ResourceDefinition};
use super::{materials, workers};
use crate::schema::{FieldRule, SectionSchema};

pub const STATUSES: &[&str] = &["planned", "active", "on_hold", "completed", "cancelled"];

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("title", FieldRule::string().required().min(1.0).max(200.0))
        .field("description", FieldRule::string().nullable())
        .field("status", FieldRule::one_of(STATUSES).default(json!("planned")))
        .field("start_date", FieldRule::date().nullable())
        .field("end_date", FieldRule::date().nullable())
        .field("budget", FieldRule::number().nullable().min(0.0))
}

/// Attributes of a worker's assignment to a job
pub fn job_worker_fields() -> SectionSchema {
    SectionSchema::new()
        .field("hours", FieldRule::number().nullable().min(0.0))
        .field("role", FieldRule::string().nullable().max(120.0))
}

/// Attributes of a material allocated to a job
pub fn job_material_fields() -> SectionSchema {
    SectionSchema::new().field("quantity", FieldRule::number().nullable().min(0.0))
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("job", "jobs")
        .fields(fields())
        .association(
            AssociationDefinition::new("workers", "worker", "job_workers", "job_worker")
                .keys("job_id", "worker_id")
                .target("workers", workers::fields())
                .join_fields(job_worker_fields()),
        )
        .association(
            AssociationDefinition::new("materials", "material", "job_materials", "job_material")
                .keys("job_id", "material_id")
                .target("materials", materials::fields())
                .join_fields(job_material_fields()),
        )
}
