use super::definition::{AssociationDefinition, ResourceDefinition};
use super::{departments, jobs};
use crate::schema::{FieldRule, SectionSchema};
use serde_json::json;

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("first_name", FieldRule::string().required().min(1.0).max(100.0))
        .field("last_name", FieldRule::string().required().min(1.0).max(100.0))
        .field("email", FieldRule::string().nullable().max(255.0))
        .field("phone", FieldRule::string().nullable().max(40.0))
        .field("hourly_rate", FieldRule::number().nullable().min(0.0))
        .field("active", FieldRule::boolean().default(json!(true)))
        .field("hired_at", FieldRule::date().nullable())
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("worker", "workers")
        .fields(fields())
        .association(
            AssociationDefinition::new("jobs", "job", "job_workers", "job_worker")
                .keys("worker_id", "job_id")
                .target("jobs", jobs::fields())
                .join_fields(jobs::job_worker_fields()),
        )
        .association(
            AssociationDefinition::new("supervisors", "supervisor", "worker_supervisors", "worker_supervisor")
                .keys("worker_id", "supervisor_id")
                .target("workers", fields())
                .join_field("since", FieldRule::date().nullable()),
        )
        .association(
            AssociationDefinition::new("departments", "department", "department_workers", "department_worker")
                .keys("worker_id", "department_id")
                .target("departments", departments::fields())
                .join_fields(departments::department_worker_fields()),
        )
}
