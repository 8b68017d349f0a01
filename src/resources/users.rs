use serde_json::json;

use super::definition::{AssociationDefinition, ResourceDefinition};
use super::roles;
use crate::schema::{FieldRule, SectionSchema};

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("email", FieldRule::string().required().min(3.0).max(255.0))
        .field("name", FieldRule::string().nullable().max(200.0))
        .field("active", FieldRule::boolean().default(json!(true)))
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("user", "users")
        .fields(fields())
        .association(
            AssociationDefinition::new("roles", "role", "user_roles", "user_role")
                .keys("user_id", "role_id")
                .target("roles", roles::fields()),
        )
}
