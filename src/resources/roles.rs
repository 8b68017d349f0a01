use super::definition::{AssociationDefinition, ResourceDefinition};
use super::{permissions, users};
use crate::schema::{FieldRule, SectionSchema};

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("name", FieldRule::string().required().min(1.0).max(120.0))
        .field("description", FieldRule::string().nullable())
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("role", "roles")
        .fields(fields())
        .association(
            AssociationDefinition::new("permissions", "permission", "role_permissions", "role_permission")
                .keys("role_id", "permission_id")
                .target("permissions", permissions::fields()),
        )
        .association(
            AssociationDefinition::new("users", "user", "user_roles", "user_role")
                .keys("role_id", "user_id")
                .target("users", users::fields()),
        )
}
