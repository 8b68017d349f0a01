use super::definition::ResourceDefinition;
use crate::schema::{FieldRule, SectionSchema};

/// Permission names are the strings carried in caller tokens, e.g.
/// `get permissions from role`.
pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("name", FieldRule::string().required().min(1.0).max(200.0))
        .field("description", FieldRule::string().nullable())
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("permission", "permissions").fields(fields())
}
