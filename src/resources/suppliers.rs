use super::definition::{AssociationDefinition, ResourceDefinition};
use super::materials;
use crate::schema::{FieldRule, SectionSchema};

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("name", FieldRule::string().required().min(1.0).max(200.0))
        .field("email", FieldRule::string().nullable().max(255.0))
        .field("phone", FieldRule::string().nullable().max(40.0))
        .field("address", FieldRule::string().nullable())
        .field("rating", FieldRule::integer().nullable().min(1.0).max(5.0))
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("supplier", "suppliers")
        .fields(fields())
        .association(
            AssociationDefinition::new("materials", "material", "material_suppliers", "material_supplier")
                .keys("supplier_id", "material_id")
                .target("materials", materials::fields())
                .join_fields(materials::material_supplier_fields()),
        )
}
