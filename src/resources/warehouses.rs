use super::definition::{AssociationDefinition, ResourceDefinition};
use super::materials;
use crate::schema::{FieldRule, SectionSchema};

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("name", FieldRule::string().required().min(1.0).max(200.0))
        .field("address", FieldRule::string().nullable())
        .field("capacity", FieldRule::integer().nullable().min(0.0))
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("warehouse", "warehouses")
        .fields(fields())
        .association(
            AssociationDefinition::new("materials", "material", "material_warehouses", "material_warehouse")
                .keys("warehouse_id", "material_id")
                .target("materials", materials::fields())
                .join_fields(materials::material_warehouse_fields()),
        )
}
