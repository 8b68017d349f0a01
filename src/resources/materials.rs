use super::definition::{AssociationDefinition, ResourceDefinition};
use super::{jobs, suppliers, warehouses};
use crate::schema::{FieldRule, SectionSchema};

pub fn fields() -> SectionSchema {
    SectionSchema::new()
        .field("name", FieldRule::string().required().min(1.0).max(200.0))
        .field("sku", FieldRule::string().nullable().max(64.0))
        .field("unit", FieldRule::string().nullable().max(32.0))
        .field("unit_cost", FieldRule::number().nullable().min(0.0))
        .field("description", FieldRule::string().nullable())
}

pub fn material_supplier_fields() -> SectionSchema {
    SectionSchema::new()
        .field("price", FieldRule::number().nullable().min(0.0))
        .field("lead_time_days", FieldRule::integer().nullable().min(0.0))
}

/// Stock of a material held in a warehouse
pub fn material_warehouse_fields() -> SectionSchema {
    SectionSchema::new().field("quantity", FieldRule::number().nullable().min(0.0))
}

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new("material", "materials")
        .fields(fields())
        .association(
            AssociationDefinition::new("suppliers", "supplier", "material_suppliers", "material_supplier")
                .keys("material_id", "supplier_id")
                .target("suppliers", suppliers::fields())
                .join_fields(material_supplier_fields()),
        )
        .association(
            AssociationDefinition::new("warehouses", "warehouse", "material_warehouses", "material_warehouse")
                .keys("material_id", "warehouse_id")
                .target("warehouses", warehouses::fields())
                .join_fields(material_warehouse_fields()),
        )
        .association(
            AssociationDefinition::new("jobs", "job", "job_materials", "job_material")
                .keys("material_id", "job_id")
                .target("jobs", jobs::fields())
                .join_fields(jobs::job_material_fields()),
        )
}
