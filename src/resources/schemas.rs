//! Operation schemas derived from resource definitions.

use serde_json::json;

use super::definition::{AssociationDefinition, ResourceDefinition, AUDIT_COLUMNS};
use crate::config::FilterConfig;
use crate::schema::{FieldKind, FieldRule, OperationSchema, SchemaError, SectionSchema};
use crate::types::Operation;

/// Schema for one operation of `definition`. `limits` caps the `limit` and
/// `offset` query keys.
pub fn operation_schema(
    definition: &ResourceDefinition,
    operation: &Operation,
    limits: &FilterConfig,
) -> Result<OperationSchema, SchemaError> {
    let includes: Vec<String> = definition.associations.iter().map(|a| a.name.clone()).collect();

    Ok(match operation {
        Operation::List => OperationSchema::new()
            .params(SectionSchema::new())
            .query(
                filter_query(&definition.fields, limits)
                    .extend(&projection(&definition.attributes(), &includes))
                    .field("sort_by", enum_of(&definition.attributes())),
            ),
        Operation::Create => OperationSchema::new()
            .params(SectionSchema::new())
            .body(
                SectionSchema::new()
                    .field("id", FieldRule::uuid().forbidden())
                    .extend(&definition.fields)
                    .extend(&audit_forbidden()),
            ),
        Operation::Get => OperationSchema::new()
            .params(key_params())
            .query(projection(&definition.attributes(), &includes).extend(&visibility())),
        Operation::Update => OperationSchema::new()
            .params(key_params())
            .query(visibility())
            .body(
                SectionSchema::new()
                    .field("id", FieldRule::uuid().denied())
                    .extend(&definition.fields.clone().map_rules(|rule| rule.optional().without_default()))
                    .extend(&audit_forbidden()),
            ),
        Operation::Delete => OperationSchema::new()
            .params(key_params())
            .query(visibility().field("force", FieldRule::boolean())),
        Operation::ListAssociated(name) => {
            let association = find_association(definition, name)?;
            OperationSchema::new().params(key_params()).query(
                filter_query(&association.target_fields, limits)
                    .extend(&projection(&association.target_attributes(), &[]))
                    .field("sort_by", enum_of(&association.target_attributes())),
            )
        }
        Operation::AddAssociations(name) => {
            let association = find_association(definition, name)?;
            OperationSchema::new().params(key_params()).body(
                SectionSchema::new()
                    .field(
                        association.name.clone(),
                        FieldRule::list(FieldKind::Uuid).required().min(1.0),
                    )
                    .extend(&join_body(association)),
            )
        }
        Operation::GetAssociated(name) => {
            let association = find_association(definition, name)?;
            OperationSchema::new()
                .params(item_params())
                .query(projection(&association.target_attributes(), &[]).extend(&visibility()))
        }
        Operation::UpdateAssociated(name) => {
            let association = find_association(definition, name)?;
            OperationSchema::new()
                .params(item_params())
                .query(visibility())
                .body(join_body(association).map_rules(|rule| rule.without_default()))
        }
        Operation::RemoveAssociated(name) => {
            find_association(definition, name)?;
            OperationSchema::new()
                .params(item_params())
                .query(visibility().field("force", FieldRule::boolean()))
        }
    })
}

fn find_association<'a>(
    definition: &'a ResourceDefinition,
    name: &str,
) -> Result<&'a AssociationDefinition, SchemaError> {
    definition
        .find_association(name)
        .ok_or_else(|| SchemaError::UnknownAssociation(name.to_string()))
}

fn key_params() -> SectionSchema {
    SectionSchema::new().field("id", FieldRule::uuid().required())
}

fn item_params() -> SectionSchema {
    key_params().field("item_id", FieldRule::uuid().required())
}

fn visibility() -> SectionSchema {
    SectionSchema::new().field("paranoid", FieldRule::boolean())
}

fn enum_of(values: &[String]) -> FieldRule {
    FieldRule::new(FieldKind::Enum(values.to_vec()))
}

fn projection(attributes: &[String], includes: &[String]) -> SectionSchema {
    let schema = SectionSchema::new().field(
        "attributes",
        FieldRule::new(FieldKind::List(Box::new(FieldKind::Enum(attributes.to_vec())))).min(1.0),
    );
    if includes.is_empty() {
        schema
    } else {
        schema.field(
            "include",
            FieldRule::new(FieldKind::List(Box::new(FieldKind::Enum(includes.to_vec())))),
        )
    }
}

/// Query section of list operations: every attribute is filterable, plus
/// the paging, ordering and visibility keys.
fn filter_query(fields: &SectionSchema, limits: &FilterConfig) -> SectionSchema {
    let filterable = |kind: FieldKind| FieldRule::new(kind).nullable().filterable();

    let mut schema = SectionSchema::new().field("id", filterable(FieldKind::Uuid));
    for (name, rule) in fields.fields() {
        schema = schema.field(name.clone(), filterable(rule.kind.clone()));
    }
    for column in AUDIT_COLUMNS {
        let kind = if column.ends_with("_by") { FieldKind::Uuid } else { FieldKind::Date };
        schema = schema.field(*column, filterable(kind));
    }

    schema
        .field("order_by", FieldRule::one_of(&["asc", "desc"]).default(json!("asc")))
        .field("limit", FieldRule::integer().min(0.0).max(limits.max_limit as f64))
        .field("offset", FieldRule::integer().min(0.0).max(limits.max_offset as f64))
        .extend(&visibility())
}

fn audit_forbidden() -> SectionSchema {
    AUDIT_COLUMNS.iter().fold(SectionSchema::new(), |schema, column| {
        schema.field(*column, FieldRule::string().nullable().forbidden())
    })
}

/// Body fields of join records: relation attributes, with both keys
/// stripped and audit columns rejected.
fn join_body(association: &AssociationDefinition) -> SectionSchema {
    SectionSchema::new()
        .field(association.owner_key.clone(), FieldRule::uuid().denied())
        .field(association.foreign_key.clone(), FieldRule::uuid().denied())
        .extend(&association.join_fields.clone().map_rules(|rule| rule.optional()))
        .extend(&audit_forbidden())
}
