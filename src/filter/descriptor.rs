use serde_json::Value;

use super::error::FilterError;
use super::types::{Condition, FieldFilter, FilterDescriptor, FilterOp, SortDirection};
use crate::schema::SectionSchema;
use crate::types::Record;

impl FilterDescriptor {
    /// Builds a descriptor from an already validated query section. The
    /// section schema supplies the column kinds of the filtered fields.
    pub fn from_query(query: &Record, schema: Option<&SectionSchema>) -> Result<Self, FilterError> {
        let mut descriptor = FilterDescriptor::default();

        for (key, value) in query {
            match key.as_str() {
                "attributes" => descriptor.attributes = Some(string_list(key, value)?),
                "include" => descriptor.include = string_list(key, value)?,
                "sort_by" => descriptor.sort_by = value.as_str().map(str::to_string),
                "order_by" => {
                    descriptor.order_by = value.as_str().map(SortDirection::parse).unwrap_or_default()
                }
                "limit" => descriptor.limit = Some(non_negative(value, FilterError::InvalidLimit)?),
                "offset" => descriptor.offset = Some(non_negative(value, FilterError::InvalidOffset)?),
                "paranoid" => descriptor.paranoid = value.as_bool().unwrap_or(true),
                "force" => descriptor.force = value.as_bool().unwrap_or(false),
                column => {
                    let rule = schema
                        .and_then(|s| s.get(column))
                        .ok_or_else(|| FilterError::InvalidColumn(column.to_string()))?;
                    let kind = rule.kind.column_kind();

                    match value {
                        Value::Object(operators) => {
                            for (op_key, operand) in operators {
                                let op = FilterOp::from_key(op_key)
                                    .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                                descriptor.conditions.push(FieldFilter {
                                    column: column.to_string(),
                                    kind,
                                    condition: Condition::Operator(op, operand.clone()),
                                });
                            }
                        }
                        literal => descriptor.conditions.push(FieldFilter {
                            column: column.to_string(),
                            kind,
                            condition: Condition::Literal(literal.clone()),
                        }),
                    }
                }
            }
        }

        Ok(descriptor)
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, FilterError> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} must be a list", key)))
}

fn non_negative(value: &Value, err: fn(String) -> FilterError) -> Result<i64, FilterError> {
    match value.as_i64() {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(err(format!("must be a non-negative integer, got {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::ColumnKind;
    use crate::schema::FieldRule;
    use serde_json::json;

    fn schema() -> SectionSchema {
        SectionSchema::new()
            .field("name", FieldRule::string().filterable())
            .field("rating", FieldRule::integer().filterable())
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_query_yields_default_descriptor() {
        let descriptor = FilterDescriptor::from_query(&Record::new(), Some(&schema())).unwrap();
        assert_eq!(descriptor, FilterDescriptor::default());
        assert!(descriptor.paranoid);
        assert!(!descriptor.force);
    }

    #[test]
    fn splits_literals_operators_and_reserved_keys() {
        let query = record(json!({
            "name": "Acme",
            "rating": { "gte": 2, "lte": 4 },
            "limit": 10,
            "offset": 5,
            "sort_by": "name",
            "order_by": "desc",
            "paranoid": false,
            "attributes": ["id", "name"],
        }));
        let descriptor = FilterDescriptor::from_query(&query, Some(&schema())).unwrap();

        assert_eq!(descriptor.limit, Some(10));
        assert_eq!(descriptor.offset, Some(5));
        assert_eq!(descriptor.sort_by.as_deref(), Some("name"));
        assert_eq!(descriptor.order_by, SortDirection::Desc);
        assert!(!descriptor.paranoid);
        assert_eq!(descriptor.attributes, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(descriptor.conditions.len(), 3);
        assert!(descriptor.conditions.contains(&FieldFilter {
            column: "name".into(),
            kind: ColumnKind::Text,
            condition: Condition::Literal(json!("Acme")),
        }));
        assert!(descriptor.conditions.contains(&FieldFilter {
            column: "rating".into(),
            kind: ColumnKind::Integer,
            condition: Condition::Operator(FilterOp::Gte, json!(2)),
        }));
    }

    #[test]
    fn unknown_column_is_an_error() {
        let query = record(json!({ "colour": "red" }));
        assert!(matches!(
            FilterDescriptor::from_query(&query, Some(&schema())),
            Err(FilterError::InvalidColumn(_))
        ));
    }
}
