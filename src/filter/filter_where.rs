use serde_json::Value;

use super::error::FilterError;
use super::filter::{quote_column, validate_identifier};
use super::types::{ColumnKind, FilterOp, FilterWhereInfo, FilterWhereOptions};

/// Renders where-conditions into SQL with `$n` positional parameters.
pub struct FilterWhere<'a> {
    alias: Option<&'a str>,
    param_values: Vec<Value>,
    param_index: usize,
}

impl<'a> FilterWhere<'a> {
    pub fn new(alias: Option<&'a str>, starting_param_index: usize) -> Self {
        Self {
            alias,
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Renders `conditions` (joined with AND) plus the soft-delete clause.
    /// Returns `1=1` when nothing restricts the rows.
    pub fn generate(
        conditions: &[FilterWhereInfo],
        alias: Option<&str>,
        starting_param_index: usize,
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = FilterWhere::new(alias, starting_param_index);
        filter_where.build(conditions, options)
    }

    /// `"deleted_at" IS NULL` unless soft-deleted rows were asked for
    pub fn paranoid_clause(alias: Option<&str>, options: &FilterWhereOptions) -> Option<String> {
        options
            .paranoid
            .then(|| format!("{} IS NULL", quote_column(alias, "deleted_at")))
    }

    fn build(
        &mut self,
        conditions: &[FilterWhereInfo],
        options: &FilterWhereOptions,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut sql_conditions = vec![];
        if let Some(clause) = Self::paranoid_clause(self.alias, options) {
            sql_conditions.push(clause);
        }
        for condition in conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        if !validate_identifier(&condition.column) {
            return Err(FilterError::InvalidColumn(condition.column.clone()));
        }

        let column = quote_column(self.alias, &condition.column);
        let kind = condition.kind;
        let data = &condition.data;

        Ok(match condition.operator {
            FilterOp::Eq => {
                if data.is_null() {
                    format!("{} IS NULL", column)
                } else {
                    format!("{} = {}", column, self.param(data.clone(), kind))
                }
            }
            FilterOp::Gt => format!("{} > {}", column, self.param(data.clone(), kind)),
            FilterOp::Gte => format!("{} >= {}", column, self.param(data.clone(), kind)),
            FilterOp::Lt => format!("{} < {}", column, self.param(data.clone(), kind)),
            FilterOp::Lte => format!("{} <= {}", column, self.param(data.clone(), kind)),
            FilterOp::Like => format!("{} LIKE {}", column, self.param(data.clone(), kind)),
            FilterOp::Contains => {
                let needle = data
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("contains requires a string".to_string()))?;
                let pattern = format!("%{}%", escape_like(needle));
                format!("{} ILIKE {}", column, self.param(Value::String(pattern), kind))
            }
            FilterOp::In => match data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone(), kind)).collect();
                    format!("{} IN ({})", column, params.join(", "))
                }
                other => format!("{} = {}", column, self.param(other.clone(), kind)),
            },
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => format!(
                    "{} BETWEEN {} AND {}",
                    column,
                    self.param(values[0].clone(), kind),
                    self.param(values[1].clone(), kind)
                ),
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "between requires exactly 2 values".to_string(),
                    ))
                }
            },
        })
    }

    fn param(&mut self, value: Value, kind: ColumnKind) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        match kind {
            ColumnKind::Uuid => format!("${}::uuid", self.param_index),
            ColumnKind::Timestamp => format!("${}::timestamptz", self.param_index),
            _ => format!("${}", self.param_index),
        }
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
