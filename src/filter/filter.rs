use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{
    Condition, FilterDescriptor, FilterOp, FilterOrderInfo, FilterWhereInfo, FilterWhereOptions,
    SortDirection, SqlResult, StoreQuery,
};

const TARGET_ALIAS: &str = "t";
const JOIN_ALIAS: &str = "j";

/// Join-table hop used when selecting associated rows: rows of the target
/// table linked to `owner` through `table`.
#[derive(Debug, Clone)]
pub struct FilterJoin {
    pub table: String,
    pub owner_column: String,
    pub target_column: String,
    pub owner: Uuid,
    /// Key under which the join record is nested in each result row
    pub nest_as: String,
}

pub struct Filter {
    table_name: String,
    query: StoreQuery,
    join: Option<FilterJoin>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if table_name.is_empty() {
            return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string()));
        }
        if !validate_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name.to_string()));
        }
        Ok(Self {
            table_name,
            query: StoreQuery::default(),
            join: None,
        })
    }

    /// Translates a validated filter descriptor into a store query.
    ///
    /// Literals become equality conditions and operator conditions keep their
    /// operator. Without `sort_by` rows come back in creation order; `id` is
    /// always the final tie-breaker so pagination is stable. A projection
    /// that is combined with eager loads keeps `id` so the loads can resolve.
    pub fn translate(descriptor: &FilterDescriptor) -> StoreQuery {
        let conditions = descriptor
            .conditions
            .iter()
            .map(|filter| {
                let (operator, data) = match &filter.condition {
                    Condition::Literal(value) => (FilterOp::Eq, value.clone()),
                    Condition::Operator(op, value) => (*op, value.clone()),
                };
                FilterWhereInfo {
                    column: filter.column.clone(),
                    kind: filter.kind,
                    operator,
                    data,
                }
            })
            .collect();

        let select = descriptor.attributes.clone().map(|mut columns| {
            if !descriptor.include.is_empty() && !columns.iter().any(|c| c == "id") {
                columns.insert(0, "id".to_string());
            }
            columns
        });

        let mut order = match &descriptor.sort_by {
            Some(column) => vec![FilterOrderInfo {
                column: column.clone(),
                sort: descriptor.order_by,
            }],
            None => vec![FilterOrderInfo {
                column: "created_at".to_string(),
                sort: SortDirection::Asc,
            }],
        };
        if !order.iter().any(|o| o.column == "id") {
            order.push(FilterOrderInfo {
                column: "id".to_string(),
                sort: SortDirection::Asc,
            });
        }

        StoreQuery {
            conditions,
            select,
            order,
            limit: descriptor.limit,
            offset: descriptor.offset,
            include: descriptor.include.clone(),
            paranoid: descriptor.paranoid,
        }
    }

    pub fn assign(&mut self, query: StoreQuery) -> Result<&mut Self, FilterError> {
        if let Some(columns) = &query.select {
            Self::validate_select_columns(columns)?;
        }
        if let Some(limit) = query.limit {
            if limit < 0 {
                return Err(FilterError::InvalidLimit(format!("must be non-negative, got {}", limit)));
            }
        }
        if let Some(offset) = query.offset {
            if offset < 0 {
                return Err(FilterError::InvalidOffset(format!("must be non-negative, got {}", offset)));
            }
        }
        self.query = query;
        Ok(self)
    }

    pub fn through(&mut self, join: FilterJoin) -> Result<&mut Self, FilterError> {
        for name in [&join.owner_column, &join.target_column, &join.nest_as] {
            if !validate_identifier(name) {
                return Err(FilterError::InvalidColumn(name.clone()));
            }
        }
        if !validate_identifier(&join.table) {
            return Err(FilterError::InvalidTableName(join.table.clone()));
        }
        self.join = Some(join);
        Ok(self)
    }

    /// Renders the full select. Each result row is a single JSON column
    /// named `row`.
    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let options = FilterWhereOptions {
            paranoid: self.query.paranoid,
        };
        let select_clause = self.build_select_clause();

        let (from_clause, mut conditions, mut params) = match &self.join {
            Some(join) => {
                let from = format!(
                    "FROM \"{}\" AS \"{}\" JOIN \"{}\" AS \"{}\" ON {} = {}",
                    self.table_name,
                    TARGET_ALIAS,
                    join.table,
                    JOIN_ALIAS,
                    quote_column(Some(JOIN_ALIAS), &join.target_column),
                    quote_column(Some(TARGET_ALIAS), "id"),
                );
                let mut conditions = vec![format!(
                    "{} = $1::uuid",
                    quote_column(Some(JOIN_ALIAS), &join.owner_column)
                )];
                if let Some(clause) = FilterWhere::paranoid_clause(Some(JOIN_ALIAS), &options) {
                    conditions.push(clause);
                }
                (from, conditions, vec![Value::String(join.owner.to_string())])
            }
            None => (
                format!("FROM \"{}\" AS \"{}\"", self.table_name, TARGET_ALIAS),
                vec![],
                vec![],
            ),
        };

        let (where_clause, where_params) =
            FilterWhere::generate(&self.query.conditions, Some(TARGET_ALIAS), params.len(), &options)?;
        conditions.push(where_clause);
        params.extend(where_params);

        let order_clause = FilterOrder::generate(&self.query.order, Some(TARGET_ALIAS))?;
        let limit_clause = self.build_limit_clause();

        let inner = [
            format!("SELECT {}", select_clause),
            from_clause,
            format!("WHERE {}", conditions.join(" AND ")),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult {
            query: format!("SELECT row_to_json(r) AS row FROM ({}) r", inner),
            params,
        })
    }

    fn validate_select_columns(columns: &[String]) -> Result<(), FilterError> {
        for column in columns {
            if column.is_empty() {
                return Err(FilterError::InvalidColumn("Column name cannot be empty".to_string()));
            }
            if !validate_identifier(column) {
                return Err(FilterError::InvalidColumn(column.to_string()));
            }
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        let mut columns = match &self.query.select {
            Some(columns) if !columns.is_empty() => columns
                .iter()
                .map(|c| quote_column(Some(TARGET_ALIAS), c))
                .collect::<Vec<_>>(),
            _ => vec![format!("\"{}\".*", TARGET_ALIAS)],
        };
        if let Some(join) = &self.join {
            columns.push(format!("row_to_json(\"{}\") AS \"{}\"", JOIN_ALIAS, join.nest_as));
        }
        columns.join(", ")
    }

    fn build_limit_clause(&self) -> String {
        match (self.query.limit, self.query.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

/// Identifiers must start with a letter or underscore and contain only
/// ASCII alphanumerics and underscores.
pub fn validate_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

pub fn quote_column(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("\"{}\".\"{}\"", alias, column),
        None => format!("\"{}\"", column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{ColumnKind, FieldFilter};
    use serde_json::json;

    #[test]
    fn empty_descriptor_matches_all_visible_rows() {
        let query = Filter::translate(&FilterDescriptor::default());
        assert!(query.conditions.is_empty());
        assert!(query.select.is_none());
        assert!(query.paranoid);
        assert_eq!(query.limit, None);
        assert_eq!(query.offset, None);
        assert_eq!(
            query.order.iter().map(|o| o.column.as_str()).collect::<Vec<_>>(),
            vec!["created_at", "id"]
        );
    }

    #[test]
    fn translates_conditions_projection_and_paging() {
        let descriptor = FilterDescriptor {
            conditions: vec![
                FieldFilter {
                    column: "name".into(),
                    kind: ColumnKind::Text,
                    condition: Condition::Literal(json!("demo")),
                },
                FieldFilter {
                    column: "rating".into(),
                    kind: ColumnKind::Integer,
                    condition: Condition::Operator(FilterOp::Between, json!([1, 3])),
                },
            ],
            attributes: Some(vec!["name".into()]),
            include: vec!["permissions".into()],
            sort_by: Some("name".into()),
            order_by: SortDirection::Desc,
            limit: Some(2),
            offset: Some(1),
            paranoid: false,
            force: false,
        };
        let query = Filter::translate(&descriptor);

        assert_eq!(query.conditions[0].operator, FilterOp::Eq);
        assert_eq!(query.conditions[1].operator, FilterOp::Between);
        assert_eq!(query.select, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(query.include, vec!["permissions".to_string()]);
        assert_eq!(query.order[0], FilterOrderInfo { column: "name".into(), sort: SortDirection::Desc });
        assert_eq!(query.order[1].column, "id");
        assert!(!query.paranoid);
        assert_eq!((query.limit, query.offset), (Some(2), Some(1)));
    }

    #[test]
    fn renders_plain_select() {
        let mut filter = Filter::new("roles").unwrap();
        filter
            .assign(StoreQuery {
                limit: Some(10),
                ..Filter::translate(&FilterDescriptor::default())
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT row_to_json(r) AS row FROM (SELECT \"t\".* FROM \"roles\" AS \"t\" WHERE \"t\".\"deleted_at\" IS NULL ORDER BY \"t\".\"created_at\" ASC, \"t\".\"id\" ASC LIMIT 10) r"
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn renders_join_select_with_owner_parameter_first() {
        let owner = Uuid::new_v4();
        let mut filter = Filter::new("permissions").unwrap();
        filter
            .assign(StoreQuery::default().with_key(Uuid::nil()))
            .unwrap()
            .through(FilterJoin {
                table: "role_permissions".into(),
                owner_column: "role_id".into(),
                target_column: "permission_id".into(),
                owner,
                nest_as: "role_permission".into(),
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT row_to_json(r) AS row FROM (SELECT \"t\".*, row_to_json(\"j\") AS \"role_permission\" FROM \"permissions\" AS \"t\" JOIN \"role_permissions\" AS \"j\" ON \"j\".\"permission_id\" = \"t\".\"id\" WHERE \"j\".\"role_id\" = $1::uuid AND \"j\".\"deleted_at\" IS NULL AND \"t\".\"deleted_at\" IS NULL AND \"t\".\"id\" = $2::uuid) r"
        );
        assert_eq!(sql.params[0], json!(owner.to_string()));
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn rejects_bad_table_and_column_names() {
        assert!(Filter::new("").is_err());
        assert!(Filter::new("roles; drop").is_err());
        let mut filter = Filter::new("roles").unwrap();
        let query = StoreQuery {
            select: Some(vec!["na me".into()]),
            ..StoreQuery::default()
        };
        assert!(filter.assign(query).is_err());
    }
}
