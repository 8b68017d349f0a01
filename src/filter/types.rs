use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators a filter condition can use. `Eq` is what a literal
/// value translates to; the rest are spelled out by clients as operator
/// objects, e.g. `name[like]=%crane%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Like,
    Contains,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
}

impl FilterOp {
    /// Maps a client-facing operator key. Equality has no key; it is the
    /// literal form.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "like" => FilterOp::Like,
            "contains" => FilterOp::Contains,
            "in" => FilterOp::In,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "between" => FilterOp::Between,
            _ => return None,
        })
    }

    pub fn key(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Like => "like",
            FilterOp::Contains => "contains",
            FilterOp::In => "in",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Between => "between",
        }
    }
}

/// Storage-level kind of a column, used to cast bound parameters and to
/// compare values in the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Integer,
    Number,
    Boolean,
    Timestamp,
}

/// A single field condition: either a literal (equality) or one operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Literal(Value),
    Operator(FilterOp, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub column: String,
    pub kind: ColumnKind,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Normalised, validated form of a request's query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor {
    pub conditions: Vec<FieldFilter>,
    pub attributes: Option<Vec<String>>,
    pub include: Vec<String>,
    pub sort_by: Option<String>,
    pub order_by: SortDirection,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub paranoid: bool,
    pub force: bool,
}

impl Default for FilterDescriptor {
    fn default() -> Self {
        Self {
            conditions: vec![],
            attributes: None,
            include: vec![],
            sort_by: None,
            order_by: SortDirection::Asc,
            limit: None,
            offset: None,
            paranoid: true,
            force: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub column: String,
    pub kind: ColumnKind,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct FilterWhereOptions {
    pub paranoid: bool,
}

impl Default for FilterWhereOptions {
    fn default() -> Self {
        Self { paranoid: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

/// Store-level query: what the store executes after translation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub conditions: Vec<FilterWhereInfo>,
    pub select: Option<Vec<String>>,
    pub order: Vec<FilterOrderInfo>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub include: Vec<String>,
    pub paranoid: bool,
}

impl Default for StoreQuery {
    fn default() -> Self {
        Self {
            conditions: vec![],
            select: None,
            order: vec![],
            limit: None,
            offset: None,
            include: vec![],
            paranoid: true,
        }
    }
}

impl StoreQuery {
    /// Match everything visible under the given soft-delete mode
    pub fn visible(paranoid: bool) -> Self {
        Self { paranoid, ..Self::default() }
    }

    /// Adds an equality condition on `id`
    pub fn with_key(mut self, key: uuid::Uuid) -> Self {
        self.conditions.push(FilterWhereInfo {
            column: "id".to_string(),
            kind: ColumnKind::Uuid,
            operator: FilterOp::Eq,
            data: Value::String(key.to_string()),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
