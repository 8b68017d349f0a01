use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use super::error::ValidationError;
use crate::filter::types::{ColumnKind, FilterOp};

/// Declared kind of a field. Values arriving as strings (path segments,
/// query strings) are coerced to the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Uuid,
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Enum(Vec<String>),
    List(Box<FieldKind>),
}

impl FieldKind {
    /// Operators a filterable field of this kind accepts
    pub fn operators(&self) -> &'static [FilterOp] {
        use FilterOp::*;
        match self {
            FieldKind::String => &[Like, Contains, In],
            FieldKind::Integer | FieldKind::Number | FieldKind::Date => {
                &[Gt, Gte, Lt, Lte, Between, In]
            }
            FieldKind::Uuid | FieldKind::Enum(_) => &[In],
            FieldKind::Boolean | FieldKind::List(_) => &[],
        }
    }

    pub fn column_kind(&self) -> ColumnKind {
        match self {
            FieldKind::Uuid => ColumnKind::Uuid,
            FieldKind::Integer => ColumnKind::Integer,
            FieldKind::Number => ColumnKind::Number,
            FieldKind::Boolean => ColumnKind::Boolean,
            FieldKind::Date => ColumnKind::Timestamp,
            FieldKind::String | FieldKind::Enum(_) | FieldKind::List(_) => ColumnKind::Text,
        }
    }

    /// Coerces `value` to this kind, returning the reason on failure
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match self {
            FieldKind::Uuid => match value {
                Value::String(s) => Uuid::parse_str(s)
                    .map(|id| Value::String(id.to_string()))
                    .map_err(|_| "must be a valid UUID".to_string()),
                _ => Err("must be a valid UUID".to_string()),
            },
            FieldKind::String => match value {
                Value::String(_) => Ok(value.clone()),
                _ => Err("must be a string".to_string()),
            },
            FieldKind::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| Value::Number(i.into()))
                    .map_err(|_| "must be an integer".to_string()),
                _ => Err("must be an integer".to_string()),
            },
            FieldKind::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => {
                    let s = s.trim();
                    if let Ok(i) = s.parse::<i64>() {
                        return Ok(Value::Number(i.into()));
                    }
                    s.parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .ok_or_else(|| "must be a number".to_string())
                }
                _ => Err("must be a number".to_string()),
            },
            FieldKind::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if s == "true" => Ok(Value::Bool(true)),
                Value::String(s) if s == "false" => Ok(Value::Bool(false)),
                _ => Err("must be a boolean".to_string()),
            },
            FieldKind::Date => match value {
                Value::String(s) => parse_date(s)
                    .map(|d| Value::String(format_timestamp(&d)))
                    .ok_or_else(|| "must be a valid date".to_string()),
                _ => Err("must be a valid date".to_string()),
            },
            FieldKind::Enum(allowed) => match value {
                Value::String(s) if allowed.iter().any(|a| a == s) => Ok(value.clone()),
                _ => Err(format!("must be one of [{}]", allowed.join(", "))),
            },
            FieldKind::List(inner) => {
                let items: Vec<Value> = match value {
                    Value::Array(items) => items.clone(),
                    Value::String(s) => s
                        .split(',')
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                    _ => return Err("must be a list".to_string()),
                };
                items
                    .iter()
                    .map(|item| inner.coerce(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
        }
    }
}

/// How a field reacts to being present in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPolicy {
    #[default]
    Allowed,
    /// Present → validation failure
    Forbidden,
    /// Present → silently stripped
    Denied,
}

/// Declarative rule for one field of a request section.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub filterable: bool,
    pub policy: FieldPolicy,
}

impl FieldRule {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            nullable: false,
            default: None,
            min: None,
            max: None,
            filterable: false,
            policy: FieldPolicy::Allowed,
        }
    }

    pub fn uuid() -> Self {
        Self::new(FieldKind::Uuid)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    pub fn one_of(values: &[&str]) -> Self {
        Self::new(FieldKind::Enum(values.iter().map(|v| v.to_string()).collect()))
    }

    pub fn list(item: FieldKind) -> Self {
        Self::new(FieldKind::List(Box::new(item)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn without_default(mut self) -> Self {
        self.default = None;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn forbidden(mut self) -> Self {
        self.policy = FieldPolicy::Forbidden;
        self
    }

    pub fn denied(mut self) -> Self {
        self.policy = FieldPolicy::Denied;
        self
    }

    /// Checks a present value and returns its normalised form
    pub fn check(&self, path: &str, value: &Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(ValidationError::new(path, "must not be null"))
            };
        }

        if let Value::Object(operators) = value {
            if self.filterable {
                return self.check_operators(path, operators);
            }
        }

        let coerced = self
            .kind
            .coerce(value)
            .map_err(|reason| ValidationError::new(path, reason))?;
        self.check_bounds(path, &coerced)?;
        Ok(coerced)
    }

    fn check_operators(
        &self,
        path: &str,
        operators: &Map<String, Value>,
    ) -> Result<Value, ValidationError> {
        if operators.is_empty() {
            return Err(ValidationError::new(path, "must contain at least one operator"));
        }

        let mut normalised = Map::new();
        for (key, operand) in operators {
            let op_path = format!("{}.{}", path, key);
            let op = FilterOp::from_key(key)
                .filter(|op| self.kind.operators().contains(op))
                .ok_or_else(|| ValidationError::new(&op_path, "is not a supported operator"))?;

            let value = match op {
                FilterOp::In => {
                    let list = FieldKind::List(Box::new(self.kind.clone()));
                    list.coerce(operand)
                        .map_err(|reason| ValidationError::new(&op_path, reason))?
                }
                FilterOp::Between => {
                    let list = FieldKind::List(Box::new(self.kind.clone()));
                    let bounds = list
                        .coerce(operand)
                        .map_err(|reason| ValidationError::new(&op_path, reason))?;
                    check_between(&op_path, &bounds)?;
                    bounds
                }
                FilterOp::Like | FilterOp::Contains => match operand {
                    Value::String(_) => operand.clone(),
                    _ => return Err(ValidationError::new(&op_path, "must be a string")),
                },
                _ => self
                    .kind
                    .coerce(operand)
                    .map_err(|reason| ValidationError::new(&op_path, reason))?,
            };
            normalised.insert(key.clone(), value);
        }
        Ok(Value::Object(normalised))
    }

    fn check_bounds(&self, path: &str, value: &Value) -> Result<(), ValidationError> {
        let (measure, unit) = match (&self.kind, value) {
            (FieldKind::String, Value::String(s)) => (s.chars().count() as f64, Some("characters")),
            (FieldKind::List(_), Value::Array(items)) => (items.len() as f64, Some("items")),
            (FieldKind::Integer | FieldKind::Number, Value::Number(n)) => {
                (n.as_f64().unwrap_or_default(), None)
            }
            _ => return Ok(()),
        };

        if let Some(min) = self.min {
            if measure < min {
                let message = match unit {
                    Some(unit) => format!("must contain at least {} {}", min, unit),
                    None => format!("must be greater than or equal to {}", min),
                };
                return Err(ValidationError::new(path, message));
            }
        }
        if let Some(max) = self.max {
            if measure > max {
                let message = match unit {
                    Some(unit) => format!("must contain at most {} {}", max, unit),
                    None => format!("must be less than or equal to {}", max),
                };
                return Err(ValidationError::new(path, message));
            }
        }
        Ok(())
    }
}

fn check_between(path: &str, bounds: &Value) -> Result<(), ValidationError> {
    let items = bounds.as_array().map(Vec::as_slice).unwrap_or_default();
    if items.len() != 2 {
        return Err(ValidationError::new(path, "requires exactly 2 values"));
    }
    let ordered = match (&items[0], &items[1]) {
        (Value::Number(lo), Value::Number(hi)) => {
            lo.as_f64().unwrap_or_default() <= hi.as_f64().unwrap_or_default()
        }
        (Value::String(lo), Value::String(hi)) => match (parse_date(lo), parse_date(hi)) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => lo <= hi,
        },
        _ => true,
    };
    if !ordered {
        return Err(ValidationError::new(path, "lower bound must not exceed upper bound"));
    }
    Ok(())
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical textual form for timestamps written by this service
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}
