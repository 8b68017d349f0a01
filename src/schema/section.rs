use serde_json::{Map, Value};

use super::error::{SchemaError, ValidationError};
use super::field::{FieldPolicy, FieldRule};
use crate::types::Record;

/// Request sections a schema can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Params,
    Query,
    Body,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Params => "params",
            Section::Query => "query",
            Section::Body => "body",
        }
    }
}

/// Ordered set of field rules for one request section. Declaration order
/// decides which failure is reported first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionSchema {
    fields: Vec<(String, FieldRule)>,
}

impl SectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any existing rule of the same name
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = rule,
            None => self.fields.push((name, rule)),
        }
        self
    }

    /// Appends every field of `other`
    pub fn extend(mut self, other: &SectionSchema) -> Self {
        for (name, rule) in other.fields() {
            self = self.field(name.clone(), rule.clone());
        }
        self
    }

    /// Applies `f` to every rule
    pub fn map_rules(mut self, f: impl Fn(FieldRule) -> FieldRule) -> Self {
        self.fields = self
            .fields
            .into_iter()
            .map(|(name, rule)| (name, f(rule)))
            .collect();
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, rule)| rule)
    }

    pub fn fields(&self) -> impl Iterator<Item = &(String, FieldRule)> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consistency checks performed once, at compile time
    pub(crate) fn check(&self, section: Section) -> Result<(), SchemaError> {
        for (name, rule) in &self.fields {
            let path = format!("{}.{}", section.as_str(), name);
            if let (Some(min), Some(max)) = (rule.min, rule.max) {
                if min > max {
                    return Err(SchemaError::InvalidBounds(path));
                }
            }
            if rule.required && rule.policy != FieldPolicy::Allowed {
                return Err(SchemaError::RequiredForbidden(path));
            }
            if let Some(default) = &rule.default {
                rule.check(&path, default).map_err(|e| SchemaError::InvalidDefault {
                    field: path.clone(),
                    reason: e.message,
                })?;
            }
        }
        Ok(())
    }

    /// Validates one section of input. Unknown keys fail first, then fields
    /// are checked in declaration order.
    pub(crate) fn validate(&self, section: Section, input: &Value) -> Result<Record, ValidationError> {
        let empty = Map::new();
        let object = match input {
            Value::Null => &empty,
            Value::Object(object) => object,
            _ => return Err(ValidationError::new(section.as_str(), "must be an object")),
        };

        if let Some(unknown) = object.keys().find(|key| self.get(key).is_none()) {
            return Err(ValidationError::new(
                format!("{}.{}", section.as_str(), unknown),
                "is not allowed",
            ));
        }

        let mut output = Record::new();
        for (name, rule) in &self.fields {
            let path = format!("{}.{}", section.as_str(), name);
            match (object.get(name), rule.policy) {
                (Some(_), FieldPolicy::Forbidden) => {
                    return Err(ValidationError::new(path, "is not allowed"));
                }
                (_, FieldPolicy::Denied) | (None, FieldPolicy::Forbidden) => continue,
                (Some(value), FieldPolicy::Allowed) => {
                    output.insert(name.clone(), rule.check(&path, value)?);
                }
                (None, FieldPolicy::Allowed) => {
                    if rule.required {
                        return Err(ValidationError::new(path, "is required"));
                    }
                    if let Some(default) = &rule.default {
                        output.insert(name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(output)
    }
}
