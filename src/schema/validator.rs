use std::sync::Arc;

use serde_json::Value;

use super::error::{SchemaError, ValidationError};
use super::section::{Section, SectionSchema};
use crate::types::Record;

/// Request body as received from the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawBody {
    #[default]
    Empty,
    Json(Value),
    /// Bytes that did not parse as JSON; the parser's message is kept
    Malformed(String),
}

/// Unvalidated request input
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub params: Value,
    pub query: Value,
    pub body: RawBody,
}

/// Normalised request input: defaults applied, denied keys stripped, values
/// coerced to their declared kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedRequest {
    pub params: Record,
    pub query: Record,
    pub body: Record,
}

/// Declares which sections an operation accepts and what they may contain.
/// A `None` section must be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSchema {
    pub params: Option<SectionSchema>,
    pub query: Option<SectionSchema>,
    pub body: Option<SectionSchema>,
}

impl OperationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, schema: SectionSchema) -> Self {
        self.params = Some(schema);
        self
    }

    pub fn query(mut self, schema: SectionSchema) -> Self {
        self.query = Some(schema);
        self
    }

    pub fn body(mut self, schema: SectionSchema) -> Self {
        self.body = Some(schema);
        self
    }

    /// Checks the schema for internal consistency and freezes it
    pub fn compile(self) -> Result<Validator, SchemaError> {
        for (section, schema) in [
            (Section::Params, &self.params),
            (Section::Query, &self.query),
            (Section::Body, &self.body),
        ] {
            if let Some(schema) = schema {
                schema.check(section)?;
            }
        }
        Ok(Validator {
            schema: Arc::new(self),
        })
    }
}

/// Compiled, immutable request validator. Cheap to clone and safe to share
/// between requests.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<OperationSchema>,
}

impl Validator {
    pub fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    pub fn validate(&self, request: &RawRequest) -> Result<ValidatedRequest, ValidationError> {
        let body = match &request.body {
            RawBody::Empty => Value::Null,
            RawBody::Json(value) => value.clone(),
            RawBody::Malformed(reason) => {
                return Err(ValidationError::new("body", format!("must be valid JSON ({})", reason)));
            }
        };

        Ok(ValidatedRequest {
            params: validate_section(Section::Params, self.schema.params.as_ref(), &request.params)?,
            query: validate_section(Section::Query, self.schema.query.as_ref(), &request.query)?,
            body: validate_section(Section::Body, self.schema.body.as_ref(), &body)?,
        })
    }
}

fn validate_section(
    section: Section,
    schema: Option<&SectionSchema>,
    input: &Value,
) -> Result<Record, ValidationError> {
    match schema {
        Some(schema) => schema.validate(section, input),
        None => {
            let empty = match input {
                Value::Null => true,
                Value::Object(object) => object.is_empty(),
                _ => false,
            };
            if empty {
                Ok(Record::new())
            } else {
                Err(ValidationError::new(section.as_str(), "is not allowed"))
            }
        }
    }
}
