//! Access-gated controller shared by every resource.
//!
//! Each request runs four stages in order and stops at the first failure:
//! authorize, validate, invoke, respond. Errors turn into HTTP responses only
//! here, through the `From` conversions into `ApiError`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::config::FilterConfig;
use crate::database::{ResourceRepository, ResourceService};
use crate::error::ApiError;
use crate::filter::FilterDescriptor;
use crate::middleware::{ApiResponse, ApiResult};
use crate::resources::{operation_schema, ResourceDefinition};
use crate::schema::{RawRequest, SchemaError, ValidatedRequest, Validator};
use crate::store::Store;
use crate::types::{Operation, Record};

pub struct ResourceController {
    definition: Arc<ResourceDefinition>,
    service: ResourceService,
    validators: HashMap<Operation, Validator>,
    debug_logging: bool,
}

impl ResourceController {
    /// Builds the service stack for `definition` and compiles one validator
    /// per operation. Inconsistent schemas fail here, before serving.
    pub fn new(
        definition: Arc<ResourceDefinition>,
        store: Arc<dyn Store>,
        filter: &FilterConfig,
    ) -> Result<Self, SchemaError> {
        let validators = definition
            .operations()
            .into_iter()
            .map(|operation| {
                let validator = operation_schema(&definition, &operation, filter)?.compile()?;
                Ok((operation, validator))
            })
            .collect::<Result<HashMap<_, _>, SchemaError>>()?;

        let repository = Arc::new(ResourceRepository::new(definition.clone(), store));
        Ok(Self {
            definition,
            service: ResourceService::new(repository),
            validators,
            debug_logging: filter.debug_logging,
        })
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub async fn handle(&self, operation: Operation, caller: &Caller, request: RawRequest) -> ApiResult<Value> {
        let permission = self.authorize(&operation, caller)?;

        let validator = self
            .validators
            .get(&operation)
            .ok_or_else(|| ApiError::not_found(format!("Unknown operation on {}", self.definition.plural)))?;
        let input = validator.validate(&request).map_err(|e| {
            warn!(%permission, "Rejected {} input: {}", operation.name(), e);
            ApiError::from(e)
        })?;
        let descriptor = FilterDescriptor::from_query(&input.query, validator.schema().query.as_ref())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if self.debug_logging {
            debug!(resource = %self.definition.plural, ?descriptor, "Filter descriptor");
        }

        debug!(resource = %self.definition.plural, operation = operation.name(), "Invoking service");
        let data = self.invoke(&operation, caller, input, &descriptor).await?;

        Ok(if operation.is_creation() {
            ApiResponse::created(data)
        } else {
            ApiResponse::success(data)
        })
    }

    /// Fails closed before any data access. The message never depends on
    /// whether the addressed row exists.
    fn authorize(&self, operation: &Operation, caller: &Caller) -> Result<String, ApiError> {
        let permission = self
            .definition
            .permission(operation)
            .ok_or_else(|| ApiError::not_found(format!("Unknown operation on {}", self.definition.plural)))?;

        if !caller.has_permission(&permission) {
            warn!(%permission, user_id = ?caller.user_id, "Permission denied");
            return Err(ApiError::forbidden(format!("Missing permission '{}'", permission)));
        }
        Ok(permission)
    }

    async fn invoke(
        &self,
        operation: &Operation,
        caller: &Caller,
        input: ValidatedRequest,
        descriptor: &FilterDescriptor,
    ) -> Result<Value, ApiError> {
        let actor = caller.user_id;
        let ValidatedRequest { params, body, .. } = input;
        let service = &self.service;

        Ok(match operation {
            Operation::List => rows(service.list(descriptor).await?),
            Operation::Create => Value::Object(service.create(body, actor).await?),
            Operation::Get => Value::Object(service.get(param(&params, "id")?, descriptor).await?),
            Operation::Update => {
                Value::Object(service.update(param(&params, "id")?, body, descriptor, actor).await?)
            }
            Operation::Delete => Value::Object(service.delete(param(&params, "id")?, descriptor, actor).await?),
            Operation::ListAssociated(name) => {
                rows(service.list_associated(param(&params, "id")?, name, descriptor).await?)
            }
            Operation::AddAssociations(name) => {
                let mut values = body;
                let targets = targets(values.remove(name), name)?;
                rows(
                    service
                        .add_associations(param(&params, "id")?, name, &targets, values, actor)
                        .await?,
                )
            }
            Operation::GetAssociated(name) => Value::Object(
                service
                    .get_associated(param(&params, "id")?, name, param(&params, "item_id")?, descriptor)
                    .await?,
            ),
            Operation::UpdateAssociated(name) => Value::Object(
                service
                    .update_associated(
                        param(&params, "id")?,
                        name,
                        param(&params, "item_id")?,
                        body,
                        descriptor,
                        actor,
                    )
                    .await?,
            ),
            Operation::RemoveAssociated(name) => Value::Object(
                service
                    .remove_associated(param(&params, "id")?, name, param(&params, "item_id")?, descriptor, actor)
                    .await?,
            ),
        })
    }
}

fn rows(rows: Vec<Record>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

fn param(params: &Record, name: &str) -> Result<Uuid, ApiError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ApiError::validation_error(format!("params.{} must be a valid UUID", name), format!("params.{}", name)))
}

fn targets(value: Option<Value>, name: &str) -> Result<Vec<Uuid>, ApiError> {
    let invalid = || ApiError::validation_error(format!("body.{} must be a list of UUIDs", name), format!("body.{}", name));
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().and_then(|s| Uuid::parse_str(s).ok()).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}
