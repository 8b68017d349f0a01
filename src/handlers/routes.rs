use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, RawQuery},
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, on, MethodFilter, MethodRouter},
    Router,
};
use serde_json::Value;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::controller::ResourceController;
use super::public;
use super::query::parse_query;
use crate::auth::Caller;
use crate::config::{AppConfig, Environment, SecurityConfig};
use crate::error::ApiError;
use crate::middleware::{jwt_auth_middleware, ApiResult, JwtSecret};
use crate::resources;
use crate::schema::{RawBody, RawRequest, SchemaError};
use crate::store::Store;
use crate::types::Operation;

/// Builds the whole application: public endpoints plus one route family per
/// resource, each behind bearer-token decoding.
pub fn create_router(store: Arc<dyn Store>, config: &AppConfig) -> Result<Router, SchemaError> {
    let definitions = resources::all();
    let names = public::resource_names(&definitions);

    let mut api = Router::new();
    for definition in definitions {
        let controller = Arc::new(ResourceController::new(
            Arc::new(definition),
            store.clone(),
            &config.filter,
        )?);
        api = api.merge(resource_routes(&controller));
    }
    let api = api
        .layer(from_fn_with_state(
            JwtSecret(Arc::new(config.security.jwt_secret.clone())),
            jwt_auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    let health_store = store.clone();
    let mut app = Router::new()
        .route("/", get(move || public::root(names.clone())))
        .route("/health", get(move || public::health(health_store.clone())))
        .merge(api)
        .fallback(not_found);

    if config.security.enable_cors {
        app = app.layer(cors_layer(config.environment, &config.security));
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    Ok(app)
}

/// Collection, item, association and association-item routes for one resource
fn resource_routes(controller: &Arc<ResourceController>) -> Router {
    let definition = controller.definition();
    let base = format!("/api/{}", definition.plural);
    info!("Mounting {}", base);

    let mut router = Router::new()
        .route(
            &base,
            endpoint(controller, MethodFilter::GET, Operation::List)
                .merge(endpoint(controller, MethodFilter::POST, Operation::Create))
                .fallback(method_not_allowed),
        )
        .route(
            &format!("{}/:id", base),
            endpoint(controller, MethodFilter::GET, Operation::Get)
                .merge(endpoint(controller, MethodFilter::PUT, Operation::Update))
                .merge(endpoint(controller, MethodFilter::PATCH, Operation::Update))
                .merge(endpoint(controller, MethodFilter::DELETE, Operation::Delete))
                .fallback(method_not_allowed),
        );

    for association in &definition.associations {
        let name = association.name.clone();
        router = router
            .route(
                &format!("{}/:id/{}", base, name),
                endpoint(controller, MethodFilter::GET, Operation::ListAssociated(name.clone()))
                    .merge(endpoint(controller, MethodFilter::POST, Operation::AddAssociations(name.clone())))
                    .merge(endpoint(controller, MethodFilter::PUT, Operation::AddAssociations(name.clone())))
                    .fallback(method_not_allowed),
            )
            .route(
                &format!("{}/:id/{}/:item_id", base, name),
                endpoint(controller, MethodFilter::GET, Operation::GetAssociated(name.clone()))
                    .merge(endpoint(controller, MethodFilter::PUT, Operation::UpdateAssociated(name.clone())))
                    .merge(endpoint(controller, MethodFilter::PATCH, Operation::UpdateAssociated(name.clone())))
                    .merge(endpoint(controller, MethodFilter::DELETE, Operation::RemoveAssociated(name)))
                    .fallback(method_not_allowed),
            );
    }
    router
}

fn endpoint(controller: &Arc<ResourceController>, method: MethodFilter, operation: Operation) -> MethodRouter {
    let controller = controller.clone();
    on(
        method,
        move |caller: Caller,
              params: Option<Path<HashMap<String, String>>>,
              RawQuery(query): RawQuery,
              body: Bytes| {
            let controller = controller.clone();
            let operation = operation.clone();
            async move { dispatch(&controller, operation, caller, params, query, body).await }
        },
    )
}

async fn dispatch(
    controller: &ResourceController,
    operation: Operation,
    caller: Caller,
    params: Option<Path<HashMap<String, String>>>,
    query: Option<String>,
    body: Bytes,
) -> ApiResult<Value> {
    let params = params
        .map(|Path(params)| params.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        .unwrap_or_default();

    let request = RawRequest {
        params: Value::Object(params),
        query: parse_query(query.as_deref()),
        body: raw_body(&body),
    };
    controller.handle(operation, &caller, request).await
}

/// Empty or whitespace-only bodies count as absent
fn raw_body(bytes: &[u8]) -> RawBody {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return RawBody::Empty;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => RawBody::Json(value),
        Err(e) => RawBody::Malformed(e.to_string()),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed("Method not allowed")
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn cors_layer(environment: Environment, security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let wildcard = security.cors_origins.iter().any(|origin| origin == "*");
    if wildcard || (security.cors_origins.is_empty() && environment == Environment::Development) {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
