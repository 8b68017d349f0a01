// Unauthenticated endpoints: service info and health

use std::sync::Arc;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::resources::ResourceDefinition;
use crate::store::Store;

pub async fn root(resources: Arc<Vec<String>>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Workforce API",
            "version": version,
            "description": "Permission-gated REST resources for jobs, workers and materials",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "resources": "/api/:resource[/:id[/:association[/:item_id]]] (permission-gated)",
            },
            "resources": resources.as_slice(),
        }
    }))
}

pub async fn health(store: Arc<dyn Store>) -> Response {
    let now = chrono::Utc::now();

    match store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            ApiError::service_unavailable("Data store unavailable").into_response()
        }
    }
}

/// Plural names listed on the root endpoint
pub fn resource_names(definitions: &[ResourceDefinition]) -> Arc<Vec<String>> {
    Arc::new(definitions.iter().map(|d| d.plural.clone()).collect())
}
