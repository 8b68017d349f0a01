use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::auth::{decode_jwt, Caller};
use crate::error::ApiError;

/// Secret used to verify bearer tokens, shared with the middleware
#[derive(Clone)]
pub struct JwtSecret(pub Arc<String>);

/// Decodes the bearer token, if any, into a `Caller` request extension.
/// Requests without an Authorization header continue as anonymous; a header
/// that does not carry a valid token is rejected with 401.
pub async fn jwt_auth_middleware(
    State(secret): State<JwtSecret>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let caller = match extract_jwt_from_headers(&headers) {
        Ok(None) => Caller::anonymous(),
        Ok(Some(token)) => match decode_jwt(&token, &secret.0) {
            Ok(claims) => Caller::from(claims),
            Err(e) => {
                warn!("Rejected bearer token: {}", e);
                return ApiError::unauthorized(e.to_string()).into_response();
            }
        },
        Err(msg) => {
            warn!("Rejected Authorization header: {}", msg);
            return ApiError::unauthorized(msg).into_response();
        }
    };

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim().to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(extract_jwt_from_headers(&HeaderMap::new()), Ok(None));
    }

    #[test]
    fn requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer  "));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_jwt_from_headers(&headers), Ok(Some("abc.def".to_string())));
    }
}
