pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, JwtSecret};
pub use response::{ApiResponse, ApiResult};
