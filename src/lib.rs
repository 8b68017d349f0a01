pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod resources;
pub mod schema;
pub mod store;
pub mod types;

pub use handlers::create_router;
