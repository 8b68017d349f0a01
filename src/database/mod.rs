pub mod manager;
pub mod repository;
pub mod service;

pub use manager::DatabaseManager;
pub use repository::{find_owner, RepositoryError, RepositoryResult, ResourceRepository};
pub use service::ResourceService;
