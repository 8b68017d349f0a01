// HTTP surface: router assembly, the generic resource controller and
// query-string decoding.

pub mod controller;
pub mod public;
pub mod query;
pub mod routes;

pub use controller::ResourceController;
pub use routes::create_router;
