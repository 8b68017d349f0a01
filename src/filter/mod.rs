pub mod descriptor;
pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod types;

pub use error::FilterError;
pub use filter::{Filter, FilterJoin};
pub use types::*;
