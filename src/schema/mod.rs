pub mod error;
pub mod field;
pub mod section;
pub mod validator;

pub use error::{SchemaError, ValidationError};
pub use field::{FieldKind, FieldPolicy, FieldRule};
pub use section::{Section, SectionSchema};
pub use validator::{OperationSchema, RawBody, RawRequest, ValidatedRequest, Validator};
