/// Shared types used across the codebase

use serde_json::{Map, Value};

/// A stored row (resource or join record) as a JSON object keyed by column name.
pub type Record = Map<String, Value>;

/// Operations exposed for every resource. Association variants carry the
/// association name (e.g. `permissions` on roles).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Get,
    Update,
    Delete,
    ListAssociated(String),
    AddAssociations(String),
    GetAssociated(String),
    UpdateAssociated(String),
    RemoveAssociated(String),
}

impl Operation {
    /// Association this operation works on, if any
    pub fn association(&self) -> Option<&str> {
        match self {
            Operation::ListAssociated(name)
            | Operation::AddAssociations(name)
            | Operation::GetAssociated(name)
            | Operation::UpdateAssociated(name)
            | Operation::RemoveAssociated(name) => Some(name),
            _ => None,
        }
    }

    /// Successful creations answer with 201 instead of 200
    pub fn is_creation(&self) -> bool {
        matches!(self, Operation::Create | Operation::AddAssociations(_))
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::ListAssociated(_) => "list_associated",
            Operation::AddAssociations(_) => "add_associations",
            Operation::GetAssociated(_) => "get_associated",
            Operation::UpdateAssociated(_) => "update_associated",
            Operation::RemoveAssociated(_) => "remove_associated",
        }
    }
}
