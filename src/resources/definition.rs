use crate::schema::{FieldRule, SectionSchema};
use crate::store::Link;
use crate::types::Operation;

/// Columns every resource row and join record carries, written only by the
/// repository.
pub const AUDIT_COLUMNS: &[&str] = &[
    "created_at",
    "updated_at",
    "deleted_at",
    "created_by",
    "updated_by",
    "deleted_by",
];

/// Declarative description of one REST resource. Everything the generic
/// controller, service and repository need is derived from it.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    /// Singular noun used in permission strings (`worker`)
    pub singular: String,
    /// Plural noun used in routes and permission strings (`workers`)
    pub plural: String,
    pub table: String,
    /// Business attributes, without `id` and the audit columns
    pub fields: SectionSchema,
    pub associations: Vec<AssociationDefinition>,
}

impl ResourceDefinition {
    pub fn new(singular: &str, plural: &str) -> Self {
        Self {
            singular: singular.to_string(),
            plural: plural.to_string(),
            table: plural.to_string(),
            fields: SectionSchema::new(),
            associations: vec![],
        }
    }

    pub fn fields(mut self, fields: SectionSchema) -> Self {
        self.fields = fields;
        self
    }

    pub fn association(mut self, association: AssociationDefinition) -> Self {
        self.associations.push(association);
        self
    }

    pub fn find_association(&self, name: &str) -> Option<&AssociationDefinition> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Every column of the resource table
    pub fn attributes(&self) -> Vec<String> {
        column_names(&self.fields)
    }

    /// All operations exposed for this resource, association operations
    /// included.
    pub fn operations(&self) -> Vec<Operation> {
        let mut operations = vec![
            Operation::List,
            Operation::Create,
            Operation::Get,
            Operation::Update,
            Operation::Delete,
        ];
        for association in &self.associations {
            let name = association.name.clone();
            operations.extend([
                Operation::ListAssociated(name.clone()),
                Operation::AddAssociations(name.clone()),
                Operation::GetAssociated(name.clone()),
                Operation::UpdateAssociated(name.clone()),
                Operation::RemoveAssociated(name),
            ]);
        }
        operations
    }

    /// Permission string gating `operation`; `None` for associations this
    /// resource does not declare.
    pub fn permission(&self, operation: &Operation) -> Option<String> {
        let one = &self.singular;
        let many = &self.plural;
        let assoc = |name: &str| self.find_association(name);

        Some(match operation {
            Operation::List => format!("get {}", many),
            Operation::Create => format!("create {}", many),
            Operation::Get => format!("get {}", one),
            Operation::Update => format!("update {}", one),
            Operation::Delete => format!("delete {}", one),
            Operation::ListAssociated(name) => format!("get {} from {}", assoc(name)?.name, one),
            Operation::AddAssociations(name) => format!("add {} to {}", assoc(name)?.name, one),
            Operation::GetAssociated(name) => format!("get {} from {}", assoc(name)?.singular, one),
            Operation::UpdateAssociated(name) => format!("update {} from {}", assoc(name)?.singular, one),
            Operation::RemoveAssociated(name) => format!("remove {} from {}", assoc(name)?.singular, one),
        })
    }

    pub fn link(&self, association: &AssociationDefinition) -> Link {
        Link {
            owner_table: self.table.clone(),
            target_table: association.target_table.clone(),
            join_table: association.join_table.clone(),
            owner_key: association.owner_key.clone(),
            foreign_key: association.foreign_key.clone(),
            through: association.through.clone(),
        }
    }
}

/// Many-to-many relation from a resource to a target table through a join
/// table.
#[derive(Debug, Clone)]
pub struct AssociationDefinition {
    /// Plural name, used as the route segment and in the add body
    pub name: String,
    pub singular: String,
    pub target_table: String,
    /// Business attributes of the target rows, for filtering associated lists
    pub target_fields: SectionSchema,
    pub join_table: String,
    /// Key the join record is nested under (`role_permission`)
    pub through: String,
    pub owner_key: String,
    pub foreign_key: String,
    /// Relation-scoped attributes of the join record
    pub join_fields: SectionSchema,
}

impl AssociationDefinition {
    pub fn new(name: &str, singular: &str, join_table: &str, through: &str) -> Self {
        Self {
            name: name.to_string(),
            singular: singular.to_string(),
            target_table: name.to_string(),
            target_fields: SectionSchema::new(),
            join_table: join_table.to_string(),
            through: through.to_string(),
            owner_key: String::new(),
            foreign_key: format!("{}_id", singular),
            join_fields: SectionSchema::new(),
        }
    }

    pub fn keys(mut self, owner_key: &str, foreign_key: &str) -> Self {
        self.owner_key = owner_key.to_string();
        self.foreign_key = foreign_key.to_string();
        self
    }

    /// Target table and its attributes when they differ from the defaults
    pub fn target(mut self, table: &str, fields: SectionSchema) -> Self {
        self.target_table = table.to_string();
        self.target_fields = fields;
        self
    }

    pub fn join_fields(mut self, fields: SectionSchema) -> Self {
        self.join_fields = fields;
        self
    }

    pub fn join_field(mut self, name: &str, rule: FieldRule) -> Self {
        self.join_fields = self.join_fields.field(name, rule);
        self
    }

    pub fn target_attributes(&self) -> Vec<String> {
        column_names(&self.target_fields)
    }
}

fn column_names(fields: &SectionSchema) -> Vec<String> {
    let mut columns = vec!["id".to_string()];
    columns.extend(fields.names());
    columns.extend(AUDIT_COLUMNS.iter().map(|c| c.to_string()));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> ResourceDefinition {
        ResourceDefinition::new("role", "roles")
            .fields(SectionSchema::new().field("name", FieldRule::string().required()))
            .association(
                AssociationDefinition::new("permissions", "permission", "role_permissions", "role_permission")
                    .keys("role_id", "permission_id"),
            )
    }

    #[test]
    fn permission_strings() {
        let role = role();
        assert_eq!(role.permission(&Operation::List).unwrap(), "get roles");
        assert_eq!(role.permission(&Operation::Create).unwrap(), "create roles");
        assert_eq!(role.permission(&Operation::Update).unwrap(), "update role");
        assert_eq!(
            role.permission(&Operation::ListAssociated("permissions".into())).unwrap(),
            "get permissions from role"
        );
        assert_eq!(
            role.permission(&Operation::AddAssociations("permissions".into())).unwrap(),
            "add permissions to role"
        );
        assert_eq!(
            role.permission(&Operation::RemoveAssociated("permissions".into())).unwrap(),
            "remove permission from role"
        );
        assert!(role.permission(&Operation::GetAssociated("users".into())).is_none());
    }

    #[test]
    fn attributes_include_key_and_audit_columns() {
        let attributes = role().attributes();
        assert_eq!(attributes[0], "id");
        assert!(attributes.contains(&"name".to_string()));
        assert!(attributes.contains(&"deleted_at".to_string()));
    }

    #[test]
    fn operations_cover_associations() {
        assert_eq!(role().operations().len(), 10);
    }

    #[test]
    fn link_carries_join_columns() {
        let role = role();
        let link = role.link(&role.associations[0]);
        assert_eq!(link.owner_table, "roles");
        assert_eq!(link.target_table, "permissions");
        assert_eq!(link.owner_key, "role_id");
        assert_eq!(link.through, "role_permission");
    }
}
