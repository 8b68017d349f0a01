use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::filter::{Filter, FilterDescriptor, StoreQuery};
use crate::resources::{AssociationDefinition, ResourceDefinition};
use crate::schema::field::format_timestamp;
use crate::store::{Store, StoreError};
use crate::types::Record;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Unknown association: {0}")]
    UnknownAssociation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Resolves the owner row of nested association work. A missing owner is
/// always `NotFound`, whatever the caller asked for.
pub async fn find_owner(
    store: &dyn Store,
    definition: &ResourceDefinition,
    key: Uuid,
    paranoid: bool,
) -> RepositoryResult<Record> {
    store
        .find_by_key(&definition.table, key, &StoreQuery::visible(paranoid))
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("{} {}", definition.singular, key)))
}

/// Store I/O for one resource and its associations.
pub struct ResourceRepository {
    definition: Arc<ResourceDefinition>,
    store: Arc<dyn Store>,
}

impl ResourceRepository {
    pub fn new(definition: Arc<ResourceDefinition>, store: Arc<dyn Store>) -> Self {
        Self { definition, store }
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub async fn list(&self, descriptor: &FilterDescriptor) -> RepositoryResult<Vec<Record>> {
        let query = Filter::translate(descriptor);
        let rows = self.store.find_all(&self.definition.table, &query).await?;
        self.eager_load(rows, &query).await
    }

    pub async fn create(&self, mut values: Record, actor: Option<Uuid>) -> RepositoryResult<Record> {
        let now = now();
        values.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        values.insert("created_at".to_string(), now.clone());
        values.insert("updated_at".to_string(), now);
        values.insert("deleted_at".to_string(), Value::Null);
        values.insert("created_by".to_string(), actor_value(actor));
        values.insert("updated_by".to_string(), Value::Null);
        values.insert("deleted_by".to_string(), Value::Null);

        let row = self.store.create(&self.definition.table, values).await?;
        debug!("Created {} {}", self.definition.singular, row_key(&row));
        Ok(row)
    }

    pub async fn get_by_key(
        &self,
        key: Uuid,
        descriptor: &FilterDescriptor,
        throw_not_found: bool,
    ) -> RepositoryResult<Option<Record>> {
        let query = Filter::translate(descriptor);
        let row = self.store.find_by_key(&self.definition.table, key, &query).await?;
        match row {
            Some(row) => Ok(self.eager_load(vec![row], &query).await?.into_iter().next()),
            None if throw_not_found => Err(self.not_found(key)),
            None => Ok(None),
        }
    }

    pub async fn update(
        &self,
        key: Uuid,
        mut values: Record,
        paranoid: bool,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        self.resolve(key, paranoid).await?;

        values.insert("updated_at".to_string(), now());
        values.insert("updated_by".to_string(), actor_value(actor));
        Ok(self.store.update(&self.definition.table, key, values).await?)
    }

    /// Soft-deletes the row, or removes it when `force` is set. Returns the
    /// row as it was last stored.
    pub async fn delete(
        &self,
        key: Uuid,
        paranoid: bool,
        force: bool,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        let row = self.resolve(key, paranoid).await?;

        if force {
            self.store.destroy(&self.definition.table, key).await?;
            debug!("Destroyed {} {}", self.definition.singular, key);
            return Ok(row);
        }

        let mut stamp = Record::new();
        let now = now();
        stamp.insert("deleted_at".to_string(), now.clone());
        stamp.insert("updated_at".to_string(), now);
        if actor.is_some() {
            stamp.insert("deleted_by".to_string(), actor_value(actor));
        }
        Ok(self.store.update(&self.definition.table, key, stamp).await?)
    }

    pub async fn list_associated(
        &self,
        key: Uuid,
        association: &str,
        descriptor: &FilterDescriptor,
    ) -> RepositoryResult<Vec<Record>> {
        let association = self.association(association)?;
        find_owner(self.store.as_ref(), &self.definition, key, descriptor.paranoid).await?;

        let query = Filter::translate(descriptor);
        let link = self.definition.link(association);
        Ok(self.store.find_associated(&link, key, &query).await?)
    }

    /// Links the owner to every target not linked yet, restoring soft-removed
    /// links, and returns the new or restored join records.
    pub async fn add_associations(
        &self,
        key: Uuid,
        association: &str,
        targets: &[Uuid],
        mut values: Record,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Vec<Record>> {
        let association = self.association(association)?;
        find_owner(self.store.as_ref(), &self.definition, key, true).await?;

        let now = now();
        values.insert("created_at".to_string(), now.clone());
        values.insert("updated_at".to_string(), now);
        values.insert("deleted_at".to_string(), Value::Null);
        values.insert("created_by".to_string(), actor_value(actor));
        values.insert("updated_by".to_string(), Value::Null);
        values.insert("deleted_by".to_string(), Value::Null);

        let link = self.definition.link(association);
        let inserted = self.store.add_associated(&link, key, targets, values).await?;
        debug!(
            "Linked {} of {} {} through {}",
            inserted.len(),
            targets.len(),
            association.name,
            link.join_table
        );
        Ok(inserted)
    }

    pub async fn get_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        descriptor: &FilterDescriptor,
        throw_not_found: bool,
    ) -> RepositoryResult<Option<Record>> {
        let association = self.association(association)?;
        find_owner(self.store.as_ref(), &self.definition, key, descriptor.paranoid).await?;

        let query = Filter::translate(descriptor).with_key(item);
        let link = self.definition.link(association);
        let row = self.store.find_associated(&link, key, &query).await?.into_iter().next();
        match row {
            None if throw_not_found => Err(RepositoryError::NotFound(format!(
                "{} {} of {} {}",
                association.singular, item, self.definition.singular, key
            ))),
            row => Ok(row),
        }
    }

    /// Writes relation attributes onto the join record. Returns the target
    /// row with the updated join record nested.
    pub async fn update_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        mut values: Record,
        paranoid: bool,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        let mut row = self.resolve_associated(key, association, item, paranoid).await?;
        let association = self.association(association)?;

        values.insert("updated_at".to_string(), now());
        values.insert("updated_by".to_string(), actor_value(actor));
        let link = self.definition.link(association);
        let join = self.store.update_associated(&link, key, item, values).await?;
        row.insert(link.through, Value::Object(join));
        Ok(row)
    }

    /// Soft-deletes the join record, or removes it when `force` is set.
    pub async fn remove_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        paranoid: bool,
        force: bool,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        let mut row = self.resolve_associated(key, association, item, paranoid).await?;
        let association = self.association(association)?;
        let link = self.definition.link(association);

        if force {
            self.store.destroy_associated(&link, key, item).await?;
            return Ok(row);
        }

        let mut stamp = Record::new();
        let now = now();
        stamp.insert("deleted_at".to_string(), now.clone());
        stamp.insert("updated_at".to_string(), now);
        if actor.is_some() {
            stamp.insert("deleted_by".to_string(), actor_value(actor));
        }
        let join = self.store.update_associated(&link, key, item, stamp).await?;
        row.insert(link.through, Value::Object(join));
        Ok(row)
    }

    fn association(&self, name: &str) -> RepositoryResult<&AssociationDefinition> {
        self.definition
            .find_association(name)
            .ok_or_else(|| RepositoryError::UnknownAssociation(name.to_string()))
    }

    async fn resolve(&self, key: Uuid, paranoid: bool) -> RepositoryResult<Record> {
        self.store
            .find_by_key(&self.definition.table, key, &StoreQuery::visible(paranoid))
            .await?
            .ok_or_else(|| self.not_found(key))
    }

    async fn resolve_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        paranoid: bool,
    ) -> RepositoryResult<Record> {
        let descriptor = FilterDescriptor {
            paranoid,
            ..FilterDescriptor::default()
        };
        self.get_associated(key, association, item, &descriptor, true)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("{} {}", association, item)))
    }

    /// Attaches each requested association to every row, using the parent
    /// query's visibility.
    async fn eager_load(&self, mut rows: Vec<Record>, query: &StoreQuery) -> RepositoryResult<Vec<Record>> {
        if query.include.is_empty() || rows.is_empty() {
            return Ok(rows);
        }

        let nested = Filter::translate(&FilterDescriptor {
            paranoid: query.paranoid,
            ..FilterDescriptor::default()
        });
        for name in &query.include {
            let association = self.association(name)?;
            let link = self.definition.link(association);
            for row in rows.iter_mut() {
                let Some(key) = row_uuid(row) else { continue };
                let associated = self.store.find_associated(&link, key, &nested).await?;
                row.insert(
                    name.clone(),
                    Value::Array(associated.into_iter().map(Value::Object).collect()),
                );
            }
        }
        Ok(rows)
    }

    fn not_found(&self, key: Uuid) -> RepositoryError {
        RepositoryError::NotFound(format!("{} {}", self.definition.singular, key))
    }
}

fn now() -> Value {
    Value::String(format_timestamp(&Utc::now()))
}

fn actor_value(actor: Option<Uuid>) -> Value {
    actor.map_or(Value::Null, |id| Value::String(id.to_string()))
}

fn row_uuid(row: &Record) -> Option<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn row_key(row: &Record) -> String {
    row.get("id").and_then(Value::as_str).unwrap_or_default().to_string()
}
