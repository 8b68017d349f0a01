use std::sync::Arc;

use uuid::Uuid;

use crate::database::repository::{RepositoryError, RepositoryResult, ResourceRepository};
use crate::filter::FilterDescriptor;
use crate::types::Record;

/// One method per controller operation. Single-item reads always ask the
/// repository to fail on a miss.
pub struct ResourceService {
    repository: Arc<ResourceRepository>,
}

impl ResourceService {
    pub fn new(repository: Arc<ResourceRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, descriptor: &FilterDescriptor) -> RepositoryResult<Vec<Record>> {
        self.repository.list(descriptor).await
    }

    pub async fn create(&self, values: Record, actor: Option<Uuid>) -> RepositoryResult<Record> {
        self.repository.create(values, actor).await
    }

    pub async fn get(&self, key: Uuid, descriptor: &FilterDescriptor) -> RepositoryResult<Record> {
        self.repository
            .get_by_key(key, descriptor, true)
            .await?
            .ok_or_else(|| self.not_found(key))
    }

    pub async fn update(
        &self,
        key: Uuid,
        values: Record,
        descriptor: &FilterDescriptor,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        self.repository.update(key, values, descriptor.paranoid, actor).await
    }

    pub async fn delete(
        &self,
        key: Uuid,
        descriptor: &FilterDescriptor,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        self.repository
            .delete(key, descriptor.paranoid, descriptor.force, actor)
            .await
    }

    pub async fn list_associated(
        &self,
        key: Uuid,
        association: &str,
        descriptor: &FilterDescriptor,
    ) -> RepositoryResult<Vec<Record>> {
        self.repository.list_associated(key, association, descriptor).await
    }

    pub async fn add_associations(
        &self,
        key: Uuid,
        association: &str,
        targets: &[Uuid],
        values: Record,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Vec<Record>> {
        self.repository
            .add_associations(key, association, targets, values, actor)
            .await
    }

    pub async fn get_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        descriptor: &FilterDescriptor,
    ) -> RepositoryResult<Record> {
        self.repository
            .get_associated(key, association, item, descriptor, true)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("{} {}", association, item)))
    }

    pub async fn update_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        values: Record,
        descriptor: &FilterDescriptor,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        self.repository
            .update_associated(key, association, item, values, descriptor.paranoid, actor)
            .await
    }

    pub async fn remove_associated(
        &self,
        key: Uuid,
        association: &str,
        item: Uuid,
        descriptor: &FilterDescriptor,
        actor: Option<Uuid>,
    ) -> RepositoryResult<Record> {
        self.repository
            .remove_associated(key, association, item, descriptor.paranoid, descriptor.force, actor)
            .await
    }

    fn not_found(&self, key: Uuid) -> RepositoryError {
        RepositoryError::NotFound(format!("{} {}", self.repository.definition().singular, key))
    }
}
