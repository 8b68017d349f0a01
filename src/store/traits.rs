//! Store trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::StoreResult;
use crate::filter::StoreQuery;
use crate::types::Record;

/// Many-to-many link between an owner table and a target table through a
/// join table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub owner_table: String,
    pub target_table: String,
    pub join_table: String,
    /// Join column referencing the owner's `id`
    pub owner_key: String,
    /// Join column referencing the target's `id`
    pub foreign_key: String,
    /// Key the join record is nested under in associated rows
    pub through: String,
}

/// Abstract persistence interface.
///
/// Implementations must be thread-safe (Send + Sync). All rows carry a UUID
/// `id` and a nullable `deleted_at`; a query's `paranoid` flag decides
/// whether rows with `deleted_at` set are visible. Soft deletion is
/// performed by the caller through `update`; `destroy` always removes rows
/// physically.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Rows of `table` matching `query`, ordered and paginated.
    async fn find_all(&self, table: &str, query: &StoreQuery) -> StoreResult<Vec<Record>>;

    /// The row with the given key if it matches `query`.
    async fn find_by_key(&self, table: &str, key: Uuid, query: &StoreQuery) -> StoreResult<Option<Record>>;

    /// Inserts a row and returns it as stored.
    async fn create(&self, table: &str, values: Record) -> StoreResult<Record>;

    /// Writes `values` onto the row and returns the updated row.
    async fn update(&self, table: &str, key: Uuid, values: Record) -> StoreResult<Record>;

    /// Physically removes the row.
    async fn destroy(&self, table: &str, key: Uuid) -> StoreResult<()>;

    /// Target rows linked to `owner`, each with its join record nested under
    /// `link.through`. Targets that cannot be resolved are skipped; `query`
    /// applies to the target rows and its visibility to both sides.
    async fn find_associated(&self, link: &Link, owner: Uuid, query: &StoreQuery) -> StoreResult<Vec<Record>>;

    /// Links `owner` to every target not linked yet. `values` seeds the
    /// columns of each new join record. A soft-removed link is restored in
    /// place: deletion stamps cleared, `updated_by` taken from `created_by`.
    /// Returns the inserted and restored join records.
    async fn add_associated(
        &self,
        link: &Link,
        owner: Uuid,
        targets: &[Uuid],
        values: Record,
    ) -> StoreResult<Vec<Record>>;

    /// Writes `values` onto the join record and returns it.
    async fn update_associated(
        &self,
        link: &Link,
        owner: Uuid,
        target: Uuid,
        values: Record,
    ) -> StoreResult<Record>;

    /// Physically removes the join record.
    async fn destroy_associated(&self, link: &Link, owner: Uuid, target: Uuid) -> StoreResult<()>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> StoreResult<()>;
}
