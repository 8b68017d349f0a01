//! In-memory store for development and tests.
//!
//! Tables are vectors of JSON rows kept in insertion order behind a single
//! `RwLock`. Join tables enforce the same rules a relational schema would:
//! one join record per (owner, target) pair and existing rows on both ends.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::traits::{Link, Store};
use crate::filter::{ColumnKind, FilterOp, FilterOrderInfo, FilterWhereInfo, SortDirection, StoreQuery};
use crate::schema::field::parse_date;
use crate::types::Record;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[instrument(skip(self, query))]
    async fn find_all(&self, table: &str, query: &StoreQuery) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Record> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| visible(row, query.paranoid) && matches(row, &query.conditions))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_rows(&mut rows, &query.order, |row| row);
        Ok(page(rows, query)
            .into_iter()
            .map(|row| project(&row, query.select.as_deref()))
            .collect())
    }

    async fn find_by_key(&self, table: &str, key: Uuid, query: &StoreQuery) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(key)))
            .filter(|row| visible(row, query.paranoid) && matches(row, &query.conditions))
            .map(|row| project(row, query.select.as_deref())))
    }

    async fn create(&self, table: &str, mut values: Record) -> StoreResult<Record> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        let key = match row_id(&values) {
            Some(key) => key,
            None => {
                let key = Uuid::new_v4();
                values.insert("id".to_string(), Value::String(key.to_string()));
                key
            }
        };
        if rows.iter().any(|row| row_id(row) == Some(key)) {
            return Err(StoreError::Constraint(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                table
            )));
        }

        rows.push(values.clone());
        Ok(values)
    }

    async fn update(&self, table: &str, key: Uuid, values: Record) -> StoreResult<Record> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(key)))
            .ok_or_else(|| StoreError::RowNotFound(format!("{} {}", table, key)))?;

        for (column, value) in values {
            row.insert(column, value);
        }
        Ok(row.clone())
    }

    async fn destroy(&self, table: &str, key: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::RowNotFound(format!("{} {}", table, key)))?;
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(key));
        if rows.len() == before {
            return Err(StoreError::RowNotFound(format!("{} {}", table, key)));
        }
        Ok(())
    }

    #[instrument(skip(self, query), fields(join = %link.join_table))]
    async fn find_associated(&self, link: &Link, owner: Uuid, query: &StoreQuery) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().await;
        let empty = Vec::new();
        let joins = tables.get(&link.join_table).unwrap_or(&empty);
        let targets = tables.get(&link.target_table).unwrap_or(&empty);

        let mut pairs: Vec<(&Record, &Record)> = joins
            .iter()
            .filter(|join| uuid_at(join, &link.owner_key) == Some(owner) && visible(join, query.paranoid))
            .filter_map(|join| {
                let target_key = uuid_at(join, &link.foreign_key)?;
                targets
                    .iter()
                    .find(|row| row_id(row) == Some(target_key))
                    .map(|target| (target, join))
            })
            .filter(|(target, _)| visible(target, query.paranoid) && matches(target, &query.conditions))
            .collect();

        sort_rows(&mut pairs, &query.order, |(target, _)| target);

        Ok(page(pairs, query)
            .into_iter()
            .map(|(target, join)| {
                let mut row = project(target, query.select.as_deref());
                row.insert(link.through.clone(), Value::Object(join.clone()));
                row
            })
            .collect())
    }

    async fn add_associated(
        &self,
        link: &Link,
        owner: Uuid,
        targets: &[Uuid],
        values: Record,
    ) -> StoreResult<Vec<Record>> {
        let mut tables = self.tables.write().await;

        let exists = |table: &str, key: Uuid| {
            tables
                .get(table)
                .map(|rows| rows.iter().any(|row| row_id(row) == Some(key)))
                .unwrap_or(false)
        };
        if !exists(&link.owner_table, owner) {
            return Err(foreign_key_violation(link, &link.owner_key));
        }
        if targets.iter().any(|target| !exists(&link.target_table, *target)) {
            return Err(foreign_key_violation(link, &link.foreign_key));
        }

        let joins = tables.entry(link.join_table.clone()).or_default();
        let mut inserted = Vec::new();
        for target in targets {
            let existing = joins.iter_mut().find(|join| {
                uuid_at(join, &link.owner_key) == Some(owner) && uuid_at(join, &link.foreign_key) == Some(*target)
            });
            if let Some(join) = existing {
                if visible(join, true) {
                    continue;
                }
                restore(join, &values);
                inserted.push(join.clone());
                continue;
            }
            let mut join = values.clone();
            join.insert(link.owner_key.clone(), Value::String(owner.to_string()));
            join.insert(link.foreign_key.clone(), Value::String(target.to_string()));
            joins.push(join.clone());
            inserted.push(join);
        }
        Ok(inserted)
    }

    async fn update_associated(
        &self,
        link: &Link,
        owner: Uuid,
        target: Uuid,
        values: Record,
    ) -> StoreResult<Record> {
        let mut tables = self.tables.write().await;
        let join = tables
            .get_mut(&link.join_table)
            .and_then(|joins| {
                joins.iter_mut().find(|join| {
                    uuid_at(join, &link.owner_key) == Some(owner)
                        && uuid_at(join, &link.foreign_key) == Some(target)
                })
            })
            .ok_or_else(|| StoreError::RowNotFound(format!("{} ({}, {})", link.join_table, owner, target)))?;

        for (column, value) in values {
            join.insert(column, value);
        }
        Ok(join.clone())
    }

    async fn destroy_associated(&self, link: &Link, owner: Uuid, target: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let joins = tables
            .get_mut(&link.join_table)
            .ok_or_else(|| StoreError::RowNotFound(format!("{} ({}, {})", link.join_table, owner, target)))?;
        let before = joins.len();
        joins.retain(|join| {
            !(uuid_at(join, &link.owner_key) == Some(owner) && uuid_at(join, &link.foreign_key) == Some(target))
        });
        if joins.len() == before {
            return Err(StoreError::RowNotFound(format!("{} ({}, {})", link.join_table, owner, target)));
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn foreign_key_violation(link: &Link, column: &str) -> StoreError {
    StoreError::Constraint(format!(
        "insert on table \"{}\" violates foreign key constraint on \"{}\"",
        link.join_table, column
    ))
}

/// Revives a soft-removed join record in place. Creation stamps are kept;
/// the re-adding actor becomes the updater.
fn restore(join: &mut Record, values: &Record) {
    for (column, value) in values {
        if column != "created_at" && column != "created_by" {
            join.insert(column.clone(), value.clone());
        }
    }
    join.insert("deleted_at".to_string(), Value::Null);
    join.insert("deleted_by".to_string(), Value::Null);
    join.insert(
        "updated_by".to_string(),
        values.get("created_by").cloned().unwrap_or(Value::Null),
    );
}

fn uuid_at(row: &Record, column: &str) -> Option<Uuid> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn row_id(row: &Record) -> Option<Uuid> {
    uuid_at(row, "id")
}

fn visible(row: &Record, paranoid: bool) -> bool {
    !paranoid || row.get("deleted_at").map_or(true, Value::is_null)
}

fn matches(row: &Record, conditions: &[FilterWhereInfo]) -> bool {
    conditions.iter().all(|condition| {
        let value = row.get(&condition.column).unwrap_or(&Value::Null);
        evaluate(value, condition)
    })
}

fn evaluate(value: &Value, condition: &FilterWhereInfo) -> bool {
    let kind = condition.kind;
    let data = &condition.data;
    let cmp = |other: &Value| compare(value, other, kind);

    match condition.operator {
        FilterOp::Eq if data.is_null() => value.is_null(),
        FilterOp::Eq => cmp(data) == Some(Ordering::Equal),
        FilterOp::Gt => cmp(data) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(cmp(data), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => cmp(data) == Some(Ordering::Less),
        FilterOp::Lte => matches!(cmp(data), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like => match (value.as_str(), data.as_str()) {
            (Some(text), Some(pattern)) => like(text, pattern),
            _ => false,
        },
        FilterOp::Contains => match (value.as_str(), data.as_str()) {
            (Some(text), Some(needle)) => text.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
        FilterOp::In => match data {
            Value::Array(values) => values.iter().any(|v| cmp(v) == Some(Ordering::Equal)),
            other => cmp(other) == Some(Ordering::Equal),
        },
        FilterOp::Between => match data.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                matches!(cmp(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(cmp(high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}

fn compare(a: &Value, b: &Value, kind: ColumnKind) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => match kind {
            ColumnKind::Timestamp => Some(parse_date(x)?.cmp(&parse_date(y)?)),
            ColumnKind::Uuid => Some(Uuid::parse_str(x).ok()?.cmp(&Uuid::parse_str(y).ok()?)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

/// SQL `LIKE`: `%` matches any run, `_` one character, `\` escapes.
fn like(text: &str, pattern: &str) -> bool {
    enum Token {
        Any,
        One,
        Char(char),
    }

    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            other => Token::Char(other),
        });
    }

    let text: Vec<char> = text.chars().collect();
    // reachable[i] = pattern prefix matches text[..i]
    let mut reachable = vec![false; text.len() + 1];
    reachable[0] = true;
    for token in &tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            Token::Any => {
                let mut seen = false;
                for i in 0..=text.len() {
                    seen |= reachable[i];
                    next[i] = seen;
                }
            }
            Token::One => {
                for i in 0..text.len() {
                    next[i + 1] = reachable[i];
                }
            }
            Token::Char(c) => {
                for i in 0..text.len() {
                    next[i + 1] = reachable[i] && text[i] == *c;
                }
            }
        }
        reachable = next;
    }
    reachable[text.len()]
}

/// Stable sort following Postgres: nulls last ascending, first descending.
fn sort_rows<T>(rows: &mut [T], order: &[FilterOrderInfo], row_of: impl Fn(&T) -> &Record) {
    rows.sort_by(|a, b| {
        for info in order {
            let left = row_of(a).get(&info.column).unwrap_or(&Value::Null);
            let right = row_of(b).get(&info.column).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare(left, right, ColumnKind::Text).unwrap_or(Ordering::Equal),
            };
            let ordering = match info.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn page<T>(rows: Vec<T>, query: &StoreQuery) -> Vec<T> {
    let offset = query.offset.unwrap_or(0).max(0) as usize;
    let limit = query.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    rows.into_iter().skip(offset).take(limit).collect()
}

fn project(row: &Record, select: Option<&[String]>) -> Record {
    match select {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .map(|column| (column.clone(), row.get(column).cloned().unwrap_or(Value::Null)))
            .collect(),
        _ => row.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn link() -> Link {
        Link {
            owner_table: "roles".into(),
            target_table: "permissions".into(),
            join_table: "role_permissions".into(),
            owner_key: "role_id".into(),
            foreign_key: "permission_id".into(),
            through: "role_permission".into(),
        }
    }

    #[test]
    fn like_matches_sql_semantics() {
        assert!(like("crane operator", "%operator"));
        assert!(like("crane", "cr_ne"));
        assert!(like("50%", "50\\%"));
        assert!(!like("500", "50\\%"));
        assert!(!like("Crane", "crane"));
        assert!(like("", "%"));
    }

    #[tokio::test]
    async fn find_all_hides_soft_deleted_rows_by_default() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.create("roles", row(json!({ "id": a.to_string(), "name": "a", "deleted_at": null }))).await.unwrap();
        store
            .create("roles", row(json!({ "id": b.to_string(), "name": "b", "deleted_at": "2024-01-01T00:00:00Z" })))
            .await
            .unwrap();

        assert_eq!(store.find_all("roles", &StoreQuery::default()).await.unwrap().len(), 1);
        assert_eq!(store.find_all("roles", &StoreQuery::visible(false)).await.unwrap().len(), 2);
        assert!(store.find_by_key("roles", b, &StoreQuery::default()).await.unwrap().is_none());
        assert!(store.find_by_key("roles", b, &StoreQuery::visible(false)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_primary_key_is_a_constraint_violation() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4().to_string();
        store.create("roles", row(json!({ "id": id }))).await.unwrap();
        let err = store.create("roles", row(json!({ "id": id }))).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn association_lifecycle() {
        let store = MemoryStore::new();
        let role = Uuid::new_v4();
        let perm = Uuid::new_v4();
        store.create("roles", row(json!({ "id": role.to_string() }))).await.unwrap();
        store.create("permissions", row(json!({ "id": perm.to_string(), "name": "x" }))).await.unwrap();

        let inserted = store
            .add_associated(&link(), role, &[perm, perm], row(json!({ "deleted_at": null })))
            .await
            .unwrap();
        assert_eq!(inserted.len(), 1);

        let again = store.add_associated(&link(), role, &[perm], Record::new()).await.unwrap();
        assert!(again.is_empty());

        let listed = store.find_associated(&link(), role, &StoreQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["name"], json!("x"));
        assert_eq!(listed[0]["role_permission"]["role_id"], json!(role.to_string()));

        store.destroy_associated(&link(), role, perm).await.unwrap();
        assert!(store.find_associated(&link(), role, &StoreQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn re_adding_a_soft_removed_link_restores_it() {
        let store = MemoryStore::new();
        let role = Uuid::new_v4();
        let perm = Uuid::new_v4();
        let actor = Uuid::new_v4().to_string();
        store.create("roles", row(json!({ "id": role.to_string() }))).await.unwrap();
        store.create("permissions", row(json!({ "id": perm.to_string(), "name": "x" }))).await.unwrap();
        store
            .add_associated(&link(), role, &[perm], row(json!({ "created_at": "t0", "deleted_at": null })))
            .await
            .unwrap();
        store
            .update_associated(&link(), role, perm, row(json!({ "deleted_at": "t1", "deleted_by": actor })))
            .await
            .unwrap();
        assert!(store.find_associated(&link(), role, &StoreQuery::default()).await.unwrap().is_empty());

        let restored = store
            .add_associated(
                &link(),
                role,
                &[perm],
                row(json!({ "created_at": "t2", "updated_at": "t2", "created_by": actor, "deleted_at": null })),
            )
            .await
            .unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0]["deleted_at"], Value::Null);
        assert_eq!(restored[0]["deleted_by"], Value::Null);
        assert_eq!(restored[0]["created_at"], json!("t0"));
        assert_eq!(restored[0]["updated_at"], json!("t2"));
        assert_eq!(restored[0]["updated_by"], json!(actor));

        let listed = store.find_associated(&link(), role, &StoreQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        let joins = store.find_all("role_permissions", &StoreQuery::visible(false)).await.unwrap();
        assert_eq!(joins.len(), 1);
    }

    #[tokio::test]
    async fn unknown_target_violates_foreign_key() {
        let store = MemoryStore::new();
        let role = Uuid::new_v4();
        store.create("roles", row(json!({ "id": role.to_string() }))).await.unwrap();
        let err = store
            .add_associated(&link(), role, &[Uuid::new_v4()], Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn dangling_join_records_are_skipped() {
        let store = MemoryStore::new();
        let role = Uuid::new_v4();
        let perm = Uuid::new_v4();
        store.create("roles", row(json!({ "id": role.to_string() }))).await.unwrap();
        store.create("permissions", row(json!({ "id": perm.to_string() }))).await.unwrap();
        store.add_associated(&link(), role, &[perm], Record::new()).await.unwrap();
        store.destroy("permissions", perm).await.unwrap();

        assert!(store.find_associated(&link(), role, &StoreQuery::visible(false)).await.unwrap().is_empty());
    }
}
