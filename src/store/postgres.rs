//! PostgreSQL store.
//!
//! Every select goes through `Filter` and returns rows as a single JSON
//! column, so the store never needs per-table row types. Writes hand the
//! record to Postgres as JSONB and let `jsonb_populate_record` coerce each
//! column to its declared type.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::traits::{Link, Store};
use crate::filter::filter::{quote_column, validate_identifier};
use crate::filter::{Filter, FilterError, FilterJoin, SqlResult, StoreQuery};
use crate::types::Record;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    log_queries: bool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            log_queries: false,
        }
    }

    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    async fn fetch_rows(&self, sql: &SqlResult) -> StoreResult<Vec<Record>> {
        self.log(&sql.query, sql.params.len());
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    fn log(&self, query: &str, params: usize) {
        if self.log_queries {
            debug!(sql = %query, params, "executing query");
        }
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self, query))]
    async fn find_all(&self, table: &str, query: &StoreQuery) -> StoreResult<Vec<Record>> {
        let mut filter = Filter::new(table)?;
        filter.assign(query.clone())?;
        self.fetch_rows(&filter.to_sql()?).await
    }

    async fn find_by_key(&self, table: &str, key: Uuid, query: &StoreQuery) -> StoreResult<Option<Record>> {
        let mut filter = Filter::new(table)?;
        filter.assign(StoreQuery {
            limit: Some(1),
            offset: None,
            ..query.clone().with_key(key)
        })?;
        Ok(self.fetch_rows(&filter.to_sql()?).await?.into_iter().next())
    }

    #[instrument(skip(self, values))]
    async fn create(&self, table: &str, values: Record) -> StoreResult<Record> {
        let columns = quoted_columns(table, &values)?;
        let query = format!(
            "WITH ins AS (INSERT INTO \"{table}\" ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::\"{table}\", $1) RETURNING *) \
             SELECT row_to_json(ins) AS row FROM ins",
            table = table,
            cols = columns.join(", "),
        );
        self.log(&query, 1);

        let row = sqlx::query(&query)
            .bind(Value::Object(values))
            .fetch_one(&self.pool)
            .await?;
        decode_row(&row)
    }

    #[instrument(skip(self, values))]
    async fn update(&self, table: &str, key: Uuid, values: Record) -> StoreResult<Record> {
        if values.is_empty() {
            return self
                .find_by_key(table, key, &StoreQuery::visible(false))
                .await?
                .ok_or_else(|| StoreError::RowNotFound(format!("{} {}", table, key)));
        }

        let assignments = quoted_columns(table, &values)?
            .into_iter()
            .map(|column| format!("{} = src.{}", column, column))
            .collect::<Vec<_>>();
        let query = format!(
            "WITH upd AS (UPDATE \"{table}\" SET {set} FROM jsonb_populate_record(NULL::\"{table}\", $1) AS src \
             WHERE {id} = $2::uuid RETURNING \"{table}\".*) SELECT row_to_json(upd) AS row FROM upd",
            table = table,
            set = assignments.join(", "),
            id = quote_column(Some(table), "id"),
        );
        self.log(&query, 2);

        let row = sqlx::query(&query)
            .bind(Value::Object(values))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::RowNotFound(format!("{} {}", table, key)))?;
        decode_row(&row)
    }

    async fn destroy(&self, table: &str, key: Uuid) -> StoreResult<()> {
        check_table(table)?;
        let query = format!("DELETE FROM \"{}\" WHERE \"id\" = $1::uuid", table);
        self.log(&query, 1);

        let result = sqlx::query(&query).bind(key).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("{} {}", table, key)));
        }
        Ok(())
    }

    #[instrument(skip(self, query), fields(join = %link.join_table))]
    async fn find_associated(&self, link: &Link, owner: Uuid, query: &StoreQuery) -> StoreResult<Vec<Record>> {
        let mut filter = Filter::new(&link.target_table)?;
        filter.assign(query.clone())?.through(FilterJoin {
            table: link.join_table.clone(),
            owner_column: link.owner_key.clone(),
            target_column: link.foreign_key.clone(),
            owner,
            nest_as: link.through.clone(),
        })?;
        self.fetch_rows(&filter.to_sql()?).await
    }

    #[instrument(skip(self, targets, values), fields(join = %link.join_table, count = targets.len()))]
    async fn add_associated(
        &self,
        link: &Link,
        owner: Uuid,
        targets: &[Uuid],
        mut values: Record,
    ) -> StoreResult<Vec<Record>> {
        let mut unique = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(target) {
                unique.push(*target);
            }
        }

        values.remove(&link.owner_key);
        values.remove(&link.foreign_key);
        let seeded = quoted_columns(&link.join_table, &values)?;
        let owner_key = quote_column(None, &link.owner_key);
        let foreign_key = quote_column(None, &link.foreign_key);

        let mut columns = vec![owner_key.clone(), foreign_key.clone()];
        columns.extend(seeded.iter().cloned());
        let mut sources = vec!["$1::uuid".to_string(), "target".to_string()];
        sources.extend(seeded.iter().map(|column| format!("src.{}", column)));

        let query = format!(
            "WITH ins AS (INSERT INTO \"{join}\" ({cols}) SELECT {sources} \
             FROM unnest($2::uuid[]) AS target CROSS JOIN jsonb_populate_record(NULL::\"{join}\", $3) AS src WHERE true \
             ON CONFLICT ({owner}, {foreign}) DO UPDATE SET {restore} \
             WHERE \"{join}\".\"deleted_at\" IS NOT NULL RETURNING *) SELECT row_to_json(ins) AS row FROM ins",
            join = link.join_table,
            cols = columns.join(", "),
            sources = sources.join(", "),
            owner = owner_key,
            foreign = foreign_key,
            restore = restore_assignments(&seeded).join(", "),
        );
        self.log(&query, 3);

        let rows = sqlx::query(&query)
            .bind(owner)
            .bind(unique)
            .bind(Value::Object(values))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn update_associated(
        &self,
        link: &Link,
        owner: Uuid,
        target: Uuid,
        values: Record,
    ) -> StoreResult<Record> {
        let not_found = || StoreError::RowNotFound(format!("{} ({}, {})", link.join_table, owner, target));
        let join = &link.join_table;
        let owner_key = quote_column(Some(join), &link.owner_key);
        let foreign_key = quote_column(Some(join), &link.foreign_key);

        if values.is_empty() {
            check_table(join)?;
            let query = format!(
                "SELECT row_to_json(\"{join}\") AS row FROM \"{join}\" WHERE {owner} = $1::uuid AND {foreign} = $2::uuid",
                join = join,
                owner = owner_key,
                foreign = foreign_key,
            );
            self.log(&query, 2);

            let row = sqlx::query(&query)
                .bind(owner)
                .bind(target)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(not_found)?;
            return decode_row(&row);
        }

        let assignments = quoted_columns(join, &values)?
            .into_iter()
            .map(|column| format!("{} = src.{}", column, column))
            .collect::<Vec<_>>();
        let query = format!(
            "WITH upd AS (UPDATE \"{join}\" SET {set} FROM jsonb_populate_record(NULL::\"{join}\", $1) AS src \
             WHERE {owner} = $2::uuid AND {foreign} = $3::uuid RETURNING \"{join}\".*) \
             SELECT row_to_json(upd) AS row FROM upd",
            join = join,
            set = assignments.join(", "),
            owner = owner_key,
            foreign = foreign_key,
        );
        self.log(&query, 3);

        let row = sqlx::query(&query)
            .bind(Value::Object(values))
            .bind(owner)
            .bind(target)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found)?;
        decode_row(&row)
    }

    async fn destroy_associated(&self, link: &Link, owner: Uuid, target: Uuid) -> StoreResult<()> {
        check_table(&link.join_table)?;
        let query = format!(
            "DELETE FROM \"{}\" WHERE {} = $1::uuid AND {} = $2::uuid",
            link.join_table,
            quote_column(None, &link.owner_key),
            quote_column(None, &link.foreign_key),
        );
        self.log(&query, 2);

        let result = sqlx::query(&query)
            .bind(owner)
            .bind(target)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!(
                "{} ({}, {})",
                link.join_table, owner, target
            )));
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn check_table(table: &str) -> StoreResult<()> {
    if validate_identifier(table) {
        Ok(())
    } else {
        Err(FilterError::InvalidTableName(table.to_string()).into())
    }
}

fn quoted_columns(table: &str, values: &Record) -> StoreResult<Vec<String>> {
    check_table(table)?;
    values
        .keys()
        .map(|column| {
            if validate_identifier(column) {
                Ok(quote_column(None, column))
            } else {
                Err(FilterError::InvalidColumn(column.clone()).into())
            }
        })
        .collect()
}

/// `SET` list reviving a soft-removed join record on conflict. Creation
/// stamps are kept; the re-adding actor becomes the updater.
fn restore_assignments(seeded: &[String]) -> Vec<String> {
    const STAMPED: [&str; 5] = ["created_at", "created_by", "updated_by", "deleted_at", "deleted_by"];

    let mut assignments: Vec<String> = seeded
        .iter()
        .filter(|column| !STAMPED.iter().any(|stamped| column.trim_matches('"') == *stamped))
        .map(|column| format!("{} = EXCLUDED.{}", column, column))
        .collect();
    assignments.push("\"deleted_at\" = NULL".to_string());
    assignments.push("\"deleted_by\" = NULL".to_string());
    assignments.push("\"updated_by\" = EXCLUDED.\"created_by\"".to_string());
    assignments
}

fn decode_row(row: &PgRow) -> StoreResult<Record> {
    let value: Value = row.try_get("row")?;
    match value {
        Value::Object(record) => Ok(record),
        other => Err(StoreError::Decode(format!("expected a JSON object row, got {}", other))),
    }
}

fn bind_param<'q>(q: PgQuery<'q>, v: &'q Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres has no unsigned 64-bit type
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
