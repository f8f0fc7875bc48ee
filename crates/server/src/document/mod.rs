//! JSON document collections on top of SQLite.
//!
//! Each collection is a table of `(_id, doc)` rows where `doc` is a JSON
//! document. Fields are addressed with `json_extract(doc, '$.path')`, and the
//! indexes are expression indexes over exactly those expressions so lookups
//! such as `sessions.user.user_id IN (...)` stay indexed.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;

use crate::error::AppResult;

mod catalog;
mod rental;
mod sequence;

pub use catalog::DocumentCatalog;
pub use rental::DocumentRentals;
pub use sequence::SequenceAllocator;

/// Application-level collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Families,
    Users,
    Media,
    Sessions,
    WatchHistory,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Families,
        Collection::Users,
        Collection::Media,
        Collection::Sessions,
        Collection::WatchHistory,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Families => "families",
            Collection::Users => "users",
            Collection::Media => "media",
            Collection::Sessions => "sessions",
            Collection::WatchHistory => "watch_history",
        }
    }

    /// Application id field, also the name of the collection's sequence
    pub fn id_field(&self) -> &'static str {
        match self {
            Collection::Families => "family_id",
            Collection::Users => "user_id",
            Collection::Media => "media_id",
            Collection::Sessions => "session_id",
            Collection::WatchHistory => "watch_history_id",
        }
    }

    /// Non-unique lookup fields that get a secondary index
    fn secondary_indexes(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["family_id"],
            Collection::Sessions | Collection::WatchHistory => &["user.user_id"],
            Collection::Families | Collection::Media => &[],
        }
    }
}

/// Scalar compared against a document field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Predicate on a dotted document path. Paths are compile-time constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, FieldValue),
    Ne(&'static str, FieldValue),
    In(&'static str, Vec<i64>),
}

impl Filter {
    pub fn eq(path: &'static str, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(path, value.into())
    }

    pub fn ne(path: &'static str, value: impl Into<FieldValue>) -> Self {
        Filter::Ne(path, value.into())
    }

    pub fn is_in(path: &'static str, values: &[i64]) -> Self {
        Filter::In(path, values.to_vec())
    }
}

fn field_expr(path: &str) -> String {
    debug_assert!(path.chars().all(|c| c.is_ascii_lowercase() || c == '_' || c == '.'));
    format!("json_extract(doc, '$.{}')", path)
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &FieldValue) {
    match value {
        FieldValue::Int(v) => builder.push_bind(*v),
        FieldValue::Text(v) => builder.push_bind(v.clone()),
    };
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &[Filter]) {
    for (i, filter) in filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq(path, value) => {
                builder.push(field_expr(path)).push(" = ");
                push_value(builder, value);
            }
            Filter::Ne(path, value) => {
                // Missing fields count as "not equal", as in document stores
                builder
                    .push("(")
                    .push(field_expr(path))
                    .push(" IS NULL OR ")
                    .push(field_expr(path))
                    .push(" <> ");
                push_value(builder, value);
                builder.push(")");
            }
            Filter::In(_, values) if values.is_empty() => {
                builder.push("0 = 1");
            }
            Filter::In(path, values) => {
                builder.push(field_expr(path)).push(" IN (");
                let mut separated = builder.separated(", ");
                for value in values {
                    separated.push_bind(*value);
                }
                separated.push_unseparated(")");
            }
        }
    }
}

/// Denormalized store. Cloning shares the pool.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn sequences(&self) -> SequenceAllocator {
        SequenceAllocator::new(self.pool.clone())
    }

    /// Creates every collection, the counters table and the index set.
    /// Safe to run repeatedly.
    pub async fn init(&self) -> AppResult<()> {
        for collection in Collection::ALL {
            let name = collection.name();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    _id INTEGER PRIMARY KEY AUTOINCREMENT,
                    doc TEXT NOT NULL CHECK (json_valid(doc))
                )
                "#,
                name
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {name}_{id} ON {name} ({expr})",
                name = name,
                id = collection.id_field(),
                expr = field_expr(collection.id_field()),
            ))
            .execute(&self.pool)
            .await?;

            for path in collection.secondary_indexes() {
                sqlx::query(&format!(
                    "CREATE INDEX IF NOT EXISTS {name}_{suffix} ON {name} ({expr})",
                    name = name,
                    suffix = path.replace('.', "_"),
                    expr = field_expr(path),
                ))
                .execute(&self.pool)
                .await?;
            }
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS counters (
                _id TEXT PRIMARY KEY,
                seq INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Drops every collection and the counters table. Indexes go with them.
    pub async fn drop_all(&self) -> AppResult<()> {
        for collection in Collection::ALL {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", collection.name()))
                .execute(&self.pool)
                .await?;
        }
        sqlx::query("DROP TABLE IF EXISTS counters")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_one<T: Serialize>(&self, collection: Collection, doc: &T) -> AppResult<()> {
        let json = serde_json::to_string(doc)?;
        sqlx::query(&format!("INSERT INTO {} (doc) VALUES (?)", collection.name()))
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts a batch in one transaction: the whole batch lands or none of it
    pub async fn insert_many<T: Serialize>(
        &self,
        collection: Collection,
        docs: &[T],
    ) -> AppResult<u64> {
        let sql = format!("INSERT INTO {} (doc) VALUES (?)", collection.name());
        let mut tx = self.pool.begin().await?;
        for doc in docs {
            let json = serde_json::to_string(doc)?;
            sqlx::query(&sql).bind(json).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(docs.len() as u64)
    }

    /// Documents matching every filter, in insertion order
    pub async fn find<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> AppResult<Vec<T>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT doc FROM ");
        builder.push(collection.name());
        push_filters(&mut builder, filters);
        builder.push(" ORDER BY _id");

        let rows: Vec<(String,)> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(doc,)| serde_json::from_str(&doc).map_err(Into::into))
            .collect()
    }

    pub async fn find_one<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> AppResult<Option<T>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT doc FROM ");
        builder.push(collection.name());
        push_filters(&mut builder, filters);
        builder.push(" ORDER BY _id LIMIT 1");

        let row: Option<(String,)> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((doc,)) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// Looks a document up by its application id
    pub async fn find_by_id<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: i64,
    ) -> AppResult<Option<T>> {
        self.find_one(collection, &[Filter::eq(collection.id_field(), id)])
            .await
    }

    pub async fn count(&self, collection: Collection) -> AppResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", collection.name()))
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    /// Document count per collection
    pub async fn stats(&self) -> AppResult<BTreeMap<String, u64>> {
        let mut stats = BTreeMap::new();
        for collection in Collection::ALL {
            stats.insert(collection.name().to_string(), self.count(collection).await?);
        }
        Ok(stats)
    }

    /// Index names defined on a collection
    pub async fn index_names(&self, collection: Collection) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL ORDER BY name",
        )
        .bind(collection.name())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> DocumentStore {
    let store = DocumentStore::new(crate::db::memory_pool().await);
    store.init().await.unwrap();
    store
}
