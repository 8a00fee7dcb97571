//! PostgreSQL [`Store`] keeping each entity as a JSONB document.
//!
//! All collections share the `security_entities` table from `sql/schema.sql`.
//! `where` filters become `data @> $n`, searches become `ILIKE` over
//! `data->>field`, and `createdOn`/`savedOn`/`id` sort on real columns.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    types::Json,
    Connection, Postgres, QueryBuilder, Row,
};
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    error::StoreError,
    store::{
        Found, Record, SearchOperator, SortOrder, Store, StoreQuery, CREATED_ON_FIELD, ID_FIELD,
        SAVED_ON_FIELD,
    },
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));
const RECORD_COLUMNS: &str = "id, data, created_on, saved_on";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema. Statements are idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        debug!("security schema applied");
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<Record, StoreError> {
    let Json(data): Json<Map<String, Value>> = row.try_get("data")?;
    Ok(Record {
        id: row.try_get("id")?,
        data,
        created_on: row.try_get("created_on")?,
        saved_on: row.try_get("saved_on")?,
    })
}

/// Name of the partial unique index backing `field` in `collection`.
fn unique_index(collection: &str, field: &str) -> String {
    format!("security_entities_{collection}_{field}_key")
}

fn duplicate_field(
    collection: &str,
    unique: &[&'static str],
    constraint: Option<&str>,
) -> Option<&'static str> {
    let constraint = constraint?;
    unique
        .iter()
        .copied()
        .find(|field| unique_index(collection, field) == constraint)
}

/// Report a violated unique index as [`StoreError::Duplicate`].
fn write_error(err: sqlx::Error, collection: &str, unique: &[&'static str]) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            if let Some(field) = duplicate_field(collection, unique, db.constraint()) {
                return StoreError::Duplicate(field);
            }
        }
    }
    StoreError::Database(err)
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Append the `WHERE` clause shared by the count and select statements.
fn push_selection(
    builder: &mut QueryBuilder<'_, Postgres>,
    collection: &'static str,
    query: &StoreQuery,
) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection);

    let mut containment = Map::new();
    for (key, value) in &query.filter {
        if key == ID_FIELD {
            match value.as_str().and_then(|id| Uuid::parse_str(id).ok()) {
                Some(id) => {
                    builder.push(" AND id = ");
                    builder.push_bind(id);
                }
                None => {
                    builder.push(" AND FALSE");
                }
            }
        } else {
            containment.insert(key.clone(), value.clone());
        }
    }
    if !containment.is_empty() {
        builder.push(" AND data @> ");
        builder.push_bind(Json(Value::Object(containment)));
    }

    if let Some(search) = &query.search {
        let needle = search.query.trim();
        if !needle.is_empty() && !search.fields.is_empty() {
            let pattern = format!("%{}%", escape_like(needle));
            let joiner = match search.operator {
                SearchOperator::Or => " OR ",
                SearchOperator::And => " AND ",
            };
            builder.push(" AND (");
            for (index, field) in search.fields.iter().enumerate() {
                if index > 0 {
                    builder.push(joiner);
                }
                builder.push("data->>");
                builder.push_bind(field.clone());
                builder.push(" ILIKE ");
                builder.push_bind(pattern.clone());
            }
            builder.push(")");
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM security_entities WHERE collection = $1 AND id = $2"
        );
        let row = sqlx::query(&query)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        collection: &'static str,
        query: &StoreQuery,
    ) -> Result<Found, StoreError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) AS total FROM security_entities");
        push_selection(&mut count, collection, query);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let mut select = QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM security_entities"));
        push_selection(&mut select, collection, query);
        select.push(" ORDER BY ");
        for sort in &query.sort {
            match sort.field.as_str() {
                ID_FIELD => {
                    select.push("id");
                }
                CREATED_ON_FIELD => {
                    select.push("created_on");
                }
                SAVED_ON_FIELD => {
                    select.push("saved_on");
                }
                field => {
                    select.push("data->");
                    select.push_bind(field.to_string());
                }
            }
            select.push(match sort.order {
                SortOrder::Asc => " ASC, ",
                SortOrder::Desc => " DESC, ",
            });
        }
        select.push("id ASC");
        if let Some(limit) = query.limit {
            select.push(" LIMIT ");
            select.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if query.offset > 0 {
            select.push(" OFFSET ");
            select.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
        }

        let rows = select.build().fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Found {
            records,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        data: Map<String, Value>,
        unique: &[&'static str],
    ) -> Result<Record, StoreError> {
        let query = format!(
            "INSERT INTO security_entities (collection, id, data) VALUES ($1, $2, $3) RETURNING {RECORD_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(collection)
            .bind(id)
            .bind(Json(Value::Object(data)))
            .fetch_one(&self.pool)
            .await
            .map_err(|err| write_error(err, collection, unique))?;
        record_from_row(&row)
    }

    async fn update(
        &self,
        collection: &'static str,
        id: Uuid,
        patch: Map<String, Value>,
        unique: &[&'static str],
    ) -> Result<Option<Record>, StoreError> {
        let query = format!(
            r"
            UPDATE security_entities
            SET data = data || $3, saved_on = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING {RECORD_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(collection)
            .bind(id)
            .bind(Json(Value::Object(patch)))
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| write_error(err, collection, unique))?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete(&self, collection: &'static str, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM security_entities WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::store::{Search, Sort};
    use serde_json::json;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct IndexViolation {
        constraint: &'static str,
        kind: ErrorKind,
    }

    impl fmt::Display for IndexViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "violates {}", self.constraint)
        }
    }

    impl StdError for IndexViolation {}

    impl DatabaseError for IndexViolation {
        fn message(&self) -> &'static str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match &self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn violation(constraint: &'static str, kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(IndexViolation { constraint, kind }))
    }

    #[test]
    fn write_error_reports_duplicates() {
        let err = write_error(
            violation("security_entities_users_email_key", ErrorKind::UniqueViolation),
            "users",
            &["email"],
        );
        assert!(matches!(err, StoreError::Duplicate("email")));

        let err = write_error(
            violation("security_entities_pkey", ErrorKind::UniqueViolation),
            "users",
            &["email"],
        );
        assert!(matches!(err, StoreError::Database(_)));

        let err = write_error(
            violation("security_entities_users_email_key", ErrorKind::Other),
            "users",
            &["email"],
        );
        assert!(matches!(err, StoreError::Database(_)));
        assert!(matches!(
            write_error(sqlx::Error::RowNotFound, "users", &["email"]),
            StoreError::Database(_)
        ));
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn unique_violations_map_to_their_field() {
        assert_eq!(
            duplicate_field("users", &["email"], Some("security_entities_users_email_key")),
            Some("email")
        );
        assert_eq!(
            duplicate_field("roles", &["slug"], Some("security_entities_pkey")),
            None
        );
        assert_eq!(duplicate_field("roles", &["slug"], None), None);
        assert_eq!(duplicate_field("groups", &[], Some("security_entities_groups_slug_key")), None);
    }

    #[test]
    fn schema_declares_unique_indexes() {
        for (collection, field) in [("users", "email"), ("roles", "slug"), ("groups", "slug")] {
            let index = unique_index(collection, field);
            assert!(SCHEMA_SQL.contains(&format!("CREATE UNIQUE INDEX IF NOT EXISTS {index}")));
            assert!(SCHEMA_SQL.contains(&format!("((data->>'{field}')) WHERE collection = '{collection}'")));
        }
    }

    #[test]
    fn selection_sql_shape() {
        let mut filter = Map::new();
        filter.insert("id".to_string(), json!("not-a-uuid"));
        filter.insert("enabled".to_string(), json!(true));
        let query = StoreQuery {
            filter,
            sort: vec![Sort::desc("savedOn")],
            search: Some(Search {
                query: "ada".to_string(),
                fields: vec!["firstName".to_string(), "email".to_string()],
                operator: SearchOperator::And,
            }),
            limit: Some(10),
            offset: 0,
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM security_entities");
        push_selection(&mut builder, "users", &query);
        let sql = builder.sql();
        assert!(sql.contains("WHERE collection = $1"));
        assert!(sql.contains("AND FALSE"));
        assert!(sql.contains("AND data @> $2"));
        assert!(sql.contains("data->>$3 ILIKE $4 AND data->>$5 ILIKE $6"));
    }
}
