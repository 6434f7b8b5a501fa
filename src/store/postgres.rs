//! PostgreSQL implementation of [`BookStore`].

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

use super::{ActivityStats, BookStore, StoreError};
use crate::config::DatabaseConfig;
use crate::models::{PendingUpdate, MIN_DESCRIPTION_CHARS};

const ENSURE_COLUMNS: &str = r#"
    ALTER TABLE books
      ADD COLUMN IF NOT EXISTS genres          text[],
      ADD COLUMN IF NOT EXISTS enriched_at     timestamptz,
      ADD COLUMN IF NOT EXISTS last_attempt_at timestamptz,
      ADD COLUMN IF NOT EXISTS attempt_count   int DEFAULT 0
"#;

const ENSURE_ISBN_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_books_isbn13 ON books(isbn13)";

const ENSURE_ATTEMPT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_books_last_attempt ON books(last_attempt_at)";

const SELECT_CANDIDATES: &str = r#"
    SELECT isbn13
    FROM books
    WHERE (
            (page_count IS NULL OR page_count <= 0)
         OR (genres IS NULL OR array_length(genres, 1) IS NULL)
         OR (description IS NULL OR length(description) < $1)
          )
      AND isbn13 IS NOT NULL
      AND isbn13 <> ''
      AND (last_attempt_at IS NULL OR last_attempt_at < NOW() - make_interval(mins => $2))
    ORDER BY last_attempt_at NULLS FIRST, id
    LIMIT $3
"#;

// Placeholders are cast so Postgres can type NULLs and the empty array.
const UPDATE_BOOK: &str = r#"
    UPDATE books
    SET
      page_count  = COALESCE($1::int, page_count),
      genres      = COALESCE(NULLIF($2::text[], '{}'), genres),
      description = COALESCE($3::text, description),
      enriched_at = CASE
                      WHEN ($1::int IS NOT NULL AND $1::int IS DISTINCT FROM page_count)
                        OR (cardinality($2::text[]) > 0 AND $2::text[] IS DISTINCT FROM genres)
                        OR ($3::text IS NOT NULL AND $3::text IS DISTINCT FROM description)
                      THEN NOW()
                      ELSE enriched_at
                    END,
      last_attempt_at = NOW(),
      attempt_count   = COALESCE(attempt_count, 0) + 1
    WHERE isbn13 = $4
"#;

const RECENT_ACTIVITY: &str = r#"
    SELECT
      COUNT(*) FILTER (WHERE enriched_at     > NOW() - make_interval(secs => $1)) AS changed_rows,
      COUNT(*) FILTER (WHERE last_attempt_at > NOW() - make_interval(secs => $1)) AS attempted_rows
    FROM books
"#;

/// Book store backed by a PostgreSQL `books` table
#[derive(Debug, Clone)]
pub struct PgBookStore {
    pool: PgPool,
}

impl PgBookStore {
    /// Open a single long-lived connection for the run
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password)
            .application_name(env!("CARGO_PKG_NAME"));

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.dbname,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for statement in [ENSURE_COLUMNS, ENSURE_ISBN_INDEX, ENSURE_ATTEMPT_INDEX] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_candidates(
        &self,
        limit: usize,
        cooldown: chrono::Duration,
    ) -> Result<Vec<String>, StoreError> {
        let cooldown_minutes = i32::try_from(cooldown.num_minutes()).unwrap_or(i32::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let isbns: Vec<String> = sqlx::query_scalar(SELECT_CANDIDATES)
            .bind(MIN_DESCRIPTION_CHARS as i32)
            .bind(cooldown_minutes)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(isbns)
    }

    async fn apply_updates(&self, updates: &[PendingUpdate]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut touched = 0;

        for update in updates {
            let result = sqlx::query(UPDATE_BOOK)
                .bind(update.page_count)
                .bind(&update.genres)
                .bind(update.description.as_deref())
                .bind(&update.isbn13)
                .execute(&mut *tx)
                .await?;
            touched += result.rows_affected();
        }

        tx.commit().await?;
        Ok(touched)
    }

    async fn recent_activity(&self, window: chrono::Duration) -> Result<ActivityStats, StoreError> {
        let seconds = window.num_milliseconds() as f64 / 1000.0;

        let (changed, attempted): (i64, i64) = sqlx::query_as(RECENT_ACTIVITY)
            .bind(seconds)
            .fetch_one(&self.pool)
            .await?;

        Ok(ActivityStats { changed, attempted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    type Row = (
        Option<i32>,
        Option<Vec<String>>,
        Option<String>,
        Option<DateTime<Utc>>,
        Option<DateTime<Utc>>,
        Option<i32>,
    );

    /// A store over a fresh `books` table in its own schema, or `None` when
    /// no database is configured.
    async fn test_store(name: &str) -> Option<PgBookStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping PostgreSQL test");
            return None;
        };
        let schema = format!("book_enricher_test_{}", name);

        let admin = PgPool::connect(&url).await.unwrap();
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema))
            .execute(&admin)
            .await
            .unwrap();
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin)
            .await
            .unwrap();
        admin.close().await;

        let search_path = format!("SET search_path TO {}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .after_connect(move |conn, _meta| {
                let sql = search_path.clone();
                Box::pin(async move {
                    sqlx::query(&sql).execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE books (
                id          bigserial PRIMARY KEY,
                isbn13      text UNIQUE,
                page_count  int CHECK (page_count < 100000),
                description text
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = PgBookStore::from_pool(pool);
        store.ensure_schema().await.unwrap();
        Some(store)
    }

    async fn insert(
        store: &PgBookStore,
        isbn13: &str,
        page_count: Option<i32>,
        genres: Option<Vec<String>>,
        description: Option<&str>,
    ) {
        sqlx::query(
            "INSERT INTO books (isbn13, page_count, genres, description) VALUES ($1, $2, $3, $4)",
        )
        .bind(isbn13)
        .bind(page_count)
        .bind(genres)
        .bind(description)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn attempted_minutes_ago(store: &PgBookStore, isbn13: &str, minutes: i32) {
        sqlx::query(
            "UPDATE books SET last_attempt_at = NOW() - make_interval(mins => $1) WHERE isbn13 = $2",
        )
        .bind(minutes)
        .bind(isbn13)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn row(store: &PgBookStore, isbn13: &str) -> Row {
        sqlx::query_as(
            "SELECT page_count, genres, description, enriched_at, last_attempt_at, attempt_count
             FROM books WHERE isbn13 = $1",
        )
        .bind(isbn13)
        .fetch_one(store.pool())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let Some(store) = test_store("schema").await else {
            return;
        };
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();

        insert(&store, "9780000000002", None, None, None).await;
        let (_, genres, _, enriched_at, last_attempt_at, attempt_count) =
            row(&store, "9780000000002").await;
        assert_eq!(genres, None);
        assert_eq!(enriched_at, None);
        assert_eq!(last_attempt_at, None);
        assert_eq!(attempt_count, Some(0));
    }

    #[tokio::test]
    async fn test_update_coalesces_and_counts_attempts() {
        let Some(store) = test_store("coalesce").await else {
            return;
        };
        insert(
            &store,
            "9780000000002",
            None,
            None,
            Some("Existing long description"),
        )
        .await;

        let update = PendingUpdate {
            page_count: Some(320),
            ..PendingUpdate::attempt_only("9780000000002")
        };
        assert_eq!(store.apply_updates(&[update.clone()]).await.unwrap(), 1);

        let (pages, genres, description, enriched_at, last_attempt_at, attempts) =
            row(&store, "9780000000002").await;
        assert_eq!(pages, Some(320));
        assert_eq!(genres, None);
        assert_eq!(description.as_deref(), Some("Existing long description"));
        assert!(enriched_at.is_some());
        assert!(last_attempt_at.is_some());
        assert_eq!(attempts, Some(1));

        // Same value again: bookkeeping advances, enriched_at does not move
        store.apply_updates(&[update]).await.unwrap();
        let (pages, _, _, enriched_again, _, attempts) = row(&store, "9780000000002").await;
        assert_eq!(pages, Some(320));
        assert_eq!(enriched_again, enriched_at);
        assert_eq!(attempts, Some(2));
    }

    #[tokio::test]
    async fn test_update_writes_genres_and_description() {
        let Some(store) = test_store("values").await else {
            return;
        };
        insert(&store, "9780000000002", Some(100), Some(vec!["History".into()]), None).await;

        let update = PendingUpdate {
            genres: vec!["Fiction".to_string(), "Mystery".to_string()],
            description: Some("A locked-room puzzle.".to_string()),
            ..PendingUpdate::attempt_only("9780000000002")
        };
        store.apply_updates(&[update]).await.unwrap();

        let (pages, genres, description, enriched_at, _, _) = row(&store, "9780000000002").await;
        assert_eq!(pages, Some(100));
        assert_eq!(
            genres,
            Some(vec!["Fiction".to_string(), "Mystery".to_string()])
        );
        assert_eq!(description.as_deref(), Some("A locked-room puzzle."));
        assert!(enriched_at.is_some());
    }

    #[tokio::test]
    async fn test_attempt_only_leaves_enriched_at_null() {
        let Some(store) = test_store("attempt_only").await else {
            return;
        };
        insert(&store, "9780000000002", Some(50), None, None).await;

        store
            .apply_updates(&[PendingUpdate::attempt_only("9780000000002")])
            .await
            .unwrap();

        let (pages, genres, _, enriched_at, last_attempt_at, attempts) =
            row(&store, "9780000000002").await;
        assert_eq!(pages, Some(50));
        assert_eq!(genres, None);
        assert_eq!(enriched_at, None);
        assert!(last_attempt_at.is_some());
        assert_eq!(attempts, Some(1));
    }

    #[tokio::test]
    async fn test_candidates_cooldown_and_ordering() {
        let Some(store) = test_store("candidates").await else {
            return;
        };
        insert(&store, "never-a", None, None, None).await;
        insert(
            &store,
            "complete",
            Some(100),
            Some(vec!["Fiction".into()]),
            Some("A complete description"),
        )
        .await;
        insert(&store, "recent", None, None, None).await;
        insert(&store, "stale", None, None, None).await;
        insert(&store, "never-b", Some(10), Some(vec!["Art".into()]), Some("short")).await;
        insert(&store, "", None, None, None).await;

        attempted_minutes_ago(&store, "recent", 5).await;
        attempted_minutes_ago(&store, "stale", 61).await;

        let candidates = store
            .fetch_candidates(10, chrono::Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(candidates, vec!["never-a", "never-b", "stale"]);

        let limited = store
            .fetch_candidates(1, chrono::Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(limited, vec!["never-a"]);
    }

    #[tokio::test]
    async fn test_failed_row_rolls_back_batch() {
        let Some(store) = test_store("rollback").await else {
            return;
        };
        insert(&store, "9780000000002", None, None, None).await;
        insert(&store, "9780000000019", None, None, None).await;

        let out_of_range = PendingUpdate {
            page_count: Some(200_000),
            ..PendingUpdate::attempt_only("9780000000019")
        };
        let result = store
            .apply_updates(&[PendingUpdate::attempt_only("9780000000002"), out_of_range])
            .await;
        assert!(matches!(result, Err(StoreError::Database(_))));

        let (_, _, _, _, last_attempt_at, attempts) = row(&store, "9780000000002").await;
        assert_eq!(last_attempt_at, None);
        assert_eq!(attempts, Some(0));
    }

    #[tokio::test]
    async fn test_recent_activity_counts() {
        let Some(store) = test_store("activity").await else {
            return;
        };
        insert(&store, "9780000000002", None, None, None).await;
        insert(&store, "9780000000019", None, None, None).await;
        insert(&store, "9780000000026", None, None, None).await;

        let with_data = PendingUpdate {
            page_count: Some(10),
            ..PendingUpdate::attempt_only("9780000000002")
        };
        store
            .apply_updates(&[with_data, PendingUpdate::attempt_only("9780000000019")])
            .await
            .unwrap();

        let stats = store
            .recent_activity(chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(stats, ActivityStats { changed: 1, attempted: 2 });
    }
}
