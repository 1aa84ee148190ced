use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task;
use tracing::info;

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        name TEXT NOT NULL,
        rating INTEGER NOT NULL,
        review_text TEXT NOT NULL,
        ai_user_response TEXT NOT NULL,
        ai_summary TEXT NOT NULL,
        ai_actions TEXT NOT NULL
    )";

const SELECT_COLUMNS: &str = "
    SELECT id, created_at, name, rating, review_text,
           ai_user_response, ai_summary, ai_actions
    FROM reviews";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Review store is closed")]
    Closed,

    #[error("Storage task failed: {0}")]
    Task(#[from] task::JoinError),
}

/// A stored review
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: i64,
    pub created_at: String,
    pub name: String,
    pub rating: u8,
    pub review_text: String,
    pub ai_user_response: String,
    pub ai_summary: String,
    pub ai_actions: String,
}

impl Review {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            name: row.get(2)?,
            rating: row.get(3)?,
            review_text: row.get(4)?,
            ai_user_response: row.get(5)?,
            ai_summary: row.get(6)?,
            ai_actions: row.get(7)?,
        })
    }
}

/// A review ready to be written; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewReview {
    pub created_at: String,
    pub name: String,
    pub rating: u8,
    pub review_text: String,
    pub ai_user_response: String,
    pub ai_summary: String,
    pub ai_actions: String,
}

/// Aggregate rating figures over all stored reviews
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingStats {
    pub total: u64,
    pub average_rating: f64,
    pub distribution: BTreeMap<String, u64>,
}

/// Current UTC time as stored in `created_at`, e.g. `2025-01-31T09:15:02.123456Z`
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite-backed review table.
///
/// One connection serves every request; the mutex serializes access so
/// writes never interleave. Queries run on the blocking pool so a busy wait
/// never stalls the async workers. `close` ends the store's lifetime explicitly.
pub struct ReviewStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl ReviewStore {
    /// Open (or create) the database file in WAL mode with a bounded busy wait
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;

        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.busy_timeout(busy_timeout)?;

        info!(
            path = %path.display(),
            journal_mode = %mode,
            busy_timeout_ms = busy_timeout.as_millis() as u64,
            "Opened review database"
        );

        Self::with_connection(conn)
    }

    /// Private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Run `f` against the open connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.conn.clone().lock_owned().await;

        task::spawn_blocking(move || -> Result<T, StorageError> {
            let conn = guard.as_ref().ok_or(StorageError::Closed)?;
            f(conn)
        })
        .await?
    }

    /// Append a review and return it with its assigned id
    pub async fn insert(&self, review: NewReview) -> Result<Review, StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO reviews (
                    created_at, name, rating, review_text,
                    ai_user_response, ai_summary, ai_actions
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    review.created_at,
                    review.name,
                    review.rating,
                    review.review_text,
                    review.ai_user_response,
                    review.ai_summary,
                    review.ai_actions,
                ],
            )?;
            let id = conn.last_insert_rowid();

            Ok(Review {
                id,
                created_at: review.created_at,
                name: review.name,
                rating: review.rating,
                review_text: review.review_text,
                ai_user_response: review.ai_user_response,
                ai_summary: review.ai_summary,
                ai_actions: review.ai_actions,
            })
        })
        .await
    }

    /// All reviews, newest first
    pub async fn list(&self) -> Result<Vec<Review>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))?;
            let reviews = stmt
                .query_map([], Review::from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(reviews)
        })
        .await
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    /// Total, mean rating (two decimals) and per-star counts
    pub async fn stats(&self) -> Result<RatingStats, StorageError> {
        let rows = self
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT rating, COUNT(*) FROM reviews GROUP BY rating")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut distribution: BTreeMap<String, u64> =
            (1..=5).map(|star: u8| (star.to_string(), 0)).collect();

        let mut total = 0u64;
        let mut sum = 0u64;
        for (rating, count) in rows {
            let count = count as u64;
            total += count;
            sum += rating as u64 * count;
            *distribution.entry(rating.to_string()).or_insert(0) += count;
        }

        let average_rating = if total == 0 {
            0.0
        } else {
            ((sum as f64 / total as f64) * 100.0).round() / 100.0
        };

        Ok(RatingStats {
            total,
            average_rating,
            distribution,
        })
    }

    /// Close the underlying connection; later calls return `StorageError::Closed`
    pub async fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.conn.clone().lock_owned().await;

        task::spawn_blocking(move || -> Result<(), StorageError> {
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
                info!("Closed review database");
            }
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_review(created_at: &str, name: &str, rating: u8) -> NewReview {
        NewReview {
            created_at: created_at.to_string(),
            name: name.to_string(),
            rating,
            review_text: format!("{name} says hello"),
            ai_user_response: "Thanks!".to_string(),
            ai_summary: "A greeting.".to_string(),
            ai_actions: "- Wave back".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = ReviewStore::open_in_memory().unwrap();

        let first = store
            .insert(new_review("2025-01-01T00:00:00.000000Z", "ana", 4))
            .await
            .unwrap();
        let second = store
            .insert(new_review("2025-01-01T00:00:01.000000Z", "ben", 2))
            .await
            .unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.name, "ana");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn inserted_row_matches_returned_review() {
        let store = ReviewStore::open_in_memory().unwrap();
        let created = store
            .insert(new_review("2025-01-01T00:00:00.000000Z", "ana", 4))
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_stable() {
        let store = ReviewStore::open_in_memory().unwrap();
        // Inserted out of order on purpose
        for (ts, name) in [
            ("2025-01-02T00:00:00.000000Z", "t2"),
            ("2025-01-01T00:00:00.000000Z", "t1"),
            ("2025-01-03T00:00:00.000000Z", "t3"),
        ] {
            store.insert(new_review(ts, name, 3)).await.unwrap();
        }

        let first = store.list().await.unwrap();
        let names: Vec<&str> = first.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["t3", "t2", "t1"]);

        let second = store.list().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn equal_timestamps_fall_back_to_id_order() {
        let store = ReviewStore::open_in_memory().unwrap();
        let ts = "2025-01-01T00:00:00.000000Z";
        store.insert(new_review(ts, "older", 3)).await.unwrap();
        store.insert(new_review(ts, "newer", 3)).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].name, "newer");
    }

    #[tokio::test]
    async fn stats_on_empty_store() {
        let store = ReviewStore::open_in_memory().unwrap();
        let stats = store.stats().await.unwrap();

        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.distribution.len(), 5);
        assert!(stats.distribution.values().all(|&n| n == 0));
    }

    #[tokio::test]
    async fn stats_counts_and_average() {
        let store = ReviewStore::open_in_memory().unwrap();
        for rating in [5, 5, 4, 1] {
            store
                .insert(new_review(&timestamp_now(), "x", rating))
                .await
                .unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.average_rating, 3.75);
        assert_eq!(stats.distribution["5"], 2);
        assert_eq!(stats.distribution["4"], 1);
        assert_eq!(stats.distribution["1"], 1);
        assert_eq!(stats.distribution["2"], 0);
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store = ReviewStore::open_in_memory().unwrap();
        store.close().await.unwrap();

        assert!(matches!(store.list().await, Err(StorageError::Closed)));
        assert!(matches!(
            store.insert(new_review(&timestamp_now(), "x", 3)).await,
            Err(StorageError::Closed)
        ));
        // Closing twice is harmless
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn file_database_uses_wal_and_persists() {
        let dir = std::env::temp_dir().join(format!("feedback-api-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reviews.db");
        let _ = std::fs::remove_file(&path);

        let store = ReviewStore::open(&path, Duration::from_millis(500)).unwrap();
        store
            .insert(new_review(&timestamp_now(), "ana", 5))
            .await
            .unwrap();
        store.close().await.unwrap();

        let reopened = ReviewStore::open(&path, Duration::from_millis(500)).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        {
            let guard = reopened.conn.lock().await;
            let mode: String = guard
                .as_ref()
                .unwrap()
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap();
            assert_eq!(mode.to_lowercase(), "wal");
        }
        reopened.close().await.unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_inserts_are_serialized() {
        let store = Arc::new(ReviewStore::open_in_memory().unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(new_review(&timestamp_now(), &format!("user-{i}"), 3))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 16);
        assert_eq!(store.count().await.unwrap(), 16);
    }

    #[test]
    fn timestamps_are_utc_with_micros() {
        let ts = timestamp_now();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2025-01-31T09:15:02.123456Z".len());
    }
}
