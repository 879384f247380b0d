//! libSQL storage layer for the regulation repository.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the current
//! text of each regulation and its amendment history. It implements
//! [`RegulationRepository`], the seam the intake workflow is written against.
//!
//! **Access rules:**
//! - ingest commands: read-write via [`Storage::open`]
//! - `show` / `list`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use reglens_shared::{Amendment, RegLensError, Regulation, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex SHA-256 of a regulation body.
pub fn content_hash(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}

/// Persistence operations the intake workflow needs.
#[async_trait]
pub trait RegulationRepository: Send + Sync {
    /// Look up a regulation by its key.
    async fn find_by_key(&self, key: &str) -> Result<Option<Regulation>>;

    /// Store a new regulation. Fails if `key` is already taken.
    async fn insert(&self, key: &str, title: Option<&str>, body: &str) -> Result<Regulation>;

    /// Replace the body of the regulation under `key` and record `amendment_text`
    /// in its history. Fails if `key` is unknown.
    async fn update(&self, key: &str, body: &str, amendment_text: &str) -> Result<Regulation>;

    /// All regulations ordered by key.
    async fn list(&self) -> Result<Vec<Regulation>>;

    /// Amendment history of one regulation, oldest first.
    async fn amendments(&self, regulation_id: &str) -> Result<Vec<Amendment>>;
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> RegLensError {
    RegLensError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RegLensError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RegLensError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        RegLensError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(RegLensError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    async fn query_regulations(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Regulation>> {
        let mut rows = self.conn.query(sql, params).await.map_err(storage_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_regulation(&row)?);
        }
        Ok(results)
    }
}

const REGULATION_COLUMNS: &str = "id, key, title, body, content_hash, created_at, updated_at";

#[async_trait]
impl RegulationRepository for Storage {
    async fn find_by_key(&self, key: &str) -> Result<Option<Regulation>> {
        let sql = format!("SELECT {REGULATION_COLUMNS} FROM regulations WHERE key = ?1");
        Ok(self
            .query_regulations(&sql, params![key])
            .await?
            .into_iter()
            .next())
    }

    async fn insert(&self, key: &str, title: Option<&str>, body: &str) -> Result<Regulation> {
        self.check_writable()?;
        let now = Utc::now();
        let regulation = Regulation {
            id: Uuid::now_v7().to_string(),
            key: key.to_string(),
            title: title.map(str::to_string),
            body: body.to_string(),
            content_hash: content_hash(body),
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                "INSERT INTO regulations (id, key, title, body, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    regulation.id.as_str(),
                    key,
                    title,
                    body,
                    regulation.content_hash.as_str(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| RegLensError::Storage(format!("insert regulation `{key}`: {e}")))?;

        tracing::debug!(key, id = %regulation.id, "regulation inserted");
        Ok(regulation)
    }

    async fn update(&self, key: &str, body: &str, amendment_text: &str) -> Result<Regulation> {
        self.check_writable()?;
        let current = self
            .find_by_key(key)
            .await?
            .ok_or_else(|| RegLensError::Storage(format!("no regulation with key `{key}`")))?;

        let now = Utc::now();
        let new_hash = content_hash(body);

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute(
            "UPDATE regulations SET body = ?1, content_hash = ?2, updated_at = ?3 WHERE id = ?4",
            params![body, new_hash.as_str(), now.to_rfc3339(), current.id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        tx.execute(
            "INSERT INTO amendments (id, regulation_id, text, previous_hash, new_hash, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::now_v7().to_string(),
                current.id.as_str(),
                amendment_text,
                current.content_hash.as_str(),
                new_hash.as_str(),
                now.to_rfc3339(),
            ],
        )
        .await
        .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;

        tracing::debug!(key, id = %current.id, "regulation amended");
        Ok(Regulation {
            body: body.to_string(),
            content_hash: new_hash,
            updated_at: now,
            ..current
        })
    }

    async fn list(&self) -> Result<Vec<Regulation>> {
        let sql = format!("SELECT {REGULATION_COLUMNS} FROM regulations ORDER BY key");
        self.query_regulations(&sql, params![]).await
    }

    async fn amendments(&self, regulation_id: &str) -> Result<Vec<Amendment>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, regulation_id, text, previous_hash, new_hash, applied_at
                 FROM amendments WHERE regulation_id = ?1 ORDER BY applied_at, id",
                params![regulation_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(Amendment {
                id: row.get::<String>(0).map_err(storage_err)?,
                regulation_id: row.get::<String>(1).map_err(storage_err)?,
                text: row.get::<String>(2).map_err(storage_err)?,
                previous_hash: row.get::<String>(3).map_err(storage_err)?,
                new_hash: row.get::<String>(4).map_err(storage_err)?,
                applied_at: parse_timestamp(&row.get::<String>(5).map_err(storage_err)?)?,
            });
        }
        Ok(results)
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RegLensError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`Regulation`].
fn row_to_regulation(row: &libsql::Row) -> Result<Regulation> {
    Ok(Regulation {
        id: row.get::<String>(0).map_err(storage_err)?,
        key: row.get::<String>(1).map_err(storage_err)?,
        title: row.get::<String>(2).ok(),
        body: row.get::<String>(3).map_err(storage_err)?,
        content_hash: row.get::<String>(4).map_err(storage_err)?,
        created_at: parse_timestamp(&row.get::<String>(5).map_err(storage_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(6).map_err(storage_err)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("rl_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash("a").len(), 64);
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("rl_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn insert_and_find() {
        let storage = test_storage().await;
        let inserted = storage
            .insert("reg-2023-114", Some("Capital requirements"), "Article 1. Banks hold capital.")
            .await
            .expect("insert");

        let found = storage
            .find_by_key("reg-2023-114")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.title.as_deref(), Some("Capital requirements"));
        assert_eq!(found.content_hash, content_hash("Article 1. Banks hold capital."));

        assert!(storage.find_by_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_key_rejected() {
        let storage = test_storage().await;
        storage.insert("k", None, "one").await.unwrap();
        let err = storage.insert("k", None, "two").await.unwrap_err();
        assert!(matches!(err, RegLensError::Storage(_)));
    }

    #[tokio::test]
    async fn update_records_amendment_history() {
        let storage = test_storage().await;
        let original = storage.insert("k", None, "Fees are 5%.").await.unwrap();

        let updated = storage
            .update("k", "Fees are 7%.", "Amend fees to 7%.")
            .await
            .expect("update");
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.body, "Fees are 7%.");
        assert_ne!(updated.content_hash, original.content_hash);

        let stored = storage.find_by_key("k").await.unwrap().unwrap();
        assert_eq!(stored.body, "Fees are 7%.");

        let history = storage.amendments(&original.id).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "Amend fees to 7%.");
        assert_eq!(history[0].previous_hash, original.content_hash);
        assert_eq!(history[0].new_hash, updated.content_hash);
    }

    #[tokio::test]
    async fn update_unknown_key_fails() {
        let storage = test_storage().await;
        assert!(storage.update("nope", "x", "y").await.is_err());
    }

    #[tokio::test]
    async fn list_orders_by_key() {
        let storage = test_storage().await;
        storage.insert("b", None, "two").await.unwrap();
        storage.insert("a", None, "one").await.unwrap();
        let keys: Vec<String> = storage.list().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("rl_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert("k1", None, "text").await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list().await.unwrap().len(), 1);
        let result = ro.insert("k2", None, "text").await;
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_missing_file_fails() {
        let tmp = std::env::temp_dir().join(format!("rl_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
