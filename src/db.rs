use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{is_unique_violation, Error};
use crate::models::Paste;

const PASTE_COLUMNS: &str = "id, slug, content, password_hash, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to a database by URL, creating the file if it does not exist.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database with the schema applied.
    pub async fn in_memory() -> crate::Result<Self> {
        // every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> crate::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database schema is up to date");
        Ok(())
    }

    /// Get a paste by slug.
    pub async fn get_paste(&self, slug: &str) -> crate::Result<Paste> {
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "SELECT {PASTE_COLUMNS} FROM paste WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(paste)
    }

    /// Check whether any paste owns a slug.
    pub async fn slug_exists(&self, slug: &str) -> crate::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM paste WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a paste. A slug that is already owned yields [`Error::SlugTaken`].
    pub async fn insert_paste(
        &self,
        slug: &str,
        content: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> crate::Result<Paste> {
        sqlx::query_as::<_, Paste>(&format!(
            "INSERT INTO paste (slug, content, password_hash, created_at) VALUES (?, ?, ?, ?) \
             RETURNING {PASTE_COLUMNS}"
        ))
        .bind(slug)
        .bind(content)
        .bind(password_hash)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::SlugTaken(slug.to_owned())
            } else {
                e.into()
            }
        })
    }

    /// Replace the content of a paste, returning the stored row.
    pub async fn update_paste_content(
        &self,
        slug: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> crate::Result<Paste> {
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "UPDATE paste SET content = ?, updated_at = ? WHERE slug = ? RETURNING {PASTE_COLUMNS}"
        ))
        .bind(content)
        .bind(updated_at)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(paste)
    }

    /// Count all pastes.
    #[cfg(test)]
    pub async fn count_pastes(&self) -> crate::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM paste")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
