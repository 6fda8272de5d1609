use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ng_core::{ArticleFilter, ArticleRecord, ArticleStore, Error, InsertOutcome, Result, TitleLookup};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::StorageBackend;

const DEFAULT_DB_PATH: &str = "articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        title TEXT NOT NULL UNIQUE,
        datePublished TEXT NOT NULL DEFAULT '',
        articleURL TEXT NOT NULL DEFAULT '',
        Content TEXT NOT NULL,
        scrapedAt TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS articles_date_published ON articles (datePublished)
    "#,
    // Add future migrations here
];

const SELECT_COLUMNS: &str = "SELECT title, datePublished, articleURL, Content, scrapedAt FROM articles";

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./articles.db"
    }

    async fn new() -> Result<Self> {
        Self::new_with_path(Path::new(DEFAULT_DB_PATH)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }

        info!(path = %db_path.display(), "SQLite article store ready");
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

fn decode_row(row: &SqliteRow) -> Result<ArticleRecord> {
    let column = |name: &str| {
        row.try_get::<String, _>(name)
            .map_err(|e| Error::Decode(format!("column {}: {}", name, e)))
    };

    let scraped_at = column("scrapedAt")?;
    let scraped_at = DateTime::parse_from_rfc3339(&scraped_at)
        .map_err(|e| Error::Decode(format!("scrapedAt {:?}: {}", scraped_at, e)))?
        .with_timezone(&Utc);

    Ok(ArticleRecord {
        title: column("title")?,
        date_published: column("datePublished")?,
        article_url: column("articleURL")?,
        content: column("Content")?,
        scraped_at,
    })
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn find_by_title(&self, title: &str) -> Result<TitleLookup> {
        let row = sqlx::query(&format!("{} WHERE title = ?", SELECT_COLUMNS))
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Failed to check for existing article: {}", e)))?;

        Ok(match row {
            None => TitleLookup::Absent,
            Some(row) => match decode_row(&row) {
                Ok(record) => TitleLookup::Present(record),
                Err(e) => TitleLookup::Undecodable(e.to_string()),
            },
        })
    }

    async fn insert_if_absent(&self, record: &ArticleRecord) -> Result<InsertOutcome> {
        match self.find_by_title(&record.title).await? {
            TitleLookup::Present(_) => {
                debug!(title = %record.title, "Article with the same title already exists, skipping");
                return Ok(InsertOutcome::Duplicate);
            }
            TitleLookup::Undecodable(reason) => {
                warn!(title = %record.title, %reason, "Existing article with this title cannot be decoded, skipping");
                return Ok(InsertOutcome::ExistingUndecodable);
            }
            TitleLookup::Absent => {}
        }

        let result = sqlx::query(
            r#"
            INSERT INTO articles (title, datePublished, articleURL, Content, scrapedAt)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(title) DO NOTHING
            "#,
        )
        .bind(&record.title)
        .bind(&record.date_published)
        .bind(&record.article_url)
        .bind(&record.content)
        .bind(record.scraped_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to store article: {}", e)))?;

        if result.rows_affected() == 0 {
            // another writer claimed the title between the lookup and the insert
            debug!(title = %record.title, "Article inserted concurrently, skipping");
            return Ok(InsertOutcome::Duplicate);
        }

        info!(title = %record.title, "Article stored");
        Ok(InsertOutcome::Inserted)
    }

    async fn retrieve(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>> {
        let rows = match &filter.date_published {
            Some(date) => {
                sqlx::query(&format!("{} WHERE datePublished = ?", SELECT_COLUMNS))
                    .bind(date)
                    .fetch_all(&self.pool)
                    .await
            }
            None => sqlx::query(SELECT_COLUMNS).fetch_all(&self.pool).await,
        }
        .map_err(|e| Error::Storage(format!("Failed to retrieve articles: {}", e)))?;

        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        debug!(path = %self.db_path.display(), "SQLite article store closed");
        Ok(())
    }
}
