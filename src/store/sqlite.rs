//! SQLite-backed [`ArticleStore`] and [`CounterStore`].
//!
//! Maps each trait operation onto the `articles` and `sequence_counters`
//! tables created by [`crate::migrate::apply`].

use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::category::{Category, SequenceFamily};
use crate::models::{ArticleRecord, ArticleStatus};
use crate::sequence::SequenceCounters;

use super::{ArticleFilter, ArticleStore, CounterStore, InsertOutcome, UpdateOutcome};

/// SQLite implementation of both store traits.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &SqliteRow) -> Result<ArticleRecord> {
    let id: String = row.get("id");
    let category_label: String = row.get("category");
    let status_label: String = row.get("status");
    let category = Category::from_label(&category_label)
        .ok_or_else(|| anyhow!("article {} has unknown category {:?}", id, category_label))?;
    let status = ArticleStatus::parse(&status_label)
        .ok_or_else(|| anyhow!("article {} has unknown status {:?}", id, status_label))?;

    Ok(ArticleRecord {
        id,
        name: row.get("name"),
        category,
        url: row.get("url"),
        status,
        notebook_link: row.get("notebook_link"),
    })
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM articles")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn urls(&self) -> Result<Vec<String>> {
        let urls: Vec<String> = sqlx::query_scalar("SELECT url FROM articles")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }

    async fn insert(&self, record: &ArticleRecord, inserted_by: &str) -> Result<InsertOutcome> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, name, category, url, status, notebook_link, inserted_by, inserted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.category.label())
        .bind(&record.url)
        .bind(record.status.as_str())
        .bind(&record.notebook_link)
        .bind(inserted_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert of {} failed", record.id))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::DuplicateKey)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn get(&self, id: &str) -> Result<Option<ArticleRecord>> {
        let row = sqlx::query(
            "SELECT id, name, category, url, status, notebook_link FROM articles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>> {
        let rows = match filter.status {
            Some(status) => {
                sqlx::query(
                    "SELECT id, name, category, url, status, notebook_link FROM articles WHERE status = ? ORDER BY id",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, name, category, url, status, notebook_link FROM articles ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        // Weekly variants share a family but not a label, so the family
        // filter runs after decoding.
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row_to_record(row)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn update_notebook_link(&self, url: &str, link: &str) -> Result<UpdateOutcome> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT notebook_link FROM articles WHERE url = ?")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Ok(UpdateOutcome::NotFound),
            Some(existing) if existing == link => Ok(UpdateOutcome::Unchanged),
            Some(_) => {
                sqlx::query("UPDATE articles SET notebook_link = ? WHERE url = ?")
                    .bind(link)
                    .bind(url)
                    .execute(&self.pool)
                    .await?;
                Ok(UpdateOutcome::Updated)
            }
        }
    }

    async fn update_status(&self, url: &str, status: ArticleStatus) -> Result<UpdateOutcome> {
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        match current {
            None => Ok(UpdateOutcome::NotFound),
            Some(existing) if existing == status.as_str() => Ok(UpdateOutcome::Unchanged),
            Some(_) => {
                sqlx::query("UPDATE articles SET status = ? WHERE url = ?")
                    .bind(status.as_str())
                    .bind(url)
                    .execute(&self.pool)
                    .await?;
                Ok(UpdateOutcome::Updated)
            }
        }
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM articles")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CounterStore for SqliteStore {
    async fn load(&self) -> Result<SequenceCounters> {
        let rows = sqlx::query("SELECT family, value FROM sequence_counters")
            .fetch_all(&self.pool)
            .await?;

        let mut counters = SequenceCounters::default();
        for row in &rows {
            let key: String = row.get("family");
            let value: i64 = row.get("value");
            let Some(family) = SequenceFamily::from_counter_key(&key) else {
                tracing::warn!(counter = %key, "ignoring unknown sequence counter");
                continue;
            };
            let value = u32::try_from(value)
                .with_context(|| format!("counter {} out of range: {}", key, value))?;
            counters.set(family, value);
        }
        Ok(counters)
    }

    async fn save(&self, counters: &SequenceCounters) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (family, value) in counters.iter() {
            sqlx::query(
                r#"
                INSERT INTO sequence_counters (family, value, updated_at) VALUES (?, ?, ?)
                ON CONFLICT(family) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(family.counter_key())
            .bind(i64::from(value))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
