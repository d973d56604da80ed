//! Article listing and post-ingestion updates.
//!
//! Used by the `list`, `notebook` and `status` CLI commands and by the
//! `/articles` HTTP endpoints. Records are only ever updated here, never
//! deleted.

use anyhow::{bail, Result};

use crate::category::Category;
use crate::models::{ArticleRecord, ArticleStatus};
use crate::store::{ArticleFilter, ArticleStore, UpdateOutcome};

/// Builds a listing filter from user-supplied category and status labels.
pub fn parse_filter(category: Option<&str>, status: Option<&str>) -> Result<ArticleFilter> {
    let family = match category {
        Some(raw) => match Category::from_label(raw) {
            Some(category) => Some(category.family()),
            None => bail!("unknown category: {}", raw),
        },
        None => None,
    };
    let status = match status {
        Some(raw) => match ArticleStatus::parse(raw) {
            Some(status) => Some(status),
            None => bail!("invalid status: {} (expected covered or not-covered)", raw),
        },
        None => None,
    };
    Ok(ArticleFilter { family, status })
}

pub async fn list_articles(
    store: &dyn ArticleStore,
    filter: &ArticleFilter,
) -> Result<Vec<ArticleRecord>> {
    store.list(filter).await
}

/// Sets the notebook link of the article at `url`. Both values are required.
pub async fn update_notebook_link(
    store: &dyn ArticleStore,
    url: &str,
    link: &str,
    user_id: &str,
) -> Result<UpdateOutcome> {
    let url = url.trim();
    let link = link.trim();
    if url.is_empty() || link.is_empty() {
        bail!("url and notebook link must not be empty");
    }

    let outcome = store.update_notebook_link(url, link).await?;
    match outcome {
        UpdateOutcome::Updated => {
            tracing::info!(url, user = user_id, "notebook link updated");
        }
        UpdateOutcome::Unchanged => tracing::debug!(url, "notebook link unchanged"),
        UpdateOutcome::NotFound => tracing::warn!(url, "no article for notebook link"),
    }
    Ok(outcome)
}

pub async fn update_status(
    store: &dyn ArticleStore,
    url: &str,
    status: ArticleStatus,
) -> Result<UpdateOutcome> {
    let url = url.trim();
    if url.is_empty() {
        bail!("url must not be empty");
    }

    let outcome = store.update_status(url, status).await?;
    if outcome == UpdateOutcome::Updated {
        tracing::info!(url, status = status.as_str(), "status updated");
    }
    Ok(outcome)
}

pub fn describe_update(outcome: UpdateOutcome) -> &'static str {
    match outcome {
        UpdateOutcome::Updated => "updated",
        UpdateOutcome::Unchanged => "unchanged",
        UpdateOutcome::NotFound => "not found",
    }
}

/// CLI printer for `list`.
pub fn print_articles(records: &[ArticleRecord]) {
    if records.is_empty() {
        println!("No articles.");
        return;
    }

    for record in records {
        println!("{}  [{}]  {}", record.id, record.status.as_str(), record.name);
        println!("    category: {}", record.category);
        println!("    url:      {}", record.url);
        if !record.notebook_link.is_empty() {
            println!("    notebook: {}", record.notebook_link);
        }
    }
    println!();
    println!("{} article(s)", records.len());
}
