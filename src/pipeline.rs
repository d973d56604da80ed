//! End-to-end pipeline run.
//!
//! A run is one sequential pass over three stages sharing a single
//! workspace (duplicate index, staging document and sequence allocator):
//!
//! ```text
//! feed ──classify──▶ merge ─┐
//!                           ├──▶ staging (flushed) ──▶ sync ──▶ store
//! source payload ──▶ merge ─┘
//! ```
//!
//! Stage errors never escape [`Pipeline::run`]; they end the run and are
//! reported in the [`RunReport`] together with the counts reached so far.
//! Only one run may be active at a time; callers check the [`RunGate`]
//! first and get an immediate refusal while a run is in progress.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::classify::classify_entries;
use crate::config::Config;
use crate::db;
use crate::dedup::DuplicateIndex;
use crate::error::{PipelineError, Result, SyncFailed};
use crate::feed::{read_scraped, FeedSource, RssFeed};
use crate::merge::{merge, merge_raw, MergeOutcome};
use crate::migrate;
use crate::sequence::{SequenceAllocator, SequenceCounters};
use crate::staging::StagingDocument;
use crate::store::{ArticleStore, CounterStore, SqliteStore};
use crate::sync::{self, RebuildReport, SyncReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Success,
    Failed,
}

/// Verdict and counts of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    /// Feed entries added to staging.
    pub feed_new: usize,
    /// Source payload entries added to staging.
    pub json_new: usize,
    /// Records inserted into the durable store.
    pub db_new: usize,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Non-blocking single-run gate.
#[derive(Clone, Default)]
pub struct RunGate {
    lock: Arc<Mutex<()>>,
}

/// Held for the duration of a run; dropping it opens the gate.
pub struct RunPermit {
    _guard: OwnedMutexGuard<()>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` immediately when a run is already active.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| RunPermit { _guard: guard })
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// Per-run mutable state.
struct Workspace {
    index: DuplicateIndex,
    staging: StagingDocument,
    allocator: SequenceAllocator,
}

pub struct Pipeline {
    config: Arc<Config>,
    articles: Arc<dyn ArticleStore>,
    counters: Arc<dyn CounterStore>,
    feed: Option<Arc<dyn FeedSource>>,
}

impl Pipeline {
    /// Builds a pipeline over the given stores. The feed comes from
    /// `config.feed` when present.
    pub fn new(
        config: Arc<Config>,
        articles: Arc<dyn ArticleStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        let feed = config
            .feed
            .as_ref()
            .map(|feed| Arc::new(RssFeed::from_config(feed)) as Arc<dyn FeedSource>);
        Self {
            config,
            articles,
            counters,
            feed,
        }
    }

    /// Connects to the configured SQLite database, applying the schema.
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;
        let store = Arc::new(SqliteStore::new(pool));
        Ok(Self::new(Arc::new(config), store.clone(), store))
    }

    pub fn with_feed(mut self, feed: Arc<dyn FeedSource>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn articles(&self) -> &dyn ArticleStore {
        self.articles.as_ref()
    }

    pub fn counters(&self) -> &dyn CounterStore {
        self.counters.as_ref()
    }

    /// Runs feed, source and sync stages in order.
    pub async fn run(&self, user_id: &str) -> RunReport {
        let mut report = RunReport::default();
        match self.run_stages(user_id, &mut report).await {
            Ok(()) => {
                tracing::info!(
                    feed_new = report.feed_new,
                    json_new = report.json_new,
                    db_new = report.db_new,
                    "pipeline run complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "pipeline run failed");
                report.status = RunStatus::Failed;
                report.errors.push(e.to_string());
            }
        }
        report
    }

    async fn run_stages(&self, user_id: &str, report: &mut RunReport) -> Result<()> {
        let mut ws = self.open_workspace().await?;

        if let Some(outcome) = self.feed_stage(&mut ws).await? {
            report.feed_new = outcome.added;
        }
        if let Some(outcome) = self.source_stage(&mut ws).await? {
            report.json_new = outcome.added;
        }

        match sync::sync_document(&ws.staging, self.articles(), &mut ws.index, user_id).await {
            Ok(sync) => report.db_new = sync.inserted,
            Err(failed) => {
                report.db_new = failed.inserted;
                return Err(failed.source);
            }
        }

        self.cleanup_source();
        Ok(())
    }

    /// Feed stage on its own. `None` when no feed is configured.
    pub async fn ingest_feed(&self) -> Result<Option<MergeOutcome>> {
        let mut ws = self.open_workspace().await?;
        self.feed_stage(&mut ws).await
    }

    /// Source payload stage on its own. `None` when no source is
    /// configured or it was already consumed.
    pub async fn ingest_source(&self) -> Result<Option<MergeOutcome>> {
        let mut ws = self.open_workspace().await?;
        self.source_stage(&mut ws).await
    }

    /// Syncs the staging document at `path` (default: the configured
    /// staging path) into the durable store.
    pub async fn sync(
        &self,
        path: Option<&Path>,
        user_id: &str,
    ) -> std::result::Result<SyncReport, SyncFailed> {
        let path = path.unwrap_or(self.config.staging.path.as_path());
        let mut index = DuplicateIndex::build(self.articles()).await?;
        let synced = sync::sync_path(path, self.articles(), &mut index, user_id).await;

        // Inserted ids did not come from this allocator; counters must not
        // fall behind them.
        match synced {
            Ok(report) => {
                if report.inserted > 0 {
                    self.raise_counters_to_store()
                        .await
                        .map_err(|source| SyncFailed {
                            inserted: report.inserted,
                            source,
                        })?;
                }
                Ok(report)
            }
            Err(failed) => {
                if failed.inserted > 0 {
                    if let Err(e) = self.raise_counters_to_store().await {
                        tracing::warn!(error = %e, "could not raise counters after failed sync");
                    }
                }
                Err(failed)
            }
        }
    }

    async fn raise_counters_to_store(&self) -> Result<SequenceCounters> {
        sync::restore_counters(&StagingDocument::new(), self.articles(), self.counters()).await
    }

    /// Reloads every staged record into the store and restores counters.
    pub async fn rebuild(&self, user_id: &str, clear: bool) -> Result<RebuildReport> {
        let doc = StagingDocument::load(&self.config.staging.path)?;
        sync::rebuild(&doc, self.articles(), self.counters(), user_id, clear).await
    }

    /// Raises persisted counters to the highest staged or stored id.
    pub async fn restore_counters(&self) -> Result<SequenceCounters> {
        let doc = StagingDocument::load_or_default(&self.config.staging.path)?;
        sync::restore_counters(&doc, self.articles(), self.counters()).await
    }

    async fn open_workspace(&self) -> Result<Workspace> {
        let index = DuplicateIndex::build(self.articles()).await?;
        let staging = StagingDocument::load_or_default(&self.config.staging.path)?;

        // Staged or stored ids may be ahead of the persisted counters after a
        // crash between flush and counter save, or a sync of a foreign document.
        let persisted = self.counters.load().await.map_err(PipelineError::Store)?;
        let implied = SequenceCounters::from_ids(
            staging
                .iter()
                .map(|(id, _)| id.as_str())
                .chain(index.ids()),
        );
        let allocator = SequenceAllocator::new(persisted.max_with(&implied), self.counters.clone());

        tracing::debug!(
            indexed = index.len(),
            staged = staging.len(),
            "workspace ready"
        );
        Ok(Workspace {
            index,
            staging,
            allocator,
        })
    }

    async fn feed_stage(&self, ws: &mut Workspace) -> Result<Option<MergeOutcome>> {
        let Some(feed) = &self.feed else {
            return Ok(None);
        };

        let entries = feed.fetch().await?;
        let classified = classify_entries(&entries);
        tracing::info!(
            origin = %feed.origin(),
            entries = entries.len(),
            classified = classified.len(),
            "feed fetched"
        );

        let merged = merge(&classified, &mut ws.staging, &ws.index, &mut ws.allocator).await;
        self.flush(ws, merged).map(Some)
    }

    async fn source_stage(&self, ws: &mut Workspace) -> Result<Option<MergeOutcome>> {
        let Some(source) = &self.config.source else {
            return Ok(None);
        };

        if source.remove_after_sync && !source.path.exists() {
            tracing::debug!(path = %source.path.display(), "source already consumed");
            return Ok(None);
        }

        let entries = read_scraped(&source.path)?;
        let merged = merge_raw(&entries, &mut ws.staging, &ws.index, &mut ws.allocator).await;
        self.flush(ws, merged).map(Some)
    }

    /// Flushes staging whatever the merge result: ids allocated before a
    /// failure are already persisted and must not be lost from staging.
    fn flush(&self, ws: &mut Workspace, merged: Result<MergeOutcome>) -> Result<MergeOutcome> {
        let flushed = ws.staging.flush(&self.config.staging.path);
        let outcome = merged?;
        flushed?;
        tracing::info!(added = outcome.added, skipped = outcome.skipped, "merged into staging");
        Ok(outcome)
    }

    fn cleanup_source(&self) {
        if let Some(source) = &self.config.source {
            if source.remove_after_sync && source.path.exists() {
                sync::remove_consumed(&source.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_refuses_second_permit() {
        let gate = RunGate::new();
        assert!(!gate.is_running());

        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_running());
        assert!(gate.clone().try_acquire().is_none());

        drop(permit);
        assert!(!gate.is_running());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_report_serializes_lowercase_status() {
        let report = RunReport {
            status: RunStatus::Failed,
            errors: vec!["boom".to_string()],
            ..RunReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["db_new"], 0);
        assert_eq!(json["errors"][0], "boom");
    }
}
