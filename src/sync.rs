//! Sync engine: reconciles a staging document against the durable store.
//!
//! A single sync walks `Idle → LoadingSource → Indexing → Reconciling` and
//! ends in `Committed`, `UpToDate` or `Failed`:
//!
//! 1. **LoadingSource**: read and validate the staging document. Unknown
//!    `Type` labels fail here, before anything is written.
//! 2. **Indexing**: read every id in the durable store; the candidates are
//!    `staged ids − stored ids`. Id match takes precedence over URL.
//! 3. **Reconciling**: for each candidate in id order, skip it if its URL is
//!    already indexed, otherwise insert it as `Not Covered` with an empty
//!    notebook link and extend the [`DuplicateIndex`].
//!
//! There is no batch transaction: each insert commits on its own and a
//! failure leaves the committed prefix in place ([`SyncFailed::inserted`]).
//!
//! Deleting a consumed source file is a separate advisory step
//! ([`remove_consumed`]) that runs only after the sync returned and whose
//! failure is logged, never reported as a sync failure.

use std::fmt;
use std::path::Path;

use crate::dedup::DuplicateIndex;
use crate::error::{PipelineError, Result, SyncFailed};
use crate::sequence::SequenceCounters;
use crate::staging::StagingDocument;
use crate::store::{ArticleStore, CounterStore, InsertOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    LoadingSource,
    Indexing,
    Reconciling,
    Committed,
    UpToDate,
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::LoadingSource => "loading-source",
            SyncState::Indexing => "indexing",
            SyncState::Reconciling => "reconciling",
            SyncState::Committed => "committed",
            SyncState::UpToDate => "up-to-date",
            SyncState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// `Committed` or `UpToDate`.
    pub state: SyncState,
    /// Staged ids absent from the durable store.
    pub candidates: usize,
    pub inserted: usize,
    /// Candidates dropped because their URL was already indexed.
    pub skipped_urls: usize,
    /// Inserts the store rejected as duplicate ids.
    pub rejected_keys: usize,
}

struct Tracker {
    state: SyncState,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: SyncState::Idle,
        }
    }

    fn enter(&mut self, next: SyncState) {
        tracing::debug!(from = %self.state, to = %next, "sync state");
        self.state = next;
    }

    fn fail(&mut self, inserted: usize, source: PipelineError) -> SyncFailed {
        self.enter(SyncState::Failed);
        SyncFailed { inserted, source }
    }
}

/// Loads the staging document at `path` and syncs it.
pub async fn sync_path(
    path: &Path,
    store: &dyn ArticleStore,
    index: &mut DuplicateIndex,
    user_id: &str,
) -> std::result::Result<SyncReport, SyncFailed> {
    let mut tracker = Tracker::new();
    tracker.enter(SyncState::LoadingSource);
    let doc = StagingDocument::load(path).map_err(|e| tracker.fail(0, e))?;
    reconcile(tracker, &doc, store, index, user_id).await
}

/// Syncs an already loaded staging document.
pub async fn sync_document(
    doc: &StagingDocument,
    store: &dyn ArticleStore,
    index: &mut DuplicateIndex,
    user_id: &str,
) -> std::result::Result<SyncReport, SyncFailed> {
    let mut tracker = Tracker::new();
    tracker.enter(SyncState::LoadingSource);
    reconcile(tracker, doc, store, index, user_id).await
}

async fn reconcile(
    mut tracker: Tracker,
    doc: &StagingDocument,
    store: &dyn ArticleStore,
    index: &mut DuplicateIndex,
    user_id: &str,
) -> std::result::Result<SyncReport, SyncFailed> {
    if let Some((id, record)) = doc.iter().find(|(_, r)| r.category().is_none()) {
        let err = PipelineError::unknown_category(id.as_str(), record.kind.as_str());
        return Err(tracker.fail(0, err));
    }

    tracker.enter(SyncState::Indexing);
    let stored_ids = store
        .ids()
        .await
        .map_err(|e| tracker.fail(0, PipelineError::Store(e)))?;

    let candidates: Vec<_> = doc
        .iter()
        .filter(|(id, _)| !stored_ids.contains(id.as_str()))
        .collect();

    let mut report = SyncReport {
        state: SyncState::UpToDate,
        candidates: candidates.len(),
        inserted: 0,
        skipped_urls: 0,
        rejected_keys: 0,
    };

    if candidates.is_empty() {
        tracker.enter(SyncState::UpToDate);
        tracing::info!("checked for updates, none found; store is up to date");
        return Ok(report);
    }

    tracker.enter(SyncState::Reconciling);
    for (id, staged) in candidates {
        if index.contains(&staged.url) {
            tracing::debug!(id = %id, url = %staged.url, "duplicate URL skipped");
            report.skipped_urls += 1;
            continue;
        }

        // Categories were validated above.
        let Some(record) = staged.to_record(id) else {
            continue;
        };

        match store.insert(&record, user_id).await {
            Ok(InsertOutcome::Inserted) => {
                index.add(record.url.clone());
                index.add_id(id.as_str());
                report.inserted += 1;
                tracing::info!(id = %id, user = user_id, "{} added by {}", id, user_id);
            }
            Ok(InsertOutcome::DuplicateKey) => {
                tracing::debug!(id = %id, "store rejected duplicate id");
                report.rejected_keys += 1;
            }
            Err(e) => {
                return Err(tracker.fail(report.inserted, PipelineError::Store(e)));
            }
        }
    }

    report.state = if report.inserted > 0 {
        SyncState::Committed
    } else {
        SyncState::UpToDate
    };
    tracker.enter(report.state);
    tracing::info!(
        inserted = report.inserted,
        skipped_urls = report.skipped_urls,
        rejected_keys = report.rejected_keys,
        "sync finished"
    );
    Ok(report)
}

/// Deletes a fully consumed source file. Failure is logged and reported as
/// `false`; it never undoes or re-flags committed inserts.
pub fn remove_consumed(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed consumed source");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove consumed source");
            false
        }
    }
}

/// Outcome of [`rebuild`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// Records removed by `clear` before loading.
    pub removed: u64,
    pub processed: usize,
    pub inserted: usize,
    /// Records skipped for an unknown `Type` or an empty URL.
    pub skipped: usize,
    /// Records whose insert failed; logged and skipped.
    pub failed: usize,
    pub counters: SequenceCounters,
}

/// Loads every staged record into the store (insert-if-absent, no URL
/// check) and restores the counters from the ids seen.
pub async fn rebuild(
    doc: &StagingDocument,
    articles: &dyn ArticleStore,
    counters: &dyn CounterStore,
    user_id: &str,
    clear: bool,
) -> Result<RebuildReport> {
    let removed = if clear {
        let removed = articles.clear().await.map_err(PipelineError::Store)?;
        tracing::info!(removed, "store cleared before rebuild");
        removed
    } else {
        0
    };

    let mut report = RebuildReport {
        removed,
        processed: 0,
        inserted: 0,
        skipped: 0,
        failed: 0,
        counters: SequenceCounters::default(),
    };

    for (id, staged) in doc.iter() {
        let record = match staged.to_record(id) {
            Some(record) if !record.url.is_empty() => record,
            _ => {
                tracing::warn!(id = %id, kind = %staged.kind, "skipping unusable staged record");
                report.skipped += 1;
                continue;
            }
        };

        match articles.insert(&record, user_id).await {
            Ok(InsertOutcome::Inserted) => report.inserted += 1,
            Ok(InsertOutcome::DuplicateKey) => {}
            Err(e) => {
                tracing::error!(id = %id, error = %e, "insert failed during rebuild");
                report.failed += 1;
                continue;
            }
        }
        report.processed += 1;
    }

    report.counters = restore_counters(doc, articles, counters).await?;
    tracing::info!(processed = report.processed, "rebuild complete");
    Ok(report)
}

/// Raises the persisted counters to the highest id observed in the staging
/// document and the durable store. Counters never decrease.
pub async fn restore_counters(
    doc: &StagingDocument,
    articles: &dyn ArticleStore,
    counters: &dyn CounterStore,
) -> Result<SequenceCounters> {
    let stored_ids = articles.ids().await.map_err(PipelineError::Store)?;
    let staged_ids = doc.ids();
    let observed = SequenceCounters::from_ids(
        stored_ids
            .iter()
            .chain(staged_ids.iter())
            .map(String::as_str),
    );

    let current = counters.load().await.map_err(PipelineError::Store)?;
    let restored = current.max_with(&observed);
    if restored != current {
        counters
            .save(&restored)
            .await
            .map_err(PipelineError::CounterPersist)?;
    }
    Ok(restored)
}
