//! Merge engine: folds classified entries into the staging document.
//!
//! Entries are processed in input order. An entry is dropped when its URL is
//! already in the durable [`DuplicateIndex`] or in the staging document's own
//! URL set; the first entry for a URL wins. Every accepted entry gets a fresh
//! ID from the [`SequenceAllocator`], never one already staged or stored.
//!
//! Raw entries carrying a source category are resolved up front by
//! [`resolve_entries`]; one unknown category rejects the whole batch before
//! any ID is allocated.

use crate::category::Category;
use crate::classify::classify;
use crate::dedup::DuplicateIndex;
use crate::error::{PipelineError, Result};
use crate::models::{ClassifiedEntry, Entry};
use crate::sequence::SequenceAllocator;
use crate::staging::{StagedRecord, StagingDocument};

/// Counts from one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    /// Entries dropped as duplicates or for lacking a URL.
    pub skipped: usize,
    /// IDs allocated in this pass, in allocation order.
    pub new_ids: Vec<String>,
}

/// Resolves the category of every raw entry.
///
/// Entries with a source category must name a known one; entries without
/// are classified by title and dropped when the classifier skips them.
pub fn resolve_entries(entries: &[Entry]) -> Result<Vec<ClassifiedEntry>> {
    let mut resolved = Vec::with_capacity(entries.len());
    for entry in entries {
        let url = entry.url.trim().to_string();
        match &entry.raw_category {
            Some(label) => {
                let category = Category::from_label(label)
                    .ok_or_else(|| PipelineError::unknown_category(&entry.key, label))?;
                resolved.push(ClassifiedEntry {
                    category,
                    cleaned_title: entry.title.trim().to_string(),
                    url,
                });
            }
            None => {
                if let Some((category, cleaned_title)) = classify(&entry.title) {
                    resolved.push(ClassifiedEntry {
                        category,
                        cleaned_title,
                        url,
                    });
                }
            }
        }
    }
    Ok(resolved)
}

/// Merges classified entries into `staging`.
///
/// A counter persistence failure aborts the pass; records added before it
/// stay in `staging` and their IDs remain committed.
pub async fn merge(
    entries: &[ClassifiedEntry],
    staging: &mut StagingDocument,
    index: &DuplicateIndex,
    allocator: &mut SequenceAllocator,
) -> Result<MergeOutcome> {
    let mut outcome = MergeOutcome::default();

    for entry in entries {
        let url = entry.url.as_str();
        if url.is_empty() {
            tracing::debug!(title = %entry.cleaned_title, "skipping entry without URL");
            outcome.skipped += 1;
            continue;
        }
        if index.contains(url) || staging.contains_url(url) {
            tracing::debug!(url, "skipping duplicate URL");
            outcome.skipped += 1;
            continue;
        }

        let mut id = allocator.allocate(entry.category).await?;
        while staging.contains_id(&id) || index.contains_id(&id) {
            tracing::warn!(id = %id, "allocated id already in use; counters were behind");
            id = allocator.allocate(entry.category).await?;
        }

        staging.insert(
            id.clone(),
            StagedRecord::new(entry.category, entry.cleaned_title.clone(), url),
        );
        outcome.added += 1;
        outcome.new_ids.push(id);
    }

    Ok(outcome)
}

/// [`resolve_entries`] followed by [`merge`].
pub async fn merge_raw(
    entries: &[Entry],
    staging: &mut StagingDocument,
    index: &DuplicateIndex,
    allocator: &mut SequenceAllocator,
) -> Result<MergeOutcome> {
    let resolved = resolve_entries(entries)?;
    merge(&resolved, staging, index, allocator).await
}
