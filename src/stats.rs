//! Counter and per-category overview.
//!
//! Used by `news-ledger counters` to show where each sequence family stands
//! next to the number of records actually stored and staged for it. A
//! counter below the highest observed id is flagged; `counters restore`
//! repairs it.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::category::SequenceFamily;
use crate::config::Config;
use crate::models::ArticleStatus;
use crate::sequence::SequenceCounters;
use crate::staging::StagingDocument;
use crate::store::{ArticleFilter, ArticleStore, CounterStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyStats {
    pub counter: u32,
    /// Highest id suffix seen in the store or staging.
    pub highest_id: u32,
    pub stored: usize,
    pub staged: usize,
    pub covered: usize,
}

impl FamilyStats {
    pub fn is_behind(&self) -> bool {
        self.counter < self.highest_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub families: BTreeMap<SequenceFamily, FamilyStats>,
    pub stored: usize,
    pub staged: usize,
}

pub async fn collect(
    staging: &StagingDocument,
    articles: &dyn ArticleStore,
    counters: &dyn CounterStore,
) -> Result<Summary> {
    let persisted = counters.load().await?;
    let records = articles.list(&ArticleFilter::default()).await?;

    let mut summary = Summary {
        stored: records.len(),
        staged: staging.len(),
        ..Summary::default()
    };
    for (family, value) in persisted.iter() {
        summary.families.entry(family).or_default().counter = value;
    }

    for record in &records {
        let stats = summary.families.entry(record.category.family()).or_default();
        stats.stored += 1;
        if record.status == ArticleStatus::Covered {
            stats.covered += 1;
        }
    }
    for (_, staged) in staging.iter() {
        if let Some(category) = staged.category() {
            summary.families.entry(category.family()).or_default().staged += 1;
        }
    }

    let observed = SequenceCounters::from_ids(
        records
            .iter()
            .map(|r| r.id.as_str())
            .chain(staging.iter().map(|(id, _)| id.as_str())),
    );
    for (family, value) in observed.iter() {
        summary.families.entry(family).or_default().highest_id = value;
    }

    Ok(summary)
}

/// Printer for `counters`.
pub fn print_summary(config: &Config, summary: &Summary) {
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("News Ledger Counters");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Staging:     {}", config.staging.path.display());
    println!();
    println!("  Stored:      {}", summary.stored);
    println!("  Staged:      {}", summary.staged);
    println!();
    println!(
        "  {:<26} {:<9} {:>7} {:>7} {:>7} {:>7}",
        "CATEGORY", "PREFIX", "COUNTER", "STORED", "STAGED", "COVERED"
    );
    println!("  {}", "-".repeat(68));

    for (family, stats) in &summary.families {
        println!(
            "  {:<26} {:<9} {:>7} {:>7} {:>7} {:>7}{}",
            family.label(),
            family.prefix(),
            stats.counter,
            stats.stored,
            stats.staged,
            stats.covered,
            if stats.is_behind() { "  (behind)" } else { "" }
        );
    }

    if summary.families.values().any(FamilyStats::is_behind) {
        println!();
        println!("  Some counters are behind stored ids; run `news-ledger counters restore`.");
    }
    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::models::ArticleRecord;
    use crate::staging::StagedRecord;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_collect_flags_stale_counter() {
        let mut covered =
            ArticleRecord::new_uncovered("uKey0003", "Key", Category::UpscKey, "https://x/3");
        covered.status = ArticleStatus::Covered;
        let store = InMemoryStore::with_records([
            ArticleRecord::new_uncovered("genArt0002", "A", Category::GeneralArticle, "https://x/1"),
            covered,
        ]);
        let mut counters = SequenceCounters::default();
        counters.set(SequenceFamily::UpscKey, 3);
        store.save(&counters).await.unwrap();

        let mut staging = StagingDocument::new();
        staging.insert(
            "genArt0004",
            StagedRecord::new(Category::GeneralArticle, "B", "https://x/4"),
        );

        let summary = collect(&staging, &store, &store).await.unwrap();
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.staged, 1);

        let general = &summary.families[&SequenceFamily::GeneralArticle];
        assert_eq!(general.highest_id, 4);
        assert_eq!(general.staged, 1);
        assert!(general.is_behind());

        let key = &summary.families[&SequenceFamily::UpscKey];
        assert_eq!(key.covered, 1);
        assert!(!key.is_behind());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
