//! Core data models used throughout the ledger.
//!
//! These types represent the raw feed entries, classified entries, and
//! canonical article records that flow through the ingestion pipeline.

use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Raw item pulled from the feed or a scraped payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Key of the entry in its source (payload key or feed position).
    pub key: String,
    pub title: String,
    pub url: String,
    /// Category label supplied by the source; `None` means classify by title.
    pub raw_category: Option<String>,
}

impl Entry {
    pub fn new(key: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            url: url.into(),
            raw_category: None,
        }
    }

    pub fn with_category(mut self, raw_category: impl Into<String>) -> Self {
        self.raw_category = Some(raw_category.into());
        self
    }
}

/// Entry with its category resolved, ready for the merge engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEntry {
    pub category: Category,
    pub cleaned_title: String,
    pub url: String,
}

/// Coverage state of an article, mutated after ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ArticleStatus {
    #[default]
    #[serde(rename = "Not Covered")]
    NotCovered,
    #[serde(rename = "Covered")]
    Covered,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::NotCovered => "Not Covered",
            ArticleStatus::Covered => "Covered",
        }
    }

    /// Parses the stored form as well as the CLI spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not covered" | "not-covered" | "notcovered" => Some(ArticleStatus::NotCovered),
            "covered" => Some(ArticleStatus::Covered),
            _ => None,
        }
    }
}

/// Canonical article stored in the durable store.
///
/// `id` is generated once and never changes; `url` is unique across all
/// records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub url: String,
    pub status: ArticleStatus,
    pub notebook_link: String,
}

impl ArticleRecord {
    /// A freshly ingested record: not yet covered, no notebook link.
    pub fn new_uncovered(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            url: url.into(),
            status: ArticleStatus::NotCovered,
            notebook_link: String::new(),
        }
    }
}
