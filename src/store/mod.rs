//! Storage abstraction for the ledger.
//!
//! Two collaborators sit behind traits so the pipeline can run against
//! SQLite in production and in-memory maps in tests:
//!
//! - [`ArticleStore`]: the durable article store, keyed by generated `id`.
//!   Inserting an `id` that already exists is reported as
//!   [`InsertOutcome::DuplicateKey`], never as an error.
//! - [`CounterStore`]: the persisted sequence counters. [`CounterStore::save`]
//!   writes the whole counter set atomically.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::category::SequenceFamily;
use crate::models::{ArticleRecord, ArticleStatus};
use crate::sequence::SequenceCounters;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Result of a single-record insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The store already holds a record with this `id`.
    DuplicateKey,
}

/// Result of an update addressed by URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// A record matched but already carried the requested value.
    Unchanged,
    NotFound,
}

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub family: Option<SequenceFamily>,
    pub status: Option<ArticleStatus>,
}

impl ArticleFilter {
    pub fn matches(&self, record: &ArticleRecord) -> bool {
        self.family
            .map_or(true, |family| record.category.family() == family)
            && self.status.map_or(true, |status| record.status == status)
    }
}

/// Durable article store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ids`](ArticleStore::ids) | All stored ids |
/// | [`urls`](ArticleStore::urls) | All stored URLs (duplicate index source) |
/// | [`insert`](ArticleStore::insert) | Insert one record, rejecting duplicate ids |
/// | [`get`](ArticleStore::get) | Fetch one record by id |
/// | [`list`](ArticleStore::list) | Filtered listing ordered by id |
/// | [`update_notebook_link`](ArticleStore::update_notebook_link) | Set the notebook link by URL |
/// | [`update_status`](ArticleStore::update_status) | Set the coverage status by URL |
/// | [`clear`](ArticleStore::clear) | Delete every record |
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn ids(&self) -> Result<HashSet<String>>;

    async fn urls(&self) -> Result<Vec<String>>;

    /// Insert one record. Each insert is its own atomic unit.
    async fn insert(&self, record: &ArticleRecord, inserted_by: &str) -> Result<InsertOutcome>;

    async fn get(&self, id: &str) -> Result<Option<ArticleRecord>>;

    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>>;

    async fn update_notebook_link(&self, url: &str, link: &str) -> Result<UpdateOutcome>;

    async fn update_status(&self, url: &str, status: ArticleStatus) -> Result<UpdateOutcome>;

    /// Delete every record, returning how many were removed.
    async fn clear(&self) -> Result<u64>;
}

/// Persisted per-family sequence counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the full counter set. Families never written read as zero.
    async fn load(&self) -> Result<SequenceCounters>;

    /// Write the full counter set: all families are updated or none are.
    async fn save(&self, counters: &SequenceCounters) -> Result<()>;
}
