//! In-memory [`ArticleStore`] and [`CounterStore`] for tests and dry runs.
//!
//! Uses a `BTreeMap` keyed by id behind `std::sync::RwLock`, so listings come
//! back in id order like the SQLite store.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ArticleRecord, ArticleStatus};
use crate::sequence::SequenceCounters;

use super::{ArticleFilter, ArticleStore, CounterStore, InsertOutcome, UpdateOutcome};

/// In-memory store holding both articles and counters.
pub struct InMemoryStore {
    articles: RwLock<BTreeMap<String, ArticleRecord>>,
    counters: RwLock<SequenceCounters>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            articles: RwLock::new(BTreeMap::new()),
            counters: RwLock::new(SequenceCounters::default()),
        }
    }

    /// Seed the store with existing records, bypassing insert bookkeeping.
    pub fn with_records(records: impl IntoIterator<Item = ArticleRecord>) -> Self {
        let store = Self::new();
        {
            let mut articles = store.articles.write().unwrap();
            for record in records {
                articles.insert(record.id.clone(), record);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.articles.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for InMemoryStore {
    async fn ids(&self) -> Result<HashSet<String>> {
        Ok(self.articles.read().unwrap().keys().cloned().collect())
    }

    async fn urls(&self) -> Result<Vec<String>> {
        Ok(self
            .articles
            .read()
            .unwrap()
            .values()
            .map(|r| r.url.clone())
            .collect())
    }

    async fn insert(&self, record: &ArticleRecord, _inserted_by: &str) -> Result<InsertOutcome> {
        let mut articles = self.articles.write().unwrap();
        if articles.contains_key(&record.id) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        articles.insert(record.id.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, id: &str) -> Result<Option<ArticleRecord>> {
        Ok(self.articles.read().unwrap().get(id).cloned())
    }

    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>> {
        Ok(self
            .articles
            .read()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update_notebook_link(&self, url: &str, link: &str) -> Result<UpdateOutcome> {
        let mut articles = self.articles.write().unwrap();
        let Some(record) = articles.values_mut().find(|r| r.url == url) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if record.notebook_link == link {
            return Ok(UpdateOutcome::Unchanged);
        }
        record.notebook_link = link.to_string();
        Ok(UpdateOutcome::Updated)
    }

    async fn update_status(&self, url: &str, status: ArticleStatus) -> Result<UpdateOutcome> {
        let mut articles = self.articles.write().unwrap();
        let Some(record) = articles.values_mut().find(|r| r.url == url) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if record.status == status {
            return Ok(UpdateOutcome::Unchanged);
        }
        record.status = status;
        Ok(UpdateOutcome::Updated)
    }

    async fn clear(&self) -> Result<u64> {
        let mut articles = self.articles.write().unwrap();
        let removed = articles.len() as u64;
        articles.clear();
        Ok(removed)
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn load(&self) -> Result<SequenceCounters> {
        Ok(self.counters.read().unwrap().clone())
    }

    async fn save(&self, counters: &SequenceCounters) -> Result<()> {
        *self.counters.write().unwrap() = counters.clone();
        Ok(())
    }
}
