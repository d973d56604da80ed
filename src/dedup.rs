//! Duplicate index over the durable store.
//!
//! Built once per run from the durable store (the source of truth) and then
//! extended in memory after every successful insert, so a URL seen twice in
//! one batch is inserted at most once without a second full-store read.
//! Stored ids are kept next to the URLs so allocation can step over an id
//! the store already holds.

use std::collections::HashSet;

use crate::error::{PipelineError, Result};
use crate::store::ArticleStore;

#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    urls: HashSet<String>,
    ids: HashSet<String>,
}

impl DuplicateIndex {
    /// Loads every URL and id currently in the durable store.
    pub async fn build(store: &dyn ArticleStore) -> Result<Self> {
        let urls = store.urls().await.map_err(PipelineError::Store)?;
        let ids = store.ids().await.map_err(PipelineError::Store)?;
        let index = Self::from_urls(urls).with_ids(ids);
        tracing::debug!(urls = index.len(), ids = index.ids.len(), "duplicate index built");
        Ok(index)
    }

    /// Empty URLs are never indexed.
    pub fn from_urls(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            urls: urls.into_iter().filter(|u| !u.is_empty()).collect(),
            ids: HashSet::new(),
        }
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ids.extend(ids);
        self
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Stored ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn add_id(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    /// Returns `true` if the URL was not indexed before.
    pub fn add(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if url.is_empty() {
            return false;
        }
        self.urls.insert(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::models::ArticleRecord;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_build_from_store() {
        let store = InMemoryStore::with_records([
            ArticleRecord::new_uncovered("genArt0001", "a", Category::GeneralArticle, "https://x/a"),
            ArticleRecord::new_uncovered("uKey0001", "b", Category::UpscKey, "https://x/b"),
            ArticleRecord::new_uncovered("uKey0002", "c", Category::UpscKey, ""),
        ]);

        let index = DuplicateIndex::build(&store).await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("https://x/a"));
        assert!(index.contains("https://x/b"));
        assert!(!index.contains(""));
        assert!(index.contains_id("uKey0002"));
        assert!(!index.contains_id("uKey0003"));
    }

    #[test]
    fn test_add_is_incremental() {
        let mut index = DuplicateIndex::default();
        assert!(index.add("https://x/a"));
        assert!(!index.add("https://x/a"));
        assert!(!index.add(""));
        assert!(index.contains("https://x/a"));
        assert_eq!(index.len(), 1);
    }
}
