//! Per-family sequence counters and ID allocation.
//!
//! [`SequenceCounters`] is a plain value: the allocator takes one in, hands
//! out IDs, and gives the updated set back through
//! [`SequenceAllocator::into_counters`]. The commit point for every
//! allocation is the [`CounterStore::save`] call inside
//! [`SequenceAllocator::allocate`]; an ID is only returned once the bumped
//! counter set is durable, so a crash can waste an ID but never reuse one.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::category::{Category, SequenceFamily};
use crate::error::{PipelineError, Result};
use crate::store::CounterStore;

/// Last allocated sequence number per family. Missing families read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCounters {
    values: BTreeMap<SequenceFamily, u32>,
}

impl SequenceCounters {
    pub fn get(&self, family: SequenceFamily) -> u32 {
        self.values.get(&family).copied().unwrap_or(0)
    }

    pub fn set(&mut self, family: SequenceFamily, value: u32) {
        self.values.insert(family, value);
    }

    /// Every family with its current value, zero included.
    pub fn iter(&self) -> impl Iterator<Item = (SequenceFamily, u32)> + '_ {
        SequenceFamily::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// Returns a copy with `family` advanced by one, plus the new value.
    /// `None` once the family's counter is at `u32::MAX`.
    pub fn bumped(&self, family: SequenceFamily) -> Option<(Self, u32)> {
        let value = self.get(family).checked_add(1)?;
        let mut next = self.clone();
        next.set(family, value);
        Some((next, value))
    }

    /// Highest sequence number per family found among generated IDs.
    /// IDs that do not follow the `<prefix><digits>` shape are ignored.
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counters = Self::default();
        for (family, value) in ids.into_iter().filter_map(SequenceFamily::parse_id) {
            if value > counters.get(family) {
                counters.set(family, value);
            }
        }
        counters
    }

    /// Per-family maximum of both sets; counters never move backwards.
    pub fn max_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (family, value) in other.iter() {
            if value > merged.get(family) {
                merged.set(family, value);
            }
        }
        merged
    }
}

/// Hands out collision-free IDs, persisting the counter set on every call.
pub struct SequenceAllocator {
    counters: SequenceCounters,
    store: Arc<dyn CounterStore>,
}

impl SequenceAllocator {
    pub fn new(counters: SequenceCounters, store: Arc<dyn CounterStore>) -> Self {
        Self { counters, store }
    }

    /// Starts from the counters currently persisted in `store`.
    pub async fn load(store: Arc<dyn CounterStore>) -> Result<Self> {
        let counters = store.load().await.map_err(PipelineError::Store)?;
        Ok(Self::new(counters, store))
    }

    /// Allocates the next ID for `category`'s family, e.g. `genArt0007`.
    ///
    /// On a persistence failure the in-memory counters are left untouched
    /// and [`PipelineError::CounterPersist`] is returned.
    pub async fn allocate(&mut self, category: Category) -> Result<String> {
        let family = category.family();
        let (next, value) = self
            .counters
            .bumped(family)
            .ok_or(PipelineError::CounterExhausted {
                family: family.counter_key(),
            })?;
        self.store
            .save(&next)
            .await
            .map_err(PipelineError::CounterPersist)?;
        self.counters = next;
        Ok(family.format_id(value))
    }

    pub fn counters(&self) -> &SequenceCounters {
        &self.counters
    }

    pub fn into_counters(self) -> SequenceCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_allocation_is_strictly_increasing_without_gaps() {
        let store = Arc::new(InMemoryStore::new());
        let mut allocator = SequenceAllocator::load(store.clone()).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..12 {
            ids.push(allocator.allocate(Category::GeneralArticle).await.unwrap());
        }

        let expected: Vec<String> = (1..=12).map(|n| format!("genArt{:04}", n)).collect();
        assert_eq!(ids, expected);
        assert_eq!(store.load().await.unwrap().get(SequenceFamily::GeneralArticle), 12);
    }

    #[tokio::test]
    async fn test_weekly_variants_share_one_counter() {
        let store = Arc::new(InMemoryStore::new());
        let mut allocator = SequenceAllocator::load(store).await.unwrap();

        let a = allocator
            .allocate(Category::MainsAnswerWeekly(Some(3)))
            .await
            .unwrap();
        let b = allocator
            .allocate(Category::MainsAnswerWeekly(None))
            .await
            .unwrap();
        let c = allocator.allocate(Category::UpscKey).await.unwrap();

        assert_eq!(a, "mainsAns0001");
        assert_eq!(b, "mainsAns0002");
        assert_eq!(c, "uKey0001");

        let counters = allocator.into_counters();
        assert_eq!(counters.get(SequenceFamily::MainsAnswerWeekly), 2);
        assert_eq!(counters.get(SequenceFamily::UpscKey), 1);
    }

    #[tokio::test]
    async fn test_allocation_resumes_from_persisted_counters() {
        let store = Arc::new(InMemoryStore::new());
        {
            let mut allocator = SequenceAllocator::load(store.clone()).await.unwrap();
            allocator.allocate(Category::Interview).await.unwrap();
            allocator.allocate(Category::Interview).await.unwrap();
        }
        let mut allocator = SequenceAllocator::load(store).await.unwrap();
        assert_eq!(
            allocator.allocate(Category::Interview).await.unwrap(),
            "intView0003"
        );
    }

    #[tokio::test]
    async fn test_exhausted_counter_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let mut counters = SequenceCounters::default();
        counters.set(SequenceFamily::UpscKey, u32::MAX);
        let mut allocator = SequenceAllocator::new(counters, store.clone());

        let err = allocator.allocate(Category::UpscKey).await.unwrap_err();
        assert!(matches!(err, PipelineError::CounterExhausted { family: "upsc_key_seq" }));
        assert_eq!(allocator.counters().get(SequenceFamily::UpscKey), u32::MAX);
        assert_eq!(store.load().await.unwrap(), SequenceCounters::default());
    }

    #[test]
    fn test_counters_from_ids_take_maximum() {
        let counters = SequenceCounters::from_ids([
            "genArt0003",
            "genArt0011",
            "uKey0002",
            "not-an-id",
            "7",
        ]);
        assert_eq!(counters.get(SequenceFamily::GeneralArticle), 11);
        assert_eq!(counters.get(SequenceFamily::UpscKey), 2);
        assert_eq!(counters.get(SequenceFamily::Interview), 0);
    }

    #[test]
    fn test_max_with_never_decreases() {
        let mut current = SequenceCounters::default();
        current.set(SequenceFamily::GeneralArticle, 20);
        let observed = SequenceCounters::from_ids(["genArt0005", "cuAff0009"]);

        let merged = current.max_with(&observed);
        assert_eq!(merged.get(SequenceFamily::GeneralArticle), 20);
        assert_eq!(merged.get(SequenceFamily::CurrentAffairsPointer), 9);
    }
}
