use fxhash::FxHashSet;

use crate::mapping::ItemId;

/// Item id used to pad a list when the pool runs out of eligible items.
/// It never denotes a real item.
pub const SENTINEL_ITEM: ItemId = 0;
/// Score of the first fallback entry, each following entry scores one less.
pub const FALLBACK_START_SCORE: f32 = -2.0;

/// Non-personalized recommendations drawn from a popularity-ranked item pool.
#[derive(Debug, Clone, Default)]
pub struct PopularityFallback {
    pool: Vec<ItemId>,
}

impl PopularityFallback {
    /// `pool` is ordered by descending popularity.
    pub fn new(pool: Vec<ItemId>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &[ItemId] {
        &self.pool
    }

    /// Exactly `rec_length` entries with strictly decreasing negative scores,
    /// skipping every item in `excluded`.
    pub fn recommend(&self, rec_length: usize, excluded: &FxHashSet<ItemId>) -> Vec<(ItemId, f32)> {
        let survivors = self
            .pool
            .iter()
            .copied()
            .filter(|item| !excluded.contains(item))
            .take(rec_length);

        survivors
            .chain(std::iter::repeat(SENTINEL_ITEM))
            .take(rec_length)
            .enumerate()
            .map(|(rank, item)| (item, FALLBACK_START_SCORE - rank as f32))
            .collect()
    }
}
