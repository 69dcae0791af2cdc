use std::time::Instant;

use fxhash::{FxHashMap, FxHashSet};

use crate::consumed::{get_excluded_set, RatedIndex};
use crate::error::Result;
use crate::fallback::PopularityFallback;
use crate::mapping::{ItemId, Mappings, UserId};
use crate::similarities::Similarities;
use crate::sparse::CsrMatrix;
use crate::utils::{create_thread_pool, dispatch_ordered};

const PROGRESS_STEP: usize = 200;

/// Score returned for pairs without any neighborhood signal.
pub(crate) const DEFAULT_PRED: f32 = 0.0;

/// Ranked recommendation lists of the target users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendations {
    /// target user -> (item, score) sorted by score descending
    pub lists: FxHashMap<UserId, Vec<(ItemId, f32)>>,
    /// target users without any neighbor, in target order
    pub non_profiled: Vec<UserId>,
}

/// Read-only state shared by every recommendation worker.
pub struct InferenceContext<'a> {
    pub similarities: &'a Similarities,
    /// transposed rating matrix: item -> (user, rating)
    pub rating_users: &'a CsrMatrix<u32, f32>,
    pub mappings: &'a Mappings,
    pub rated: &'a RatedIndex,
    pub fallback: &'a PopularityFallback,
}

impl InferenceContext<'_> {
    /// Nonzero similarities of a target user, keyed by user position.
    pub(crate) fn neighbor_sims(&self, user: UserId) -> Result<FxHashMap<u32, f32>> {
        let (cols, vals) = self.similarities.row(user)?;
        Ok(cols
            .iter()
            .zip(vals)
            .filter(|(_, &s)| s != 0.0)
            .map(|(&v, &s)| (v, s))
            .collect())
    }

    /// Neighbor-weighted estimate of item column `c`:
    /// `Σ sim(u, v) * urm(v, c) / Σ sim(u, v)` over users `v` who rated `c`.
    /// A zero weight is replaced by 1.
    pub(crate) fn estimate_score(&self, neighbor_sims: &FxHashMap<u32, f32>, c: u32) -> f32 {
        let mut weight: f32 = self
            .rated
            .rating_users(c)
            .iter()
            .filter_map(|v| neighbor_sims.get(v))
            .sum();
        if weight == 0.0 {
            weight = 1.0;
        }

        let (users, ratings) = self.rating_users.row(c as usize);
        let weighted_sum: f32 = users
            .iter()
            .zip(ratings)
            .filter_map(|(v, &r)| neighbor_sims.get(v).map(|&s| s * r))
            .sum();
        weighted_sum / weight
    }

    /// Items rated by any neighbor, minus the excluded ones, ordered by column.
    fn candidate_items(
        &self,
        neighbor_sims: &FxHashMap<u32, f32>,
        excluded: &FxHashSet<ItemId>,
    ) -> Result<Vec<(u32, ItemId)>> {
        let mut columns: FxHashSet<u32> = FxHashSet::default();
        for &v in neighbor_sims.keys() {
            let neighbor = self.mappings.users.id_of(v as usize)?;
            columns.extend(self.rated.rated_items(neighbor));
        }

        let mut candidates = Vec::with_capacity(columns.len());
        for c in columns {
            let item = self.mappings.items.id_of(c as usize)?;
            if !excluded.contains(&item) {
                candidates.push((c, item));
            }
        }
        candidates.sort_unstable_by_key(|&(c, _)| c);
        Ok(candidates)
    }

    /// Recommendation list of a single target user, and whether any neighbor
    /// contributed to it.
    ///
    /// # Algorithm
    /// 1. Build `rec_length` fallback entries (negative scores).
    /// 2. Without nonzero neighbors, the fallback entries are the answer.
    /// 3. Otherwise score every item rated by a neighbor that is neither rated by
    ///    the user nor ineligible.
    /// 4. Stable sort the scored items descending, then append the fallback
    ///    entries and keep `rec_length` entries. Fallback entries only pad the
    ///    list, even when an estimate is below the first placeholder score.
    pub fn recommend_single(
        &self,
        user: UserId,
        rec_length: usize,
        ineligible: &FxHashSet<ItemId>,
    ) -> Result<(Vec<(ItemId, f32)>, bool)> {
        let excluded = get_excluded_set(self.rated, self.mappings, user, ineligible);
        let fallback = self.fallback.recommend(rec_length, &excluded);

        let neighbor_sims = self.neighbor_sims(user)?;
        if neighbor_sims.is_empty() {
            return Ok((fallback, false));
        }

        let mut recs: Vec<(ItemId, f32)> = self
            .candidate_items(&neighbor_sims, &excluded)?
            .into_iter()
            .map(|(c, item)| (item, self.estimate_score(&neighbor_sims, c)))
            .collect();
        recs.sort_by(|(_, a), (_, b)| b.total_cmp(a));
        recs.extend(fallback);
        recs.truncate(rec_length);
        Ok((recs, true))
    }
}

struct RecommendationPart {
    lists: Vec<(UserId, Vec<(ItemId, f32)>)>,
    non_profiled: Vec<UserId>,
}

fn recommend_part(
    ctx: &InferenceContext<'_>,
    targets: &[UserId],
    rec_length: usize,
    ineligible: &FxHashSet<ItemId>,
    worker: usize,
) -> Result<RecommendationPart> {
    let start = Instant::now();
    let mut part = RecommendationPart {
        lists: Vec::with_capacity(targets.len()),
        non_profiled: Vec::new(),
    };

    for (counter, &user) in targets.iter().enumerate() {
        if counter % PROGRESS_STEP == 0 {
            tracing::debug!(
                "[worker {worker}] {:.1}% recommendations provided",
                counter as f32 / targets.len() as f32 * 100.0
            );
        }
        let (recs, profiled) = ctx.recommend_single(user, rec_length, ineligible)?;
        if !profiled {
            part.non_profiled.push(user);
        }
        part.lists.push((user, recs));
    }

    if !targets.is_empty() {
        tracing::info!(
            "[worker {worker}] 100% recommendations provided, {} are not profiled, elapsed: {:.4?}",
            part.non_profiled.len(),
            start.elapsed()
        );
    }
    Ok(part)
}

/// Generate recommendations for every target user.
///
/// Targets are split into `num_workers` contiguous slices processed in
/// parallel. The lists are merged by user id, the non-profiled users are
/// concatenated in slice order.
pub fn recommend_users(
    ctx: &InferenceContext<'_>,
    targets: &[UserId],
    rec_length: usize,
    ineligible: &FxHashSet<ItemId>,
    num_workers: usize,
) -> Result<Recommendations> {
    let start = Instant::now();
    let pool = create_thread_pool(num_workers)?;
    let parts = dispatch_ordered(&pool, targets.len(), num_workers, |worker, slice| {
        recommend_part(ctx, &targets[slice], rec_length, ineligible, worker)
    })?;

    let mut recommendations = Recommendations::default();
    for part in parts {
        recommendations.lists.extend(part.lists);
        recommendations.non_profiled.extend(part.non_profiled);
    }

    let duration = start.elapsed();
    tracing::info!(
        "recommendations for {} users, {} not profiled, elapsed: {:.4?}",
        recommendations.lists.len(),
        recommendations.non_profiled.len(),
        duration
    );
    Ok(recommendations)
}
