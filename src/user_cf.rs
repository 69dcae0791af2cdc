use std::time::Instant;

use fxhash::FxHashSet;

use crate::config::KnnConfig;
use crate::consumed::RatedIndex;
use crate::error::Result;
use crate::fallback::PopularityFallback;
use crate::inference::{recommend_users, InferenceContext, Recommendations, DEFAULT_PRED};
use crate::mapping::{ItemId, Mappings, UserId};
use crate::matrix::{build_urm, UrmOptions};
use crate::similarities::{compute_similarities, SimilarityOptions, Similarities};
use crate::source::{IneligibleSource, Interaction, InteractionSource};
use crate::sparse::CsrMatrix;

/// User-based KNN model.
///
/// Holds every structure produced while fitting. Nothing is mutated after
/// `fit` returns, so recommendation workers only ever read from it.
pub struct UserKnn {
    config: KnnConfig,
    mappings: Mappings,
    targets: Vec<UserId>,
    urm: CsrMatrix<u32, f32>,
    rating_users: CsrMatrix<u32, f32>,
    user_bias: Vec<f32>,
    item_bias: Vec<f32>,
    rated: RatedIndex,
    similarities: Similarities,
    fallback: PopularityFallback,
}

impl UserKnn {
    /// Build the rating matrix and the top-k similarities of `targets`.
    ///
    /// Without targets every interacting user is a target, in first-seen order.
    /// Repeated targets are only kept once.
    pub fn fit(
        config: KnnConfig,
        interactions: &[Interaction],
        targets: Option<&[UserId]>,
    ) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();

        let targets: Vec<UserId> = {
            let mut seen = FxHashSet::default();
            match targets {
                Some(t) => t.iter().copied().filter(|u| seen.insert(*u)).collect(),
                None => interactions
                    .iter()
                    .map(|x| x.user)
                    .filter(|u| seen.insert(*u))
                    .collect(),
            }
        };

        let mappings = Mappings::build(interactions, &targets);
        let urm_options = UrmOptions {
            user_bias: config.user_bias,
            item_bias: config.item_bias,
            normalize: config.normalize,
        };
        let build = build_urm(interactions, &mappings, urm_options)?;

        let sim_options = SimilarityOptions {
            k: config.k,
            num_workers: config.num_workers,
            prune_zero_neighbors: config.prune_zero_neighbors,
        };
        let similarities = compute_similarities(&build.urm, &targets, &mappings, sim_options)?;
        let fallback = PopularityFallback::new(config.fallback_pool.clone());

        tracing::info!(
            "user knn fitted on {} interactions, {} targets, elapsed: {:.4?}",
            interactions.len(),
            targets.len(),
            start.elapsed()
        );

        Ok(Self {
            config,
            mappings,
            targets,
            rating_users: build.urm.transpose(),
            urm: build.urm,
            user_bias: build.user_bias,
            item_bias: build.item_bias,
            rated: build.rated,
            similarities,
            fallback,
        })
    }

    pub fn fit_source<S: InteractionSource>(
        config: KnnConfig,
        source: &mut S,
        targets: Option<&[UserId]>,
    ) -> Result<Self> {
        let interactions = source.interactions()?;
        Self::fit(config, &interactions, targets)
    }

    fn context(&self) -> InferenceContext<'_> {
        InferenceContext {
            similarities: &self.similarities,
            rating_users: &self.rating_users,
            mappings: &self.mappings,
            rated: &self.rated,
            fallback: &self.fallback,
        }
    }

    /// Recommendation lists of every target user.
    pub fn recommend(&self, ineligible: &FxHashSet<ItemId>) -> Result<Recommendations> {
        recommend_users(
            &self.context(),
            &self.targets,
            self.config.rec_length,
            ineligible,
            self.config.num_workers,
        )
    }

    pub fn recommend_source<S: IneligibleSource>(&self, source: &mut S) -> Result<Recommendations> {
        let ineligible = source.ineligible_items()?;
        self.recommend(&ineligible)
    }

    /// Estimated score of `item` for a target `user`.
    ///
    /// Returns `DEFAULT_PRED` for unknown users, non-target users and unknown items.
    pub fn predict(&self, user: UserId, item: ItemId) -> Result<f32> {
        let Some(c) = self.mappings.items.get(item) else {
            return Ok(DEFAULT_PRED);
        };
        if !self.similarities.target_rows.contains_key(&user) {
            return Ok(DEFAULT_PRED);
        }
        let ctx = self.context();
        let neighbor_sims = ctx.neighbor_sims(user)?;
        if neighbor_sims.is_empty() {
            return Ok(DEFAULT_PRED);
        }
        Ok(ctx.estimate_score(&neighbor_sims, c))
    }

    pub fn num_sim_elements(&self) -> usize {
        self.similarities
            .matrix
            .data
            .iter()
            .filter(|&&s| s != 0.0)
            .count()
    }

    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    pub fn targets(&self) -> &[UserId] {
        &self.targets
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn urm(&self) -> &CsrMatrix<u32, f32> {
        &self.urm
    }

    pub fn user_bias(&self) -> &[f32] {
        &self.user_bias
    }

    pub fn item_bias(&self) -> &[f32] {
        &self.item_bias
    }

    pub fn rated(&self) -> &RatedIndex {
        &self.rated
    }

    pub fn similarities(&self) -> &Similarities {
        &self.similarities
    }
}
