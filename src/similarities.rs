use std::cmp::Ordering;
use std::time::Instant;

use fxhash::FxHashMap;

use crate::error::{RecError, Result};
use crate::mapping::{Mappings, UserId};
use crate::sparse::CsrMatrix;
use crate::utils::{create_thread_pool, dispatch_ordered};

const PROGRESS_STEP: usize = 500;

/// Top-k user similarities of the target users.
#[derive(Debug, Clone, PartialEq)]
pub struct Similarities {
    /// rows: target users in list order, columns: all users
    pub matrix: CsrMatrix<u32, f32>,
    /// target user -> row of `matrix`
    pub target_rows: FxHashMap<UserId, usize>,
    /// target user -> retained neighbor positions
    pub neighbors: FxHashMap<UserId, Vec<u32>>,
}

impl Similarities {
    pub fn row(&self, user: UserId) -> Result<(&[u32], &[f32])> {
        let r = self
            .target_rows
            .get(&user)
            .ok_or(RecError::UnknownUser(user))?;
        Ok(self.matrix.row(*r))
    }
}

/// Partial result of one worker.
struct SimilarityPart {
    // (row, col, similarity)
    triples: Vec<(u32, u32, f32)>,
    target_rows: Vec<(UserId, usize)>,
    neighbors: Vec<(UserId, Vec<u32>)>,
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityOptions {
    pub k: usize,
    pub num_workers: usize,
    pub prune_zero_neighbors: bool,
}

/// Dense similarity of user `u` against every user: `urm[u] · urmᵀ`.
///
/// `urm_t` is the transposed rating matrix (item -> users), so only users
/// sharing at least one item with `u` are touched. Self similarity is zero.
pub(crate) fn compute_sim_row(
    urm: &CsrMatrix<u32, f32>,
    urm_t: &CsrMatrix<u32, f32>,
    u: usize,
) -> Vec<f32> {
    let mut sims = vec![0.0f32; urm.n_rows()];
    let (items, ratings) = urm.row(u);
    for (&i, &r) in items.iter().zip(ratings) {
        let (users, user_ratings) = urm_t.row(i as usize);
        for (&v, &rv) in users.iter().zip(user_ratings) {
            sims[v as usize] += r * rv;
        }
    }
    if let Some(s) = sims.get_mut(u) {
        *s = 0.0;
    }
    sims
}

fn magnitude_desc(a: &(u32, f32), b: &(u32, f32)) -> Ordering {
    b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0))
}

/// Select the `k` entries with the largest magnitude, ordered by column.
///
/// Uses `select_nth_unstable_by` (quickselect) for O(n) partitioning instead of
/// a full sort. Ties are broken by position, so the selected set does not depend
/// on how the work was split. When fewer than `k` users share any signal the
/// remaining slots are filled with zero-valued entries, unless `prune_zero` is set.
pub(crate) fn top_k_neighbors(sims: &[f32], k: usize, prune_zero: bool) -> Vec<(u32, f32)> {
    let mut entries: Vec<(u32, f32)> = sims
        .iter()
        .enumerate()
        .map(|(v, &s)| (v as u32, s))
        .collect();

    let k = k.min(entries.len());
    if k == 0 {
        return Vec::new();
    }
    if entries.len() > k {
        entries.select_nth_unstable_by(k - 1, magnitude_desc);
        entries.truncate(k);
    }
    if prune_zero {
        entries.retain(|&(_, s)| s != 0.0);
    }
    entries.sort_unstable_by_key(|&(v, _)| v);
    entries
}

fn compute_part(
    urm: &CsrMatrix<u32, f32>,
    urm_t: &CsrMatrix<u32, f32>,
    targets: &[UserId],
    offset: usize,
    mappings: &Mappings,
    options: &SimilarityOptions,
    worker: usize,
) -> Result<SimilarityPart> {
    let start = Instant::now();
    let mut part = SimilarityPart {
        triples: Vec::with_capacity(targets.len() * options.k),
        target_rows: Vec::with_capacity(targets.len()),
        neighbors: Vec::with_capacity(targets.len()),
    };
    let mut nonzero = 0usize;

    for (counter, &user) in targets.iter().enumerate() {
        let row = offset + counter;
        let u = mappings.user_position(user)? as usize;
        let sims = compute_sim_row(urm, urm_t, u);
        nonzero += sims.iter().filter(|&&s| s != 0.0).count();

        let top_k = top_k_neighbors(&sims, options.k, options.prune_zero_neighbors);
        part.neighbors
            .push((user, top_k.iter().map(|&(v, _)| v).collect()));
        part.triples
            .extend(top_k.into_iter().map(|(v, s)| (row as u32, v, s)));
        part.target_rows.push((user, row));

        if (counter + 1) % PROGRESS_STEP == 0 {
            tracing::debug!(
                "[worker {worker}] {:.1}% completed",
                (counter + 1) as f32 / targets.len() as f32 * 100.0
            );
        }
    }

    if !targets.is_empty() {
        tracing::info!(
            "[worker {worker}] {} targets, in average {:.2} nonzero similarities per row, elapsed: {:.4?}",
            targets.len(),
            nonzero as f32 / targets.len() as f32,
            start.elapsed()
        );
    }
    Ok(part)
}

/// Compute the top-k similarity matrix between `targets` and all users.
///
/// The target list is split into `num_workers` contiguous slices computed in
/// parallel. Partial results are merged in slice order so that row `r` of the
/// output always belongs to `targets[r]`, whatever the number of workers.
pub fn compute_similarities(
    urm: &CsrMatrix<u32, f32>,
    targets: &[UserId],
    mappings: &Mappings,
    options: SimilarityOptions,
) -> Result<Similarities> {
    let start = Instant::now();
    let urm_t = urm.transpose();
    let pool = create_thread_pool(options.num_workers)?;

    let parts = dispatch_ordered(
        &pool,
        targets.len(),
        options.num_workers,
        |worker, slice| {
            let offset = slice.start;
            compute_part(
                urm,
                &urm_t,
                &targets[slice],
                offset,
                mappings,
                &options,
                worker,
            )
        },
    )?;

    let mut rows: Vec<Vec<(u32, f32)>> = vec![Vec::new(); targets.len()];
    let mut target_rows = FxHashMap::default();
    let mut neighbors = FxHashMap::default();
    for part in parts {
        for (r, v, s) in part.triples {
            rows[r as usize].push((v, s));
        }
        target_rows.extend(part.target_rows);
        neighbors.extend(part.neighbors);
    }
    let matrix = CsrMatrix::from_rows(rows, urm.n_rows());

    let duration = start.elapsed();
    tracing::info!(
        "similarity matrix built for {} users, {} entries, elapsed: {:.4?}",
        target_rows.len(),
        matrix.nnz(),
        duration
    );

    Ok(Similarities {
        matrix,
        target_rows,
        neighbors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{build_urm, UrmOptions};
    use crate::source::Interaction;

    fn options(k: usize, num_workers: usize) -> SimilarityOptions {
        SimilarityOptions {
            k,
            num_workers,
            prune_zero_neighbors: false,
        }
    }

    fn sample_urm() -> Result<(CsrMatrix<u32, f32>, Mappings)> {
        let mut interactions = Vec::new();
        for u in 1..=23u64 {
            for i in 1..=9u64 {
                if (u * 7 + i * 3) % 5 < 2 {
                    interactions.push(Interaction::new(u, i, ((u + i) % 4 + 1) as f32));
                }
            }
        }
        let mappings = Mappings::build(&interactions, &[]);
        let build = build_urm(&interactions, &mappings, UrmOptions::default())?;
        Ok((build.urm, mappings))
    }

    #[test]
    fn test_sim_row() {
        // [
        //   [1, 2, 0],
        //   [0, 1, 1],
        //   [3, 0, 0],
        // ]
        let urm: CsrMatrix<u32, f32> = CsrMatrix {
            indices: vec![0, 1, 1, 2, 0],
            indptr: vec![0, 2, 4, 5],
            data: vec![1.0, 2.0, 1.0, 1.0, 3.0],
            n_cols: 3,
        };
        let sims = compute_sim_row(&urm, &urm.transpose(), 0);
        assert_eq!(sims, vec![0.0, 2.0, 3.0]);
        let sims = compute_sim_row(&urm, &urm.transpose(), 1);
        assert_eq!(sims, vec![2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_top_k_by_magnitude() {
        let sims = [0.1, -0.9, 0.0, 0.5, 0.3];
        assert_eq!(top_k_neighbors(&sims, 2, false), vec![(1, -0.9), (3, 0.5)]);
        assert_eq!(top_k_neighbors(&sims, 10, false).len(), 5);
        assert!(top_k_neighbors(&sims, 0, false).is_empty());

        // fewer genuine neighbors than k: zero entries fill the row
        let sims = [0.0, 0.4, 0.0, 0.0];
        assert_eq!(
            top_k_neighbors(&sims, 3, false),
            vec![(0, 0.0), (1, 0.4), (2, 0.0)]
        );
        assert_eq!(top_k_neighbors(&sims, 3, true), vec![(1, 0.4)]);
    }

    #[test]
    fn test_rows_follow_target_order() -> Result<()> {
        let (urm, mappings) = sample_urm()?;
        let targets: Vec<UserId> = vec![5, 3, 17, 1, 22, 9, 11];
        let sims = compute_similarities(&urm, &targets, &mappings, options(4, 3))?;

        assert_eq!(sims.matrix.n_rows(), targets.len());
        assert_eq!(sims.matrix.n_cols, mappings.n_users());
        for (r, user) in targets.iter().enumerate() {
            assert_eq!(sims.target_rows[user], r);
            let u = mappings.user_position(*user)?;
            let (cols, vals) = sims.matrix.row(r);
            assert_eq!(cols.len(), 4);
            assert_eq!(cols, sims.neighbors[user].as_slice());
            assert!(vals.iter().filter(|&&s| s != 0.0).count() <= 4);
            assert_eq!(sims.matrix.get(r, u), 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_partitioning_does_not_change_results() -> Result<()> {
        let (urm, mappings) = sample_urm()?;
        let targets: Vec<UserId> = (1..=23).rev().collect();
        let single = compute_similarities(&urm, &targets, &mappings, options(5, 1))?;
        for num_workers in [2, 4, 7, 30] {
            let parallel =
                compute_similarities(&urm, &targets, &mappings, options(5, num_workers))?;
            assert_eq!(single, parallel);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_target() -> Result<()> {
        let (urm, mappings) = sample_urm()?;
        let result = compute_similarities(&urm, &[1, 999], &mappings, options(3, 2));
        assert!(matches!(result, Err(RecError::UnknownUser(999))));
        Ok(())
    }
}
