use std::time::Instant;

use crate::consumed::RatedIndex;
use crate::error::Result;
use crate::mapping::Mappings;
use crate::source::Interaction;
use crate::sparse::{CsrMatrix, DokMatrix};

#[derive(Debug, Clone, Copy)]
pub struct UrmOptions {
    pub user_bias: bool,
    pub item_bias: bool,
    pub normalize: bool,
}

impl Default for UrmOptions {
    fn default() -> Self {
        Self {
            user_bias: true,
            item_bias: true,
            normalize: true,
        }
    }
}

/// Bias-corrected user rating matrix together with the byproducts of its
/// construction.
pub struct UrmBuild {
    pub urm: CsrMatrix<u32, f32>,
    pub user_bias: Vec<f32>,
    pub item_bias: Vec<f32>,
    pub rated: RatedIndex,
}

/// Build the user rating matrix.
///
/// # Algorithm
/// 1. Sum repeated `(user, item)` interactions into one magnitude.
/// 2. `user_bias(u)`: mean of the aggregated magnitudes over items rated by `u`.
/// 3. `item_bias(i)`: mean of `agg(u, i) - user_bias(u)` over users who rated `i`.
///    The user term is only subtracted when user bias is enabled.
/// 4. Cell value: `agg(u, i) - user_bias(u) - item_bias(i)`, each bias only when enabled.
/// 5. Optionally L2-normalize every row, leaving zero rows as they are.
///
/// # Errors
/// Fails with an unknown id error when an interaction references a user or an
/// item absent from `mappings`.
pub fn build_urm(
    interactions: &[Interaction],
    mappings: &Mappings,
    options: UrmOptions,
) -> Result<UrmBuild> {
    let start = Instant::now();
    let n_users = mappings.n_users();
    let n_items = mappings.n_items();

    let mut aggregated: DokMatrix<u32, f32> = DokMatrix::new(n_users);
    for x in interactions {
        let u = mappings.user_position(x.user)?;
        let i = mappings.item_position(x.item)?;
        aggregated.add(u as usize, i, x.rating);
    }

    let user_bias = compute_user_bias(&aggregated, n_users);
    let item_bias = if options.item_bias {
        compute_item_bias(&aggregated, &user_bias, options.user_bias, n_items)
    } else {
        vec![0.0; n_items]
    };

    let mut urm = aggregated.to_csr(n_items);
    let mut rated = RatedIndex::new(n_items);
    for u in 0..urm.n_rows() {
        let user = mappings.users.id_of(u)?;
        for pos in urm.indptr[u]..urm.indptr[u + 1] {
            let i = urm.indices[pos];
            if options.user_bias {
                urm.data[pos] -= user_bias[u];
            }
            urm.data[pos] -= item_bias[i as usize];
            rated.insert(user, u as u32, i);
        }
    }
    rated.finish();

    tracing::info!(
        "in average every user rated {:.2} items, {} users rated no items",
        rated.avg_rated_items(),
        n_users - rated.user_rated_items.len()
    );

    if options.normalize {
        urm.normalize_rows();
    }

    let duration = start.elapsed();
    tracing::info!(
        "urm built: {} x {}, {} entries, elapsed: {:.4?}",
        n_users,
        n_items,
        urm.nnz(),
        duration
    );

    Ok(UrmBuild {
        urm,
        user_bias,
        item_bias,
        rated,
    })
}

fn compute_user_bias(aggregated: &DokMatrix<u32, f32>, n_users: usize) -> Vec<f32> {
    let mut user_bias = vec![0.0; n_users];
    for (u, row) in aggregated.rows() {
        if !row.is_empty() {
            user_bias[u] = row.values().sum::<f32>() / row.len() as f32;
        }
    }
    user_bias
}

fn compute_item_bias(
    aggregated: &DokMatrix<u32, f32>,
    user_bias: &[f32],
    subtract_user_bias: bool,
    n_items: usize,
) -> Vec<f32> {
    // (sum, count)
    let mut totals = vec![(0.0f32, 0usize); n_items];
    for (u, row) in aggregated.rows() {
        let bias = if subtract_user_bias { user_bias[u] } else { 0.0 };
        for (&i, &value) in row {
            let (sum, count) = &mut totals[i as usize];
            *sum += value - bias;
            *count += 1;
        }
    }
    totals
        .into_iter()
        .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f32 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecError;

    fn no_bias() -> UrmOptions {
        UrmOptions {
            user_bias: false,
            item_bias: false,
            normalize: false,
        }
    }

    #[test]
    fn test_repeated_interactions_are_summed() -> Result<()> {
        let interactions = vec![
            Interaction::new(1, 10, 2.0),
            Interaction::new(1, 10, 3.0),
            Interaction::new(2, 20, 1.0),
        ];
        let mappings = Mappings::build(&interactions, &[]);
        let build = build_urm(&interactions, &mappings, no_bias())?;
        assert_eq!(build.urm.nnz(), 2);
        assert_eq!(build.urm.get(0, 0), 5.0);
        assert_eq!(build.urm.get(1, 1), 1.0);
        assert_eq!(build.rated.rated_items(1), &[0]);
        assert_eq!(build.rated.rating_users(1), &[1]);
        Ok(())
    }

    #[test]
    fn test_uniform_single_item_biases() -> Result<()> {
        let interactions: Vec<Interaction> =
            (1..=4).map(|u| Interaction::new(u, 7, 3.0)).collect();
        let mappings = Mappings::build(&interactions, &[]);
        let build = build_urm(&interactions, &mappings, UrmOptions::default())?;
        assert!(build.user_bias.iter().all(|&b| b == 3.0));
        assert_eq!(build.item_bias, vec![0.0]);
        assert_eq!(build.urm.nnz(), 4);
        assert!(build.urm.data.iter().all(|&d| d == 0.0));
        Ok(())
    }

    #[test]
    fn test_user_then_item_bias() -> Result<()> {
        // user 1: item 10 -> 4, item 20 -> 2 (bias 3)
        // user 2: item 10 -> 5 (bias 5)
        let interactions = vec![
            Interaction::new(1, 10, 4.0),
            Interaction::new(1, 20, 2.0),
            Interaction::new(2, 10, 5.0),
        ];
        let mappings = Mappings::build(&interactions, &[]);
        let options = UrmOptions {
            normalize: false,
            ..UrmOptions::default()
        };
        let build = build_urm(&interactions, &mappings, options)?;
        assert_eq!(build.user_bias, vec![3.0, 5.0]);
        // item 10: mean(4 - 3, 5 - 5) = 0.5, item 20: mean(2 - 3) = -1
        assert_eq!(build.item_bias, vec![0.5, -1.0]);
        assert!((build.urm.get(0, 0) - 0.5).abs() < 1e-6);
        assert!((build.urm.get(0, 1) - 0.0).abs() < 1e-6);
        assert!((build.urm.get(1, 0) + 0.5).abs() < 1e-6);

        let options = UrmOptions {
            user_bias: false,
            item_bias: true,
            normalize: false,
        };
        let build = build_urm(&interactions, &mappings, options)?;
        assert_eq!(build.item_bias, vec![4.5, 2.0]);
        assert!((build.urm.get(0, 0) + 0.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_normalized_rows() -> Result<()> {
        let interactions = vec![
            Interaction::new(1, 10, 3.0),
            Interaction::new(1, 20, 4.0),
        ];
        let mappings = Mappings::build(&interactions, &[9]);
        let options = UrmOptions {
            user_bias: false,
            item_bias: false,
            normalize: true,
        };
        let build = build_urm(&interactions, &mappings, options)?;
        // target-only user 9 keeps an empty row
        assert_eq!(build.urm.n_rows(), 2);
        assert_eq!(build.urm.row(0).0.len(), 0);
        assert!((build.urm.get(1, 0) - 0.6).abs() < 1e-6);
        assert!((build.urm.get(1, 1) - 0.8).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_empty_and_unmapped_input() -> Result<()> {
        let mappings = Mappings::build(&[], &[]);
        let build = build_urm(&[], &mappings, UrmOptions::default())?;
        assert_eq!(build.urm.n_rows(), 0);
        assert_eq!(build.urm.nnz(), 0);

        let interactions = vec![Interaction::new(1, 10, 1.0)];
        let result = build_urm(&interactions, &mappings, UrmOptions::default());
        assert!(matches!(result, Err(RecError::UnknownUser(1))));
        Ok(())
    }
}
