use fxhash::{FxHashMap, FxHashSet};

use crate::mapping::{ItemId, Mappings, UserId};

/// Which items every user rated and which users rated every item.
///
/// Built once while emitting the user rating matrix, read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct RatedIndex {
    /// external user id -> item columns
    pub user_rated_items: FxHashMap<UserId, Vec<u32>>,
    /// item column -> user rows
    pub item_rating_users: Vec<Vec<u32>>,
}

impl RatedIndex {
    pub fn new(n_items: usize) -> Self {
        Self {
            user_rated_items: FxHashMap::default(),
            item_rating_users: vec![Vec::new(); n_items],
        }
    }

    pub(crate) fn insert(&mut self, user: UserId, u: u32, i: u32) {
        self.user_rated_items.entry(user).or_default().push(i);
        self.item_rating_users[i as usize].push(u);
    }

    /// Sorts every list so downstream iteration is deterministic.
    pub(crate) fn finish(&mut self) {
        self.user_rated_items
            .values_mut()
            .for_each(|v| v.sort_unstable());
        self.item_rating_users
            .iter_mut()
            .for_each(|v| v.sort_unstable());
    }

    /// Item columns rated by `user`, empty for users with no interactions.
    pub fn rated_items(&self, user: UserId) -> &[u32] {
        self.user_rated_items
            .get(&user)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn rating_users(&self, item: u32) -> &[u32] {
        self.item_rating_users
            .get(item as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Average number of rated items over users with at least one rating.
    pub fn avg_rated_items(&self) -> f32 {
        if self.user_rated_items.is_empty() {
            return 0.0;
        }
        let total: usize = self.user_rated_items.values().map(|v| v.len()).sum();
        total as f32 / self.user_rated_items.len() as f32
    }
}

/// Build the set of external item ids a user must not be recommended:
/// the ineligible items plus everything the user already rated.
pub(crate) fn get_excluded_set(
    index: &RatedIndex,
    mappings: &Mappings,
    user: UserId,
    ineligible: &FxHashSet<ItemId>,
) -> FxHashSet<ItemId> {
    let mut excluded = ineligible.clone();
    excluded.extend(
        index
            .rated_items(user)
            .iter()
            .filter_map(|&i| mappings.items.ids().get(i as usize).copied()),
    );
    excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Interaction;

    #[test]
    fn test_rated_index() {
        let interactions = vec![
            Interaction::new(1, 10, 1.0),
            Interaction::new(1, 20, 1.0),
            Interaction::new(2, 20, 1.0),
        ];
        let mappings = Mappings::build(&interactions, &[]);
        let mut index = RatedIndex::new(mappings.n_items());
        index.insert(1, 0, 1);
        index.insert(1, 0, 0);
        index.insert(2, 1, 1);
        index.finish();

        assert_eq!(index.rated_items(1), &[0, 1]);
        assert_eq!(index.rated_items(3), &[] as &[u32]);
        assert_eq!(index.rating_users(1), &[0, 1]);
        assert!((index.avg_rated_items() - 1.5).abs() < 1e-6);

        let ineligible: FxHashSet<ItemId> = [99].into_iter().collect();
        let excluded = get_excluded_set(&index, &mappings, 2, &ineligible);
        assert_eq!(excluded.len(), 2);
        assert!(excluded.contains(&20) && excluded.contains(&99));
    }
}
