use fxhash::FxHashMap;

use crate::error::{RecError, Result};
use crate::source::Interaction;

pub type UserId = u64;
pub type ItemId = u64;

/// Bijection between external identifiers and dense 0-based matrix positions.
///
/// Positions follow the first-seen order of the input, duplicates are dropped.
/// They are only meaningful for the lifetime of a single run.
#[derive(Debug, Default, Clone)]
pub struct IdMapping {
    subject: &'static str,
    positions: FxHashMap<u64, u32>,
    ids: Vec<u64>,
}

impl IdMapping {
    pub fn from_ids<I>(subject: &'static str, ids: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut positions = FxHashMap::default();
        let mut unique_ids = Vec::new();
        for id in ids {
            positions.entry(id).or_insert_with(|| {
                unique_ids.push(id);
                (unique_ids.len() - 1) as u32
            });
        }
        Self {
            subject,
            positions,
            ids: unique_ids,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn get(&self, id: u64) -> Option<u32> {
        self.positions.get(&id).copied()
    }

    pub fn id_of(&self, position: usize) -> Result<u64> {
        self.ids
            .get(position)
            .copied()
            .ok_or(RecError::UnknownPosition {
                subject: self.subject,
                position,
                size: self.ids.len(),
            })
    }

    /// Identifiers in position order.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }
}

/// User and item mappings, built independently of each other.
#[derive(Debug, Default, Clone)]
pub struct Mappings {
    pub users: IdMapping,
    pub items: IdMapping,
}

impl Mappings {
    /// Users are `targets` followed by every interacting user, items are every
    /// interacted item.
    pub fn build(interactions: &[Interaction], targets: &[UserId]) -> Self {
        let users = IdMapping::from_ids(
            "user",
            targets
                .iter()
                .copied()
                .chain(interactions.iter().map(|x| x.user)),
        );
        let items = IdMapping::from_ids("item", interactions.iter().map(|x| x.item));
        tracing::info!(
            "mapped {} users and {} items",
            users.len(),
            items.len()
        );
        Self { users, items }
    }

    pub fn user_position(&self, user: UserId) -> Result<u32> {
        self.users.get(user).ok_or(RecError::UnknownUser(user))
    }

    pub fn item_position(&self, item: ItemId) -> Result<u32> {
        self.items.get(item).ok_or(RecError::UnknownItem(item))
    }

    #[inline]
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    #[inline]
    pub fn n_items(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_bijective() -> Result<()> {
        let mapping = IdMapping::from_ids("user", vec![30, 10, 30, 20, 10]);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.ids(), &[30, 10, 20]);
        for pos in 0..mapping.len() {
            let id = mapping.id_of(pos)?;
            assert_eq!(mapping.get(id), Some(pos as u32));
        }
        Ok(())
    }

    #[test]
    fn test_unknown_lookups_fail() {
        let interactions = vec![Interaction::new(1, 100, 1.0)];
        let mappings = Mappings::build(&interactions, &[7]);
        assert_eq!(mappings.n_users(), 2);
        assert_eq!(mappings.user_position(7).ok(), Some(0));
        assert!(matches!(
            mappings.user_position(2),
            Err(RecError::UnknownUser(2))
        ));
        assert!(matches!(
            mappings.item_position(5),
            Err(RecError::UnknownItem(5))
        ));
        assert!(mappings.items.id_of(1).is_err());
    }
}
