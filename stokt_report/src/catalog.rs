use indexmap::IndexMap;

use crate::model::{Hold, HoldId, WallConfig};
use crate::StoktError;

/// Every hold on one wall, keyed by id, in wall-configuration order.
#[derive(Clone, Debug, Default)]
pub struct HoldCatalog {
    holds: IndexMap<HoldId, Hold>,
}

impl HoldCatalog {
    pub fn from_wall(wall: &WallConfig) -> Result<Self, StoktError> {
        Self::from_holds(wall.holds.iter().cloned())
    }

    pub fn from_holds(holds: impl IntoIterator<Item = Hold>) -> Result<Self, StoktError> {
        let mut map = IndexMap::new();
        for hold in holds {
            let id = hold.id;
            if map.insert(id, hold).is_some() {
                return Err(StoktError::DuplicateHold(id));
            }
        }
        Ok(Self { holds: map })
    }

    pub fn get(&self, id: HoldId) -> Option<&Hold> {
        self.holds.get(&id)
    }

    pub fn contains(&self, id: HoldId) -> bool {
        self.holds.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = HoldId> + '_ {
        self.holds.keys().copied()
    }

    pub fn holds(&self) -> impl Iterator<Item = &Hold> {
        self.holds.values()
    }

    /// Resolve a list of ids, skipping any the wall does not have.
    pub fn select(&self, ids: &[HoldId]) -> Vec<&Hold> {
        ids.iter().filter_map(|id| self.holds.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }
}
