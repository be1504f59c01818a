use std::{collections::BTreeMap, sync::RwLock};

use crate::{Section, train::TrainId};

/// Roster of trains currently in the system, keyed by id.
///
/// Guarded by its own lock so taking a snapshot for an event never blocks
/// the counter lock or the passage.
#[derive(Debug, Default)]
pub struct TrainRegistry {
    trains: RwLock<BTreeMap<TrainId, Section>>,
}

impl TrainRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// * If the `trains` `RwLock` is poisoned
    pub fn register(&self, id: TrainId, section: Section) {
        let previous = self.trains.write().unwrap().insert(id, section);
        debug_assert!(previous.is_none(), "train {id} registered twice");
    }

    /// Returns `false` if the train was not registered.
    ///
    /// # Panics
    ///
    /// * If the `trains` `RwLock` is poisoned
    pub fn deregister(&self, id: TrainId) -> bool {
        self.trains.write().unwrap().remove(&id).is_some()
    }

    /// Ids of every registered train, in ascending order.
    ///
    /// # Panics
    ///
    /// * If the `trains` `RwLock` is poisoned
    #[must_use]
    pub fn snapshot(&self) -> Vec<TrainId> {
        self.trains.read().unwrap().keys().copied().collect()
    }

    /// # Panics
    ///
    /// * If the `trains` `RwLock` is poisoned
    #[must_use]
    pub fn len(&self) -> usize {
        self.trains.read().unwrap().len()
    }

    /// # Panics
    ///
    /// * If the `trains` `RwLock` is poisoned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trains.read().unwrap().is_empty()
    }

    /// # Panics
    ///
    /// * If the `trains` `RwLock` is poisoned
    #[must_use]
    pub fn section_of(&self, id: TrainId) -> Option<Section> {
        self.trains.read().unwrap().get(&id).copied()
    }
}
