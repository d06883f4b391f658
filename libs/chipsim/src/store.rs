//! A read-only collection of chip definitions.

use arcstr::ArcStr;
use indexmap::IndexMap;
use tracing::warn;

use crate::definition::ChipDefinition;

/// Chip definitions keyed by name.
///
/// Iteration follows insertion order, which makes loading deterministic.
#[derive(Clone, Debug, Default)]
pub struct ChipStore {
    definitions: IndexMap<ArcStr, ChipDefinition>,
}

impl ChipStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a list of definitions.
    ///
    /// If two definitions share a name, the later one wins and a warning is logged.
    pub fn from_definitions(definitions: impl IntoIterator<Item = ChipDefinition>) -> Self {
        let mut store = Self::new();
        for def in definitions {
            if let Some(prev) = store.insert(def) {
                warn!(chip = %prev.name, "duplicate chip definition replaces an earlier one");
            }
        }
        store
    }

    /// Adds a definition, returning the definition it replaced, if any.
    pub fn insert(&mut self, def: ChipDefinition) -> Option<ChipDefinition> {
        self.definitions.insert(def.name.clone(), def)
    }

    /// Gets the definition with the given name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ChipDefinition> {
        self.definitions.get(name)
    }

    /// Returns `true` if the store has a definition with the given name.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// The number of definitions.
    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if the store is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterates over definitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ChipDefinition> {
        self.definitions.values()
    }

    /// Iterates over definition names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &ArcStr> {
        self.definitions.keys()
    }

    pub(crate) fn get_index(&self, index: usize) -> Option<&ChipDefinition> {
        self.definitions.get_index(index).map(|(_, def)| def)
    }
}

impl FromIterator<ChipDefinition> for ChipStore {
    fn from_iter<T: IntoIterator<Item = ChipDefinition>>(iter: T) -> Self {
        Self::from_definitions(iter)
    }
}
