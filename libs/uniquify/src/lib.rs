//! A library for assigning unique names.
//!
//! Names that collide with an existing name receive the smallest free
//! integer suffix, appended directly to the base name:
//!
//! ```
//! use uniquify::Names;
//!
//! let mut names = Names::new();
//! names.reserve("AND");
//! names.reserve("AND2");
//! assert_eq!(names.assign_name(0, "AND"), "AND3");
//! assert_eq!(names.assign_name(1, "OR"), "OR");
//! ```
#![warn(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// The first suffix tried when a name is already taken.
pub const DEFAULT_FIRST_SUFFIX: usize = 2;

/// A set of unique names.
///
/// Each key of type `K` is assigned a unique name.
/// Names may also be reserved without a key,
/// for example names that already exist in some external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Names<K: Hash + Eq> {
    names: HashSet<ArcStr>,
    assignments: HashMap<K, ArcStr>,
    first_suffix: usize,
}

impl<K: Hash + Eq> Default for Names<K> {
    fn default() -> Self {
        Self {
            names: HashSet::new(),
            assignments: HashMap::new(),
            first_suffix: DEFAULT_FIRST_SUFFIX,
        }
    }
}

impl<K: Hash + Eq> Names<K> {
    /// Creates a new, empty name set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new, empty name set with room for `capacity` names.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: HashSet::with_capacity(capacity),
            assignments: HashMap::with_capacity(capacity),
            first_suffix: DEFAULT_FIRST_SUFFIX,
        }
    }

    /// Sets the first suffix tried on collision.
    ///
    /// Defaults to [`DEFAULT_FIRST_SUFFIX`].
    pub fn with_first_suffix(mut self, first_suffix: usize) -> Self {
        self.first_suffix = first_suffix;
        self
    }

    /// Returns the name associated with this key, if it exists.
    pub fn name(&self, id: &K) -> Option<ArcStr> {
        self.assignments.get(id).cloned()
    }

    /// Returns `true` if `name` is reserved or assigned.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The number of names in use.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no names are in use.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Marks `name` as taken without associating it with a key.
    ///
    /// Returns `false` if the name was already taken.
    pub fn reserve(&mut self, name: impl Into<ArcStr>) -> bool {
        self.names.insert(name.into())
    }

    /// Associates `id` with exactly `name`, marking the name as taken.
    ///
    /// Unlike [`Names::assign_name`], no suffix is ever added.
    /// Returns `false` if the name was already taken.
    pub fn reserve_name(&mut self, id: K, name: impl Into<ArcStr>) -> bool {
        let name = name.into();
        let fresh = self.names.insert(name.clone());
        self.assignments.insert(id, name);
        fresh
    }

    /// Allocates a new, unique name associated with the given ID.
    ///
    /// The name will be `base_name` if it is free.
    /// Otherwise it is `base_name` followed by the smallest integer
    /// (starting from the first suffix) that yields a free name.
    pub fn assign_name(&mut self, id: K, base_name: &str) -> ArcStr {
        let name = if self.names.contains(base_name) {
            let mut i = self.first_suffix;
            loop {
                let new_name = arcstr::format!("{}{}", base_name, i);
                if !self.names.contains(&new_name) {
                    break new_name;
                }
                i += 1;
            }
        } else {
            base_name.into()
        };

        self.names.insert(name.clone());
        self.assignments.insert(id, name.clone());
        name
    }
}
