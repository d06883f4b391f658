//! Dependency-ordered loading of chip definitions.
//!
//! A [`Loader`] is an iterator over [`LoadEvent`]s. Each call to `next` performs
//! one unit of work, so a caller can report progress (or stop early) between
//! units. [`load_all`] drives a loader to completion.
//!
//! Dependencies are resolved depth first with an explicit stack. A chip is
//! instantiated only after every chip it uses has been loaded. A chip whose
//! dependencies cannot be satisfied is reported as failed; every other chip
//! still loads.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::time::Instant;

use arcstr::ArcStr;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, span, warn, Level, Span};

use crate::chip::{Chip, ChipTable};
use crate::definition::ChipDefinition;
use crate::instantiate::{instantiate, InstantiateError};
use crate::store::ChipStore;

/// A unit of loading work that has completed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadEvent {
    /// A builtin chip was made available.
    BuiltinRegistered {
        /// The builtin's name.
        name: ArcStr,
    },
    /// One dependency of a chip being loaded has been checked.
    DependencyResolved {
        /// The chip whose dependency was checked.
        chip: ArcStr,
        /// The dependency.
        dependency: ArcStr,
    },
    /// A chip was instantiated.
    ChipLoaded {
        /// The chip's name.
        name: ArcStr,
    },
    /// A chip could not be instantiated.
    ChipFailed {
        /// The chip's name.
        name: ArcStr,
        /// The dependencies that were not available.
        missing: Vec<ArcStr>,
    },
    /// Loading is complete. Emitted exactly once.
    Finished,
}

/// Loading progress.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// The number of builtins registered and chips loaded or failed.
    pub done: usize,
    /// The total number of builtins and chips.
    pub total: usize,
}

/// A chip that failed to load.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FailedChip {
    /// The chip's name.
    pub name: ArcStr,
    /// The dependencies that were not available.
    pub missing: Vec<ArcStr>,
}

/// The aggregate result of a loading pass.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Loaded chips, in load order. Builtins are not included.
    pub loaded: Vec<ArcStr>,
    /// Chips that failed, in the order they failed.
    pub failed: Vec<FailedChip>,
}

impl LoadReport {
    /// The number of chips loaded.
    #[inline]
    pub fn num_loaded(&self) -> usize {
        self.loaded.len()
    }

    /// The number of chips that failed.
    #[inline]
    pub fn num_failed(&self) -> usize {
        self.failed.len()
    }

    /// Returns `true` if no chip failed.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Display for LoadReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "loaded {} chips, {} failed",
            self.num_loaded(),
            self.num_failed()
        )?;
        for chip in self.failed.iter() {
            writeln!(f, "  {}: missing {}", chip.name, chip.missing.iter().join(", "))?;
        }
        Ok(())
    }
}

/// The chips and report produced by a loading pass.
#[derive(Clone, Debug)]
pub struct LoadOutcome {
    /// Every loaded chip, builtins included.
    pub chips: ChipTable,
    /// Loaded and failed chips.
    pub report: LoadReport,
}

struct Frame<'a> {
    def: &'a ChipDefinition,
    deps: Vec<ArcStr>,
    next: usize,
}

impl<'a> Frame<'a> {
    fn new(def: &'a ChipDefinition) -> Self {
        Self {
            def,
            deps: def.chip_dependencies().collect(),
            next: 0,
        }
    }
}

/// A resumable loading pass over a [`ChipStore`].
pub struct Loader<'a> {
    store: &'a ChipStore,
    loaded: ChipTable,
    builtins: std::vec::IntoIter<Chip>,
    shadowed: HashSet<ArcStr>,
    next_definition: usize,
    stack: Vec<Frame<'a>>,
    failed: HashSet<ArcStr>,
    report: LoadReport,
    progress: Progress,
    finished: bool,
    start: Instant,
    span: Span,
}

impl<'a> Loader<'a> {
    /// Creates a loading pass over `store`, starting from the given builtins.
    ///
    /// Definitions that share a name with a builtin are skipped with a warning.
    pub fn new(store: &'a ChipStore, builtins: impl IntoIterator<Item = Chip>) -> Self {
        let span = span!(Level::INFO, "load_all_chips", chips = store.len());
        let builtins: Vec<Chip> = builtins.into_iter().collect();
        let shadowed: HashSet<ArcStr> = {
            let _guard = span.enter();
            builtins
                .iter()
                .filter(|b| store.contains(&b.name))
                .map(|b| {
                    warn!(chip = %b.name, "saved chip has the same name as a builtin and will not be loaded");
                    b.name.clone()
                })
                .collect()
        };
        let total = builtins.len() + store.len() - shadowed.len();
        Self {
            store,
            loaded: ChipTable::new(),
            builtins: builtins.into_iter(),
            shadowed,
            next_definition: 0,
            stack: Vec::new(),
            failed: HashSet::new(),
            report: LoadReport::default(),
            progress: Progress { done: 0, total },
            finished: false,
            start: Instant::now(),
            span,
        }
    }

    /// The progress made so far.
    #[inline]
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// The chips loaded so far.
    #[inline]
    pub fn loaded(&self) -> &ChipTable {
        &self.loaded
    }

    /// Runs the remaining units of work and returns the result.
    pub fn finish(mut self) -> LoadOutcome {
        for _ in &mut self {}
        LoadOutcome {
            chips: self.loaded,
            report: self.report,
        }
    }

    fn on_stack(&self, name: &str) -> bool {
        self.stack.iter().any(|f| f.def.name == name)
    }

    /// Returns the definition of `name` if it still has to be loaded.
    fn pending(&self, name: &str) -> Option<&'a ChipDefinition> {
        if self.loaded.contains(name) || self.failed.contains(name) || self.on_stack(name) {
            return None;
        }
        let store = self.store;
        store.get(name)
    }

    fn complete(&mut self, def: &ChipDefinition) -> LoadEvent {
        self.progress.done += 1;
        let name = def.name.clone();
        match instantiate(def, &self.loaded) {
            Ok(chip) => {
                self.loaded.insert(chip);
                self.report.loaded.push(name.clone());
                LoadEvent::ChipLoaded { name }
            }
            Err(InstantiateError::MissingDependencies(missing)) => {
                warn!(
                    chip = %name,
                    missing = %missing.iter().join(", "),
                    "skipping chip with missing dependencies"
                );
                self.failed.insert(name.clone());
                self.report.failed.push(FailedChip {
                    name: name.clone(),
                    missing: missing.clone(),
                });
                LoadEvent::ChipFailed { name, missing }
            }
        }
    }

    fn step(&mut self) -> LoadEvent {
        if let Some(chip) = self.builtins.next() {
            self.progress.done += 1;
            let name = self.loaded.insert(chip).name.clone();
            return LoadEvent::BuiltinRegistered { name };
        }

        loop {
            let Some(frame) = self.stack.last() else {
                match self.next_root() {
                    Some(def) => {
                        self.stack.push(Frame::new(def));
                        continue;
                    }
                    None => return self.finish_pass(),
                }
            };

            let Some(dep) = frame.deps.get(frame.next).cloned() else {
                let def = frame.def;
                self.stack.pop();
                return self.complete(def);
            };
            let chip = frame.def.name.clone();

            if let Some(def) = self.pending(&dep) {
                self.stack.push(Frame::new(def));
                continue;
            }
            if let Some(frame) = self.stack.last_mut() {
                frame.next += 1;
            }
            return LoadEvent::DependencyResolved {
                chip,
                dependency: dep,
            };
        }
    }

    /// Finds the next definition in store order that has not been visited.
    fn next_root(&mut self) -> Option<&'a ChipDefinition> {
        let store = self.store;
        while let Some(def) = store.get_index(self.next_definition) {
            self.next_definition += 1;
            if !self.shadowed.contains(&def.name)
                && !self.loaded.contains(&def.name)
                && !self.failed.contains(&def.name)
            {
                return Some(def);
            }
        }
        None
    }

    fn finish_pass(&mut self) -> LoadEvent {
        self.finished = true;
        info!(
            loaded = self.report.num_loaded(),
            failed = self.report.num_failed(),
            elapsed = ?self.start.elapsed(),
            "finished loading chips"
        );
        LoadEvent::Finished
    }
}

impl Iterator for Loader<'_> {
    type Item = LoadEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let span = self.span.clone();
        let _guard = span.enter();
        Some(self.step())
    }
}

/// Loads every chip in `store`, starting from the given builtins.
///
/// `on_event` is called after each unit of work with the progress so far.
pub fn load_all(
    store: &ChipStore,
    builtins: impl IntoIterator<Item = Chip>,
    mut on_event: impl FnMut(&LoadEvent, Progress),
) -> LoadOutcome {
    let mut loader = Loader::new(store, builtins);
    #[allow(clippy::while_let_on_iterator)]
    while let Some(event) = loader.next() {
        on_event(&event, loader.progress());
    }
    loader.finish()
}
