//! Hierarchical logic chips.
//!
//! Custom chips are built from builtin gates and other custom chips. This
//! crate turns a flat collection of saved chip definitions into loaded chip
//! templates, instantiates them into pin/wire graphs, and propagates tri-state
//! signals through the result.
//!
//! The usual flow is:
//!
//! 1. Read definitions with [`persist::get_all_saved_chips`].
//! 2. Load them in dependency order with [`loader::load_all`] (or drive a
//!    [`loader::Loader`] by hand to observe progress).
//! 3. Run a loaded chip with [`sim::Simulation`].
//!
//! Chips saved elsewhere can be merged in with [`import::import`], which renames
//! imported chips whose names are already taken.
//!
//! Signals have three states per bit: low, high and undriven
//! ([`signal::Bit::HighZ`]). Gates read undriven bits as low. Tri-state
//! buffers output undriven bits while disabled.
#![warn(missing_docs)]

pub mod builtin;
pub mod chip;
pub mod config;
pub mod definition;
pub mod graph;
pub mod import;
pub mod instantiate;
pub mod issues;
pub mod loader;
pub mod persist;
pub mod signal;
pub mod sim;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod tests;

pub use builtin::{builtin_chips, Primitive};
pub use chip::{Chip, ChipFactory, ChipKind, ChipTable, PinSpec};
pub use definition::{ChipDefinition, ComponentRef, SavedWireLayout, SIGNAL_IN, SIGNAL_OUT};
pub use graph::{ComponentId, CompositeChip, ConnectError, Direction, PinRef, Wire};
pub use instantiate::{instantiate, instantiate_with_wires, would_load, EditableChip, InstantiateError};
pub use loader::{load_all, LoadEvent, LoadOutcome, LoadReport, Loader, Progress};
pub use persist::{get_all_saved_chips, get_chip_save_data, ChipPersistence, PersistError};
pub use signal::{Bit, Signal};
pub use sim::{SimError, Simulation};
pub use store::ChipStore;
