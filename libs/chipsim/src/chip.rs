//! Loaded chip templates.

use std::sync::Arc;

use arcstr::ArcStr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::builtin::Primitive;
use crate::definition::Position;
use crate::graph::{ComponentInstance, CompositeChip};

/// The name and width of an interface pin.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PinSpec {
    /// The pin name.
    pub name: ArcStr,
    /// The pin width in bits.
    pub width: usize,
}

impl PinSpec {
    /// Creates a new pin spec.
    #[inline]
    pub fn new(name: impl Into<ArcStr>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }
}

/// The contents of a chip.
#[derive(Clone, Debug)]
pub enum ChipKind {
    /// A builtin chip whose behavior is implemented natively.
    Primitive(Primitive),
    /// A chip built from other chips.
    Composite(CompositeChip),
}

/// A loaded chip from which component instances are created.
#[derive(Clone, Debug)]
pub struct Chip {
    /// The chip name.
    pub name: ArcStr,
    /// The interface inputs.
    pub inputs: Vec<PinSpec>,
    /// The interface outputs.
    pub outputs: Vec<PinSpec>,
    /// The chip contents.
    pub kind: ChipKind,
}

impl Chip {
    /// Creates a primitive chip.
    pub fn primitive(
        name: impl Into<ArcStr>,
        primitive: Primitive,
        inputs: Vec<PinSpec>,
        outputs: Vec<PinSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            kind: ChipKind::Primitive(primitive),
        }
    }

    /// Wraps a composite chip.
    ///
    /// The interface is taken from the chip's `SIGNAL IN` outputs and `SIGNAL OUT` inputs.
    pub fn composite(chip: CompositeChip) -> Self {
        let inputs = chip
            .interface_inputs()
            .iter()
            .filter_map(|&id| chip.component(id).outputs.first())
            .map(|p| PinSpec::new(p.name.clone(), p.width))
            .collect();
        let outputs = chip
            .interface_outputs()
            .iter()
            .filter_map(|&id| chip.component(id).inputs.first())
            .map(|p| PinSpec::new(p.name.clone(), p.width))
            .collect();
        Self {
            name: chip.name().clone(),
            inputs,
            outputs,
            kind: ChipKind::Composite(chip),
        }
    }

    /// The primitive behind this chip, if it is one.
    #[inline]
    pub fn primitive_kind(&self) -> Option<Primitive> {
        match self.kind {
            ChipKind::Primitive(p) => Some(p),
            ChipKind::Composite(_) => None,
        }
    }

    /// The composite contents of this chip, if it is one.
    #[inline]
    pub fn as_composite(&self) -> Option<&CompositeChip> {
        match &self.kind {
            ChipKind::Primitive(_) => None,
            ChipKind::Composite(c) => Some(c),
        }
    }

    /// Returns `true` if this chip is builtin.
    #[inline]
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ChipKind::Primitive(_))
    }
}

/// Creates component instances from loaded chip templates.
pub trait ChipFactory {
    /// Looks up the template with the given name.
    fn template(&self, name: &str) -> Option<&Arc<Chip>>;

    /// Creates a new instance of the named template.
    ///
    /// Returns [`None`] if no such template exists.
    fn create_instance(&self, name: &str, position: Position) -> Option<ComponentInstance> {
        self.template(name)
            .map(|chip| ComponentInstance::new(chip.clone(), position))
    }
}

/// A table of loaded chips, keyed by name.
///
/// Iteration follows insertion order.
#[derive(Clone, Debug, Default)]
pub struct ChipTable {
    chips: IndexMap<ArcStr, Arc<Chip>>,
}

impl ChipTable {
    /// Creates an empty table.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chip, replacing any chip of the same name.
    pub fn insert(&mut self, chip: impl Into<Arc<Chip>>) -> Arc<Chip> {
        let chip = chip.into();
        self.chips.insert(chip.name.clone(), chip.clone());
        chip
    }

    /// Gets the chip with the given name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<Chip>> {
        self.chips.get(name)
    }

    /// Returns `true` if a chip with the given name is loaded.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.chips.contains_key(name)
    }

    /// The number of loaded chips.
    #[inline]
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Returns `true` if no chips are loaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Iterates over the names of loaded chips.
    pub fn names(&self) -> impl Iterator<Item = &ArcStr> {
        self.chips.keys()
    }

    /// Iterates over loaded chips.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chip>> {
        self.chips.values()
    }
}

impl ChipFactory for ChipTable {
    #[inline]
    fn template(&self, name: &str) -> Option<&Arc<Chip>> {
        self.get(name)
    }
}

impl FromIterator<Chip> for ChipTable {
    fn from_iter<T: IntoIterator<Item = Chip>>(iter: T) -> Self {
        let mut table = Self::new();
        for chip in iter {
            table.insert(chip);
        }
        table
    }
}
