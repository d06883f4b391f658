//! Builds live chips from definitions.

use std::sync::Arc;

use arcstr::ArcStr;
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, span, Level};

use crate::builtin::Primitive;
use crate::chip::{Chip, ChipFactory};
use crate::definition::{
    ChipDefinition, ComponentRef, Position, SavedInputPin, SavedOutputPin, SavedWire,
    SavedWireLayout,
};
use crate::graph::{ComponentId, ComponentInstance, CompositeChip, PinRef, Wire};

/// An error instantiating a chip definition.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InstantiateError {
    /// Some dependencies are not loaded.
    #[error("missing dependencies: {}", .0.iter().join(", "))]
    MissingDependencies(Vec<ArcStr>),
}

/// Checks that every dependency of `def` is loaded.
///
/// Returns the names of missing dependencies, in order of first use.
pub fn would_load(def: &ChipDefinition, loaded: &impl ChipFactory) -> Result<(), Vec<ArcStr>> {
    let missing: Vec<_> = def
        .chip_dependencies()
        .filter(|dep| loaded.template(dep).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing)
    }
}

/// Instantiates `def` using the templates in `loaded`.
///
/// Fails without side effects if a dependency is missing.
pub fn instantiate(def: &ChipDefinition, loaded: &impl ChipFactory) -> Result<Chip, InstantiateError> {
    build(def, loaded).map(Chip::composite)
}

/// A wire together with its editor geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRecord {
    /// The connection.
    pub wire: Wire,
    /// Intermediate anchor points.
    pub anchor_points: Vec<Position>,
}

/// A chip instantiated for editing, with a record for every wire.
#[derive(Clone, Debug)]
pub struct EditableChip {
    /// The instantiated chip.
    pub chip: Chip,
    /// One record per successful connection, in connection order.
    pub wires: Vec<WireRecord>,
}

/// Instantiates `def` for editing.
///
/// Every successful connection gets a [`WireRecord`]. Anchor points from
/// `layout` are then matched onto those records by component and pin index.
pub fn instantiate_with_wires(
    def: &ChipDefinition,
    layout: Option<&SavedWireLayout>,
    loaded: &impl ChipFactory,
) -> Result<EditableChip, InstantiateError> {
    let composite = build(def, loaded)?;
    let wires = composite
        .wires()
        .iter()
        .map(|&wire| WireRecord {
            wire,
            anchor_points: Vec::new(),
        })
        .collect();
    let mut chip = EditableChip {
        chip: Chip::composite(composite),
        wires,
    };
    if let Some(layout) = layout {
        chip.apply_layout(layout);
    }
    Ok(chip)
}

fn build(def: &ChipDefinition, loaded: &impl ChipFactory) -> Result<CompositeChip, InstantiateError> {
    let _guard = span!(Level::INFO, "instantiate", chip = %def.name).entered();
    would_load(def, loaded).map_err(InstantiateError::MissingDependencies)?;

    let mut chip = CompositeChip::new(def.name.clone());
    for c in def.components.iter() {
        let mut instance = match Primitive::sentinel(&c.chip_name) {
            Some(sentinel) => ComponentInstance::new(Arc::new(sentinel.template()), c.position()),
            None => loaded
                .create_instance(&c.chip_name, c.position())
                .ok_or_else(|| InstantiateError::MissingDependencies(vec![c.chip_name.clone()]))?,
        };
        instance.apply_saved_pins(&c.input_pins, &c.output_pins);
        chip.add_component(instance);
    }

    for (child, c) in def.components.iter().enumerate() {
        let live = chip.components()[child].inputs.len();
        for (slot, saved) in c.input_pins.iter().enumerate().take(live) {
            let Some(parent) = saved.parent_chip_index else {
                continue;
            };
            let Some(output) = saved.parent_chip_output_index else {
                debug!(child, slot, parent, "saved connection has no output index");
                continue;
            };
            let to = PinRef::input(ComponentId(child), slot);
            chip.set_cyclic(to, saved.is_cyclic);
            if let Err(err) = chip.try_connect(PinRef::output(ComponentId(parent), output), to) {
                debug!(child, slot, parent, output, "skipping saved connection: {err}");
            }
        }
    }

    Ok(chip)
}

impl EditableChip {
    /// The composite contents of the chip.
    ///
    /// Editable chips are always composite.
    pub fn composite(&self) -> Option<&CompositeChip> {
        self.chip.as_composite()
    }

    /// Applies anchor points from a saved layout.
    ///
    /// Each saved wire is matched by its (parent, output, child, input) index
    /// tuple. If those indices name a pin that does not exist, the record is
    /// retried with the input and output roles swapped. A record that matches
    /// no wire is skipped.
    pub fn apply_layout(&mut self, layout: &SavedWireLayout) {
        for saved in layout.wires.iter() {
            let primary = Wire {
                from: PinRef::output(ComponentId(saved.parent_chip_index), saved.parent_chip_output_index),
                to: PinRef::input(ComponentId(saved.child_chip_index), saved.child_chip_input_index),
            };
            let wire = if self.has_pins(&primary) {
                primary
            } else {
                Wire {
                    from: PinRef::output(ComponentId(saved.child_chip_index), saved.child_chip_input_index),
                    to: PinRef::input(ComponentId(saved.parent_chip_index), saved.parent_chip_output_index),
                }
            };
            match self.wires.iter_mut().find(|r| r.wire == wire) {
                Some(record) => record.anchor_points = saved.anchor_points.clone(),
                None => debug!(
                    chip = %layout.chip_name,
                    parent = saved.parent_chip_index,
                    child = saved.child_chip_index,
                    "no wire matches saved anchor points"
                ),
            }
        }
    }

    fn has_pins(&self, wire: &Wire) -> bool {
        self.composite()
            .is_some_and(|c| c.pin(wire.from).is_some() && c.pin(wire.to).is_some())
    }

    /// Derives the wire layout record of this chip.
    pub fn wire_layout(&self) -> SavedWireLayout {
        SavedWireLayout {
            chip_name: self.chip.name.clone(),
            wires: self
                .wires
                .iter()
                .map(|r| SavedWire {
                    parent_chip_index: r.wire.from.component.index(),
                    parent_chip_output_index: r.wire.from.slot,
                    child_chip_index: r.wire.to.component.index(),
                    child_chip_input_index: r.wire.to.slot,
                    anchor_points: r.anchor_points.clone(),
                })
                .collect(),
        }
    }
}

impl CompositeChip {
    /// Derives the saved definition of this chip.
    pub fn to_definition(&self) -> ChipDefinition {
        ChipDefinition {
            name: self.name().clone(),
            components: self
                .components()
                .iter()
                .map(|c| ComponentRef {
                    chip_name: c.chip.name.clone(),
                    pos_x: c.position.x,
                    pos_y: c.position.y,
                    input_pins: c
                        .inputs
                        .iter()
                        .map(|p| SavedInputPin {
                            name: p.name.clone(),
                            width: p.width,
                            parent_chip_index: p.driver.map(|d| d.component.index()),
                            parent_chip_output_index: p.driver.map(|d| d.slot),
                            is_cyclic: p.cyclic,
                        })
                        .collect(),
                    output_pins: c
                        .outputs
                        .iter()
                        .map(|p| SavedOutputPin {
                            name: p.name.clone(),
                            width: p.width,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
