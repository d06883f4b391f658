//! Component instances, pins and wires.
//!
//! A [`CompositeChip`] owns its components in an arena. Pins are addressed by
//! [`PinRef`] handles (component index, direction, slot) rather than by
//! reference, so feedback loops need no shared ownership.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builtin::Primitive;
use crate::chip::Chip;
use crate::definition::{Position, SavedInputPin, SavedOutputPin};

/// An opaque component identifier.
///
/// A component ID is only meaningful within the chip that created it.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    /// The index of this component in its chip's stored order.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "component{}", self.0)
    }
}

/// Port directions.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    /// Input.
    Input,
    /// Output.
    Output,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// A handle to a pin of a component.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PinRef {
    /// The owning component.
    pub component: ComponentId,
    /// Whether this is an input or an output pin.
    pub direction: Direction,
    /// The pin slot within the component's inputs or outputs.
    pub slot: usize,
}

impl PinRef {
    /// A handle to input `slot` of `component`.
    #[inline]
    pub fn input(component: ComponentId, slot: usize) -> Self {
        Self {
            component,
            direction: Direction::Input,
            slot,
        }
    }

    /// A handle to output `slot` of `component`.
    #[inline]
    pub fn output(component: ComponentId, slot: usize) -> Self {
        Self {
            component,
            direction: Direction::Output,
            slot,
        }
    }
}

impl Display for PinRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.component, self.direction, self.slot)
    }
}

/// A pin on a live component.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pin {
    /// The pin name.
    ///
    /// Names only matter while matching saved records; afterwards pins are
    /// addressed by [`PinRef`].
    pub name: ArcStr,
    /// The pin width in bits.
    pub width: usize,
    /// The pin direction.
    pub direction: Direction,
    /// Whether this input may read the previous cycle's value.
    pub cyclic: bool,
    /// The output pin driving this input, if any.
    ///
    /// Always [`None`] for output pins.
    pub driver: Option<PinRef>,
}

impl Pin {
    fn new(name: ArcStr, width: usize, direction: Direction) -> Self {
        Self {
            name,
            width,
            direction,
            cyclic: false,
            driver: None,
        }
    }
}

/// A live instance of a chip template.
#[derive(Clone, Debug)]
pub struct ComponentInstance {
    /// The template this component was created from.
    pub chip: Arc<Chip>,
    /// The position of the component.
    pub position: Position,
    /// Input pins, in slot order.
    pub inputs: Vec<Pin>,
    /// Output pins, in slot order.
    pub outputs: Vec<Pin>,
}

impl ComponentInstance {
    /// Creates an instance with pins copied from the template's defaults.
    pub fn new(chip: Arc<Chip>, position: Position) -> Self {
        let inputs = chip
            .inputs
            .iter()
            .map(|p| Pin::new(p.name.clone(), p.width, Direction::Input))
            .collect();
        let outputs = chip
            .outputs
            .iter()
            .map(|p| Pin::new(p.name.clone(), p.width, Direction::Output))
            .collect();
        Self {
            chip,
            position,
            inputs,
            outputs,
        }
    }

    /// Copies saved pin names and widths onto this instance.
    ///
    /// Only the prefix shared by the saved and live pin lists is updated.
    /// Extra live pins keep their template defaults and extra saved pins are ignored.
    pub fn apply_saved_pins(&mut self, inputs: &[SavedInputPin], outputs: &[SavedOutputPin]) {
        for (pin, saved) in self.inputs.iter_mut().zip(inputs) {
            pin.name = saved.name.clone();
            pin.width = saved.width;
        }
        for (pin, saved) in self.outputs.iter_mut().zip(outputs) {
            pin.name = saved.name.clone();
            pin.width = saved.width;
        }
    }

    /// The primitive this component instantiates, if any.
    #[inline]
    pub fn primitive(&self) -> Option<Primitive> {
        self.chip.primitive_kind()
    }

    fn pins(&self, direction: Direction) -> &[Pin] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    fn pins_mut(&mut self, direction: Direction) -> &mut [Pin] {
        match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        }
    }
}

/// A directed connection from an output pin to an input pin.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    /// The driving output pin.
    pub from: PinRef,
    /// The receiving input pin.
    pub to: PinRef,
}

/// An error connecting two pins.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum ConnectError {
    /// A pin handle does not refer to an existing pin.
    #[error("no such pin: {0}")]
    NoSuchPin(PinRef),
    /// The driving end of a wire is not an output.
    #[error("{0} is not an output pin")]
    NotAnOutput(PinRef),
    /// The receiving end of a wire is not an input.
    #[error("{0} is not an input pin")]
    NotAnInput(PinRef),
    /// The input already has a driver.
    #[error("{to} is already driven by {driver}")]
    InputAlreadyDriven {
        /// The input being connected.
        to: PinRef,
        /// The existing driver.
        driver: PinRef,
    },
    /// The pins have different widths.
    #[error("cannot connect {from_width}-bit {from} to {to_width}-bit {to}")]
    WidthMismatch {
        /// The output pin.
        from: PinRef,
        /// The output pin width.
        from_width: usize,
        /// The input pin.
        to: PinRef,
        /// The input pin width.
        to_width: usize,
    },
}

/// A chip built from other chips.
#[derive(Clone, Debug, Default)]
pub struct CompositeChip {
    name: ArcStr,
    components: Vec<ComponentInstance>,
    wires: Vec<Wire>,
    inputs: Vec<ComponentId>,
    outputs: Vec<ComponentId>,
}

impl CompositeChip {
    /// Creates an empty composite chip.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The name of the chip.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Adds a component, returning its ID.
    ///
    /// [`Primitive::SignalIn`] and [`Primitive::SignalOut`] components become
    /// part of the chip's interface, in the order they are added.
    pub fn add_component(&mut self, component: ComponentInstance) -> ComponentId {
        let id = ComponentId(self.components.len());
        match component.primitive() {
            Some(Primitive::SignalIn) => self.inputs.push(id),
            Some(Primitive::SignalOut) => self.outputs.push(id),
            _ => (),
        }
        self.components.push(component);
        id
    }

    /// Gets the component with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no component has the given ID.
    #[inline]
    pub fn component(&self, id: ComponentId) -> &ComponentInstance {
        &self.components[id.0]
    }

    /// The components of the chip, in stored order.
    #[inline]
    pub fn components(&self) -> &[ComponentInstance] {
        &self.components
    }

    /// Every connection made in this chip, in the order it was made.
    #[inline]
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// The `SIGNAL IN` components, in interface order.
    #[inline]
    pub fn interface_inputs(&self) -> &[ComponentId] {
        &self.inputs
    }

    /// The `SIGNAL OUT` components, in interface order.
    #[inline]
    pub fn interface_outputs(&self) -> &[ComponentId] {
        &self.outputs
    }

    /// Looks up a pin.
    pub fn pin(&self, pin: PinRef) -> Option<&Pin> {
        self.components.get(pin.component.0)?.pins(pin.direction).get(pin.slot)
    }

    fn pin_mut(&mut self, pin: PinRef) -> Option<&mut Pin> {
        self.components
            .get_mut(pin.component.0)?
            .pins_mut(pin.direction)
            .get_mut(pin.slot)
    }

    /// Sets the cyclic flag of an input pin.
    ///
    /// Returns `false` if the pin does not exist.
    pub fn set_cyclic(&mut self, pin: PinRef, cyclic: bool) -> bool {
        match self.pin_mut(pin) {
            Some(p) if p.direction == Direction::Input => {
                p.cyclic = cyclic;
                true
            }
            _ => false,
        }
    }

    /// Connects output pin `from` to input pin `to`.
    ///
    /// An input accepts at most one driver, and both pins must have the same width.
    /// On failure the chip is left unchanged.
    pub fn try_connect(&mut self, from: PinRef, to: PinRef) -> Result<(), ConnectError> {
        if from.direction != Direction::Output {
            return Err(ConnectError::NotAnOutput(from));
        }
        if to.direction != Direction::Input {
            return Err(ConnectError::NotAnInput(to));
        }
        let from_width = self.pin(from).ok_or(ConnectError::NoSuchPin(from))?.width;
        let input = self.pin_mut(to).ok_or(ConnectError::NoSuchPin(to))?;
        if let Some(driver) = input.driver {
            return Err(ConnectError::InputAlreadyDriven { to, driver });
        }
        if input.width != from_width {
            return Err(ConnectError::WidthMismatch {
                from,
                from_width,
                to,
                to_width: input.width,
            });
        }
        input.driver = Some(from);
        self.wires.push(Wire { from, to });
        Ok(())
    }

    /// The wires driven by the given output pin.
    pub fn fanout(&self, from: PinRef) -> impl Iterator<Item = &Wire> {
        self.wires.iter().filter(move |w| w.from == from)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn two_nots() -> CompositeChip {
        let not = Arc::new(Primitive::Not.template());
        let mut chip = CompositeChip::new("pair");
        chip.add_component(ComponentInstance::new(not.clone(), Position::default()));
        chip.add_component(ComponentInstance::new(not, Position::default()));
        chip
    }

    #[test]
    fn second_driver_is_rejected() {
        let mut chip = two_nots();
        let a = ComponentId(0);
        let b = ComponentId(1);
        chip.try_connect(PinRef::output(a, 0), PinRef::input(b, 0))
            .unwrap();
        let err = chip
            .try_connect(PinRef::output(b, 0), PinRef::input(b, 0))
            .unwrap_err();
        assert_eq!(
            err,
            ConnectError::InputAlreadyDriven {
                to: PinRef::input(b, 0),
                driver: PinRef::output(a, 0),
            }
        );
        assert_eq!(chip.pin(PinRef::input(b, 0)).unwrap().driver, Some(PinRef::output(a, 0)));
        assert_eq!(chip.wires().len(), 1);
    }

    #[test]
    fn connection_checks_roles_and_widths() {
        let mut chip = two_nots();
        let a = ComponentId(0);
        let b = ComponentId(1);
        assert!(matches!(
            chip.try_connect(PinRef::input(a, 0), PinRef::input(b, 0)),
            Err(ConnectError::NotAnOutput(_))
        ));
        assert!(matches!(
            chip.try_connect(PinRef::output(a, 0), PinRef::input(ComponentId(7), 0)),
            Err(ConnectError::NoSuchPin(_))
        ));

        let mut wide = ComponentInstance::new(Arc::new(Primitive::Not.template()), Position::default());
        wide.apply_saved_pins(&[SavedInputPin::new("in", 4)], &[]);
        let c = chip.add_component(wide);
        assert!(matches!(
            chip.try_connect(PinRef::output(a, 0), PinRef::input(c, 0)),
            Err(ConnectError::WidthMismatch { from_width: 1, to_width: 4, .. })
        ));
        assert!(chip.wires().is_empty());
        assert!(chip.pin(PinRef::input(c, 0)).unwrap().driver.is_none());
    }

    #[test]
    fn fanout_lists_all_receivers() {
        let mut chip = two_nots();
        let c = chip.add_component(ComponentInstance::new(
            Arc::new(Primitive::And.template()),
            Position::default(),
        ));
        let from = PinRef::output(ComponentId(0), 0);
        chip.try_connect(from, PinRef::input(c, 0)).unwrap();
        chip.try_connect(from, PinRef::input(c, 1)).unwrap();
        chip.try_connect(from, PinRef::input(ComponentId(1), 0)).unwrap();
        assert_eq!(chip.fanout(from).count(), 3);
    }

    #[test]
    fn saved_pins_apply_to_shared_prefix() {
        let mut and = ComponentInstance::new(Arc::new(Primitive::And.template()), Position::default());
        and.apply_saved_pins(
            &[SavedInputPin::new("x", 1)],
            &[SavedOutputPin { name: "y".into(), width: 1 }, SavedOutputPin { name: "extra".into(), width: 1 }],
        );
        assert_eq!(and.inputs[0].name, "x");
        assert_eq!(and.inputs[1].name, "b");
        assert_eq!(and.outputs.len(), 1);
        assert_eq!(and.outputs[0].name, "y");
    }
}
