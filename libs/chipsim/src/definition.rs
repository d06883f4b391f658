//! Persisted chip records.
//!
//! A [`ChipDefinition`] is the saved form of a composite chip. Its
//! [`SavedWireLayout`] carries editor geometry for the chip's wires and is
//! stored separately.

use arcstr::ArcStr;
use serde::{Deserialize, Deserializer, Serialize};

/// The chip name of an external input pin component.
pub const SIGNAL_IN: &str = "SIGNAL IN";
/// The chip name of an external output pin component.
pub const SIGNAL_OUT: &str = "SIGNAL OUT";

/// Returns `true` if `name` is one of the interface sentinels,
/// [`SIGNAL_IN`] or [`SIGNAL_OUT`].
#[inline]
pub fn is_sentinel(name: &str) -> bool {
    name == SIGNAL_IN || name == SIGNAL_OUT
}

/// Returns `true` if `name` can be used as a saved chip name.
///
/// Saved records are keyed by chip name, so a name must not be empty and must
/// not contain path separators, `..` or NUL.
pub fn is_valid_chip_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

/// A 2D position in editor coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// The x coordinate.
    pub x: f32,
    /// The y coordinate.
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The saved form of a composite chip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChipDefinition {
    /// The unique name of the chip.
    pub name: ArcStr,
    /// The chip's components, in stored order.
    ///
    /// Saved connections refer to components by their index in this list.
    pub components: Vec<ComponentRef>,
}

/// A component placed inside a [`ChipDefinition`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    /// The name of the chip this component instantiates.
    pub chip_name: ArcStr,
    /// The x position of the component.
    pub pos_x: f32,
    /// The y position of the component.
    pub pos_y: f32,
    /// Saved input pin overrides, in pin slot order.
    #[serde(default)]
    pub input_pins: Vec<SavedInputPin>,
    /// Saved output pin overrides, in pin slot order.
    #[serde(default)]
    pub output_pins: Vec<SavedOutputPin>,
}

/// A saved input pin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedInputPin {
    /// The pin name.
    pub name: ArcStr,
    /// The pin width in bits.
    #[serde(default = "default_width")]
    pub width: usize,
    /// The index of the component driving this pin, if any.
    #[serde(default, deserialize_with = "deserialize_index")]
    pub parent_chip_index: Option<usize>,
    /// The output pin slot on the driving component.
    #[serde(default, deserialize_with = "deserialize_index")]
    pub parent_chip_output_index: Option<usize>,
    /// Whether this pin may read a value from the previous evaluation cycle.
    #[serde(default)]
    pub is_cyclic: bool,
}

/// A saved output pin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedOutputPin {
    /// The pin name.
    pub name: ArcStr,
    /// The pin width in bits.
    #[serde(default = "default_width")]
    pub width: usize,
}

/// Geometry for the wires of one chip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedWireLayout {
    /// The chip this layout belongs to.
    pub chip_name: ArcStr,
    /// One record per wire.
    #[serde(default)]
    pub wires: Vec<SavedWire>,
}

/// Geometry for a single wire, keyed by its endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedWire {
    /// The component index of the driving component.
    pub parent_chip_index: usize,
    /// The output pin slot on the driving component.
    pub parent_chip_output_index: usize,
    /// The component index of the receiving component.
    pub child_chip_index: usize,
    /// The input pin slot on the receiving component.
    pub child_chip_input_index: usize,
    /// Intermediate anchor points.
    #[serde(default)]
    pub anchor_points: Vec<Position>,
}

/// A connection recorded on a saved input pin.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct SavedConnection {
    /// The driving component.
    pub parent: usize,
    /// The output slot on the driving component.
    ///
    /// [`None`] if the record names a parent but no output.
    pub parent_output: Option<usize>,
    /// The receiving component.
    pub child: usize,
    /// The input slot on the receiving component.
    pub child_input: usize,
    /// Whether the receiving pin is cyclic.
    pub cyclic: bool,
}

fn default_width() -> usize {
    1
}

/// Reads an optional index, treating `null` and negative values as absent.
fn deserialize_index<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    let value = Option::<i64>::deserialize(d)?;
    Ok(value.and_then(|v| usize::try_from(v).ok()))
}

impl ChipDefinition {
    /// Creates an empty definition.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Appends a component, returning its index.
    pub fn add_component(&mut self, component: ComponentRef) -> usize {
        self.components.push(component);
        self.components.len() - 1
    }

    /// Builder form of [`ChipDefinition::add_component`].
    pub fn with_component(mut self, component: ComponentRef) -> Self {
        self.add_component(component);
        self
    }

    /// The names of the chips this definition depends on.
    ///
    /// Names appear in order of first use and without duplicates.
    /// The interface sentinels are included; callers skip them with [`is_sentinel`].
    pub fn dependencies(&self) -> Vec<ArcStr> {
        let mut deps: Vec<ArcStr> = Vec::new();
        for c in self.components.iter() {
            if !deps.contains(&c.chip_name) {
                deps.push(c.chip_name.clone());
            }
        }
        deps
    }

    /// Iterates over the non-sentinel dependencies of this definition.
    pub fn chip_dependencies(&self) -> impl Iterator<Item = ArcStr> {
        self.dependencies().into_iter().filter(|d| !is_sentinel(d))
    }

    /// The connections stored on this definition's input pins.
    pub fn wires(&self) -> impl Iterator<Item = SavedConnection> + '_ {
        self.components
            .iter()
            .enumerate()
            .flat_map(|(child, c)| {
                c.input_pins
                    .iter()
                    .enumerate()
                    .filter_map(move |(child_input, pin)| {
                        Some(SavedConnection {
                            parent: pin.parent_chip_index?,
                            parent_output: pin.parent_chip_output_index,
                            child,
                            child_input,
                            cyclic: pin.is_cyclic,
                        })
                    })
            })
    }

    /// Parses a definition from its JSON record.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serializes this definition as a pretty-printed JSON record.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl ComponentRef {
    /// Creates a component of the given chip at the given position, with no pin overrides.
    pub fn new(chip_name: impl Into<ArcStr>, position: Position) -> Self {
        Self {
            chip_name: chip_name.into(),
            pos_x: position.x,
            pos_y: position.y,
            input_pins: Vec::new(),
            output_pins: Vec::new(),
        }
    }

    /// A [`SIGNAL_IN`] component exposing an input of the given name and width.
    pub fn signal_in(name: impl Into<ArcStr>, width: usize) -> Self {
        Self::new(SIGNAL_IN, Position::default()).with_output(name, width)
    }

    /// A [`SIGNAL_OUT`] component exposing an output of the given name and width.
    pub fn signal_out(name: impl Into<ArcStr>, width: usize) -> Self {
        Self::new(SIGNAL_OUT, Position::default()).with_input(SavedInputPin::new(name, width))
    }

    /// The component's position.
    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.pos_x, self.pos_y)
    }

    /// Appends a saved input pin.
    pub fn with_input(mut self, pin: SavedInputPin) -> Self {
        self.input_pins.push(pin);
        self
    }

    /// Appends a saved output pin.
    pub fn with_output(mut self, name: impl Into<ArcStr>, width: usize) -> Self {
        self.output_pins.push(SavedOutputPin {
            name: name.into(),
            width,
        });
        self
    }
}

impl SavedInputPin {
    /// An unconnected input pin.
    pub fn new(name: impl Into<ArcStr>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
            ..Default::default()
        }
    }

    /// Records that this pin is driven by output `output` of component `component`.
    pub fn driven_by(mut self, component: usize, output: usize) -> Self {
        self.parent_chip_index = Some(component);
        self.parent_chip_output_index = Some(output);
        self
    }

    /// Marks this pin as cyclic.
    pub fn cyclic(mut self) -> Self {
        self.is_cyclic = true;
        self
    }
}

impl SavedWireLayout {
    /// Parses a layout from its JSON record.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serializes this layout as a pretty-printed JSON record.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
