//! Builtin chips.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chip::{Chip, PinSpec};
use crate::definition::{SIGNAL_IN, SIGNAL_OUT};
use crate::signal::{Bit, Signal};

/// A chip whose behavior is implemented natively.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// An external input of a composite chip.
    SignalIn,
    /// An external output of a composite chip.
    SignalOut,
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise NOT.
    Not,
    /// Bitwise XOR.
    Xor,
    /// Passes `data` through while `enable` is high, otherwise outputs high impedance.
    TriStateBuffer,
    /// Joins two drivers onto one bus point.
    Bus,
}

impl Primitive {
    /// Every primitive that can be placed as a named chip.
    ///
    /// Excludes the interface sentinels.
    pub const BUILTIN: [Primitive; 6] = [
        Self::And,
        Self::Or,
        Self::Not,
        Self::Xor,
        Self::TriStateBuffer,
        Self::Bus,
    ];

    /// The canonical chip name of this primitive.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::SignalIn => SIGNAL_IN,
            Self::SignalOut => SIGNAL_OUT,
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Xor => "XOR",
            Self::TriStateBuffer => "TRI-STATE BUFFER",
            Self::Bus => "BUS",
        }
    }

    /// Looks up a primitive by chip name.
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::SignalIn, Self::SignalOut]
            .into_iter()
            .chain(Self::BUILTIN)
            .find(|p| p.name() == name)
    }

    /// The interface sentinel with the given chip name, if any.
    pub fn sentinel(name: &str) -> Option<Self> {
        match name {
            SIGNAL_IN => Some(Self::SignalIn),
            SIGNAL_OUT => Some(Self::SignalOut),
            _ => None,
        }
    }

    /// A template chip for this primitive with single-bit pins.
    pub fn template(&self) -> Chip {
        let pins = |names: &[&str]| -> Vec<PinSpec> {
            names.iter().map(|&n| PinSpec::new(n, 1)).collect()
        };
        let (inputs, outputs) = match *self {
            Self::SignalIn => (pins(&[]), pins(&["out"])),
            Self::SignalOut => (pins(&["in"]), pins(&[])),
            Self::And | Self::Or | Self::Xor | Self::Bus => (pins(&["a", "b"]), pins(&["out"])),
            Self::Not => (pins(&["in"]), pins(&["out"])),
            Self::TriStateBuffer => (pins(&["data", "enable"]), pins(&["out"])),
        };
        Chip::primitive(self.name(), *self, inputs, outputs)
    }

    /// Computes output values from input values.
    ///
    /// Missing inputs read as high impedance. One signal is returned per entry
    /// of `output_widths`.
    pub fn process_output(&self, inputs: &[Signal], output_widths: &[usize]) -> Vec<Signal> {
        let input = |i: usize| inputs.get(i).cloned().unwrap_or_default();
        let width = output_widths.first().copied().unwrap_or_default();
        let out = match *self {
            Self::SignalOut => return Vec::new(),
            Self::SignalIn => input(0).resize(width),
            Self::And => input(0).zip_with(&input(1), width, |a, b| {
                Bit::from(a.is_high() && b.is_high())
            }),
            Self::Or => input(0).zip_with(&input(1), width, |a, b| {
                Bit::from(a.is_high() || b.is_high())
            }),
            Self::Xor => input(0).zip_with(&input(1), width, |a, b| {
                Bit::from(a.is_high() != b.is_high())
            }),
            Self::Not => (0..width)
                .map(|i| Bit::from(!input(0).bit(i).is_high()))
                .collect(),
            Self::TriStateBuffer => {
                if input(1).to_u64() == Some(1) {
                    input(0)
                } else {
                    Signal::high_z(width)
                }
            }
            Self::Bus => {
                let (a, b) = (input(0), input(1));
                Signal::resolve([&a, &b], width).unwrap_or_else(|err| {
                    warn!(a = %a, b = %b, "{err}");
                    Signal::high_z(width)
                })
            }
        };
        let mut outputs = vec![out];
        outputs.extend(output_widths.iter().skip(1).map(|&w| Signal::high_z(w)));
        outputs
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Templates for every builtin chip.
pub fn builtin_chips() -> Vec<Chip> {
    Primitive::BUILTIN.iter().map(|p| p.template()).collect()
}
