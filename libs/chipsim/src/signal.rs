//! Tri-state signal values.
//!
//! Every pin carries a [`Signal`]: a little-endian vector of [`Bit`]s whose
//! length is the pin width. [`Bit::HighZ`] marks a bit that is not currently
//! driven by anything.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The value of a single bit.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Bit {
    /// Driven logic 0.
    Low,
    /// Driven logic 1.
    High,
    /// High impedance (undriven).
    #[default]
    HighZ,
}

impl Bit {
    /// Returns `true` if this bit is driven low or high.
    #[inline]
    pub fn is_driven(&self) -> bool {
        !matches!(self, Self::HighZ)
    }

    /// The logic level seen by a gate input.
    ///
    /// Gates read an undriven bit as low.
    #[inline]
    pub fn is_high(&self) -> bool {
        matches!(self, Self::High)
    }

    /// Combines two drivers of the same bit.
    ///
    /// Returns [`None`] if both bits are driven to different levels.
    pub fn resolve(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::HighZ, b) | (b, Self::HighZ) => Some(b),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }
}

impl From<bool> for Bit {
    #[inline]
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl Display for Bit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Low => write!(f, "0"),
            Self::High => write!(f, "1"),
            Self::HighZ => write!(f, "Z"),
        }
    }
}

/// Two drivers asserted different levels on the same bus bit.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("conflicting drivers on bit {bit} of a shared bus")]
pub struct BusConflict {
    /// The index of the first conflicting bit.
    pub bit: usize,
}

/// A possibly multi-bit signal.
///
/// Bit 0 is the least significant bit.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signal(Vec<Bit>);

impl Signal {
    /// Creates a signal from the given bits, least significant bit first.
    #[inline]
    pub fn new(bits: Vec<Bit>) -> Self {
        Self(bits)
    }

    /// A signal of the given width with every bit undriven.
    #[inline]
    pub fn high_z(width: usize) -> Self {
        Self(vec![Bit::HighZ; width])
    }

    /// Encodes the low `width` bits of `value`.
    ///
    /// Bits above 64 are driven low.
    pub fn from_u64(value: u64, width: usize) -> Self {
        Self(
            (0..width)
                .map(|i| Bit::from(i < 64 && (value >> i) & 1 == 1))
                .collect(),
        )
    }

    /// Decodes this signal as an unsigned integer.
    ///
    /// Returns [`None`] if any bit is undriven or the signal is wider than 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0.len() > 64 {
            return None;
        }
        self.0.iter().enumerate().try_fold(0u64, |acc, (i, bit)| match bit {
            Bit::Low => Some(acc),
            Bit::High => Some(acc | (1 << i)),
            Bit::HighZ => None,
        })
    }

    /// The number of bits in this signal.
    #[inline]
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// The bits of this signal, least significant first.
    #[inline]
    pub fn bits(&self) -> &[Bit] {
        &self.0
    }

    /// The bit at index `i`, or [`Bit::HighZ`] if `i` is out of range.
    #[inline]
    pub fn bit(&self, i: usize) -> Bit {
        self.0.get(i).copied().unwrap_or_default()
    }

    /// Returns `true` if every bit is undriven.
    pub fn is_high_z(&self) -> bool {
        self.0.iter().all(|b| !b.is_driven())
    }

    /// Truncates or pads (with undriven bits) this signal to `width` bits.
    pub fn resize(&self, width: usize) -> Self {
        Self((0..width).map(|i| self.bit(i)).collect())
    }

    /// Applies `f` to each bit.
    pub fn map(&self, f: impl Fn(Bit) -> Bit) -> Self {
        Self(self.0.iter().map(|&b| f(b)).collect())
    }

    /// Combines two signals bit by bit into a signal of the given width.
    ///
    /// Missing bits on either side read as [`Bit::HighZ`].
    pub fn zip_with(&self, other: &Self, width: usize, f: impl Fn(Bit, Bit) -> Bit) -> Self {
        Self((0..width).map(|i| f(self.bit(i), other.bit(i))).collect())
    }

    /// Combines several drivers of one bus point.
    ///
    /// For each bit, a driven value wins over [`Bit::HighZ`].
    /// If two drivers assert different levels on the same bit,
    /// the combination is undefined and a [`BusConflict`] is returned.
    pub fn resolve<'a>(
        drivers: impl IntoIterator<Item = &'a Signal>,
        width: usize,
    ) -> Result<Self, BusConflict> {
        let mut out = Self::high_z(width);
        for driver in drivers {
            for (bit, slot) in out.0.iter_mut().enumerate() {
                *slot = slot
                    .resolve(driver.bit(bit))
                    .ok_or(BusConflict { bit })?;
            }
        }
        Ok(out)
    }
}

impl From<Bit> for Signal {
    #[inline]
    fn from(value: Bit) -> Self {
        Self(vec![value])
    }
}

impl From<bool> for Signal {
    #[inline]
    fn from(value: bool) -> Self {
        Bit::from(value).into()
    }
}

impl FromIterator<Bit> for Signal {
    fn from_iter<T: IntoIterator<Item = Bit>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Formats the signal most significant bit first, e.g. `10Z1`.
impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for bit in self.0.iter().rev() {
            write!(f, "{bit}")?;
        }
        Ok(())
    }
}
