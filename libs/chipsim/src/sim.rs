//! Signal propagation.
//!
//! A composite chip is evaluated once per cycle. Within a cycle, a component
//! runs once every non-cyclic input it reads has been computed. Cyclic inputs
//! read the value their driver produced in the previous cycle, which is what
//! lets latches and other feedback loops evaluate.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, span, Level};

use crate::chip::{Chip, ChipKind};
use crate::graph::{CompositeChip, Pin};
use crate::signal::Signal;

/// The default cycle limit for [`Simulation::settle`].
pub const DEFAULT_MAX_CYCLES: usize = 100;

/// An error during simulation.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub enum SimError {
    /// An input index is out of range.
    #[error("chip has {len} inputs, but input {index} was set")]
    NoSuchInput {
        /// The requested input.
        index: usize,
        /// The number of inputs.
        len: usize,
    },
    /// The chip did not reach a steady state.
    #[error("chip did not settle within {cycles} cycles")]
    Unstable {
        /// The number of cycles run.
        cycles: usize,
    },
}

/// Per-instance state kept between cycles.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChipState {
    /// Primitives are stateless.
    Primitive,
    /// The latest outputs of every component, and the state of each child.
    Composite {
        /// `outputs[component][slot]`.
        outputs: Vec<Vec<Signal>>,
        /// One state per component.
        children: Vec<ChipState>,
    },
}

impl ChipState {
    /// The initial state of `chip`, with every output undriven.
    pub fn new(chip: &Chip) -> Self {
        match &chip.kind {
            ChipKind::Primitive(_) => Self::Primitive,
            ChipKind::Composite(c) => Self::Composite {
                outputs: c
                    .components()
                    .iter()
                    .map(|comp| comp.outputs.iter().map(|p| Signal::high_z(p.width)).collect())
                    .collect(),
                children: c.components().iter().map(|comp| Self::new(&comp.chip)).collect(),
            },
        }
    }
}

/// Computes the outputs of `chip` for one cycle.
///
/// `output_widths` gives the width of each output pin of the instance being evaluated.
pub fn process_output(
    chip: &Chip,
    inputs: &[Signal],
    output_widths: &[usize],
    state: &mut ChipState,
) -> Vec<Signal> {
    match &chip.kind {
        ChipKind::Primitive(p) => p.process_output(inputs, output_widths),
        ChipKind::Composite(c) => {
            if !matches!(state, ChipState::Composite { .. }) {
                *state = ChipState::new(chip);
            }
            match state {
                ChipState::Composite { outputs, children } => {
                    eval_composite(c, inputs, output_widths, outputs, children)
                }
                ChipState::Primitive => output_widths.iter().map(|&w| Signal::high_z(w)).collect(),
            }
        }
    }
}

fn read(pin: &Pin, outputs: &[Vec<Signal>]) -> Signal {
    pin.driver
        .and_then(|d| outputs.get(d.component.index())?.get(d.slot).cloned())
        .unwrap_or_else(|| Signal::high_z(pin.width))
}

fn eval_composite(
    chip: &CompositeChip,
    inputs: &[Signal],
    output_widths: &[usize],
    outputs: &mut [Vec<Signal>],
    children: &mut [ChipState],
) -> Vec<Signal> {
    let components = chip.components();
    let mut done = vec![false; components.len()];

    for (i, &id) in chip.interface_inputs().iter().enumerate() {
        let value = inputs.get(i).cloned().unwrap_or_default();
        outputs[id.index()] = chip
            .component(id)
            .outputs
            .iter()
            .map(|p| value.resize(p.width))
            .collect();
        done[id.index()] = true;
    }
    for &id in chip.interface_outputs() {
        done[id.index()] = true;
    }

    loop {
        let ready = (0..components.len()).find(|&i| {
            !done[i]
                && components[i].inputs.iter().all(|pin| match pin.driver {
                    Some(d) if !pin.cyclic => done.get(d.component.index()).copied().unwrap_or(true),
                    _ => true,
                })
        });
        let next = ready.or_else(|| {
            let forced = done.iter().position(|d| !d)?;
            debug!(
                chip = %chip.name(),
                component = forced,
                "no component is ready; evaluating with stale inputs"
            );
            Some(forced)
        });
        let Some(i) = next else {
            break;
        };

        let component = &components[i];
        let args: Vec<Signal> = component.inputs.iter().map(|pin| read(pin, outputs)).collect();
        let widths: Vec<usize> = component.outputs.iter().map(|p| p.width).collect();
        outputs[i] = process_output(&component.chip, &args, &widths, &mut children[i]);
        done[i] = true;
    }

    chip.interface_outputs()
        .iter()
        .enumerate()
        .map(|(k, &id)| {
            let value = chip
                .component(id)
                .inputs
                .first()
                .map(|pin| read(pin, outputs))
                .unwrap_or_default();
            match output_widths.get(k) {
                Some(&w) => value.resize(w),
                None => value,
            }
        })
        .collect()
}

/// Runs a chip.
#[derive(Clone, Debug)]
pub struct Simulation {
    chip: Arc<Chip>,
    inputs: Vec<Signal>,
    outputs: Vec<Signal>,
    state: ChipState,
    cycles: usize,
}

impl Simulation {
    /// Creates a simulation of `chip` with every input undriven.
    pub fn new(chip: Arc<Chip>) -> Self {
        let inputs = chip.inputs.iter().map(|p| Signal::high_z(p.width)).collect();
        let outputs = chip.outputs.iter().map(|p| Signal::high_z(p.width)).collect();
        let state = ChipState::new(&chip);
        Self {
            chip,
            inputs,
            outputs,
            state,
            cycles: 0,
        }
    }

    /// The chip being simulated.
    #[inline]
    pub fn chip(&self) -> &Arc<Chip> {
        &self.chip
    }

    /// Sets the value of input `index`.
    pub fn set_input(&mut self, index: usize, value: impl Into<Signal>) -> Result<(), SimError> {
        let len = self.inputs.len();
        let slot = self
            .inputs
            .get_mut(index)
            .ok_or(SimError::NoSuchInput { index, len })?;
        *slot = value.into();
        Ok(())
    }

    /// The current input values.
    #[inline]
    pub fn inputs(&self) -> &[Signal] {
        &self.inputs
    }

    /// The output values computed by the last cycle.
    #[inline]
    pub fn outputs(&self) -> &[Signal] {
        &self.outputs
    }

    /// The number of cycles run so far.
    #[inline]
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Runs one evaluation cycle.
    pub fn step(&mut self) -> &[Signal] {
        let widths: Vec<usize> = self.chip.outputs.iter().map(|p| p.width).collect();
        self.outputs = process_output(&self.chip, &self.inputs, &widths, &mut self.state);
        self.cycles += 1;
        &self.outputs
    }

    /// Runs cycles until neither outputs nor internal state change.
    ///
    /// Fails with [`SimError::Unstable`] after `max_cycles` cycles without a steady state.
    pub fn settle(&mut self, max_cycles: usize) -> Result<&[Signal], SimError> {
        let _guard = span!(Level::DEBUG, "settle", chip = %self.chip.name).entered();
        for _ in 0..max_cycles {
            let state = self.state.clone();
            let outputs = self.outputs.clone();
            self.step();
            if self.state == state && self.outputs == outputs {
                return Ok(&self.outputs);
            }
        }
        Err(SimError::Unstable { cycles: max_cycles })
    }
}
