//! Static checks on chip definitions.
//!
//! Validation runs on definitions before they are loaded and reports problems
//! that loading would otherwise tolerate silently or report only as a failed chip.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use tracing::{span, Level};

use crate::chip::Chip;
use crate::definition::{is_sentinel, ChipDefinition, SIGNAL_IN, SIGNAL_OUT};
use crate::issues::{Diagnostic, IssueSet, Severity};
use crate::store::ChipStore;

/// An issue identified during validation.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidatorIssue {
    cause: Cause,
    severity: Severity,
}

/// The cause of a [`ValidatorIssue`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Cause {
    /// Two definitions have the same name.
    DuplicateChipName {
        /// The shared name.
        name: ArcStr,
    },
    /// A definition has the same name as a builtin chip.
    ShadowsBuiltin {
        /// The shared name.
        name: ArcStr,
    },
    /// A component uses a chip that is neither saved nor builtin.
    MissingDependency {
        /// The chip containing the component.
        chip: ArcStr,
        /// The unknown chip.
        dependency: ArcStr,
    },
    /// A chip contains a component of itself.
    SelfReference {
        /// The chip.
        chip: ArcStr,
        /// The offending component.
        component: usize,
    },
    /// A saved input pin names a driving component that does not exist.
    ParentIndexOutOfRange {
        /// The chip.
        chip: ArcStr,
        /// The component owning the input pin.
        component: usize,
        /// The input pin slot.
        pin: usize,
        /// The saved parent index.
        parent: usize,
        /// The number of components in the chip.
        num_components: usize,
    },
    /// A saved input pin names an output slot its driving component does not have.
    ParentOutputIndexOutOfRange {
        /// The chip.
        chip: ArcStr,
        /// The component owning the input pin.
        component: usize,
        /// The input pin slot.
        pin: usize,
        /// The saved parent index.
        parent: usize,
        /// The saved output slot.
        output: usize,
        /// The number of outputs saved on the parent.
        num_outputs: usize,
    },
    /// An interface component carries more than one pin record.
    MultipleInterfacePinRecords {
        /// The chip.
        chip: ArcStr,
        /// The interface component.
        component: usize,
        /// The number of pin records found.
        count: usize,
    },
}

impl Diagnostic for ValidatorIssue {
    fn severity(&self) -> Severity {
        self.severity
    }

    fn help(&self) -> Option<String> {
        match &self.cause {
            Cause::MissingDependency { dependency, .. } => Some(format!(
                "save or import a chip named `{dependency}` before loading"
            )),
            Cause::ShadowsBuiltin { name } => Some(format!(
                "rename the saved chip; `{name}` always refers to the builtin"
            )),
            _ => None,
        }
    }
}

impl ValidatorIssue {
    pub(crate) fn new(cause: Cause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    /// The underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Creates a new issue and logs it at the level matching its severity.
    pub(crate) fn new_and_log(cause: Cause, severity: Severity) -> Self {
        let result = Self::new(cause, severity);
        match severity {
            Severity::Warning => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
            Severity::Error => tracing::event!(Level::ERROR, issue = ?result.cause, "{}", result),
        }
        result
    }
}

impl Display for ValidatorIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateChipName { name } => {
                write!(f, "duplicate chip names: found two or more chips named `{name}`")
            }
            Self::ShadowsBuiltin { name } => {
                write!(f, "saved chip `{name}` has the same name as a builtin chip")
            }
            Self::MissingDependency { chip, dependency } => write!(
                f,
                "missing dependency: chip `{chip}` uses `{dependency}`, which does not exist"
            ),
            Self::SelfReference { chip, component } => write!(
                f,
                "self reference: component {component} of chip `{chip}` is the chip itself"
            ),
            Self::ParentIndexOutOfRange {
                chip,
                component,
                pin,
                parent,
                num_components,
            } => write!(
                f,
                "input {pin} of component {component} in chip `{chip}` is driven by component {parent}, but the chip has {num_components} components"
            ),
            Self::ParentOutputIndexOutOfRange {
                chip,
                component,
                pin,
                parent,
                output,
                num_outputs,
            } => write!(
                f,
                "input {pin} of component {component} in chip `{chip}` is driven by output {output} of component {parent}, which has {num_outputs} outputs"
            ),
            Self::MultipleInterfacePinRecords {
                chip,
                component,
                count,
            } => write!(
                f,
                "interface component {component} of chip `{chip}` has {count} pin records; only the first is used"
            ),
        }
    }
}

/// Validates a set of definitions against each other and the given builtins.
pub fn validate<'a>(
    defs: impl IntoIterator<Item = &'a ChipDefinition>,
    builtins: &[Chip],
) -> IssueSet<ValidatorIssue> {
    let _guard = span!(Level::INFO, "validate chips").entered();
    let defs: Vec<&ChipDefinition> = defs.into_iter().collect();
    let builtin_names: HashSet<&str> = builtins.iter().map(|b| b.name.as_str()).collect();
    let mut issues = IssueSet::new();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for def in defs.iter() {
        *counts.entry(def.name.as_str()).or_default() += 1;
    }
    let mut reported = HashSet::new();
    for def in defs.iter() {
        if counts[def.name.as_str()] > 1 && reported.insert(def.name.clone()) {
            issues.add(ValidatorIssue::new_and_log(
                Cause::DuplicateChipName {
                    name: def.name.clone(),
                },
                Severity::Warning,
            ));
        }
        if builtin_names.contains(def.name.as_str()) {
            issues.add(ValidatorIssue::new_and_log(
                Cause::ShadowsBuiltin {
                    name: def.name.clone(),
                },
                Severity::Warning,
            ));
        }
    }

    for def in defs.iter() {
        validate_definition(def, &counts, &builtin_names, &mut issues);
    }
    issues
}

fn validate_definition(
    def: &ChipDefinition,
    saved: &HashMap<&str, usize>,
    builtins: &HashSet<&str>,
    issues: &mut IssueSet<ValidatorIssue>,
) {
    for dependency in def.chip_dependencies() {
        if !saved.contains_key(dependency.as_str()) && !builtins.contains(dependency.as_str()) {
            issues.add(ValidatorIssue::new_and_log(
                Cause::MissingDependency {
                    chip: def.name.clone(),
                    dependency,
                },
                Severity::Error,
            ));
        }
    }

    let num_components = def.components.len();
    for (i, c) in def.components.iter().enumerate() {
        if c.chip_name == def.name {
            issues.add(ValidatorIssue::new_and_log(
                Cause::SelfReference {
                    chip: def.name.clone(),
                    component: i,
                },
                Severity::Error,
            ));
        }

        let interface_pins = match c.chip_name.as_str() {
            SIGNAL_IN => c.output_pins.len(),
            SIGNAL_OUT => c.input_pins.len(),
            _ => 0,
        };
        if is_sentinel(&c.chip_name) && interface_pins > 1 {
            issues.add(ValidatorIssue::new_and_log(
                Cause::MultipleInterfacePinRecords {
                    chip: def.name.clone(),
                    component: i,
                    count: interface_pins,
                },
                Severity::Warning,
            ));
        }

        for (pin, saved_pin) in c.input_pins.iter().enumerate() {
            let Some(parent) = saved_pin.parent_chip_index else {
                continue;
            };
            let Some(parent_ref) = def.components.get(parent) else {
                issues.add(ValidatorIssue::new_and_log(
                    Cause::ParentIndexOutOfRange {
                        chip: def.name.clone(),
                        component: i,
                        pin,
                        parent,
                        num_components,
                    },
                    Severity::Error,
                ));
                continue;
            };
            let num_outputs = parent_ref.output_pins.len();
            match saved_pin.parent_chip_output_index {
                Some(output) if num_outputs > 0 && output >= num_outputs => {
                    issues.add(ValidatorIssue::new_and_log(
                        Cause::ParentOutputIndexOutOfRange {
                            chip: def.name.clone(),
                            component: i,
                            pin,
                            parent,
                            output,
                            num_outputs,
                        },
                        Severity::Warning,
                    ));
                }
                _ => (),
            }
        }
    }
}

impl ChipStore {
    /// Validates the definitions in this store against each other and the given builtins.
    pub fn validate(&self, builtins: &[Chip]) -> IssueSet<ValidatorIssue> {
        validate(self.iter(), builtins)
    }
}
