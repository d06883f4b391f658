//! Reading and writing chip records.
//!
//! Every chip has two records: its [`ChipDefinition`] and its
//! [`SavedWireLayout`]. A [`ChipPersistence`] stores them as text keyed by chip
//! name.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use thiserror::Error;
use tracing::{debug, span, Level};

use crate::chip::ChipFactory;
use crate::config::Config;
use crate::definition::{is_valid_chip_name, ChipDefinition, SavedWireLayout};
use crate::instantiate::{instantiate_with_wires, EditableChip, InstantiateError};
use crate::store::ChipStore;

/// The kind of a persisted record.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum RecordKind {
    /// A chip definition.
    Chip,
    /// A wire layout.
    Wires,
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Chip => write!(f, "chip"),
            Self::Wires => write!(f, "wire layout"),
        }
    }
}

/// An error reading or writing chip records.
#[derive(Debug, Error)]
pub enum PersistError {
    /// A record could not be read.
    #[error("failed to read {path:?}")]
    Read {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// A record could not be written.
    #[error("failed to write {path:?}")]
    Write {
        /// The file being written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The list of saved chips could not be read.
    #[error("failed to list saved chips in {path:?}")]
    ListDir {
        /// The directory being listed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// A record is not valid JSON of the expected shape.
    #[error("malformed {kind} record for chip `{name}`")]
    Malformed {
        /// The chip name.
        name: ArcStr,
        /// The kind of record.
        kind: RecordKind,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be serialized.
    #[error("failed to serialize {kind} record for chip `{name}`")]
    Serialize {
        /// The chip name.
        name: ArcStr,
        /// The kind of record.
        kind: RecordKind,
        /// The serialization error.
        #[source]
        source: serde_json::Error,
    },
    /// A chip name cannot be used as a record key.
    #[error("invalid chip name `{0}`")]
    InvalidName(ArcStr),
    /// A saved chip could not be instantiated.
    #[error(transparent)]
    Instantiate(#[from] InstantiateError),
}

/// Storage for chip records.
pub trait ChipPersistence {
    /// The names of all saved chips, in a stable order.
    fn chip_names(&self) -> Result<Vec<ArcStr>, PersistError>;

    /// The raw definition record of `name`, if it exists.
    fn read_chip_text(&self, name: &str) -> Result<Option<String>, PersistError>;

    /// The raw wire layout record of `name`, if it exists.
    fn read_wire_text(&self, name: &str) -> Result<Option<String>, PersistError>;

    /// Writes the raw definition record of `name`.
    fn write_chip_text(&mut self, name: &str, text: &str) -> Result<(), PersistError>;

    /// Writes the raw wire layout record of `name`.
    fn write_wire_text(&mut self, name: &str, text: &str) -> Result<(), PersistError>;

    /// Reads and parses the definition record of `name`.
    fn read_chip(&self, name: &str) -> Result<Option<ChipDefinition>, PersistError> {
        self.read_chip_text(name)?
            .map(|text| {
                ChipDefinition::from_json(&text).map_err(|source| PersistError::Malformed {
                    name: name.into(),
                    kind: RecordKind::Chip,
                    source,
                })
            })
            .transpose()
    }

    /// Reads and parses the wire layout record of `name`.
    fn read_wire(&self, name: &str) -> Result<Option<SavedWireLayout>, PersistError> {
        self.read_wire_text(name)?
            .map(|text| {
                SavedWireLayout::from_json(&text).map_err(|source| PersistError::Malformed {
                    name: name.into(),
                    kind: RecordKind::Wires,
                    source,
                })
            })
            .transpose()
    }

    /// Serializes and writes a definition record under its own name.
    fn write_chip(&mut self, def: &ChipDefinition) -> Result<(), PersistError> {
        let text = def.to_json().map_err(|source| PersistError::Serialize {
            name: def.name.clone(),
            kind: RecordKind::Chip,
            source,
        })?;
        self.write_chip_text(&def.name, &text)
    }

    /// Serializes and writes a wire layout record under its chip's name.
    fn write_wire(&mut self, layout: &SavedWireLayout) -> Result<(), PersistError> {
        let text = layout.to_json().map_err(|source| PersistError::Serialize {
            name: layout.chip_name.clone(),
            kind: RecordKind::Wires,
            source,
        })?;
        self.write_wire_text(&layout.chip_name, &text)
    }
}

/// Chip records stored as `<name>.json` files in two subdirectories.
#[derive(Clone, Debug)]
pub struct SaveDir {
    chips: PathBuf,
    wires: PathBuf,
}

const EXTENSION: &str = "json";

impl SaveDir {
    /// A save directory rooted at `root`, with records in `root/chips` and `root/wires`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            chips: root.join("chips"),
            wires: root.join("wires"),
        }
    }

    /// A save directory laid out according to `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chips: config.chips_dir(),
            wires: config.wires_dir(),
        }
    }

    /// The directory holding definition records.
    #[inline]
    pub fn chips_dir(&self) -> &Path {
        &self.chips
    }

    /// The directory holding wire layout records.
    #[inline]
    pub fn wires_dir(&self) -> &Path {
        &self.wires
    }

    fn record_path(dir: &Path, name: &str) -> Result<PathBuf, PersistError> {
        if !is_valid_chip_name(name) {
            return Err(PersistError::InvalidName(name.into()));
        }
        Ok(dir.join(format!("{name}.{EXTENSION}")))
    }

    fn read(dir: &Path, name: &str) -> Result<Option<String>, PersistError> {
        let path = Self::record_path(dir, name)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Read { path, source }),
        }
    }

    fn write(dir: &Path, name: &str, text: &str) -> Result<(), PersistError> {
        let path = Self::record_path(dir, name)?;
        std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&path, text))
            .map_err(|source| PersistError::Write { path, source })
    }
}

impl ChipPersistence for SaveDir {
    fn chip_names(&self) -> Result<Vec<ArcStr>, PersistError> {
        let list_err = |source: io::Error| PersistError::ListDir {
            path: self.chips.clone(),
            source,
        };
        let entries = match std::fs::read_dir(&self.chips) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_err(e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(list_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(ArcStr::from(stem));
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_chip_text(&self, name: &str) -> Result<Option<String>, PersistError> {
        Self::read(&self.chips, name)
    }

    fn read_wire_text(&self, name: &str) -> Result<Option<String>, PersistError> {
        Self::read(&self.wires, name)
    }

    fn write_chip_text(&mut self, name: &str, text: &str) -> Result<(), PersistError> {
        Self::write(&self.chips, name, text)
    }

    fn write_wire_text(&mut self, name: &str, text: &str) -> Result<(), PersistError> {
        Self::write(&self.wires, name, text)
    }
}

/// Chip records held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryPersistence {
    chips: BTreeMap<ArcStr, String>,
    wires: BTreeMap<ArcStr, String>,
}

impl MemoryPersistence {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChipPersistence for MemoryPersistence {
    fn chip_names(&self) -> Result<Vec<ArcStr>, PersistError> {
        Ok(self.chips.keys().cloned().collect())
    }

    fn read_chip_text(&self, name: &str) -> Result<Option<String>, PersistError> {
        Ok(self.chips.get(name).cloned())
    }

    fn read_wire_text(&self, name: &str) -> Result<Option<String>, PersistError> {
        Ok(self.wires.get(name).cloned())
    }

    fn write_chip_text(&mut self, name: &str, text: &str) -> Result<(), PersistError> {
        self.chips.insert(name.into(), text.to_string());
        Ok(())
    }

    fn write_wire_text(&mut self, name: &str, text: &str) -> Result<(), PersistError> {
        self.wires.insert(name.into(), text.to_string());
        Ok(())
    }
}

/// Reads every saved chip definition into a store.
///
/// Fails on the first record that cannot be read or parsed.
pub fn get_all_saved_chips(persistence: &impl ChipPersistence) -> Result<ChipStore, PersistError> {
    let _guard = span!(Level::INFO, "get_all_saved_chips").entered();
    let mut defs = Vec::new();
    for name in persistence.chip_names()? {
        match persistence.read_chip(&name)? {
            Some(def) => defs.push(def),
            None => debug!(chip = %name, "listed chip has no record"),
        }
    }
    Ok(ChipStore::from_definitions(defs))
}

/// A saved chip together with its editable instantiation.
#[derive(Clone, Debug)]
pub struct ChipSaveData {
    /// The saved definition.
    pub definition: ChipDefinition,
    /// The chip, with wire records and anchor points applied.
    pub chip: EditableChip,
}

/// Reads the records of chip `name` and instantiates it for editing.
///
/// Returns [`None`] if no definition is saved under `name`.
pub fn get_chip_save_data(
    persistence: &impl ChipPersistence,
    name: &str,
    loaded: &impl ChipFactory,
) -> Result<Option<ChipSaveData>, PersistError> {
    let Some(definition) = persistence.read_chip(name)? else {
        return Ok(None);
    };
    let layout = persistence.read_wire(name)?;
    let chip = instantiate_with_wires(&definition, layout.as_ref(), loaded)?;
    Ok(Some(ChipSaveData { definition, chip }))
}
