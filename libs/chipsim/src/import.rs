//! Importing and exporting chip bundles.
//!
//! A bundle is line-oriented text:
//!
//! ```text
//! <number of chips>
//! <chip name>
//! <number of definition lines>
//! <number of wire layout lines>
//! <definition lines>
//! <wire layout lines>
//! ...
//! ```
//!
//! Imported chips whose names are taken are renamed with the smallest free
//! integer suffix, starting at 2. References to renamed chips are rewritten in
//! the `"name"` and `"chipName"` fields of the records that follow.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use thiserror::Error;
use tracing::{info, span, Level};
use uniquify::Names;

use crate::builtin::Primitive;
use crate::definition::{is_valid_chip_name, SavedWireLayout};
use crate::persist::{ChipPersistence, PersistError, RecordKind};

/// One chip in a bundle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BundleEntry {
    /// The chip name.
    pub name: ArcStr,
    /// The raw definition record. Every line ends with `\n`.
    pub save_data: String,
    /// The raw wire layout record. Every line ends with `\n`.
    pub wire_data: String,
}

/// A malformed bundle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BundleError {
    /// The bundle ended early.
    #[error("bundle ends at line {line}; expected {expected}")]
    MissingLine {
        /// The 1-based line number that is missing.
        line: usize,
        /// What the line should contain.
        expected: &'static str,
    },
    /// A count is not a non-negative integer.
    #[error("invalid count `{value}` on line {line}")]
    InvalidCount {
        /// The 1-based line number.
        line: usize,
        /// The text found.
        value: String,
    },
    /// A chip name cannot be used as a saved chip name.
    #[error("invalid chip name `{name}` on line {line}")]
    InvalidChipName {
        /// The 1-based line number.
        line: usize,
        /// The name found.
        name: String,
    },
}

/// An error importing or exporting a bundle.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The bundle file could not be read.
    #[error("failed to read bundle {path:?}")]
    Read {
        /// The bundle path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The bundle is malformed.
    #[error("malformed bundle")]
    Bundle(#[from] BundleError),
    /// Records could not be read or written.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// A chip to export has no saved record.
    #[error("no saved chip named `{0}`")]
    MissingChip(ArcStr),
}

/// A chip written by an import.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ImportedChip {
    /// The name in the bundle.
    pub original: ArcStr,
    /// The name it was saved under.
    pub name: ArcStr,
}

/// The chips written by an import, in bundle order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImportReport {
    /// Every imported chip.
    pub imported: Vec<ImportedChip>,
}

impl ImportReport {
    /// The imported chips that were saved under a new name.
    pub fn renamed(&self) -> impl Iterator<Item = &ImportedChip> {
        self.imported.iter().filter(|c| c.original != c.name)
    }
}

struct BundleLines<'a> {
    lines: std::str::Lines<'a>,
    line: usize,
}

impl<'a> BundleLines<'a> {
    fn next(&mut self, expected: &'static str) -> Result<&'a str, BundleError> {
        self.line += 1;
        self.lines.next().ok_or(BundleError::MissingLine {
            line: self.line,
            expected,
        })
    }

    fn count(&mut self, expected: &'static str) -> Result<usize, BundleError> {
        let text = self.next(expected)?.trim();
        text.parse().map_err(|_| BundleError::InvalidCount {
            line: self.line,
            value: text.to_string(),
        })
    }

    fn block(&mut self, n: usize, expected: &'static str) -> Result<String, BundleError> {
        let mut out = String::new();
        for _ in 0..n {
            out.push_str(self.next(expected)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Parses a bundle.
pub fn parse_bundle(text: &str) -> Result<Vec<BundleEntry>, BundleError> {
    let mut lines = BundleLines {
        lines: text.lines(),
        line: 0,
    };
    let n = lines.count("number of chips")?;
    let mut entries = Vec::new();
    for _ in 0..n {
        let name = lines.next("chip name")?;
        if !is_valid_chip_name(name) {
            return Err(BundleError::InvalidChipName {
                line: lines.line,
                name: name.to_string(),
            });
        }
        let name = ArcStr::from(name);
        let save_lines = lines.count("number of definition lines")?;
        let wire_lines = lines.count("number of wire layout lines")?;
        let save_data = lines.block(save_lines, "chip definition line")?;
        let wire_data = lines.block(wire_lines, "wire layout line")?;
        entries.push(BundleEntry {
            name,
            save_data,
            wire_data,
        });
    }
    Ok(entries)
}

const NAME_FIELDS: [&str; 2] = ["\"name\": \"", "\"chipName\": \""];

/// Rewrites `"name"` and `"chipName"` field values found in `renames`.
///
/// Values are matched exactly; other text is left untouched. Each value is
/// rewritten at most once, so renames do not chain.
pub fn rename_fields(text: &str, renames: &HashMap<ArcStr, ArcStr>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let next = NAME_FIELDS
            .iter()
            .filter_map(|field| rest.find(field).map(|i| i + field.len()))
            .min();
        let Some(value_start) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..value_start]);
        rest = &rest[value_start..];
        if let Some(end) = rest.find('"') {
            let value = &rest[..end];
            out.push_str(renames.get(value).map(|v| v.as_str()).unwrap_or(value));
            rest = &rest[end..];
        }
    }
}

/// Rewrites `"name": "<old>"` and `"chipName": "<old>"` to use `new`.
pub fn replace_name_fields(text: &str, old: &str, new: &str) -> String {
    rename_fields(text, &HashMap::from([(ArcStr::from(old), ArcStr::from(new))]))
}

/// Imports a bundle into `persistence`.
///
/// The whole bundle is parsed before anything is written. An I/O failure while
/// writing leaves the chips written so far in place.
pub fn import_bundle(
    text: &str,
    persistence: &mut impl ChipPersistence,
) -> Result<ImportReport, ImportError> {
    let _guard = span!(Level::INFO, "import_bundle").entered();
    let entries = parse_bundle(text)?;

    let mut names = Names::new();
    for existing in persistence.chip_names()? {
        names.reserve(existing);
    }
    for p in [Primitive::SignalIn, Primitive::SignalOut]
        .into_iter()
        .chain(Primitive::BUILTIN)
    {
        names.reserve(p.name());
    }

    let mut renames = HashMap::new();
    let mut report = ImportReport::default();
    for (i, entry) in entries.into_iter().enumerate() {
        let name = names.assign_name(i, &entry.name);
        if name != entry.name {
            info!(original = %entry.name, name = %name, "renaming imported chip");
            renames.insert(entry.name.clone(), name.clone());
        }
        persistence.write_chip_text(&name, &rename_fields(&entry.save_data, &renames))?;
        persistence.write_wire_text(&name, &rename_fields(&entry.wire_data, &renames))?;
        report.imported.push(ImportedChip {
            original: entry.name,
            name,
        });
    }
    info!(
        imported = report.imported.len(),
        renamed = report.renamed().count(),
        "imported bundle"
    );
    Ok(report)
}

/// Reads the bundle at `path` and imports it into `persistence`.
pub fn import(
    path: impl AsRef<Path>,
    persistence: &mut impl ChipPersistence,
) -> Result<ImportReport, ImportError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    import_bundle(&text, persistence)
}

/// Writes the named chips from `persistence` as a bundle.
///
/// A chip without a wire layout record is exported with an empty layout.
pub fn export_bundle<S: AsRef<str>>(
    names: &[S],
    persistence: &impl ChipPersistence,
) -> Result<String, ImportError> {
    let mut out = format!("{}\n", names.len());
    for name in names.iter().map(|n| n.as_ref()) {
        let chip = persistence
            .read_chip_text(name)?
            .ok_or_else(|| ImportError::MissingChip(name.into()))?;
        let wires = match persistence.read_wire_text(name)? {
            Some(wires) => wires,
            None => SavedWireLayout {
                chip_name: name.into(),
                wires: Vec::new(),
            }
            .to_json()
            .map_err(|source| PersistError::Serialize {
                name: name.into(),
                kind: RecordKind::Wires,
                source,
            })?,
        };
        out.push_str(&format!(
            "{name}\n{}\n{}\n",
            chip.lines().count(),
            wires.lines().count()
        ));
        for line in chip.lines().chain(wires.lines()) {
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn parse_reports_truncation() {
        let err = parse_bundle("1\nAND\n3\n0\n{\n").unwrap_err();
        assert_eq!(
            err,
            BundleError::MissingLine {
                line: 6,
                expected: "chip definition line"
            }
        );
    }

    #[test]
    fn parse_reports_bad_counts() {
        let err = parse_bundle("1\nAND\nthree\n0\n").unwrap_err();
        assert_eq!(
            err,
            BundleError::InvalidCount {
                line: 3,
                value: "three".to_string()
            }
        );
        assert!(matches!(
            parse_bundle("-1\n"),
            Err(BundleError::InvalidCount { line: 1, .. })
        ));
    }

    #[test]
    fn parse_rejects_path_like_names() {
        assert_eq!(
            parse_bundle("1\n../../escaped\n1\n0\n{}\n").unwrap_err(),
            BundleError::InvalidChipName {
                line: 2,
                name: "../../escaped".to_string()
            }
        );
        assert!(matches!(
            parse_bundle("1\n\n1\n0\n{}\n"),
            Err(BundleError::InvalidChipName { line: 2, .. })
        ));
    }

    #[test]
    fn parse_keeps_lines_verbatim() {
        let entries = parse_bundle("1\r\nX\r\n2\r\n1\r\n{\r\n  }\r\n[]\r\n").unwrap();
        assert_eq!(
            entries,
            vec![BundleEntry {
                name: "X".into(),
                save_data: "{\n  }\n".to_string(),
                wire_data: "[]\n".to_string(),
            }]
        );
    }

    #[test]
    fn replacement_is_field_scoped() {
        let text = r#"{ "name": "AND", "label": "AND", "chipName": "AND", "pin": { "name": "ANDY" }, "chipName": "AND2" }"#;
        assert_eq!(
            replace_name_fields(text, "AND", "AND3"),
            r#"{ "name": "AND3", "label": "AND", "chipName": "AND3", "pin": { "name": "ANDY" }, "chipName": "AND2" }"#
        );
    }

    #[test]
    fn renames_do_not_chain() {
        let renames = HashMap::from([
            (ArcStr::from("AND"), ArcStr::from("AND3")),
            (ArcStr::from("AND3"), ArcStr::from("AND32")),
        ]);
        assert_eq!(
            rename_fields(r#""chipName": "AND", "chipName": "AND3""#, &renames),
            r#""chipName": "AND3", "chipName": "AND32""#
        );
    }
}
