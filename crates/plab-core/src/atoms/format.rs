//! Declared grammars for atom dump files.
//!
//! Every input file is read with exactly one grammar, chosen by the caller.
//! No grammar falls back to another one when its delimiter is absent.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::extract::{Atom, extract_atom};

/// Ordered set of canonical atoms.
pub type AtomSet = BTreeSet<Atom>;

/// Serialization style of an atom dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AtomFormat {
    /// Python list repr: `['Atom on(a, b)', 'Atom clear(c)']`.
    ///
    /// Nested lists (`[[...], [...]]`) are flattened by rewriting the
    /// `'], ['` joint into an item separator. Items are separated by `', '`.
    ListRepr,
    /// Items separated by single spaces: `on(a,b) clear(c)`.
    SpaceSeparated,
    /// Items separated by commas: `on(ab),clear(c)`.
    CommaSeparated,
}

impl AtomFormat {
    /// Split `content` into raw item fragments according to this grammar.
    pub fn tokenize(&self, content: &str) -> Vec<String> {
        let content = content.trim();
        match self {
            Self::ListRepr => content
                .replace("'], ['", "', '")
                .split("', '")
                .map(str::to_owned)
                .collect(),
            Self::SpaceSeparated => content.split(' ').map(str::to_owned).collect(),
            Self::CommaSeparated => content.split(',').map(str::to_owned).collect(),
        }
    }
}

impl fmt::Display for AtomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ListRepr => "list-repr",
            Self::SpaceSeparated => "space-separated",
            Self::CommaSeparated => "comma-separated",
        };
        f.write_str(s)
    }
}

impl FromStr for AtomFormat {
    type Err = AtomFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list-repr" => Ok(Self::ListRepr),
            "space-separated" => Ok(Self::SpaceSeparated),
            "comma-separated" => Ok(Self::CommaSeparated),
            other => Err(AtomFormatParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AtomFormat`] name.
#[derive(Debug, Clone, Error)]
#[error("invalid atom format {0:?} (expected list-repr, space-separated, or comma-separated)")]
pub struct AtomFormatParseError(pub String);

/// Errors raised while reading an atom dump from disk.
#[derive(Debug, Error)]
pub enum AtomFileError {
    #[error("failed to read atom file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse every positive atom out of `content` using `format`.
pub fn parse_atoms(format: AtomFormat, content: &str) -> AtomSet {
    format
        .tokenize(content)
        .iter()
        .filter_map(|item| extract_atom(item))
        .collect()
}

/// Read and parse an atom dump file.
pub fn read_atom_file(path: &Path, format: AtomFormat) -> Result<AtomSet, AtomFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| AtomFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let atoms = parse_atoms(format, &content);
    tracing::debug!(
        path = %path.display(),
        %format,
        atoms = atoms.len(),
        "parsed atom file"
    );
    Ok(atoms)
}
