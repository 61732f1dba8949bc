//! Canonicalization of a single atom fragment.
//!
//! Fragments come from loosely structured state dumps (Python list reprs,
//! planner printouts). Canonicalization is lossy and best-effort: anything
//! that does not look like a positive atom is dropped rather than reported.

use std::fmt;

/// Marker that prefixes positive atoms in translator dumps.
const ATOM_MARKER: &str = "Atom ";

/// Marker that identifies negated atoms, which are never kept.
const NEGATED_MARKER: &str = "NegatedAtom";

/// Placeholder value the translator emits for "none of those" variables.
const PLACEHOLDER: &str = "<noneofthose>";

/// A canonical ground atom such as `on(ab)`.
///
/// The canonical form has no whitespace and no commas, so `on(a, b)` and
/// `on(ab)` map to the same atom.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Atom(String);

impl Atom {
    /// The canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the atom and return its canonical string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Atom {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract the canonical atom from a raw fragment.
///
/// Rules are applied in order:
/// 1. list brackets and quote characters are removed;
/// 2. fragments mentioning `NegatedAtom` are rejected;
/// 3. every `Atom ` marker is removed;
/// 4. all whitespace and commas are removed;
/// 5. the `<noneofthose>` placeholder is removed;
/// 6. the result is kept only if it contains both `(` and `)`.
pub fn extract_atom(fragment: &str) -> Option<Atom> {
    let unquoted: String = fragment
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
        .collect();

    if unquoted.contains(NEGATED_MARKER) {
        return None;
    }

    let unmarked = unquoted.replace(ATOM_MARKER, "");

    let compact: String = unmarked
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    let canonical = compact.replace(PLACEHOLDER, "");

    if canonical.contains('(') && canonical.contains(')') {
        Some(Atom(canonical))
    } else {
        None
    }
}
