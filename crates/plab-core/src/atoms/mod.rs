//! Atom-set differ: canonicalize atoms from two state dumps and compare them.
//!
//! ```text
//! fd.txt  --read_atom_file(ListRepr)-------> AtomSet --+
//!                                                      +--> AtomComparison --> report
//! gen.txt --read_atom_file(SpaceSeparated)-> AtomSet --+
//! ```

pub mod compare;
pub mod extract;
pub mod format;

pub use compare::AtomComparison;
pub use extract::{Atom, extract_atom};
pub use format::{
    AtomFileError, AtomFormat, AtomFormatParseError, AtomSet, parse_atoms, read_atom_file,
};
