//! Set comparison between two atom dumps.

use std::io::{self, Write};

use super::extract::Atom;
use super::format::AtomSet;

/// Differences and overlap between a left and a right atom set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomComparison {
    /// Atoms present only on the left, sorted.
    pub left_only: Vec<Atom>,
    /// Atoms present only on the right, sorted.
    pub right_only: Vec<Atom>,
    /// Cardinality of the left set.
    pub left_total: usize,
    /// Cardinality of the right set.
    pub right_total: usize,
    /// Cardinality of the intersection.
    pub common: usize,
}

impl AtomComparison {
    /// Compare two atom sets.
    pub fn between(left: &AtomSet, right: &AtomSet) -> Self {
        Self {
            left_only: left.difference(right).cloned().collect(),
            right_only: right.difference(left).cloned().collect(),
            left_total: left.len(),
            right_total: right.len(),
            common: left.intersection(right).count(),
        }
    }

    /// The same comparison seen from the other side.
    pub fn swapped(&self) -> Self {
        Self {
            left_only: self.right_only.clone(),
            right_only: self.left_only.clone(),
            left_total: self.right_total,
            right_total: self.left_total,
            common: self.common,
        }
    }

    /// `true` when both sets contain exactly the same atoms.
    pub fn is_identical(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty()
    }

    /// Write the human-readable comparison report.
    pub fn write_report<W: Write>(
        &self,
        out: &mut W,
        left_label: &str,
        right_label: &str,
    ) -> io::Result<()> {
        writeln!(out, "Atoms found only in {left_label}:")?;
        for atom in &self.left_only {
            writeln!(out, "  {atom}")?;
        }

        writeln!(out)?;
        writeln!(out, "Atoms found only in {right_label}:")?;
        for atom in &self.right_only {
            writeln!(out, "  {atom}")?;
        }

        writeln!(out)?;
        writeln!(out, "Total atoms in {left_label}: {}", self.left_total)?;
        writeln!(out, "Total atoms in {right_label}: {}", self.right_total)?;
        writeln!(out, "Atoms in both files: {}", self.common)?;
        Ok(())
    }
}
