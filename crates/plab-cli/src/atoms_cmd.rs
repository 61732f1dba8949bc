use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use plab_core::atoms::{AtomComparison, AtomFormat, read_atom_file};

/// Execute `plab atoms diff`.
pub fn run_atoms_diff(
    left: &Path,
    right: &Path,
    left_format: AtomFormat,
    right_format: AtomFormat,
) -> Result<()> {
    let left_atoms = read_atom_file(left, left_format)?;
    let right_atoms = read_atom_file(right, right_format)?;
    let comparison = AtomComparison::between(&left_atoms, &right_atoms);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    comparison
        .write_report(
            &mut out,
            &left.display().to_string(),
            &right.display().to_string(),
        )
        .context("failed to write comparison report")?;
    out.flush().context("failed to flush stdout")?;
    Ok(())
}
