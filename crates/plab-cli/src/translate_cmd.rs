use std::path::Path;

use anyhow::{Context, Result};

use plab_core::translate::{PddlFileParser, PddlNormalizer, translate};

/// Execute `plab translate`: parse and normalize a task, optionally writing
/// the normalized files to `output`.
pub fn run_translate(domain: &Path, problem: &Path, output: Option<&Path>) -> Result<()> {
    let task = translate(&PddlFileParser, &PddlNormalizer, domain, problem)?;

    println!("Domain:  {}", task.domain_name);
    println!("Problem: {}", task.problem_name);

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        for (name, text) in [("domain.pddl", &task.domain_text), ("problem.pddl", &task.problem_text)] {
            let path = dir.join(name);
            std::fs::write(&path, format!("{text}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        println!("Normalized task written to {}", dir.display());
    }
    Ok(())
}
