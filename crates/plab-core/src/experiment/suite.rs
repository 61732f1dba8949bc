//! Benchmark suite resolution.
//!
//! A suite entry is either `domain` (every problem of that domain) or
//! `domain:problem`. Domains are directories below the benchmark root that
//! hold PDDL problem files and one or more domain files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single planning task: one domain file plus one problem file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkTask {
    pub domain: String,
    pub problem: String,
    pub domain_file: PathBuf,
    pub problem_file: PathBuf,
}

/// Errors that can occur while resolving a suite.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("malformed suite entry {0:?} (expected \"domain\" or \"domain:problem\")")]
    MalformedEntry(String),

    #[error("domain directory {} does not exist", .0.display())]
    MissingDomain(PathBuf),

    #[error("problem file {} does not exist", .0.display())]
    MissingProblem(PathBuf),

    #[error("no domain file found for problem {problem:?} in {}", .dir.display())]
    NoDomainFile { dir: PathBuf, problem: String },

    #[error("failed to list domain directory {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve suite entries against `benchmarks_dir`, preserving entry order.
pub fn build_suite(
    benchmarks_dir: &Path,
    entries: &[String],
) -> Result<Vec<BenchmarkTask>, SuiteError> {
    let mut tasks = Vec::new();
    for entry in entries {
        match entry.split_once(':') {
            Some((domain, problem)) => {
                if domain.is_empty() || problem.is_empty() || problem.contains(':') {
                    return Err(SuiteError::MalformedEntry(entry.clone()));
                }
                tasks.push(load_task(benchmarks_dir, domain, problem)?);
            }
            None => {
                if entry.is_empty() {
                    return Err(SuiteError::MalformedEntry(entry.clone()));
                }
                for problem in list_problems(benchmarks_dir, entry)? {
                    tasks.push(load_task(benchmarks_dir, entry, &problem)?);
                }
            }
        }
    }
    tracing::debug!(
        benchmarks = %benchmarks_dir.display(),
        entries = entries.len(),
        tasks = tasks.len(),
        "resolved benchmark suite"
    );
    Ok(tasks)
}

/// Sorted problem file names of a domain directory.
///
/// Every `.pddl` file whose name does not mention `domain` is a problem.
pub fn list_problems(benchmarks_dir: &Path, domain: &str) -> Result<Vec<String>, SuiteError> {
    let dir = benchmarks_dir.join(domain);
    if !dir.is_dir() {
        return Err(SuiteError::MissingDomain(dir));
    }

    let read = std::fs::read_dir(&dir).map_err(|source| SuiteError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut problems = Vec::new();
    for entry in read {
        let entry = entry.map_err(|source| SuiteError::Io {
            path: dir.clone(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".pddl") && !name.contains("domain") {
            problems.push(name);
        }
    }
    problems.sort();
    Ok(problems)
}

fn load_task(benchmarks_dir: &Path, domain: &str, problem: &str) -> Result<BenchmarkTask, SuiteError> {
    let dir = benchmarks_dir.join(domain);
    if !dir.is_dir() {
        return Err(SuiteError::MissingDomain(dir));
    }

    let problem_file = dir.join(problem);
    if !problem_file.is_file() {
        return Err(SuiteError::MissingProblem(problem_file));
    }

    let domain_file = find_domain_file(&dir, problem).ok_or_else(|| SuiteError::NoDomainFile {
        dir: dir.clone(),
        problem: problem.to_owned(),
    })?;

    Ok(BenchmarkTask {
        domain: domain.to_owned(),
        problem: problem.to_owned(),
        domain_file,
        problem_file,
    })
}

/// Locate the domain file that belongs to `problem` inside `dir`.
///
/// Candidates, first match wins: `domain.pddl`, `<stem>-domain<ext>`,
/// `<first three chars>-domain.pddl`, `domain_<problem>`, `domain-<problem>`.
pub fn find_domain_file(dir: &Path, problem: &str) -> Option<PathBuf> {
    let (stem, ext) = match problem.rfind('.') {
        Some(pos) => (&problem[..pos], &problem[pos..]),
        None => (problem, ""),
    };
    let prefix: String = problem.chars().take(3).collect();

    let candidates = [
        "domain.pddl".to_string(),
        format!("{stem}-domain{ext}"),
        format!("{prefix}-domain.pddl"),
        format!("domain_{problem}"),
        format!("domain-{problem}"),
    ];

    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}
