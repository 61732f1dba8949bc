//! Translator front end: parse a domain/problem pair, then normalize it.
//!
//! ```text
//!   domain.pddl ─┐
//!                ├─► TaskParser::open ─► PlanningTask ─► Normalizer::normalize
//!   problem.pddl ┘
//! ```
//!
//! Both stages are traits so that other front ends can be plugged in; the
//! [`pddl`] module provides the file-based implementations.

pub mod pddl;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use pddl::{PddlFileParser, PddlNormalizer};

/// Errors produced while opening or normalizing a planning task.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{which} file path is empty")]
    EmptyPath { which: &'static str },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no (define ({kind} NAME) ...) header found in {}", .path.display())]
    MissingHeader { kind: &'static str, path: PathBuf },

    #[error("problem {problem:?} refers to domain {declared:?}, but the domain file defines {domain:?}")]
    DomainMismatch {
        problem: String,
        declared: String,
        domain: String,
    },
}

/// A domain/problem pair as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningTask {
    pub domain_name: String,
    pub problem_name: String,
    pub domain_path: PathBuf,
    pub problem_path: PathBuf,
    pub domain_text: String,
    pub problem_text: String,
}

/// Opens a domain/task file pair.
pub trait TaskParser {
    fn open(&self, domain: &Path, task: &Path) -> Result<PlanningTask, TranslateError>;
}

/// Rewrites a parsed task in place.
pub trait Normalizer {
    fn normalize(&self, task: &mut PlanningTask) -> Result<(), TranslateError>;
}

/// Open `domain`/`task` with `parser`, then normalize the result.
pub fn translate(
    parser: &dyn TaskParser,
    normalizer: &dyn Normalizer,
    domain: &Path,
    task: &Path,
) -> Result<PlanningTask, TranslateError> {
    if domain.as_os_str().is_empty() {
        return Err(TranslateError::EmptyPath { which: "domain" });
    }
    if task.as_os_str().is_empty() {
        return Err(TranslateError::EmptyPath { which: "problem" });
    }

    let mut parsed = parser.open(domain, task)?;
    normalizer.normalize(&mut parsed)?;
    tracing::debug!(
        domain = %parsed.domain_name,
        problem = %parsed.problem_name,
        "translated task"
    );
    Ok(parsed)
}
