use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{Normalizer, PlanningTask, TaskParser, TranslateError};

static DOMAIN_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*define\s*\(\s*domain\s+([^\s()]+)\s*\)").expect("valid regex")
});

static PROBLEM_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(\s*define\s*\(\s*problem\s+([^\s()]+)\s*\)").expect("valid regex")
});

static PROBLEM_DOMAIN_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*:domain\s+([^\s()]+)\s*\)").expect("valid regex"));

/// Reads PDDL files and extracts their `define` headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PddlFileParser;

impl TaskParser for PddlFileParser {
    fn open(&self, domain: &Path, task: &Path) -> Result<PlanningTask, TranslateError> {
        let domain_text = read(domain)?;
        let problem_text = read(task)?;

        let domain_body = strip_comments(&domain_text);
        let problem_body = strip_comments(&problem_text);

        let domain_name = capture(&DOMAIN_HEADER, &domain_body).ok_or_else(|| {
            TranslateError::MissingHeader {
                kind: "domain",
                path: domain.to_path_buf(),
            }
        })?;
        let problem_name = capture(&PROBLEM_HEADER, &problem_body).ok_or_else(|| {
            TranslateError::MissingHeader {
                kind: "problem",
                path: task.to_path_buf(),
            }
        })?;

        if let Some(declared) = capture(&PROBLEM_DOMAIN_REF, &problem_body) {
            if !declared.eq_ignore_ascii_case(&domain_name) {
                return Err(TranslateError::DomainMismatch {
                    problem: problem_name,
                    declared,
                    domain: domain_name,
                });
            }
        }

        Ok(PlanningTask {
            domain_name,
            problem_name,
            domain_path: domain.to_path_buf(),
            problem_path: task.to_path_buf(),
            domain_text,
            problem_text,
        })
    }
}

/// Strips `;` comments, lower-cases, and collapses whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct PddlNormalizer;

impl Normalizer for PddlNormalizer {
    fn normalize(&self, task: &mut PlanningTask) -> Result<(), TranslateError> {
        task.domain_text = normalize_text(&task.domain_text);
        task.problem_text = normalize_text(&task.problem_text);
        task.domain_name = task.domain_name.to_lowercase();
        task.problem_name = task.problem_name.to_lowercase();
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, TranslateError> {
    std::fs::read_to_string(path).map_err(|source| TranslateError::Io {
        path: PathBuf::from(path),
        source,
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Remove everything from `;` to the end of each line.
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| line.split_once(';').map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comment-free, lower-case text with single spaces between tokens.
pub fn normalize_text(text: &str) -> String {
    strip_comments(text)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
