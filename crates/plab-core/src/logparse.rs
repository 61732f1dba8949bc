//! Planner log parsing.
//!
//! Turns the search output captured in `run.log` into run properties. Each
//! pattern stores the first capture group of its first match.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::experiment::toml_format::PatternToml;

/// How a captured value is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Int,
    Float,
    /// `true` when the pattern matches anywhere; no capture group needed.
    Flag,
}

/// A compiled log pattern.
#[derive(Debug, Clone)]
pub struct LogPattern {
    pub attribute: String,
    pub regex: Regex,
    pub kind: ValueKind,
}

impl LogPattern {
    pub fn new(attribute: &str, regex: &str, kind: ValueKind) -> Result<Self, regex::Error> {
        Ok(Self {
            attribute: attribute.to_owned(),
            regex: Regex::new(regex)?,
            kind,
        })
    }

    fn extract(&self, log: &str) -> Option<Value> {
        match self.kind {
            ValueKind::Flag => self.regex.is_match(log).then_some(Value::Bool(true)),
            ValueKind::Int => {
                let caps = self.regex.captures(log)?;
                caps.get(1)?.as_str().trim().parse::<i64>().ok().map(Value::from)
            }
            ValueKind::Float => {
                let caps = self.regex.captures(log)?;
                caps.get(1)?.as_str().trim().parse::<f64>().ok().map(Value::from)
            }
        }
    }
}

/// Built-in patterns for the lifted planner's search output.
static PLANNER_PATTERNS: LazyLock<Vec<LogPattern>> = LazyLock::new(|| {
    [
        ("cost", r"Total plan cost:\s*(\d+)", ValueKind::Int),
        ("visited", r"Total number of states visited:\s*(\d+)", ValueKind::Int),
        ("generated", r"Total number of states generated:\s*(\d+)", ValueKind::Int),
        ("expanded", r"Expanded (\d+) state", ValueKind::Int),
        ("evaluations", r"Evaluated (\d+) state", ValueKind::Int),
        ("initial_state_size", r"Initial state size:\s*(\d+)", ValueKind::Int),
        ("search_time", r"Total time:\s*([\d.]+)s", ValueKind::Float),
        ("peak_memory", r"Peak memory usage:\s*(\d+) ?[kK][bB]", ValueKind::Int),
        ("solved", r"Goal state found!", ValueKind::Flag),
        ("solved", r"Solution found\.", ValueKind::Flag),
        (
            "unsolvable",
            r"Problem goal was statically determined to be unsatisfiable",
            ValueKind::Flag,
        ),
    ]
    .into_iter()
    .map(|(attribute, regex, kind)| {
        LogPattern::new(attribute, regex, kind).expect("built-in log pattern is valid")
    })
    .collect()
});

/// Parser that applies an ordered list of patterns to a log.
#[derive(Debug, Clone)]
pub struct LogParser {
    patterns: Vec<LogPattern>,
}

impl LogParser {
    /// Parser with the built-in planner patterns only.
    pub fn planner() -> Self {
        Self {
            patterns: PLANNER_PATTERNS.clone(),
        }
    }

    /// Parser with the built-in patterns followed by `extra`.
    pub fn with_extra(extra: &[PatternToml]) -> Result<Self, regex::Error> {
        let mut parser = Self::planner();
        for p in extra {
            parser
                .patterns
                .push(LogPattern::new(&p.attribute, &p.regex, p.kind)?);
        }
        Ok(parser)
    }

    /// Extract properties from `log`. An attribute already set by an
    /// earlier pattern is not overwritten.
    pub fn parse(&self, log: &str) -> BTreeMap<String, Value> {
        let mut props = BTreeMap::new();
        for pattern in &self.patterns {
            if props.contains_key(&pattern.attribute) {
                continue;
            }
            if let Some(value) = pattern.extract(log) {
                props.insert(pattern.attribute.clone(), value);
            }
        }
        props
    }
}
