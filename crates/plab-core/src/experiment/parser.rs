//! Experiment TOML parser with validation.
//!
//! Parses an `experiment.toml` string into an [`ExperimentToml`] and
//! validates:
//! - At least one configuration exists and configuration names are unique.
//! - Time and memory limits are positive.
//! - The local environment runs at least one process.
//! - At least one suite side lists benchmarks.
//! - Reports are well-formed (non-empty attributes, scatter plots compare
//!   exactly two algorithms).
//! - Extra log patterns compile.

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

use super::toml_format::{ExperimentToml, ReportToml};

/// Errors that can occur during experiment parsing and validation.
#[derive(Debug, Error)]
pub enum ExperimentParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("experiment must define at least one configuration")]
    NoConfigs,

    #[error("configuration name must not be empty")]
    EmptyConfigName,

    #[error("duplicate configuration name: {0:?}")]
    DuplicateConfigName(String),

    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    #[error("environment.local.processes must be greater than zero")]
    ZeroProcesses,

    #[error("suite must list at least one local or remote benchmark")]
    EmptySuite,

    #[error("report {outfile:?} must list at least one attribute")]
    NoReportAttributes { outfile: String },

    #[error("scatter report {outfile:?} needs exactly two algorithms, got {count}")]
    ScatterAlgorithmCount { outfile: String, count: usize },

    #[error("invalid log pattern for attribute {attribute:?}: {source}")]
    InvalidPattern {
        attribute: String,
        #[source]
        source: regex::Error,
    },
}

/// Parse and validate an `experiment.toml` string.
pub fn parse_experiment_toml(content: &str) -> Result<ExperimentToml, ExperimentParseError> {
    let experiment: ExperimentToml = toml::from_str(content)?;
    validate(&experiment)?;
    Ok(experiment)
}

/// Validate the parsed experiment structure.
fn validate(exp: &ExperimentToml) -> Result<(), ExperimentParseError> {
    if exp.configs.is_empty() {
        return Err(ExperimentParseError::NoConfigs);
    }

    let mut seen = HashSet::new();
    for config in &exp.configs {
        if config.name().trim().is_empty() {
            return Err(ExperimentParseError::EmptyConfigName);
        }
        if !seen.insert(config.name()) {
            return Err(ExperimentParseError::DuplicateConfigName(
                config.name().to_owned(),
            ));
        }
    }

    if exp.experiment.time_limit == 0 {
        return Err(ExperimentParseError::ZeroLimit {
            field: "experiment.time_limit",
        });
    }
    if exp.experiment.memory_limit == 0 {
        return Err(ExperimentParseError::ZeroLimit {
            field: "experiment.memory_limit",
        });
    }

    if exp.environment.local.processes == 0 {
        return Err(ExperimentParseError::ZeroProcesses);
    }

    if exp.suite.local.is_empty() && exp.suite.remote.is_empty() {
        return Err(ExperimentParseError::EmptySuite);
    }

    for report in &exp.reports {
        match report {
            ReportToml::Absolute {
                attributes,
                outfile,
                ..
            } => {
                if attributes.is_empty() {
                    return Err(ExperimentParseError::NoReportAttributes {
                        outfile: outfile.clone(),
                    });
                }
            }
            ReportToml::Scatter {
                algorithms,
                outfile,
                ..
            } => {
                if algorithms.len() != 2 {
                    return Err(ExperimentParseError::ScatterAlgorithmCount {
                        outfile: outfile.clone(),
                        count: algorithms.len(),
                    });
                }
            }
        }
    }

    for pattern in &exp.parser.patterns {
        Regex::new(&pattern.regex).map_err(|source| ExperimentParseError::InvalidPattern {
            attribute: pattern.attribute.clone(),
            source,
        })?;
    }

    Ok(())
}
