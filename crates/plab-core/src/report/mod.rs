//! Reports over fetched experiment properties.
//!
//! Every report consumes the combined `properties.json` written by the
//! fetch step (run id -> run properties) and renders a single file.

pub mod absolute;
pub mod filter;
pub mod scatter;
pub mod table;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::experiment::toml_format::ReportToml;

pub use absolute::AbsoluteReport;
pub use filter::{Category, PropertyFilter};
pub use scatter::ScatterPlotReport;

/// Properties of a single run.
pub type RunProperties = BTreeMap<String, Value>;

/// Properties of all runs, keyed by the joined run id.
pub type EvalProperties = BTreeMap<String, RunProperties>;

/// Output format of a table report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Tex,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Tex => write!(f, "tex"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "tex" => Ok(Self::Tex),
            other => Err(format!("invalid report format: {other:?}")),
        }
    }
}

/// A renderable report.
pub trait Report {
    fn render(&self, properties: &EvalProperties) -> Result<String>;
}

/// Instantiate the report described by a `[[reports]]` entry.
pub fn build_report(def: &ReportToml) -> Box<dyn Report> {
    match def {
        ReportToml::Absolute {
            format,
            attributes,
            algorithms,
            error_attributes,
            ..
        } => Box::new(AbsoluteReport {
            format: *format,
            attributes: attributes.clone(),
            algorithms: algorithms.clone(),
            error_attributes: error_attributes.clone(),
        }),
        ReportToml::Scatter {
            attribute,
            algorithms,
            category,
            filters,
            ..
        } => Box::new(ScatterPlotReport {
            attribute: attribute.clone(),
            algorithms: algorithms.clone(),
            category: *category,
            filters: filters.clone(),
        }),
    }
}

/// Read the combined properties file written by the fetch step.
pub fn load_properties(path: &Path) -> Result<EvalProperties> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Numeric value of `key`; booleans count as 0/1.
pub fn numeric(run: &RunProperties, key: &str) -> Option<f64> {
    match run.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// String value of `key`.
pub fn text<'a>(run: &'a RunProperties, key: &str) -> Option<&'a str> {
    run.get(key).and_then(Value::as_str)
}

/// Integral values without decimals, everything else with two.
pub fn format_number(value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() < 1e-9 && rounded.abs() < 1e15 {
        format!("{rounded:.0}")
    } else {
        format!("{value:.2}")
    }
}
