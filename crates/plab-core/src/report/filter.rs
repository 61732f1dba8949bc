use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RunProperties;

/// Keep only runs whose `property` equals `equals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub equals: Value,
}

impl PropertyFilter {
    pub fn matches(&self, run: &RunProperties) -> bool {
        run.get(&self.property) == Some(&self.equals)
    }
}

/// `true` if `run` passes every filter.
pub fn passes_all(filters: &[PropertyFilter], run: &RunProperties) -> bool {
    filters.iter().all(|f| f.matches(run))
}

/// How scatter points are grouped into plot series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// One series for all tasks.
    #[default]
    None,
    /// One series per domain.
    Domain,
}

impl Category {
    /// Series name of `run`.
    pub fn of(&self, run: &RunProperties) -> String {
        match self {
            Self::None => "tasks".to_owned(),
            Self::Domain => match run.get("domain") {
                Some(Value::String(d)) => d.clone(),
                _ => "unknown".to_owned(),
            },
        }
    }
}
