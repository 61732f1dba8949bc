use serde::{Deserialize, Serialize};

/// One planner invocation variant: a label plus the search arguments.
///
/// Immutable after construction; the label becomes the `algorithm`
/// property of every run that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    name: String,
    #[serde(default)]
    arguments: Vec<String>,
}

impl Configuration {
    pub fn new<I, S>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}
