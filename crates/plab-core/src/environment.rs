//! Execution environment selection.
//!
//! Whether an experiment runs on the local machine or is submitted to a
//! Slurm cluster is decided from an explicit [`HostContext`] value, not by
//! inspecting the host inside the experiment code.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::experiment::toml_format::EnvironmentToml;

/// `[environment.slurm]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlurmSettings {
    pub partition: String,
    /// Passed as `--mem-per-cpu`, e.g. `6G`.
    pub memory_per_cpu: String,
    /// Extra lines copied verbatim into the job script header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_options: Option<String>,
    /// Environment variables forwarded to the jobs.
    #[serde(default)]
    pub export: Vec<String>,
    /// Host-name suffixes that identify cluster login nodes.
    #[serde(default)]
    pub remote_host_suffixes: Vec<String>,
}

/// Where the experiment's runs are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Run on this machine with at most `processes` concurrent runs.
    Local { processes: usize },
    /// Submit an array job to Slurm.
    Slurm(SlurmSettings),
}

impl Environment {
    /// `true` for cluster environments; selects the remote suite.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Slurm(_))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { processes } => write!(f, "local ({processes} processes)"),
            Self::Slurm(s) => write!(f, "slurm (partition {})", s.partition),
        }
    }
}

/// Facts about the machine the experiment is launched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub node: String,
}

impl HostContext {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }

    /// Context for the machine this process runs on.
    pub fn detect() -> Self {
        Self::new(local_hostname())
    }
}

/// Pick the environment for `host`.
///
/// Slurm is chosen only when a Slurm section exists and the node name ends
/// with one of its remote suffixes.
pub fn select_environment(host: &HostContext, settings: &EnvironmentToml) -> Environment {
    if let Some(slurm) = &settings.slurm {
        if slurm
            .remote_host_suffixes
            .iter()
            .any(|suffix| host.node.ends_with(suffix.as_str()))
        {
            return Environment::Slurm(slurm.clone());
        }
    }
    Environment::Local {
        processes: settings.local.processes,
    }
}

/// Host name of this machine, or `"localhost"` if it cannot be read.
#[cfg(unix)]
pub fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is valid for `buf.len()` bytes for the duration of the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(not(unix))]
pub fn local_hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::toml_format::LocalToml;

    fn settings_with_slurm() -> EnvironmentToml {
        EnvironmentToml {
            local: LocalToml { processes: 4 },
            slurm: Some(SlurmSettings {
                partition: "infai_2".to_owned(),
                memory_per_cpu: "6G".to_owned(),
                extra_options: None,
                export: vec![],
                remote_host_suffixes: vec![
                    ".scicore.unibas.ch".to_owned(),
                    ".cluster.bc2.ch".to_owned(),
                ],
            }),
        }
    }

    #[test]
    fn cluster_host_selects_slurm() {
        let host = HostContext::new("login12.cluster.bc2.ch");
        let env = select_environment(&host, &settings_with_slurm());
        assert!(env.is_remote());
        assert!(env.to_string().contains("infai_2"));
    }

    #[test]
    fn other_host_selects_local() {
        let host = HostContext::new("laptop");
        let env = select_environment(&host, &settings_with_slurm());
        assert_eq!(env, Environment::Local { processes: 4 });
        assert!(!env.is_remote());
    }

    #[test]
    fn no_slurm_section_always_local() {
        let host = HostContext::new("login12.cluster.bc2.ch");
        let env = select_environment(&host, &EnvironmentToml::default());
        assert_eq!(env, Environment::Local { processes: 1 });
    }

    #[test]
    fn detect_returns_non_empty_name() {
        assert!(!HostContext::detect().node.is_empty());
    }
}
