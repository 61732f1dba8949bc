//! Job executor abstraction.
//!
//! Decouples "run these built runs" from where they run, so that the local
//! machine and a Slurm cluster can be used interchangeably by the `start`
//! step.

pub mod command;
pub mod local;
pub mod run;
pub mod slurm;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::environment::Environment;
use crate::experiment::layout::ExperimentLayout;
use crate::experiment::matrix::Run;

pub use command::{CommandOutcome, run_command};
pub use local::LocalExecutor;
pub use run::execute_run;
pub use slurm::SlurmExecutor;

/// A run that has been written to disk by the build step.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    /// 1-based position in the experiment.
    pub index: usize,
    pub dir: PathBuf,
    pub run: Run,
}

/// What happened when an experiment was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSummary {
    /// All runs were executed in-process.
    Completed { succeeded: usize, failed: usize },
    /// Runs were handed to a batch scheduler.
    Submitted { job_id: String, runs: usize },
    /// Execution was cancelled before all runs finished.
    Interrupted { finished: usize, remaining: usize },
}

impl fmt::Display for StartSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { succeeded, failed } => {
                write!(f, "completed: {succeeded} succeeded, {failed} failed")
            }
            Self::Submitted { job_id, runs } => {
                write!(f, "submitted job {job_id} with {runs} runs")
            }
            Self::Interrupted {
                finished,
                remaining,
            } => write!(f, "interrupted: {finished} finished, {remaining} not run"),
        }
    }
}

/// Trait for experiment execution backends.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Human-readable name of the backend (e.g. "local", "slurm").
    fn name(&self) -> &str;

    /// Execute (or submit) `runs`, which live under `layout`.
    async fn execute(
        &self,
        layout: &ExperimentLayout,
        runs: &[PreparedRun],
        cancel: CancellationToken,
    ) -> Result<StartSummary>;
}

/// Factory function: create an executor for `environment`.
///
/// `self_exe` is the `plab` binary that cluster jobs invoke to execute a
/// single run directory.
pub fn create_executor(environment: &Environment, self_exe: PathBuf) -> Arc<dyn JobExecutor> {
    match environment {
        Environment::Local { processes } => Arc::new(LocalExecutor::new(*processes)),
        Environment::Slurm(settings) => Arc::new(SlurmExecutor::new(settings.clone(), self_exe)),
    }
}
