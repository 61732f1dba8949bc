//! In-process executor for the local machine.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{JobExecutor, PreparedRun, StartSummary, execute_run};
use crate::experiment::layout::ExperimentLayout;

/// Runs every prepared run on this machine, at most `processes` at a time.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    processes: usize,
}

impl LocalExecutor {
    pub fn new(processes: usize) -> Self {
        Self {
            processes: processes.max(1),
        }
    }
}

#[async_trait]
impl JobExecutor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn execute(
        &self,
        _layout: &ExperimentLayout,
        runs: &[PreparedRun],
        cancel: CancellationToken,
    ) -> Result<StartSummary> {
        tracing::info!(runs = runs.len(), processes = self.processes, "starting local runs");

        let semaphore = Arc::new(Semaphore::new(self.processes));
        let mut tasks = JoinSet::new();
        for prepared in runs {
            let semaphore = Arc::clone(&semaphore);
            let index = prepared.index;
            let dir = prepared.dir.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, execute_run(&dir).await)
            });
        }

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = tasks.len(), "cancelled, killing in-flight runs");
                    // Aborted tasks drop their child handles, which kills the processes.
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
                next = tasks.join_next() => {
                    let Some(joined) = next else { break };
                    match joined {
                        Ok((_, Ok(true))) => succeeded += 1,
                        Ok((_, Ok(false))) => failed += 1,
                        Ok((index, Err(e))) => {
                            tracing::error!(run = index, error = %format!("{e:#}"), "run could not be executed");
                            failed += 1;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "run task panicked");
                            failed += 1;
                        }
                    }
                    let done = succeeded + failed;
                    if done % 10 == 0 || done == runs.len() {
                        tracing::info!(done, total = runs.len(), "progress");
                    }
                }
            }
        }

        let finished = succeeded + failed;
        if finished < runs.len() {
            tracing::warn!(finished, remaining = runs.len() - finished, "local execution interrupted");
            return Ok(StartSummary::Interrupted {
                finished,
                remaining: runs.len() - finished,
            });
        }
        Ok(StartSummary::Completed { succeeded, failed })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::experiment::layout::{RUN_PROPERTIES_FILE, RUN_SPEC_FILE};
    use crate::experiment::matrix::{ResourceLimits, Run};

    fn prepare(layout: &ExperimentLayout, index: usize, script: &str) -> PreparedRun {
        let dir = layout.run_dir(index);
        std::fs::create_dir_all(&dir).unwrap();
        let mut run = Run::default();
        run.add_command(
            "run-search",
            vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()],
            ResourceLimits {
                time_limit_secs: 30,
                memory_limit_mib: 1024,
            },
        );
        std::fs::write(dir.join(RUN_SPEC_FILE), serde_json::to_string(&run).unwrap()).unwrap();
        PreparedRun { index, dir, run }
    }

    fn layout(root: &Path) -> ExperimentLayout {
        ExperimentLayout::new(root, "exp")
    }

    #[tokio::test]
    async fn counts_successes_and_failures() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let runs = vec![
            prepare(&layout, 1, "exit 0"),
            prepare(&layout, 2, "exit 1"),
            prepare(&layout, 3, "exit 0"),
        ];

        let summary = LocalExecutor::new(2)
            .execute(&layout, &runs, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            summary,
            StartSummary::Completed {
                succeeded: 2,
                failed: 1
            }
        );
        assert!(runs.iter().all(|r| r.dir.join(RUN_PROPERTIES_FILE).exists()));
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let runs = vec![prepare(&layout, 1, "exit 0"), prepare(&layout, 2, "exit 0")];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = LocalExecutor::new(1)
            .execute(&layout, &runs, cancel)
            .await
            .unwrap();

        assert_eq!(
            summary,
            StartSummary::Interrupted {
                finished: 0,
                remaining: 2
            }
        );
    }

    #[tokio::test]
    async fn cancellation_kills_in_flight_runs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let runs = vec![
            prepare(&layout, 1, "sleep 2; echo late > marker"),
            prepare(&layout, 2, "sleep 2; echo late > marker"),
            prepare(&layout, 3, "sleep 2; echo late > marker"),
        ];

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let summary = LocalExecutor::new(2)
            .execute(&layout, &runs, cancel)
            .await
            .unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        assert_eq!(
            summary,
            StartSummary::Interrupted {
                finished: 0,
                remaining: 3
            }
        );

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        for run in &runs {
            assert!(!run.dir.join("marker").exists());
            assert!(!run.dir.join(RUN_PROPERTIES_FILE).exists());
        }
    }

    #[tokio::test]
    async fn zero_processes_is_treated_as_one() {
        let tmp = tempfile::TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let runs = vec![prepare(&layout, 1, "exit 0")];

        let summary = LocalExecutor::new(0)
            .execute(&layout, &runs, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            summary,
            StartSummary::Completed {
                succeeded: 1,
                failed: 0
            }
        );
    }
}
