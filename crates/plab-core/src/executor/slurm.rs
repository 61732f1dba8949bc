//! Slurm array-job executor.
//!
//! All runs of an experiment become one array job. Task `i` of the array
//! executes the run directory on line `i` of `runs.txt` by calling back into
//! `plab exp run-dir`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{JobExecutor, PreparedRun, StartSummary};
use crate::environment::SlurmSettings;
use crate::experiment::layout::ExperimentLayout;

/// Run list consumed by the array tasks, one run directory per line.
pub const RUNS_LIST_FILE: &str = "runs.txt";
/// Generated job script.
pub const JOB_SCRIPT_FILE: &str = "slurm-job.sh";

#[derive(Debug, Clone)]
pub struct SlurmExecutor {
    settings: SlurmSettings,
    self_exe: PathBuf,
    submit: Vec<String>,
}

impl SlurmExecutor {
    pub fn new(settings: SlurmSettings, self_exe: PathBuf) -> Self {
        Self {
            settings,
            self_exe,
            submit: vec!["sbatch".to_owned()],
        }
    }

    /// Submit with `argv` (followed by the script path) instead of `sbatch`.
    pub fn with_submit_command(mut self, argv: Vec<String>) -> Self {
        self.submit = argv;
        self
    }

    /// Render the array job script for `run_count` runs.
    pub fn render_job_script(&self, layout: &ExperimentLayout, job_name: &str, run_count: usize) -> String {
        let s = &self.settings;
        let exp_dir = layout.exp_dir.display();
        let mut directives = format!(
            "#SBATCH --job-name={job_name}\n\
             #SBATCH --partition={partition}\n\
             #SBATCH --mem-per-cpu={memory}\n\
             #SBATCH --array=1-{run_count}\n\
             #SBATCH --output={exp_dir}/slurm-%A_%a.out\n\
             #SBATCH --error={exp_dir}/slurm-%A_%a.err\n",
            partition = s.partition,
            memory = s.memory_per_cpu,
        );
        if !s.export.is_empty() {
            directives.push_str(&format!("#SBATCH --export={}\n", s.export.join(",")));
        }
        if let Some(extra) = &s.extra_options {
            directives.push_str(&format!("{}\n", extra.trim_end()));
        }

        let runs_list = shell_quote(&layout.exp_dir.join(RUNS_LIST_FILE).to_string_lossy());
        let self_exe = shell_quote(&self.self_exe.to_string_lossy());
        format!(
            "#!/bin/bash\n\
             {directives}\n\
             set -eu\n\
             RUN_DIR=\"$(sed -n \"${{SLURM_ARRAY_TASK_ID}}p\" {runs_list})\"\n\
             {self_exe} exp run-dir \"$RUN_DIR\"\n"
        )
    }
}

/// Single-quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Extract the job id from `sbatch` output ("Submitted batch job 123").
pub fn parse_job_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Submitted batch job ")
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
    })
}

#[async_trait]
impl JobExecutor for SlurmExecutor {
    fn name(&self) -> &str {
        "slurm"
    }

    async fn execute(
        &self,
        layout: &ExperimentLayout,
        runs: &[PreparedRun],
        _cancel: CancellationToken,
    ) -> Result<StartSummary> {
        if runs.is_empty() {
            bail!("no runs to submit in {}", layout.exp_dir.display());
        }

        let mut list = String::new();
        for run in runs {
            list.push_str(&run.dir.to_string_lossy());
            list.push('\n');
        }
        write_file(&layout.exp_dir.join(RUNS_LIST_FILE), &list)?;

        let job_name = job_name(&layout.exp_dir);
        let script_path = layout.exp_dir.join(JOB_SCRIPT_FILE);
        write_file(&script_path, &self.render_job_script(layout, &job_name, runs.len()))?;

        let Some((program, args)) = self.submit.split_first() else {
            bail!("empty submit command");
        };
        let output = Command::new(program)
            .args(args)
            .arg(&script_path)
            .current_dir(&layout.exp_dir)
            .output()
            .await
            .with_context(|| format!("failed to run {program}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            bail!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let job_id = parse_job_id(&stdout)
            .with_context(|| format!("could not find a job id in sbatch output: {:?}", stdout.trim()))?;

        tracing::info!(job_id = %job_id, runs = runs.len(), partition = %self.settings.partition, "submitted array job");
        Ok(StartSummary::Submitted {
            job_id,
            runs: runs.len(),
        })
    }
}

fn job_name(exp_dir: &Path) -> String {
    exp_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plab".to_owned())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
