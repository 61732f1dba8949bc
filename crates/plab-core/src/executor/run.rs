//! Execution of a single built run directory.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::environment::local_hostname;
use crate::experiment::layout::{RUN_ERR_FILE, RUN_LOG_FILE, RUN_PROPERTIES_FILE, RUN_SPEC_FILE};
use crate::experiment::matrix::Run;

/// Read the `run.json` written by the build step.
pub fn load_run_spec(run_dir: &Path) -> Result<Run> {
    let path = run_dir.join(RUN_SPEC_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Execute every command of the run in `run_dir`, in order.
///
/// Stops at the first command that fails, times out or cannot be started
/// (its error goes to `run.err` and its return code is recorded as null).
/// Writes the per-command
/// return code, wall-clock time and timeout flag to `properties.json` and
/// returns `true` if every command exited with status 0.
pub async fn execute_run(run_dir: &Path) -> Result<bool> {
    let run = load_run_spec(run_dir)?;
    let log = open_append(&run_dir.join(RUN_LOG_FILE))?;
    let err = open_append(&run_dir.join(RUN_ERR_FILE))?;

    let mut props: BTreeMap<String, Value> = BTreeMap::new();
    props.insert("node".to_owned(), Value::from(local_hostname()));

    let mut all_ok = true;
    for command in &run.commands {
        tracing::debug!(run_dir = %run_dir.display(), command = %command.name, "starting command");
        let outcome =
            match super::run_command(command, run_dir, log.try_clone()?, err.try_clone()?).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Spawn failures leave no trace in the child's output.
                    tracing::warn!(
                        run_dir = %run_dir.display(),
                        command = %command.name,
                        error = %format!("{e:#}"),
                        "command could not be started"
                    );
                    writeln!(&err, "{e:#}")
                        .with_context(|| format!("failed to write {RUN_ERR_FILE}"))?;
                    props.insert(format!("{}_returncode", command.name), Value::Null);
                    props.insert(format!("{}_timed_out", command.name), Value::Bool(false));
                    all_ok = false;
                    break;
                }
            };

        props.insert(
            format!("{}_returncode", command.name),
            outcome.exit_code.map_or(Value::Null, Value::from),
        );
        props.insert(
            format!("{}_wall_clock_time", command.name),
            Value::from(outcome.wall_clock_secs),
        );
        props.insert(
            format!("{}_timed_out", command.name),
            Value::Bool(outcome.timed_out),
        );

        if !outcome.succeeded() {
            tracing::info!(
                run_dir = %run_dir.display(),
                command = %command.name,
                exit_code = ?outcome.exit_code,
                timed_out = outcome.timed_out,
                "command failed, skipping remaining commands"
            );
            all_ok = false;
            break;
        }
    }

    let path = run_dir.join(RUN_PROPERTIES_FILE);
    let json = serde_json::to_string_pretty(&props)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(all_ok)
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}
