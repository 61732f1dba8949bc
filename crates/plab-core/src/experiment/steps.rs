//! Experiment steps: build, start, fetch, report.
//!
//! Each step reads what the previous one left on disk, so they can be run
//! in separate invocations (and `start` on a cluster can finish long after
//! the launching process has exited).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::layout::{ExperimentLayout, RUN_ERR_FILE, RUN_LOG_FILE, RUN_PROPERTIES_FILE, RUN_SPEC_FILE};
use super::matrix::{Experiment, Resource, ResourceLimits, build_matrix};
use super::planner::PlannerLayout;
use super::suite::build_suite;
use super::toml_format::ExperimentToml;
use crate::environment::{Environment, HostContext, select_environment};
use crate::executor::run::load_run_spec;
use crate::executor::{JobExecutor, PreparedRun, StartSummary};
use crate::logparse::LogParser;
use crate::report::{EvalProperties, RunProperties, build_report, load_properties};

/// An experiment whose runs are declared but not yet written to disk.
#[derive(Debug, Clone)]
pub struct PlannedExperiment {
    pub experiment: Experiment,
    pub environment: Environment,
    pub layout: ExperimentLayout,
}

/// Contents of `experiment.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub environment: String,
    pub runs: usize,
}

/// Resolve the suite for `host` and declare the run matrix.
///
/// `base_dir` anchors a relative `data_dir`; it is normally the directory
/// containing the experiment file.
pub fn plan_experiment(
    def: &ExperimentToml,
    base_dir: &Path,
    planner_root: &Path,
    host: &HostContext,
) -> Result<PlannedExperiment> {
    let environment = select_environment(host, &def.environment);
    let planner = PlannerLayout::new(planner_root, &def.planner);
    let benchmarks = planner.benchmarks_dir(&def.experiment.benchmarks);

    let entries = def.suite.entries(environment.is_remote());
    if entries.is_empty() {
        bail!(
            "the {} suite is empty for host {}",
            if environment.is_remote() { "remote" } else { "local" },
            host.node
        );
    }
    let tasks = build_suite(&benchmarks, entries)
        .with_context(|| format!("failed to resolve suite in {}", benchmarks.display()))?;

    let limits = ResourceLimits {
        time_limit_secs: def.experiment.time_limit,
        memory_limit_mib: def.experiment.memory_limit,
    };
    let mut experiment = Experiment::new(&def.experiment.name);
    build_matrix(
        &mut experiment,
        &planner,
        &def.configs,
        &tasks,
        &def.suite.excluded_domains,
        limits,
    );

    let layout = ExperimentLayout::new(&base_dir.join(&def.experiment.data_dir), &def.experiment.name);
    tracing::info!(
        experiment = %def.experiment.name,
        environment = %environment,
        runs = experiment.runs().len(),
        "planned experiment"
    );
    Ok(PlannedExperiment {
        experiment,
        environment,
        layout,
    })
}

/// Write the experiment directory: one directory per run with its
/// `run.json` and resources.
pub fn build(planned: &PlannedExperiment, force: bool) -> Result<Vec<PreparedRun>> {
    let layout = &planned.layout;
    if layout.exp_dir.exists() {
        if !force {
            bail!(
                "experiment directory {} already exists (use --force to overwrite)",
                layout.exp_dir.display()
            );
        }
        tracing::warn!(dir = %layout.exp_dir.display(), "removing existing experiment directory");
        std::fs::remove_dir_all(&layout.exp_dir)
            .with_context(|| format!("failed to remove {}", layout.exp_dir.display()))?;
    }
    std::fs::create_dir_all(&layout.exp_dir)
        .with_context(|| format!("failed to create {}", layout.exp_dir.display()))?;

    let mut prepared = Vec::with_capacity(planned.experiment.runs().len());
    for (i, run) in planned.experiment.runs().iter().enumerate() {
        let index = i + 1;
        let dir = layout.run_dir(index);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for resource in &run.resources {
            materialize(resource, &dir)?;
        }
        write_json(&dir.join(RUN_SPEC_FILE), run)?;
        prepared.push(PreparedRun {
            index,
            dir,
            run: run.clone(),
        });
    }

    let info = ExperimentInfo {
        name: planned.experiment.name.clone(),
        created_at: Utc::now(),
        environment: planned.environment.to_string(),
        runs: prepared.len(),
    };
    write_json(&layout.experiment_file(), &info)?;

    tracing::info!(
        dir = %layout.exp_dir.display(),
        runs = prepared.len(),
        "built experiment"
    );
    Ok(prepared)
}

/// Read `experiment.json` of a built experiment.
pub fn load_info(layout: &ExperimentLayout) -> Result<ExperimentInfo> {
    let path = layout.experiment_file();
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {} (was the experiment built?)", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load all runs of a built experiment in order.
pub fn load_runs(layout: &ExperimentLayout) -> Result<Vec<PreparedRun>> {
    let info = load_info(layout)?;
    (1..=info.runs)
        .map(|index| {
            let dir = layout.run_dir(index);
            let run = load_run_spec(&dir)?;
            Ok(PreparedRun { index, dir, run })
        })
        .collect()
}

/// Hand all built runs to `executor`.
pub async fn start(
    layout: &ExperimentLayout,
    executor: &dyn JobExecutor,
    cancel: CancellationToken,
) -> Result<StartSummary> {
    let runs = load_runs(layout)?;
    if runs.is_empty() {
        bail!("experiment in {} has no runs", layout.exp_dir.display());
    }
    tracing::info!(executor = executor.name(), runs = runs.len(), "starting experiment");
    executor.execute(layout, &runs, cancel).await
}

/// Collect the properties of every run into the eval directory.
pub fn fetch(layout: &ExperimentLayout, parser: &LogParser) -> Result<EvalProperties> {
    let runs = load_runs(layout)?;
    let mut all = EvalProperties::new();

    for prepared in &runs {
        let props = collect_run(prepared, parser)?;
        let id = match prepared.run.id_string() {
            id if id.is_empty() => format!("{:05}", prepared.index),
            id => id,
        };
        if all.insert(id.clone(), props).is_some() {
            tracing::warn!(run = %id, "duplicate run id, keeping the later run");
        }
    }

    std::fs::create_dir_all(&layout.eval_dir)
        .with_context(|| format!("failed to create {}", layout.eval_dir.display()))?;
    write_json(&layout.eval_properties_file(), &all)?;

    let solved = all
        .values()
        .filter(|p| p.get("coverage") == Some(&Value::from(1)))
        .count();
    let errors = all
        .values()
        .filter(|p| matches!(p.get("unexplained_errors"), Some(Value::Array(a)) if !a.is_empty()))
        .count();
    tracing::info!(
        runs = all.len(),
        solved,
        unexplained_errors = errors,
        file = %layout.eval_properties_file().display(),
        "fetched properties"
    );
    Ok(all)
}

/// Render every configured report into the eval directory.
pub fn report(def: &ExperimentToml, layout: &ExperimentLayout) -> Result<Vec<PathBuf>> {
    let properties = load_properties(&layout.eval_properties_file())?;
    let mut written = Vec::with_capacity(def.reports.len());
    for report_def in &def.reports {
        let content = build_report(report_def)
            .render(&properties)
            .with_context(|| format!("failed to render {}", report_def.outfile()))?;
        let path = layout.eval_dir.join(report_def.outfile());
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(report = %path.display(), "wrote report");
        written.push(path);
    }
    Ok(written)
}

fn collect_run(prepared: &PreparedRun, parser: &LogParser) -> Result<RunProperties> {
    let mut props: RunProperties = prepared.run.properties.clone();

    let executed_path = prepared.dir.join(RUN_PROPERTIES_FILE);
    let executed = executed_path.exists();
    if executed {
        let text = std::fs::read_to_string(&executed_path)
            .with_context(|| format!("failed to read {}", executed_path.display()))?;
        let run_props: BTreeMap<String, Value> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", executed_path.display()))?;
        props.extend(run_props);
    }

    let log = read_optional(&prepared.dir.join(RUN_LOG_FILE))?;
    props.extend(parser.parse(&log));

    let err = read_optional(&prepared.dir.join(RUN_ERR_FILE))?;
    let first_err_line = err.lines().map(str::trim).find(|l| !l.is_empty());
    derive_status(&mut props, executed, first_err_line);
    Ok(props)
}

/// Add `coverage`, `error` and `unexplained_errors` to `props`.
pub fn derive_status(props: &mut RunProperties, executed: bool, first_err_line: Option<&str>) {
    let flag = |key: &str| props.get(key) == Some(&Value::Bool(true));
    let solved = flag("solved");

    let timed_out = props
        .iter()
        .any(|(k, v)| k.ends_with("_timed_out") && *v == Value::Bool(true));
    let crashed = props.iter().any(|(k, v)| {
        k.ends_with("_returncode") && (v.is_null() || v.as_i64().is_some_and(|code| code != 0))
    });

    let error = if solved {
        "success"
    } else if timed_out {
        "timeout"
    } else if flag("unsolvable") {
        "unsolvable"
    } else if !executed {
        "not-run"
    } else if crashed {
        "crash"
    } else {
        "incomplete"
    };

    let mut unexplained: Vec<Value> = Vec::new();
    if matches!(error, "crash" | "incomplete" | "not-run") {
        unexplained.push(Value::from(error));
    }
    if let Some(line) = first_err_line {
        unexplained.push(Value::from(format!("run.err: {line}")));
    }

    props.insert("coverage".to_owned(), Value::from(i64::from(solved)));
    props.insert("error".to_owned(), Value::from(error));
    props.insert("unexplained_errors".to_owned(), Value::Array(unexplained));
}

fn materialize(resource: &Resource, run_dir: &Path) -> Result<()> {
    if resource.dest.is_empty() {
        bail!("resource {} has no file name", resource.name);
    }
    let dest = run_dir.join(&resource.dest);
    symlink(&resource.source, &dest).with_context(|| {
        format!(
            "failed to place resource {} ({} -> {})",
            resource.name,
            resource.source.display(),
            dest.display()
        )
    })
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(not(unix))]
fn symlink(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::copy(source, dest).map(|_| ())
}

fn read_optional(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, Value)]) -> RunProperties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn solved_run_is_success() {
        let mut p = props(&[
            ("solved", Value::Bool(true)),
            ("run-search_returncode", Value::from(0)),
        ]);
        derive_status(&mut p, true, None);
        assert_eq!(p["coverage"], Value::from(1));
        assert_eq!(p["error"], Value::from("success"));
        assert_eq!(p["unexplained_errors"], Value::Array(vec![]));
    }

    #[test]
    fn timeout_is_explained() {
        let mut p = props(&[
            ("run-search_timed_out", Value::Bool(true)),
            ("run-search_returncode", Value::Null),
        ]);
        derive_status(&mut p, true, None);
        assert_eq!(p["coverage"], Value::from(0));
        assert_eq!(p["error"], Value::from("timeout"));
        assert_eq!(p["unexplained_errors"], Value::Array(vec![]));
    }

    #[test]
    fn unsolvable_is_explained() {
        let mut p = props(&[("unsolvable", Value::Bool(true))]);
        derive_status(&mut p, true, None);
        assert_eq!(p["error"], Value::from("unsolvable"));
    }

    #[test]
    fn nonzero_exit_is_a_crash() {
        let mut p = props(&[("run-translator_returncode", Value::from(1))]);
        derive_status(&mut p, true, Some("Traceback (most recent call last):"));
        assert_eq!(p["error"], Value::from("crash"));
        assert_eq!(
            p["unexplained_errors"],
            Value::from(vec![
                "crash".to_owned(),
                "run.err: Traceback (most recent call last):".to_owned()
            ])
        );
    }

    #[test]
    fn unexecuted_run_is_not_run() {
        let mut p = RunProperties::new();
        derive_status(&mut p, false, None);
        assert_eq!(p["error"], Value::from("not-run"));
        assert_eq!(p["unexplained_errors"], Value::from(vec!["not-run"]));
    }

    #[test]
    fn clean_exit_without_plan_is_incomplete() {
        let mut p = props(&[("run-search_returncode", Value::from(0))]);
        derive_status(&mut p, true, None);
        assert_eq!(p["error"], Value::from("incomplete"));
    }
}
