//! `plab exp` subcommands: drive an experiment file through its steps.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use plab_core::environment::{HostContext, select_environment};
use plab_core::executor::{StartSummary, create_executor, execute_run};
use plab_core::experiment::{
    self, ExperimentLayout, ExperimentToml, PlannedExperiment, parse_experiment_toml,
};
use plab_core::logparse::LogParser;

use crate::ExpCommands;
use crate::config::PlabConfig;

/// Settings shared by every `exp` subcommand.
pub struct ExpContext<'a> {
    pub planner_dir: Option<&'a Path>,
    pub host: HostContext,
}

pub async fn run_exp_command(command: ExpCommands, ctx: &ExpContext<'_>) -> Result<()> {
    match command {
        ExpCommands::Show { file } => {
            let (_, planned) = plan(&file, ctx)?;
            print_plan(&planned);
        }
        ExpCommands::Build { file, force } => {
            let (_, planned) = plan(&file, ctx)?;
            cmd_build(&planned, force)?;
        }
        ExpCommands::Start { file } => {
            let def = ExperimentFile::load(&file)?;
            cmd_start(&def, &ctx.host).await?;
        }
        ExpCommands::Fetch { file } => {
            let def = ExperimentFile::load(&file)?;
            cmd_fetch(&def)?;
        }
        ExpCommands::Report { file } => {
            let def = ExperimentFile::load(&file)?;
            cmd_report(&def)?;
        }
        ExpCommands::Run { file, force } => {
            let (def, planned) = plan(&file, ctx)?;
            cmd_build(&planned, force)?;
            match cmd_start(&def, &ctx.host).await? {
                StartSummary::Completed { .. } => {
                    cmd_fetch(&def)?;
                    cmd_report(&def)?;
                }
                StartSummary::Submitted { .. } => {
                    println!("Run `plab exp fetch` and `plab exp report` once the job has finished.");
                }
                StartSummary::Interrupted { .. } => {
                    bail!("experiment interrupted; fetch and report skipped");
                }
            }
        }
        ExpCommands::RunDir { dir } => {
            tracing::info!(dir = %dir.display(), node = %ctx.host.node, "executing run directory");
            let ok = execute_run(&dir).await?;
            if !ok {
                bail!("run in {} failed", dir.display());
            }
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Experiment file
// -----------------------------------------------------------------------

/// A parsed experiment file together with the directory it was read from.
struct ExperimentFile {
    def: ExperimentToml,
    base_dir: PathBuf,
}

impl ExperimentFile {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read experiment file {}", path.display()))?;
        let def = parse_experiment_toml(&content)
            .with_context(|| format!("invalid experiment file {}", path.display()))?;
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        // Cluster jobs read run directories from runs.txt in another cwd.
        let base_dir = std::path::absolute(parent)
            .with_context(|| format!("failed to resolve {}", parent.display()))?;
        Ok(Self { def, base_dir })
    }

    fn layout(&self) -> ExperimentLayout {
        ExperimentLayout::new(
            &self.base_dir.join(&self.def.experiment.data_dir),
            &self.def.experiment.name,
        )
    }
}

fn plan(path: &Path, ctx: &ExpContext<'_>) -> Result<(ExperimentFile, PlannedExperiment)> {
    let file = ExperimentFile::load(path)?;
    let resolved = PlabConfig::resolve(ctx.planner_dir)?;
    let planned =
        experiment::plan_experiment(&file.def, &file.base_dir, &resolved.planner_root, &ctx.host)?;
    Ok((file, planned))
}

// -----------------------------------------------------------------------
// Steps
// -----------------------------------------------------------------------

fn print_plan(planned: &PlannedExperiment) {
    let runs = planned.experiment.runs();
    println!("Experiment:  {}", planned.experiment.name);
    println!("Environment: {}", planned.environment);
    println!("Directory:   {}", planned.layout.exp_dir.display());
    println!("Runs:        {}", runs.len());
    println!();
    println!("{:<7} {:<20} {:<24} PROBLEM", "RUN", "ALGORITHM", "DOMAIN");
    for (i, run) in runs.iter().enumerate() {
        let field = |key: &str| {
            run.properties
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_owned()
        };
        println!(
            "{:<7} {:<20} {:<24} {}",
            format!("{:05}", i + 1),
            field("algorithm"),
            field("domain"),
            field("problem"),
        );
    }
}

fn cmd_build(planned: &PlannedExperiment, force: bool) -> Result<()> {
    let runs = experiment::build(planned, force)?;
    tracing::debug!(runs = runs.len(), force, "build step finished");
    println!(
        "Built {} runs in {}",
        runs.len(),
        planned.layout.exp_dir.display()
    );
    Ok(())
}

async fn cmd_start(file: &ExperimentFile, host: &HostContext) -> Result<StartSummary> {
    let layout = file.layout();
    let environment = select_environment(host, &file.def.environment);
    let self_exe = std::env::current_exe().context("failed to locate the plab executable")?;
    let executor = create_executor(&environment, self_exe);
    tracing::info!(
        experiment = %file.def.experiment.name,
        executor = executor.name(),
        "starting experiment"
    );

    println!("Starting {} on {environment}", file.def.experiment.name);
    let summary = experiment::start(&layout, executor.as_ref(), shutdown_token()).await?;
    println!("{summary}");
    Ok(summary)
}

fn cmd_fetch(file: &ExperimentFile) -> Result<()> {
    let layout = file.layout();
    let parser = LogParser::with_extra(&file.def.parser.patterns)
        .context("invalid regex in [[parser.patterns]]")?;
    let props = experiment::fetch(&layout, &parser)?;

    let solved = props
        .values()
        .filter(|p| p.get("coverage").and_then(|v| v.as_i64()) == Some(1))
        .count();
    println!(
        "Fetched {} runs ({solved} solved) into {}",
        props.len(),
        layout.eval_properties_file().display()
    );
    Ok(())
}

fn cmd_report(file: &ExperimentFile) -> Result<()> {
    let written = experiment::report(&file.def, &file.layout())?;
    if written.is_empty() {
        println!("No reports configured.");
    }
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// First Ctrl+C cancels the token, the second force-exits.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        let mut got_first_signal = false;
        loop {
            tokio::signal::ctrl_c().await.ok();
            if std::mem::replace(&mut got_first_signal, true) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nShutting down gracefully (Ctrl+C again to force)...");
            tracing::warn!("interrupt received, cancelling runs");
            cancel_clone.cancel();
        }
    });

    cancel
}
