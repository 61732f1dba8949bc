mod atoms_cmd;
mod config;
mod exp_cmds;
mod translate_cmd;

#[cfg(test)]
mod test_util;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use plab_core::atoms::AtomFormat;
use plab_core::environment::HostContext;

use exp_cmds::ExpContext;

#[derive(Parser)]
#[command(name = "plab", about = "Planner experiment launcher and analysis tools")]
struct Cli {
    /// Planner source root (overrides POWER_LIFTED_SRC env var and config file)
    #[arg(long, global = true)]
    planner_dir: Option<PathBuf>,

    /// Host name used to pick the execution environment (defaults to this machine)
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a plab config file pointing at the planner root (use --planner-dir)
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Atom-set tools
    Atoms {
        #[command(subcommand)]
        command: AtomsCommands,
    },
    /// Experiment steps
    Exp {
        #[command(subcommand)]
        command: ExpCommands,
    },
    /// Parse and normalize a PDDL domain/problem pair
    Translate {
        /// Domain file
        domain: PathBuf,
        /// Problem file
        problem: PathBuf,
        /// Directory to write the normalized domain.pddl and problem.pddl to
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AtomsCommands {
    /// Compare the atoms of two state dumps
    Diff {
        /// First dump
        #[arg(default_value = "fd.txt")]
        left: PathBuf,
        /// Second dump
        #[arg(default_value = "gen.txt")]
        right: PathBuf,
        /// Grammar of the first dump: list-repr, space-separated, comma-separated
        #[arg(long, default_value = "list-repr")]
        left_format: AtomFormat,
        /// Grammar of the second dump
        #[arg(long, default_value = "space-separated")]
        right_format: AtomFormat,
    },
}

#[derive(Subcommand)]
pub enum ExpCommands {
    /// Show the runs an experiment file expands to
    Show {
        /// Path to the experiment TOML file
        file: PathBuf,
    },
    /// Write the experiment directory
    Build {
        /// Path to the experiment TOML file
        file: PathBuf,
        /// Overwrite an existing experiment directory
        #[arg(long)]
        force: bool,
    },
    /// Execute (or submit) the built runs
    Start {
        /// Path to the experiment TOML file
        file: PathBuf,
    },
    /// Collect run properties into the eval directory
    Fetch {
        /// Path to the experiment TOML file
        file: PathBuf,
    },
    /// Render the configured reports
    Report {
        /// Path to the experiment TOML file
        file: PathBuf,
    },
    /// Build, start, fetch and report in one go
    Run {
        /// Path to the experiment TOML file
        file: PathBuf,
        /// Overwrite an existing experiment directory
        #[arg(long)]
        force: bool,
    },
    /// Execute a single built run directory (used by cluster jobs)
    RunDir {
        /// Run directory containing run.json
        dir: PathBuf,
    },
}

/// Execute the `plab init` command: write config file.
fn cmd_init(planner_dir: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let Some(planner_dir) = planner_dir else {
        anyhow::bail!("--planner-dir is required for `plab init`");
    };
    let root = std::path::absolute(planner_dir)?;

    let cfg = config::ConfigFile {
        planner: config::PlannerSection { root: root.clone() },
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  planner.root = {}", root.display());

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { force } => {
            cmd_init(cli.planner_dir.as_deref(), force)?;
        }
        Commands::Atoms {
            command:
                AtomsCommands::Diff {
                    left,
                    right,
                    left_format,
                    right_format,
                },
        } => {
            atoms_cmd::run_atoms_diff(&left, &right, left_format, right_format)?;
        }
        Commands::Exp { command } => {
            let host = match cli.host {
                Some(node) => HostContext::new(node),
                None => HostContext::detect(),
            };
            let ctx = ExpContext {
                planner_dir: cli.planner_dir.as_deref(),
                host,
            };
            exp_cmds::run_exp_command(command, &ctx).await?;
        }
        Commands::Translate {
            domain,
            problem,
            output,
        } => {
            translate_cmd::run_translate(&domain, &problem, output.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "plab", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn atoms_diff_defaults() {
        let cli = Cli::try_parse_from(["plab", "atoms", "diff"]).unwrap();
        match cli.command {
            Commands::Atoms {
                command:
                    AtomsCommands::Diff {
                        left,
                        right,
                        left_format,
                        right_format,
                    },
            } => {
                assert_eq!(left, PathBuf::from("fd.txt"));
                assert_eq!(right, PathBuf::from("gen.txt"));
                assert_eq!(left_format, AtomFormat::ListRepr);
                assert_eq!(right_format, AtomFormat::SpaceSeparated);
            }
            _ => panic!("expected atoms diff"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "plab",
            "exp",
            "build",
            "exp.toml",
            "--force",
            "--host",
            "login12.cluster.bc2.ch",
            "--planner-dir",
            "/opt/pl",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("login12.cluster.bc2.ch"));
        assert_eq!(cli.planner_dir, Some(PathBuf::from("/opt/pl")));
        assert!(matches!(
            cli.command,
            Commands::Exp {
                command: ExpCommands::Build { force: true, .. }
            }
        ));
    }

    #[test]
    fn invalid_atom_format_is_rejected() {
        let result = Cli::try_parse_from(["plab", "atoms", "diff", "--left-format", "yaml"]);
        assert!(result.is_err());
    }
}
