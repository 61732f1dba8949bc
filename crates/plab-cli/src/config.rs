//! Configuration file management for plab.
//!
//! Provides a TOML-based config file at `~/.config/plab/config.toml` and a
//! resolution chain: CLI flag > env var > config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Environment variable naming the planner source checkout.
pub const PLANNER_ENV: &str = "POWER_LIFTED_SRC";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub planner: PlannerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlannerSection {
    /// Root of the planner checkout (holds `builds/` and `benchmarks/`).
    pub root: PathBuf,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the plab config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/plab` or `~/.config/plab`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("plab");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("plab")
}

/// Return the path to the plab config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlabConfig {
    pub planner_root: PathBuf,
}

impl PlabConfig {
    /// Resolve the planner root: `cli_planner_dir` > `POWER_LIFTED_SRC` env >
    /// `config_file.planner.root` > error.
    pub fn resolve(cli_planner_dir: Option<&Path>) -> Result<Self> {
        let planner_root = if let Some(dir) = cli_planner_dir {
            dir.to_path_buf()
        } else if let Some(dir) = std::env::var_os(PLANNER_ENV).filter(|v| !v.is_empty()) {
            PathBuf::from(dir)
        } else if let Ok(cfg) = load_config() {
            cfg.planner.root
        } else {
            bail!("planner root not found; set {PLANNER_ENV} or run `plab init --planner-dir DIR`");
        };

        if !planner_root.is_dir() {
            bail!("planner root {} is not a directory", planner_root.display());
        }
        // Run directories symlink into the planner tree.
        let planner_root = std::path::absolute(&planner_root).with_context(|| {
            format!("failed to resolve planner root {}", planner_root.display())
        })?;
        Ok(Self { planner_root })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
