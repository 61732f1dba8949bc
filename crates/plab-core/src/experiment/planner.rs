use std::path::{Path, PathBuf};

use super::toml_format::PlannerPaths;

/// Resolved locations of the external planner's entry points.
///
/// Built once from the planner root (CLI flag, environment or config file)
/// and passed to the run-matrix builder; nothing below this type reads the
/// process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerLayout {
    pub root: PathBuf,
    pub translator: PathBuf,
    pub search: PathBuf,
    pub task_file: String,
}

impl PlannerLayout {
    pub fn new(root: impl Into<PathBuf>, paths: &PlannerPaths) -> Self {
        let root = root.into();
        Self {
            translator: root.join(&paths.translator),
            search: root.join(&paths.search),
            task_file: paths.task_file.clone(),
            root,
        }
    }

    /// Resolve a benchmark directory: absolute paths are kept, relative
    /// paths are taken relative to the planner root.
    pub fn benchmarks_dir(&self, benchmarks: &str) -> PathBuf {
        let path = Path::new(benchmarks);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
