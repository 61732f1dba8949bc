use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tokio::process::Command;

use crate::experiment::matrix::RunCommand;

/// The result of executing a single run command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// The exit code, or `None` if the process was killed (timeout or
    /// signal).
    pub exit_code: Option<i32>,
    /// Whether the wall-clock limit expired.
    pub timed_out: bool,
    /// Wall-clock duration in seconds.
    pub wall_clock_secs: f64,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run `command` in `working_dir` with its limits applied.
///
/// Standard output and error go straight to the given files. The wall-clock
/// limit is enforced here (the child is killed on expiry); the memory limit
/// is applied to the child's address space before `exec` on Unix.
pub async fn run_command(
    command: &RunCommand,
    working_dir: &Path,
    stdout: File,
    stderr: File,
) -> Result<CommandOutcome> {
    let Some((program, args)) = command.argv.split_first() else {
        bail!("command {:?} has an empty argv", command.name);
    };

    let start = Instant::now();
    let timeout = Duration::from_secs(command.limits.time_limit_secs.max(1));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        let bytes = command.limits.memory_limit_mib.saturating_mul(1024 * 1024);
        // SAFETY: the closure only calls the async-signal-safe `setrlimit`.
        unsafe {
            cmd.pre_exec(move || limit_address_space(bytes));
        }
    }

    let mut child = cmd.spawn().with_context(|| {
        format!(
            "failed to execute command {:?} ({})",
            command.name,
            command.argv.join(" "),
        )
    })?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(CommandOutcome {
            exit_code: status.code(),
            timed_out: false,
            wall_clock_secs: start.elapsed().as_secs_f64(),
        }),
        Ok(Err(e)) => Err(e).with_context(|| {
            format!(
                "failed to wait on command {:?} ({})",
                command.name,
                command.argv.join(" "),
            )
        }),
        Err(_) => {
            let _ = child.kill().await;
            tracing::warn!(
                command = %command.name,
                limit_secs = command.limits.time_limit_secs,
                "command timed out"
            );
            Ok(CommandOutcome {
                exit_code: None,
                timed_out: true,
                wall_clock_secs: start.elapsed().as_secs_f64(),
            })
        }
    }
}

#[cfg(unix)]
fn limit_address_space(bytes: u64) -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: bytes as libc::rlim_t,
        rlim_max: bytes as libc::rlim_t,
    };
    // SAFETY: `limit` is a valid rlimit for the duration of the call.
    if unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::matrix::ResourceLimits;

    fn test_command(argv: &[&str], time_limit_secs: u64) -> RunCommand {
        RunCommand {
            name: "test-command".to_owned(),
            argv: argv.iter().map(|s| (*s).to_owned()).collect(),
            limits: ResourceLimits {
                time_limit_secs,
                memory_limit_mib: 1024,
            },
        }
    }

    fn outputs(dir: &Path) -> (File, File) {
        (
            File::create(dir.join("out")).unwrap(),
            File::create(dir.join("err")).unwrap(),
        )
    }

    #[tokio::test]
    async fn true_command_succeeds() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let outcome = run_command(&test_command(&["true"], 10), tmp.path(), out, err)
            .await
            .expect("should run");

        assert!(outcome.succeeded());
        assert!(!outcome.timed_out);
        assert!(outcome.wall_clock_secs >= 0.0);
    }

    #[tokio::test]
    async fn false_command_reports_exit_code() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let outcome = run_command(&test_command(&["false"], 10), tmp.path(), out, err)
            .await
            .expect("process ran, just returned non-zero");

        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[tokio::test]
    async fn output_goes_to_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let cmd = test_command(&["sh", "-c", "echo to_stdout; echo to_stderr >&2"], 10);
        run_command(&cmd, tmp.path(), out, err).await.unwrap();

        let stdout = std::fs::read_to_string(tmp.path().join("out")).unwrap();
        let stderr = std::fs::read_to_string(tmp.path().join("err")).unwrap();
        assert!(stdout.contains("to_stdout"), "stdout: {stdout:?}");
        assert!(stderr.contains("to_stderr"), "stderr: {stderr:?}");
    }

    #[tokio::test]
    async fn runs_inside_working_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let cmd = test_command(&["sh", "-c", "touch marker"], 10);
        run_command(&cmd, tmp.path(), out, err).await.unwrap();
        assert!(tmp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn nonexistent_command_returns_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let cmd = test_command(&["this_command_does_not_exist_plab_test"], 10);
        assert!(run_command(&cmd, tmp.path(), out, err).await.is_err());
    }

    #[tokio::test]
    async fn empty_argv_returns_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let cmd = test_command(&[], 10);
        let result = run_command(&cmd, tmp.path(), out, err).await;
        assert!(result.unwrap_err().to_string().contains("empty argv"));
    }

    #[tokio::test]
    async fn timeout_kills_slow_command() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (out, err) = outputs(tmp.path());
        let outcome = run_command(&test_command(&["sleep", "60"], 1), tmp.path(), out, err)
            .await
            .expect("should succeed even on timeout");

        assert!(outcome.timed_out);
        assert!(outcome.exit_code.is_none());
        assert!(outcome.wall_clock_secs < 30.0);
    }
}
