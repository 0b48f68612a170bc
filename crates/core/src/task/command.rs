//! Child-process task runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::args::TaskArgs;
use super::error::TaskError;
use super::traits::{TaskReport, TaskRunner};
use crate::config::TaskConfig;
use crate::metrics;

/// How long to wait for the output pumps once the child has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the configured program once per identifier.
pub struct CommandRunner {
    args: TaskArgs,
    collect_artifacts: bool,
}

impl CommandRunner {
    /// Creates a runner for the given task configuration.
    pub fn new(config: TaskConfig) -> Self {
        Self {
            args: TaskArgs::new(config),
            collect_artifacts: false,
        }
    }

    /// Ask the program for its final file paths and the thumbnail, so the
    /// output can be post-processed.
    pub fn with_artifacts(mut self, enabled: bool) -> Self {
        self.args = self.args.with_thumbnails(enabled);
        self.collect_artifacts = enabled;
        self
    }

    fn program(&self) -> &Path {
        &self.args.config().program
    }

    fn manifest_path() -> PathBuf {
        std::env::temp_dir().join(format!("ytbatch-{}.txt", Uuid::new_v4()))
    }

    /// Distinct parent directories of the paths listed in `manifest`.
    async fn read_manifest(manifest: &Path) -> Vec<PathBuf> {
        let content = match tokio::fs::read_to_string(manifest).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No artifact manifest at {:?}: {}", manifest, e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(parent) = Path::new(line).parent() {
                let parent = parent.to_path_buf();
                if !dirs.contains(&parent) {
                    dirs.push(parent);
                }
            }
        }
        dirs
    }

    async fn remove_manifest(manifest: Option<&Path>) {
        if let Some(path) = manifest {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}

/// Copy everything from `reader` to `writer` as it arrives.
fn pump<R, W>(reader: Option<R>, mut writer: W) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Some(mut reader) = reader {
            if let Err(e) = tokio::io::copy(&mut reader, &mut writer).await {
                debug!("Output forwarding stopped: {}", e);
            }
        }
    })
}

/// How waiting on a child ended.
#[derive(Debug)]
enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
}

/// Wait for `child` unless `cancel` fires first.
///
/// An exit that is already available wins over a cancellation that arrives
/// at the same time.
async fn wait_or_cancel(child: &mut Child, cancel: &CancellationToken) -> Waited {
    tokio::select! {
        biased;
        status = child.wait() => Waited::Exited(status),
        _ = cancel.cancelled() => Waited::Cancelled,
    }
}

async fn drain(pumps: [JoinHandle<()>; 2]) {
    for pump in pumps {
        let abort = pump.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, pump).await.is_err() {
            // A grandchild still holds the pipe open
            abort.abort();
        }
    }
}

#[async_trait]
impl TaskRunner for CommandRunner {
    fn name(&self) -> &str {
        "command"
    }

    async fn run(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        let manifest = self.collect_artifacts.then(Self::manifest_path);
        let args = self.args.build(identifier, manifest.as_deref());
        debug!(
            "[{}] Running {} {}",
            identifier,
            self.program().display(),
            args.join(" ")
        );

        let mut child = Command::new(self.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TaskError::spawn(self.program(), e))?;
        metrics::PROCESSES_SPAWNED.inc();

        let pumps = [
            pump(child.stdout.take(), tokio::io::stdout()),
            pump(child.stderr.take(), tokio::io::stderr()),
        ];

        let status = match wait_or_cancel(&mut child, cancel).await {
            Waited::Exited(status) => status,
            Waited::Cancelled => {
                warn!("[{}] Cancelled, stopping {}", identifier, self.program().display());
                if let Err(e) = child.kill().await {
                    warn!("[{}] Failed to kill child process: {}", identifier, e);
                }
                drain(pumps).await;
                Self::remove_manifest(manifest.as_deref()).await;
                return Err(TaskError::Cancelled);
            }
        };

        drain(pumps).await;

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                Self::remove_manifest(manifest.as_deref()).await;
                return Err(TaskError::Io(e));
            }
        };

        if !status.success() {
            Self::remove_manifest(manifest.as_deref()).await;
            // The terminal delivers Ctrl+C to the child too, so a failure
            // during shutdown is a cancellation.
            if cancel.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            return Err(TaskError::Exit {
                program: self.program().to_path_buf(),
                code: status.code(),
            });
        }

        let artifact_dirs = match manifest.as_deref() {
            Some(path) => {
                let dirs = Self::read_manifest(path).await;
                Self::remove_manifest(Some(path)).await;
                dirs
            }
            None => Vec::new(),
        };

        Ok(TaskReport { artifact_dirs })
    }

    async fn validate(&self) -> Result<(), TaskError> {
        let output = Command::new(self.program())
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TaskError::spawn(self.program(), e))?;

        if !output.status.success() {
            return Err(TaskError::Exit {
                program: self.program().to_path_buf(),
                code: output.status.code(),
            });
        }

        debug!(
            "{} version {}",
            self.program().display(),
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Runner executing `sh -c <script> sh <id>`, so the script sees the
    /// identifier as `$1`.
    fn shell_runner(script: &str) -> CommandRunner {
        CommandRunner::new(TaskConfig {
            program: PathBuf::from("sh"),
            args: Some(vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
                "{id}".to_string(),
            ]),
            ..Default::default()
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_child_wins_over_cancel() {
        let mut child = Command::new("sh")
            .args(["-c", "exit 0"])
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        // Let the child exit without reaping it, then cancel
        tokio::time::sleep(Duration::from_millis(300)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        match wait_or_cancel(&mut child, &cancel).await {
            Waited::Exited(status) => assert!(status.unwrap().success()),
            Waited::Cancelled => panic!("exited child reported as cancelled"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_running_child_is_cancelled() {
        let mut child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            wait_or_cancel(&mut child, &cancel).await,
            Waited::Cancelled
        ));
        child.kill().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_success() {
        let runner = shell_runner("echo processing $1");
        let report = runner.run("abc", &CancellationToken::new()).await.unwrap();
        assert!(report.artifact_dirs.is_empty());
    }

    #[tokio::test]
    async fn test_run_failure_carries_exit_code() {
        let runner = shell_runner("echo broken >&2; exit 3");
        let err = runner
            .run("abc", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Exit { code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_run_program_not_found() {
        let runner = CommandRunner::new(TaskConfig {
            program: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        });
        let err = runner
            .run("abc", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::ProgramNotFound { .. }));
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let runner = shell_runner("exit 0");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner.run("abc", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_cancelled_while_running() {
        let runner = shell_runner("sleep 30");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = runner.run("abc", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_read_manifest_collects_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = dir.path().join("manifest.txt");
        tokio::fs::write(
            &manifest,
            "/music/Album/01 - Intro.mp3\n/music/Album/02 - Song.mp3\n\n/music/Other/x.mp3\n",
        )
        .await
        .unwrap();

        let dirs = CommandRunner::read_manifest(&manifest).await;
        assert_eq!(
            dirs,
            vec![PathBuf::from("/music/Album"), PathBuf::from("/music/Other")]
        );
    }

    #[tokio::test]
    async fn test_read_missing_manifest() {
        let dirs = CommandRunner::read_manifest(Path::new("/nonexistent/manifest.txt")).await;
        assert!(dirs.is_empty());
    }

    #[tokio::test]
    async fn test_validate() {
        let ok = CommandRunner::new(TaskConfig {
            program: PathBuf::from("true"),
            ..Default::default()
        });
        assert!(ok.validate().await.is_ok());

        let missing = CommandRunner::new(TaskConfig {
            program: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        });
        assert!(matches!(
            missing.validate().await,
            Err(TaskError::ProgramNotFound { .. })
        ));
    }
}
