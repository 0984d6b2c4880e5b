//! The update action: pull the docs repository, then regenerate the sidebar

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{RegenerateWith, ServiceConfig};
use crate::error::{HookError, UpdateError};
use crate::sidebar::{SidebarGenerator, SidebarOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    Pull,
    Regenerate,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStep::Pull => write!(f, "git pull"),
            UpdateStep::Regenerate => write!(f, "sidebar regeneration"),
        }
    }
}

/// Output of one successful step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: UpdateStep,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u128,
}

/// Outcome of a completed update
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

#[async_trait]
pub trait Updater: Send + Sync {
    /// Runs the whole update once. Each step must succeed before the next starts.
    async fn update(&self) -> Result<UpdateReport, UpdateError>;
}

/// Pulls `remote/branch` into the docs directory and rebuilds its sidebar.
pub struct GitSidebarUpdater {
    docs_dir: PathBuf,
    git_bin: String,
    remote: String,
    branch: String,
    regenerate: RegenerateWith,
    sidebar: SidebarOptions,
    step_timeout: Duration,
    /// Held from the pull until the sidebar write returns, including a
    /// write that outlived its step timeout.
    in_flight: Arc<Mutex<()>>,
}

impl GitSidebarUpdater {
    pub fn new(config: &ServiceConfig, sidebar: SidebarOptions) -> Self {
        Self {
            docs_dir: config.docs_dir.clone(),
            git_bin: config.git_bin.clone(),
            remote: config.git_remote.clone(),
            branch: config.git_branch.clone(),
            regenerate: config.regenerate.clone(),
            sidebar,
            step_timeout: config.update_timeout,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    async fn pull(&self) -> Result<StepReport, UpdateError> {
        let args = ["pull".to_string(), self.remote.clone(), self.branch.clone()];
        self.run_command(UpdateStep::Pull, &self.git_bin, &args).await
    }

    async fn regenerate(&self, guard: OwnedMutexGuard<()>) -> Result<StepReport, UpdateError> {
        match &self.regenerate {
            RegenerateWith::Command(parts) => {
                let Some((program, args)) = parts.split_first() else {
                    return Err(UpdateError::SpawnFailed {
                        step: UpdateStep::Regenerate,
                        source: std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "SIDEBAR_COMMAND is empty",
                        ),
                    });
                };
                self.run_command(UpdateStep::Regenerate, program, args).await
            }
            RegenerateWith::Builtin => self.regenerate_builtin(guard).await,
        }
    }

    async fn regenerate_builtin(
        &self,
        guard: OwnedMutexGuard<()>,
    ) -> Result<StepReport, UpdateError> {
        let step = UpdateStep::Regenerate;
        let root = self.docs_dir.clone();
        let options = self.sidebar.clone();
        let started = Instant::now();

        info!("Running (cwd = '{}'): built-in sidebar generator", root.display());
        let written = run_blocking(step, self.step_timeout, guard, move || {
            SidebarGenerator::new(&root, &options).write()
        })
        .await?;

        Ok(StepReport {
            step,
            stdout: format!("{} generated successfully.", written.display()),
            stderr: String::new(),
            duration_ms: started.elapsed().as_millis(),
        })
    }

    async fn run_command(
        &self,
        step: UpdateStep,
        program: &str,
        args: &[String],
    ) -> Result<StepReport, UpdateError> {
        info!(
            "Running (cwd = '{}'): {} {}",
            self.docs_dir.display(),
            program,
            args.join(" ")
        );
        let started = Instant::now();

        let mut command = Command::new(program);
        command.current_dir(&self.docs_dir).args(args).kill_on_drop(true);

        let output = match timeout(self.step_timeout, command.output()).await {
            Err(_) => {
                error!("{} timed out after {}s", step, self.step_timeout.as_secs());
                return Err(UpdateError::TimedOut {
                    step,
                    after: self.step_timeout,
                });
            }
            Ok(Err(source)) => {
                error!("{} failed to start: {}", step, source);
                return Err(UpdateError::SpawnFailed { step, source });
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!("{} failed: {}", step, stderr);
            return Err(UpdateError::NonZeroExit {
                step,
                code: output.status.code(),
                stderr,
            });
        }

        if !stderr.trim().is_empty() {
            warn!("{} stderr:\n{}", step, stderr);
        }
        info!("{} output:\n{}", step, stdout);

        Ok(StepReport {
            step,
            stdout,
            stderr,
            duration_ms: started.elapsed().as_millis(),
        })
    }
}

/// Runs `work` on a blocking thread, bounded by `limit`. Blocking threads
/// cannot be cancelled, so `guard` moves into the thread and is released only
/// when `work` returns.
async fn run_blocking<T, F>(
    step: UpdateStep,
    limit: Duration,
    guard: OwnedMutexGuard<()>,
    work: F,
) -> Result<T, UpdateError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HookError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work()
    });

    match timeout(limit, task).await {
        Err(_) => {
            error!("{} timed out after {}s", step, limit.as_secs());
            Err(UpdateError::TimedOut { step, after: limit })
        }
        Ok(Err(join_error)) => Err(UpdateError::TaskAborted {
            step,
            message: join_error.to_string(),
        }),
        Ok(Ok(result)) => result.map_err(|source| UpdateError::GeneratorFailed { step, source }),
    }
}

#[async_trait]
impl Updater for GitSidebarUpdater {
    async fn update(&self) -> Result<UpdateReport, UpdateError> {
        let id = Uuid::now_v7();
        let started_at = Utc::now();
        info!(
            "Update {} - pulling {}/{} into '{}'",
            id,
            self.remote,
            self.branch,
            self.docs_dir.display()
        );

        let guard = self.in_flight.clone().lock_owned().await;
        let pull = self.pull().await?;
        let regenerate = self.regenerate(guard).await?;

        let completed_at = Utc::now();
        info!(
            "Update {} - docs updated and sidebar regenerated. Completed at: {}",
            id,
            completed_at.to_rfc3339()
        );

        Ok(UpdateReport {
            id,
            started_at,
            completed_at,
            steps: vec![pull, regenerate],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_for(docs_dir: &std::path::Path, extra: &[(&str, &str)]) -> ServiceConfig {
        let mut env: HashMap<String, String> = HashMap::from([
            ("WEBHOOK_SECRET".to_string(), "s3cret".to_string()),
            ("DOCS_DIR".to_string(), docs_dir.display().to_string()),
        ]);
        for (k, v) in extra {
            env.insert(k.to_string(), v.to_string());
        }
        ServiceConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_successful_pull_then_builtin_regenerate() {
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("1.intro.md"), "# intro").unwrap();

        // `true` ignores its arguments and exits 0, standing in for git.
        let config = config_for(docs.path(), &[("GIT_BIN", "true")]);
        let updater = GitSidebarUpdater::new(&config, SidebarOptions::default());

        let report = updater.update().await.unwrap();
        let steps: Vec<_> = report.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![UpdateStep::Pull, UpdateStep::Regenerate]);

        let sidebar = std::fs::read_to_string(docs.path().join("_sidebar.md")).unwrap();
        assert_eq!(sidebar, "* [首页](/docs/)\n* [1. intro](1.intro.md)\n");
    }

    #[tokio::test]
    async fn test_failed_pull_skips_regenerate() {
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("a.md"), "a").unwrap();

        let config = config_for(docs.path(), &[("GIT_BIN", "false")]);
        let updater = GitSidebarUpdater::new(&config, SidebarOptions::default());

        let err = updater.update().await.unwrap_err();
        assert!(matches!(
            err,
            UpdateError::NonZeroExit {
                step: UpdateStep::Pull,
                code: Some(1),
                ..
            }
        ));
        assert!(!docs.path().join("_sidebar.md").exists());
    }

    #[tokio::test]
    async fn test_failed_regenerate_command_is_attributed() {
        let docs = tempfile::tempdir().unwrap();
        let config = config_for(
            docs.path(),
            &[("GIT_BIN", "true"), ("SIDEBAR_COMMAND", "false --whatever")],
        );
        let updater = GitSidebarUpdater::new(&config, SidebarOptions::default());

        let err = updater.update().await.unwrap_err();
        assert_eq!(err.step(), Some(UpdateStep::Regenerate));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let docs = tempfile::tempdir().unwrap();
        let config = config_for(
            docs.path(),
            &[("GIT_BIN", "definitely-not-a-real-git-binary")],
        );
        let updater = GitSidebarUpdater::new(&config, SidebarOptions::default());

        let err = updater.update().await.unwrap_err();
        assert!(matches!(
            err,
            UpdateError::SpawnFailed {
                step: UpdateStep::Pull,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_step_timeout() {
        let docs = tempfile::tempdir().unwrap();
        let mut config = config_for(
            docs.path(),
            &[("GIT_BIN", "true"), ("SIDEBAR_COMMAND", "sleep 5")],
        );
        config.update_timeout = Duration::from_millis(100);
        let updater = GitSidebarUpdater::new(&config, SidebarOptions::default());

        let started = Instant::now();
        let err = updater.update().await.unwrap_err();
        assert!(matches!(
            err,
            UpdateError::TimedOut {
                step: UpdateStep::Regenerate,
                ..
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_timed_out_blocking_work_keeps_lock_until_done() {
        let in_flight = Arc::new(Mutex::new(()));
        let guard = in_flight.clone().lock_owned().await;

        let err = run_blocking(
            UpdateStep::Regenerate,
            Duration::from_millis(50),
            guard,
            || {
                std::thread::sleep(Duration::from_millis(400));
                Ok(())
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UpdateError::TimedOut { .. }));

        // The abandoned work still owns the lock, so the next update waits for it.
        assert!(in_flight.try_lock().is_err());
        let next = timeout(Duration::from_secs(2), in_flight.clone().lock_owned()).await;
        assert!(next.is_ok());
    }
}
