//! Shutdown coordination.
//!
//! [`Shutdown`] is the one cancellation signal every long-running task
//! observes. [`ShutdownOrchestrator`] turns the first trigger (OS signal or
//! programmatic) into an ordered run of [`ShutdownTask`]s.

use std::io;
use std::path::PathBuf;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::pidfile::PidFile;
use crate::lifecycle::signals::TerminationSignals;
use crate::lifecycle::tasks::{RemovePidFile, ShutdownTask, TaskError};

/// Coordinator for graceful shutdown.
///
/// Cloning shares the same signal. Triggering is idempotent.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// A signal that fires with this one but can also be triggered on its own.
    pub fn child(&self) -> Shutdown {
        Shutdown {
            token: self.token.child_token(),
        }
    }
}

/// Error reported by the shutdown sequence.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("shutdown task '{name}' failed: {source}")]
    Task {
        name: String,
        #[source]
        source: TaskError,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),

    #[error("shutdown sequence ended without reporting")]
    Lost,
}

/// Builder for the ordered shutdown sequence.
pub struct ShutdownOrchestrator {
    trigger: Shutdown,
    signals: Option<TerminationSignals>,
    tasks: Vec<Box<dyn ShutdownTask>>,
    pid_file: Option<PidFile>,
}

impl ShutdownOrchestrator {
    /// Create an orchestrator fired by `trigger`.
    pub fn new(trigger: Shutdown) -> Self {
        Self {
            trigger,
            signals: None,
            tasks: Vec::new(),
            pid_file: None,
        }
    }

    /// Also fire on termination signals. Handlers are registered immediately.
    pub fn with_signals(mut self) -> Result<Self, ShutdownError> {
        self.signals = Some(TerminationSignals::install().map_err(ShutdownError::Signals)?);
        Ok(self)
    }

    /// Write the PID marker now and remove it after every other task.
    ///
    /// A marker that cannot be written is logged and skipped.
    pub fn with_pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match PidFile::create(&path) {
            Ok(pid_file) => self.pid_file = Some(pid_file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not write PID file");
            }
        }
        self
    }

    /// Append a task to the sequence.
    pub fn register<T: ShutdownTask + 'static>(&mut self, task: T) -> &mut Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Names of the tasks in execution order.
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.iter().map(|t| t.name().to_string()).collect();
        if self.pid_file.is_some() {
            names.push("pid-file".to_string());
        }
        names
    }

    /// Start waiting for the first trigger in the background.
    pub fn start(self) -> ShutdownHandle {
        let Self {
            trigger,
            signals,
            mut tasks,
            pid_file,
        } = self;

        if let Some(pid_file) = pid_file {
            tasks.push(Box::new(RemovePidFile::new(pid_file)));
        }

        let (completion_tx, completion_rx) = oneshot::channel();
        let waiter = trigger.clone();
        tokio::spawn(async move {
            wait_for_trigger(&waiter, signals).await;
            let _ = completion_tx.send(run_tasks(tasks).await);
        });

        ShutdownHandle {
            trigger,
            completion: completion_rx,
        }
    }
}

async fn wait_for_trigger(trigger: &Shutdown, signals: Option<TerminationSignals>) {
    match signals {
        Some(mut signals) => {
            tokio::select! {
                name = signals.recv() => {
                    tracing::info!(signal = name, "Shutdown signal received");
                    trigger.trigger();
                }
                _ = trigger.wait() => {
                    tracing::info!("Shutdown requested");
                }
            }
        }
        None => {
            trigger.wait().await;
            tracing::info!("Shutdown requested");
        }
    }
}

/// Run tasks in order, stopping at the first failure.
async fn run_tasks(tasks: Vec<Box<dyn ShutdownTask>>) -> Result<(), ShutdownError> {
    for task in tasks {
        let name = task.name().to_string();
        tracing::debug!(task = %name, "Running shutdown task");
        if let Err(source) = task.run().await {
            tracing::error!(task = %name, error = %source, "Shutdown task failed");
            return Err(ShutdownError::Task { name, source });
        }
    }
    Ok(())
}

/// Handle to a started shutdown sequence.
pub struct ShutdownHandle {
    trigger: Shutdown,
    completion: oneshot::Receiver<Result<(), ShutdownError>>,
}

impl ShutdownHandle {
    /// Request shutdown programmatically. Safe to call more than once.
    pub fn trigger(&self) {
        self.trigger.trigger();
    }

    pub fn stop_trigger(&self) -> Shutdown {
        self.trigger.clone()
    }

    /// Wait for the sequence to finish: `Ok(())` when every task succeeded,
    /// otherwise the first task's error.
    pub async fn wait(self) -> Result<(), ShutdownError> {
        self.completion.await.unwrap_or(Err(ShutdownError::Lost))
    }
}
