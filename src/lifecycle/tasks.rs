//! Shutdown tasks.
//!
//! Each task is a named, fallible action run at most once when shutdown
//! begins. Tasks run in the order they were registered.

use std::future::Future;

use async_trait::async_trait;

use crate::lifecycle::pidfile::PidFile;
use crate::net::listener::ListenerHandle;
use crate::store::UpdatePump;

/// Error produced by a failing task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A cleanup action run during shutdown.
#[async_trait]
pub trait ShutdownTask: Send {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    /// Run the task. Consumes it.
    async fn run(self: Box<Self>) -> Result<(), TaskError>;
}

/// Stop a listener and wait until its in-flight requests have completed.
pub struct StopListener {
    name: String,
    handle: ListenerHandle,
}

impl StopListener {
    pub fn new(name: impl Into<String>, handle: ListenerHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

#[async_trait]
impl ShutdownTask for StopListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> Result<(), TaskError> {
        self.handle.shutdown().await?;
        Ok(())
    }
}

/// Stop the update pump and wait for its consumer to exit.
pub struct StopPump {
    pump: UpdatePump,
}

impl StopPump {
    pub fn new(pump: UpdatePump) -> Self {
        Self { pump }
    }
}

#[async_trait]
impl ShutdownTask for StopPump {
    fn name(&self) -> &str {
        "update-pump"
    }

    async fn run(self: Box<Self>) -> Result<(), TaskError> {
        self.pump.stop();
        self.pump.wait().await;
        tracing::info!("Update pump stopped");
        Ok(())
    }
}

/// Remove the PID marker.
pub struct RemovePidFile {
    pid_file: PidFile,
}

impl RemovePidFile {
    pub fn new(pid_file: PidFile) -> Self {
        Self { pid_file }
    }
}

#[async_trait]
impl ShutdownTask for RemovePidFile {
    fn name(&self) -> &str {
        "pid-file"
    }

    async fn run(self: Box<Self>) -> Result<(), TaskError> {
        self.pid_file.remove()?;
        Ok(())
    }
}

/// A task built from a closure.
pub struct FnTask<F> {
    name: String,
    f: F,
}

/// Wrap an async closure as a named shutdown task.
pub fn task_fn<F, Fut>(name: impl Into<String>, f: F) -> FnTask<F>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    FnTask {
        name: name.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> ShutdownTask for FnTask<F>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> Result<(), TaskError> {
        (self.f)().await
    }
}
