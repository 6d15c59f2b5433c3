//! Startup orchestration.
//!
//! # Responsibilities
//! - Install signal handlers before anything is bound
//! - Start the update pump, then the admin and service listeners
//! - Write the PID file and register the shutdown sequence
//!
//! Any startup error is fatal. Whatever was already started is stopped
//! before the error is returned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::admin::setup_admin_router;
use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::http::{service_router, AppState};
use crate::lifecycle::pidfile::PidFile;
use crate::lifecycle::shutdown::{Shutdown, ShutdownHandle, ShutdownOrchestrator};
use crate::lifecycle::tasks::{StopListener, StopPump};
use crate::net::listener::{FaultPolicy, ListenerHandle, LocalAddr};
use crate::proxy::{validate_target, Forwarder};
use crate::store::{KeyValueStore, UpdatePump};

/// Runtime switches that are not part of the configuration file.
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Begin shutdown on SIGHUP, SIGINT, SIGQUIT, SIGABRT or SIGTERM.
    pub signals: bool,
    /// What a listener does when serving fails unexpectedly.
    pub fault_policy: FaultPolicy,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            signals: true,
            fault_policy: FaultPolicy::Abort,
        }
    }
}

/// A started daemon.
pub struct RunningDaemon {
    admin_addr: LocalAddr,
    service_addr: LocalAddr,
    store: Arc<KeyValueStore>,
    forwarder: Arc<Forwarder>,
    pid_path: Option<PathBuf>,
    shutdown: ShutdownHandle,
}

impl RunningDaemon {
    pub fn admin_addr(&self) -> &LocalAddr {
        &self.admin_addr
    }

    pub fn service_addr(&self) -> &LocalAddr {
        &self.service_addr
    }

    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    pub fn forwarder(&self) -> &Arc<Forwarder> {
        &self.forwarder
    }

    /// Where the PID file was requested, if enabled.
    pub fn pid_path(&self) -> Option<&PathBuf> {
        self.pid_path.as_ref()
    }

    /// Begin shutdown programmatically. Safe to call more than once.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    pub fn stop_trigger(&self) -> Shutdown {
        self.shutdown.stop_trigger()
    }

    /// Wait until the shutdown sequence has run.
    pub async fn wait(self) -> Result<(), DaemonError> {
        self.shutdown.wait().await?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Bring up the daemon described by `config`.
///
/// Shutdown begins when `trigger` fires (or on a signal, if enabled).
pub async fn start(
    config: &DaemonConfig,
    trigger: Shutdown,
    options: StartOptions,
) -> Result<RunningDaemon, DaemonError> {
    validate_target(&config.forward.host_port)?;

    let mut orchestrator = ShutdownOrchestrator::new(trigger);
    if options.signals {
        orchestrator = orchestrator.with_signals()?;
    }

    let store = Arc::new(KeyValueStore::new());
    let pump = UpdatePump::spawn(store.clone());
    tracing::info!("Update pump started");

    let forwarder = Forwarder::new(
        config.forward.host_port.clone(),
        Duration::from_secs(config.timeouts.connect_secs),
    );
    let state = AppState::new(store.clone(), pump.sender(), forwarder);
    let forwarder = state.forwarder.clone();

    tracing::info!(address = %config.admin.address, "Starting admin endpoint");
    let admin = match ListenerHandle::start_with(
        &config.admin.address,
        setup_admin_router(state.clone(), config),
        options.fault_policy,
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            pump.stop();
            return Err(DaemonError::Listener {
                endpoint: "admin",
                source: e,
            });
        }
    };

    tracing::info!(address = %config.service.address, "Starting service endpoint");
    let service = match ListenerHandle::start_with(
        &config.service.address,
        service_router(state, config),
        options.fault_policy,
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            if let Err(stop_err) = admin.shutdown().await {
                tracing::warn!(error = %stop_err, "Admin listener did not stop cleanly");
            }
            pump.stop();
            return Err(DaemonError::Listener {
                endpoint: "service",
                source: e,
            });
        }
    };

    let admin_addr = admin.local_addr().clone();
    let service_addr = service.local_addr().clone();

    let pid_path = config
        .pid
        .enabled
        .then(|| config.pid.dir.join(PidFile::default_name()));
    if let Some(path) = &pid_path {
        orchestrator = orchestrator.with_pid_file(path.clone());
    }

    orchestrator
        .register(StopListener::new("admin-listener", admin))
        .register(StopListener::new("service-listener", service))
        .register(StopPump::new(pump));
    tracing::debug!(tasks = ?orchestrator.task_names(), "Shutdown sequence registered");

    tracing::info!(
        admin = %admin_addr,
        service = %service_addr,
        forward = %forwarder.target().get(),
        "Daemon started"
    );

    Ok(RunningDaemon {
        admin_addr,
        service_addr,
        store,
        forwarder,
        pid_path,
        shutdown: orchestrator.start(),
    })
}
