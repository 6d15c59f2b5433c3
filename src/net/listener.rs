//! Listener lifecycle.
//!
//! # Responsibilities
//! - Bind a TCP or Unix-domain listener (bind errors are synchronous)
//! - Open Unix socket permissions so unprivileged local clients can connect
//! - Serve a router in the background until the stop trigger fires
//! - Report completion once serving has fully ended
//!
//! # States
//! ```text
//! Serving ──stop trigger──▶ Stopping ──in-flight drained──▶ Stopped
//! ```
//! There is no transition back.

use std::fmt;
use std::fs::{self, Permissions};
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::serve::Listener;
use axum::Router;
use tokio::net::{unix, TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::{oneshot, watch};

use crate::lifecycle::Shutdown;
use crate::net::address::{AddressError, ListenAddr};
use crate::observability::metrics;

/// Mode applied to Unix sockets after binding.
pub const SOCKET_MODE: u32 = 0o777;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("failed to set mode {mode:o} on {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        mode: u32,
        source: io::Error,
    },

    #[error("listener {addr} failed while serving: {source}")]
    Serve { addr: String, source: io::Error },

    #[error("listener {addr} exited without reporting completion")]
    Lost { addr: String },
}

/// What to do when serving fails without a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Abort the process. A listener that stopped on its own is never rebound.
    #[default]
    Abort,
    /// Deliver the error through the completion signal.
    Report,
}

/// Lifecycle state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Serving,
    Stopping,
    Stopped,
}

/// The address a listener actually bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for LocalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalAddr::Tcp(addr) => write!(f, "tcp://{}", addr),
            LocalAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

enum Bound {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// A bound, serving listener.
pub struct ListenerHandle {
    local_addr: LocalAddr,
    stop: Shutdown,
    state: watch::Receiver<ListenerState>,
    completion: oneshot::Receiver<Result<(), ListenerError>>,
}

impl ListenerHandle {
    /// Bind `addr` and serve `router` on it, aborting the process on serve faults.
    pub async fn start(addr: &ListenAddr, router: Router) -> Result<Self, ListenerError> {
        Self::start_with(addr, router, FaultPolicy::Abort).await
    }

    /// Bind `addr` and serve `router` on it with an explicit fault policy.
    pub async fn start_with(
        addr: &ListenAddr,
        router: Router,
        policy: FaultPolicy,
    ) -> Result<Self, ListenerError> {
        let (bound, local_addr) = bind(addr).await?;
        Ok(Self::spawn(bound, local_addr, addr, router, policy))
    }

    fn spawn(
        bound: Bound,
        local_addr: LocalAddr,
        addr: &ListenAddr,
        router: Router,
        policy: FaultPolicy,
    ) -> Self {
        tracing::info!(
            protocol = addr.protocol(),
            address = %local_addr,
            "Listener bound"
        );
        metrics::record_listener_event(addr.protocol(), "start");

        let stop = Shutdown::new();
        let (state_tx, state_rx) = watch::channel(ListenerState::Serving);
        let (completion_tx, completion_rx) = oneshot::channel();

        tokio::spawn(serve(
            bound,
            router,
            addr.clone(),
            local_addr.clone(),
            stop.clone(),
            Arc::new(state_tx),
            completion_tx,
            policy,
        ));

        Self {
            local_addr,
            stop,
            state: state_rx,
            completion: completion_rx,
        }
    }

    /// The address this listener bound.
    pub fn local_addr(&self) -> &LocalAddr {
        &self.local_addr
    }

    /// A trigger that stops this listener when fired.
    pub fn stop_trigger(&self) -> Shutdown {
        self.stop.clone()
    }

    /// Stop accepting connections. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.trigger();
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Wait for serving to end.
    ///
    /// Resolves to `Ok(())` after a requested stop once in-flight requests
    /// have completed.
    pub async fn wait(self) -> Result<(), ListenerError> {
        let addr = self.local_addr.to_string();
        self.completion
            .await
            .unwrap_or(Err(ListenerError::Lost { addr }))
    }

    /// Stop and wait.
    pub async fn shutdown(self) -> Result<(), ListenerError> {
        self.stop();
        self.wait().await
    }
}

/// Wraps a listener so that a fatal accept error ends serving.
///
/// axum retries every accept error forever. Per-connection errors and
/// resource exhaustion are retried here too; anything else is sent once on
/// `fault` and accepting stops.
struct Watched<L> {
    inner: L,
    fault: Option<oneshot::Sender<io::Error>>,
}

impl<L> Watched<L> {
    fn new(inner: L, fault: oneshot::Sender<io::Error>) -> Self {
        Self {
            inner,
            fault: Some(fault),
        }
    }

    async fn accept_failed(&mut self, e: io::Error) {
        if is_connection_error(&e) {
            return;
        }
        if is_resource_exhaustion(&e) {
            tracing::warn!(error = %e, "Accept failed, retrying");
            tokio::time::sleep(Duration::from_secs(1)).await;
            return;
        }
        if let Some(fault) = self.fault.take() {
            let _ = fault.send(e);
        }
        std::future::pending::<()>().await;
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

fn is_resource_exhaustion(e: &io::Error) -> bool {
    use nix::errno::Errno;
    matches!(
        e.raw_os_error().map(Errno::from_raw),
        Some(Errno::EMFILE | Errno::ENFILE | Errno::ENOBUFS | Errno::ENOMEM)
    )
}

impl Listener for Watched<TcpListener> {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok(accepted) => return accepted,
                Err(e) => self.accept_failed(e).await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

impl Listener for Watched<UnixListener> {
    type Io = UnixStream;
    type Addr = unix::SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok(accepted) => return accepted,
                Err(e) => self.accept_failed(e).await,
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

async fn bind(addr: &ListenAddr) -> Result<(Bound, LocalAddr), ListenerError> {
    match addr {
        ListenAddr::Tcp(host_port) => {
            let bind_err = |source| ListenerError::Bind {
                addr: addr.to_string(),
                source,
            };
            let listener = TcpListener::bind(host_port.as_str()).await.map_err(bind_err)?;
            let local = listener.local_addr().map_err(bind_err)?;
            Ok((Bound::Tcp(listener), LocalAddr::Tcp(local)))
        }
        ListenAddr::Unix(path) => {
            let listener = bind_unix(addr, path)?;
            Ok((Bound::Unix(listener), LocalAddr::Unix(path.clone())))
        }
    }
}

fn bind_unix(addr: &ListenAddr, path: &Path) -> Result<UnixListener, ListenerError> {
    let listener = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    if let Err(source) = fs::set_permissions(path, Permissions::from_mode(SOCKET_MODE)) {
        drop(listener);
        let _ = fs::remove_file(path);
        return Err(ListenerError::Permissions {
            path: path.to_path_buf(),
            mode: SOCKET_MODE,
            source,
        });
    }

    Ok(listener)
}

#[allow(clippy::too_many_arguments)]
async fn serve(
    bound: Bound,
    router: Router,
    addr: ListenAddr,
    local_addr: LocalAddr,
    stop: Shutdown,
    state: Arc<watch::Sender<ListenerState>>,
    completion: oneshot::Sender<Result<(), ListenerError>>,
    policy: FaultPolicy,
) {
    let protocol = addr.protocol();
    let stopping = {
        let stop = stop.clone();
        let state = state.clone();
        let local_addr = local_addr.clone();
        async move {
            stop.wait().await;
            tracing::info!(address = %local_addr, "Listener stopping");
            state.send_replace(ListenerState::Stopping);
        }
    };

    let (fault_tx, fault_rx) = oneshot::channel();
    let serving = async move {
        match bound {
            Bound::Tcp(listener) => {
                axum::serve(Watched::new(listener, fault_tx), router)
                    .with_graceful_shutdown(stopping)
                    .await
            }
            Bound::Unix(listener) => {
                axum::serve(Watched::new(listener, fault_tx), router)
                    .with_graceful_shutdown(stopping)
                    .await
            }
        }
    };

    let result = tokio::select! {
        result = serving => result,
        Ok(fault) = fault_rx => Err(fault),
    };

    let user_initiated = stop.is_triggered();
    let outcome = match result {
        Ok(()) => Ok(()),
        Err(e) if user_initiated => {
            tracing::debug!(address = %local_addr, error = %e, "Ignoring serve error after stop");
            Ok(())
        }
        Err(source) => {
            tracing::error!(address = %local_addr, error = %source, "Listener failed while serving");
            metrics::record_listener_event(protocol, "fault");
            if policy == FaultPolicy::Abort {
                std::process::abort();
            }
            Err(ListenerError::Serve {
                addr: local_addr.to_string(),
                source,
            })
        }
    };

    if let ListenAddr::Unix(path) = &addr {
        if let Err(e) = fs::remove_file(path) {
            tracing::debug!(path = %path.display(), error = %e, "Socket file not removed");
        }
    }

    state.send_replace(ListenerState::Stopped);
    metrics::record_listener_event(protocol, "stop");
    tracing::info!(address = %local_addr, "Listener stopped");
    let _ = completion.send(outcome);
}
