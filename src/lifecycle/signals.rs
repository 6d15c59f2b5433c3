//! OS signal handling.
//!
//! SIGHUP, SIGINT, SIGQUIT, SIGABRT and SIGTERM all request the same
//! shutdown. SIGKILL cannot be caught; the process dies without cleanup.

use std::io;

use nix::sys::signal::Signal as NixSignal;
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Subscriptions to every termination signal.
///
/// Handlers are registered on construction, so signals delivered before
/// [`recv`](Self::recv) is first polled are not lost.
pub struct TerminationSignals {
    hangup: Signal,
    interrupt: Signal,
    quit: Signal,
    abort: Signal,
    terminate: Signal,
}

impl TerminationSignals {
    /// Register handlers. Must be called from within a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            abort: signal(SignalKind::from_raw(NixSignal::SIGABRT as i32))?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.quit.recv() => "SIGQUIT",
            _ = self.abort.recv() => "SIGABRT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}
