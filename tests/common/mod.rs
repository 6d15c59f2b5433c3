//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use metadata_proxy::net::{FaultPolicy, ListenAddr, LocalAddr};
use metadata_proxy::{start, DaemonConfig, RunningDaemon, Shutdown, StartOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start a mock upstream that answers every request with `f(path)`.
///
/// Returns the bound address.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nX-Upstream: mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock upstream that returns a fixed body.
#[allow(dead_code)]
pub async fn start_mock_upstream(body: &'static str) -> SocketAddr {
    start_programmable_upstream(move |_| async move { (200, body.to_string()) }).await
}

/// Start a mock upstream that waits `delay` before echoing the request path.
#[allow(dead_code)]
pub async fn start_slow_upstream(delay: Duration) -> SocketAddr {
    start_programmable_upstream(move |path| async move {
        tokio::time::sleep(delay).await;
        (200, path)
    })
    .await
}

async fn read_request_path(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

/// Daemon config with an admin socket in `dir`, an ephemeral service port
/// and `upstream` as the forward target.
pub fn test_config(dir: &Path, upstream: SocketAddr) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.admin.address = ListenAddr::Unix(dir.join("metadata.sock"));
    config.service.address = ListenAddr::tcp("127.0.0.1:0").unwrap();
    config.forward.host_port = upstream.to_string();
    config.pid.dir = dir.to_path_buf();
    config
}

pub async fn start_daemon(config: &DaemonConfig) -> RunningDaemon {
    let options = StartOptions {
        signals: false,
        fault_policy: FaultPolicy::Report,
    };
    start(config, Shutdown::new(), options).await.unwrap()
}

/// Base URL of the service endpoint.
pub fn service_url(daemon: &RunningDaemon) -> String {
    match daemon.service_addr() {
        LocalAddr::Tcp(addr) => format!("http://{}", addr),
        other => panic!("service endpoint is not tcp: {other}"),
    }
}
