//! Local static server for the `docs/` export.
//!
//! When nothing answers at the base URL, the inventory stage serves the site
//! itself. The server runs on its own tokio runtime in a background thread
//! and shuts down gracefully when the handle is dropped.

use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use axum::Router;
use reqwest::{StatusCode, Url};
use tokio::sync::oneshot;
use tower_http::services::ServeDir;

use stylemark::Settings;

/// Interval between readiness probes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long to wait for a server to come up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls `url` with HEAD requests until it answers 2xx or 404.
///
/// A 404 still proves a server is listening; the route list may simply not
/// include `/`.
pub fn wait_for_server(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "failed to build readiness client");
            return false;
        }
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(response) = client.head(url).send() {
            let status = response.status();
            if status.is_success() || status == StatusCode::NOT_FOUND {
                return true;
            }
        }
        if Instant::now() + POLL_INTERVAL > deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Host and port to bind for a base URL. `localhost` binds IPv4 loopback.
pub fn bind_target(base_url: &str) -> anyhow::Result<(String, u16)> {
    let url = Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("base URL {base_url} has no host"))?;
    let host = match host {
        "localhost" => "127.0.0.1",
        other => other.trim_start_matches('[').trim_end_matches(']'),
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("base URL {base_url} has no port"))?;
    Ok((host.to_string(), port))
}

/// A running static file server.
pub struct StaticServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StaticServer {
    /// Serves `dir` on `host:port`. Port 0 picks a free port.
    pub fn start(dir: &Path, host: &str, port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((host, port))
            .with_context(|| format!("failed to bind {host}:{port}"))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("failed to build server runtime")?;

        let app = Router::new().fallback_service(ServeDir::new(dir));
        let (tx, rx) = oneshot::channel::<()>();
        let thread = thread::Builder::new()
            .name("static-server".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(err) => {
                            tracing::error!(error = %err, "static server listener failed");
                            return;
                        }
                    };
                    let shutdown = async {
                        let _ = rx.await;
                    };
                    if let Err(err) = axum::serve(listener, app)
                        .with_graceful_shutdown(shutdown)
                        .await
                    {
                        tracing::error!(error = %err, "static server stopped");
                    }
                });
            })
            .context("failed to spawn server thread")?;

        tracing::info!(%addr, dir = %dir.display(), "serving static site");
        Ok(Self {
            addr,
            shutdown: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        tracing::debug!(addr = %self.addr, "static server stopped");
    }
}

/// Makes sure something answers at the configured base URL.
///
/// Returns the server handle when one had to be started; the caller keeps it
/// alive for the rest of the run.
pub fn ensure_server(settings: &Settings) -> anyhow::Result<Option<StaticServer>> {
    let probe_url = settings.base_url.as_str();
    if wait_for_server(probe_url, READY_TIMEOUT) {
        tracing::info!(url = %probe_url, "using running server");
        return Ok(None);
    }

    let (host, port) = bind_target(&settings.base_url)?;
    let server = start_or_explain(&settings.site_dir, &host, port, &settings.base_url)?;
    tracing::debug!(url = %server.url(), "waiting for static server");
    if !wait_for_server(probe_url, READY_TIMEOUT) {
        return Err(anyhow!(
            "server at {} did not become ready within {}s",
            settings.base_url,
            READY_TIMEOUT.as_secs()
        ));
    }
    Ok(Some(server))
}

fn start_or_explain(
    dir: &Path,
    host: &str,
    port: u16,
    base_url: &str,
) -> anyhow::Result<StaticServer> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "site directory does not exist");
    }
    StaticServer::start(dir, host, port).with_context(|| {
        format!("could not start local server on {host}:{port}; start your dev server at {base_url} and retry")
    })
}
