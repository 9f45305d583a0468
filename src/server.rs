use crate::clock::SystemClock;
use crate::error::{HandlerFault, RequestError};
use crate::game::Game;
use crate::http::read_request;
use crate::routes::{App, Reply};
use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause after a failed accept, so persistent errors such as EMFILE don't spin.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub public_dir: PathBuf,
    pub port: u16,
    /// Bounds each accept wait and each request read.
    pub timeout: Duration,
    /// Seed for the scramble RNG; entropy when unset.
    pub seed: Option<u64>,
    pub log_requests: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            seed: None,
            log_requests: true,
        }
    }
}

/// Outside handle on a running serve loop.
///
/// Clones share state, so a harness can keep one while the loop owns another:
/// stop the loop, cap how many connections it accepts, and collect the faults
/// raised while composing or writing responses.
#[derive(Clone, Default)]
pub struct ServeControl {
    max_connections: Option<usize>,
    stopped: Arc<AtomicBool>,
    faults: Arc<Mutex<Vec<HandlerFault>>>,
}

impl ServeControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after this many connections have been handled.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// Ask the loop to stop; it notices at its next accept tick.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn should_continue(&self, served: usize) -> bool {
        !self.is_stopped() && self.max_connections.map_or(true, |max| served < max)
    }

    fn record(&self, fault: HandlerFault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault);
    }

    pub fn fault_count(&self) -> usize {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn take_faults(&self) -> Vec<HandlerFault> {
        std::mem::take(&mut *self.faults.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Served,
    Aborted,
    Shutdown,
}

/// Create a dual-stack listener, falling back to IPv4 where IPv6 is missing.
fn create_listener(port: u16) -> Result<std::net::TcpListener> {
    match create_socket(Domain::IPV6, SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            warn!("IPv6 listener unavailable ({}), using IPv4 only", e);
            create_socket(Domain::IPV4, SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        }
    }
}

fn create_socket(domain: Domain, addr: SocketAddr) -> Result<std::net::TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if domain == Domain::IPV6 {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    Ok(socket.into())
}

pub async fn start_server(config: ServeConfig) -> Result<()> {
    start_server_with(config, ServeControl::new()).await
}

pub async fn start_server_with(config: ServeConfig, control: ServeControl) -> Result<()> {
    let game = match config.seed {
        Some(seed) => Game::with_seed(seed),
        None => Game::new(),
    };
    let mut app = App::new(&config.public_dir, game, Box::new(SystemClock))
        .context("Failed to compile page templates")?;

    let listener = TcpListener::from_std(
        create_listener(config.port).with_context(|| format!("Failed to bind port {}", config.port))?,
    )?;

    info!(
        "Server started on port {}. Try: http://localhost:{}/startgame.html",
        config.port, config.port
    );
    info!("Serving directory: {:?}", config.public_dir);

    serve(&listener, &mut app, &config, &control).await;
    Ok(())
}

/// Accept and handle connections one at a time until the shutdown route is
/// hit or `control` says stop.
pub async fn serve(
    listener: &TcpListener,
    app: &mut App,
    config: &ServeConfig,
    control: &ServeControl,
) {
    let mut served = 0;

    while control.should_continue(served) {
        let (mut stream, peer) = match timeout(config.timeout, listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                accept_backoff(&e).await;
                continue;
            }
            Err(_) => {
                trace!("no connection within accept timeout");
                continue;
            }
        };
        served += 1;
        debug!(%peer, "accepted connection");

        if serve_connection(&mut stream, app, config, control).await == ConnectionOutcome::Shutdown
        {
            info!("Server shutting down");
            return;
        }
    }

    info!(served, "Serve loop stopped");
}

async fn accept_backoff(e: &std::io::Error) {
    warn!("Failed to accept connection: {}", e);
    sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Read one request, answer it, close the stream.
///
/// Faults end this connection only. Composition and write faults are also
/// handed to `control`.
pub async fn serve_connection<S>(
    stream: &mut S,
    app: &mut App,
    config: &ServeConfig,
    control: &ServeControl,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let read = {
        let mut reader = BufReader::new(&mut *stream);
        timeout(config.timeout, read_request(&mut reader)).await
    };
    let request = match read.unwrap_or(Err(RequestError::TimedOut)) {
        Ok(request) => request,
        Err(e) => {
            warn!("Error while reading HTTP request: {}", e);
            close(stream).await;
            return ConnectionOutcome::Aborted;
        }
    };

    let outcome = match app.dispatch(&request).await {
        Ok(Reply::Shutdown) => ConnectionOutcome::Shutdown,
        Ok(Reply::Respond(response)) => match response.write_to(stream).await {
            Ok(()) => {
                if config.log_requests {
                    info!(
                        method = %request.method,
                        path = %request.path,
                        status = response.status,
                        "request"
                    );
                }
                ConnectionOutcome::Served
            }
            Err(e) => {
                let fault = HandlerFault::Write(e);
                warn!("Error while writing HTTP response: {}", fault);
                control.record(fault);
                ConnectionOutcome::Aborted
            }
        },
        Err(fault) => {
            warn!(
                method = %request.method,
                path = %request.path,
                "Error while composing HTTP response: {}", fault
            );
            control.record(fault);
            ConnectionOutcome::Aborted
        }
    };

    close(stream).await;
    outcome
}

async fn close<S>(stream: &mut S)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!("Connection shutdown failed: {}", e);
    }
}
