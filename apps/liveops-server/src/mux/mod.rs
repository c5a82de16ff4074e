//! Single-port protocol multiplexer.
//!
//! The [`Multiplexer`] owns the listening socket. Each accepted connection is
//! classified from its leading bytes by an ordered list of [`Matcher`]s and
//! handed, bytes intact, to the [`VirtualListener`] of the first route that
//! matches. Protocol servers accept from their virtual listener as if it were
//! a real one.

pub mod matcher;
mod replay;

pub use matcher::{Any, Http2Preface, Matcher};
pub use replay::Replay;

use matcher::{decide, MatchResult};

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Connections waiting to be accepted per route.
const ROUTE_BACKLOG: usize = 128;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

type Routed = (Replay<TcpStream>, SocketAddr);

#[derive(Debug, Error)]
pub enum MuxError {
    /// The root listener was closed; terminal.
    #[error("multiplexer closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("connection closed before classification")]
    Eof,
    #[error("no route matched")]
    Unmatched,
    #[error("undecided after {0} bytes")]
    BudgetExhausted(usize),
    #[error("undecided after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug)]
pub struct MuxConfig {
    pub sniff_timeout: Duration,
    pub sniff_max_bytes: usize,
}

/// Read just enough of `stream` for `matchers` to decide.
///
/// Returns the winning route index and the bytes consumed, which the caller
/// must replay.
pub async fn classify<S>(
    stream: &mut S,
    matchers: &[&dyn Matcher],
    max_bytes: usize,
) -> Result<(usize, Vec<u8>), ClassifyError>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = Vec::with_capacity(max_bytes);
    loop {
        match decide(matchers, &prefix) {
            Ok(idx) => return Ok((idx, prefix)),
            Err(MatchResult::NeedMore) => {}
            Err(_) => return Err(ClassifyError::Unmatched),
        }
        if prefix.len() >= max_bytes {
            return Err(ClassifyError::BudgetExhausted(prefix.len()));
        }

        let mut chunk = [0u8; 256];
        let want = (max_bytes - prefix.len()).min(chunk.len());
        let n = stream.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(ClassifyError::Eof);
        }
        prefix.extend_from_slice(&chunk[..n]);
    }
}

struct Route {
    matcher: Box<dyn Matcher>,
    tx: mpsc::Sender<Routed>,
}

/// Handle that closes a running [`Multiplexer`].
#[derive(Clone)]
pub struct MuxCloser(Arc<watch::Sender<bool>>);

impl MuxCloser {
    pub fn close(&self) {
        self.0.send_replace(true);
    }
}

pub struct Multiplexer {
    listener: TcpListener,
    config: MuxConfig,
    routes: Vec<Route>,
    closed: Arc<watch::Sender<bool>>,
}

impl Multiplexer {
    pub fn new(listener: TcpListener, config: MuxConfig) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            listener,
            config,
            routes: Vec::new(),
            closed: Arc::new(closed),
        }
    }

    /// Register a route. Routes are tried in registration order.
    pub fn route(&mut self, matcher: impl Matcher + 'static) -> io::Result<VirtualListener> {
        let (tx, rx) = mpsc::channel(ROUTE_BACKLOG);
        self.routes.push(Route {
            matcher: Box::new(matcher),
            tx,
        });
        Ok(VirtualListener {
            rx,
            local_addr: self.listener.local_addr()?,
        })
    }

    pub fn closer(&self) -> MuxCloser {
        MuxCloser(self.closed.clone())
    }

    /// Accept and route until closed. Only ever returns `Err(MuxError::Closed)`.
    pub async fn serve(self) -> Result<(), MuxError> {
        let Multiplexer {
            listener,
            config,
            routes,
            closed,
        } = self;
        let routes: Arc<[Route]> = routes.into();
        let mut closed_rx = closed.subscribe();

        loop {
            let accepted = tokio::select! {
                _ = closed_rx.wait_for(|c| *c) => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    tokio::spawn(dispatch(stream, peer, routes.clone(), config));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        drop(listener);
        tracing::info!("multiplexer listener closed");
        Err(MuxError::Closed)
    }
}

async fn dispatch(
    mut stream: TcpStream,
    peer: SocketAddr,
    routes: Arc<[Route]>,
    config: MuxConfig,
) {
    let matchers: Vec<&dyn Matcher> = routes.iter().map(|r| r.matcher.as_ref()).collect();
    let classified = tokio::time::timeout(
        config.sniff_timeout,
        classify(&mut stream, &matchers, config.sniff_max_bytes),
    )
    .await
    .unwrap_or(Err(ClassifyError::Timeout(config.sniff_timeout)));

    let (idx, prefix) = match classified {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "dropping unclassified connection");
            return;
        }
    };

    let route = &routes[idx];
    tracing::debug!(%peer, protocol = route.matcher.name(), "routed connection");
    let routed = (Replay::new(prefix, stream), peer);
    if route.tx.send(routed).await.is_err() {
        tracing::warn!(%peer, protocol = route.matcher.name(), "route closed, dropping");
    }
}

/// The accepting end of one route.
pub struct VirtualListener {
    rx: mpsc::Receiver<Routed>,
    local_addr: SocketAddr,
}

impl VirtualListener {
    /// Connection stream for servers that take an incoming stream (tonic).
    /// Ends once the multiplexer is gone.
    pub fn into_incoming(self) -> impl Stream<Item = io::Result<Replay<TcpStream>>> {
        ReceiverStream::new(self.rx).map(|(stream, _)| Ok(stream))
    }
}

impl axum::serve::Listener for VirtualListener {
    type Io = Replay<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.rx.recv().await {
            Some(routed) => routed,
            // Multiplexer is gone; callers stop via their shutdown signal.
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}
