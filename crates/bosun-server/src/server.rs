//! Connection listener and upgrade dispatch.
//!
//! Accepts TCP connections and runs the WebSocket handshake with a header
//! callback that resolves the request path against the route table. An
//! unmatched path refuses the upgrade outright: no handshake completes,
//! no frame is sent, and no session is ever constructed.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use bosun_core::{BosunError, BosunResult};

use crate::router::{Route, RouteTable};
use crate::session::{self, SessionContext};

/// The daemon's single upgrade-capable endpoint.
pub struct StreamServer {
    listener: TcpListener,
    routes: Arc<RouteTable>,
    ctx: Arc<SessionContext>,
}

impl StreamServer {
    /// Bind the listener. The route table and session context are built
    /// once by the caller and owned here for the daemon lifetime.
    pub async fn bind(
        addr: SocketAddr,
        routes: RouteTable,
        ctx: SessionContext,
    ) -> BosunResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BosunError::Transport(format!("bind {addr} failed: {e}")))?;
        Ok(Self {
            listener,
            routes: Arc::new(routes),
            ctx: Arc::new(ctx),
        })
    }

    pub fn local_addr(&self) -> BosunResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| BosunError::Transport(format!("local_addr failed: {e}")))
    }

    /// Shared session context (registry, shutdown token).
    pub fn context(&self) -> Arc<SessionContext> {
        self.ctx.clone()
    }

    /// Accept connections until the shutdown token fires.
    pub async fn run(self) -> BosunResult<()> {
        let shutdown = self.ctx.shutdown.clone();
        info!(addr = %self.local_addr()?, "stream listener started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(live = self.ctx.registry.count(), "listener stopping");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let routes = self.routes.clone();
                        let ctx = self.ctx.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, addr, routes, ctx).await;
                        });
                    }
                    Err(e) => error!(error = %e, "TCP accept failed"),
                },
            }
        }

        Ok(())
    }
}

/// Run the handshake for one connection and hand the stream to its
/// session. Route matching happens inside the handshake callback so a
/// miss never completes the upgrade.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    routes: Arc<RouteTable>,
    ctx: Arc<SessionContext>,
) {
    let mut route: Option<Route> = None;
    let callback = |request: &Request, response: Response| {
        let path = request.uri().path();
        let query = request.uri().query();
        info!(remote = %addr, path, "upgrade request");
        match routes.resolve(path, query) {
            Ok(matched) => {
                route = Some(matched);
                Ok(response)
            }
            Err(e) => {
                warn!(remote = %addr, error = %e, "upgrade rejected");
                let mut reject = ErrorResponse::new(None);
                *reject.status_mut() = StatusCode::NOT_FOUND;
                Err(reject)
            }
        }
    };

    match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => {
            if let Some(route) = route {
                session::run(route, ws, ctx).await;
            }
        }
        // Covers the hard route reject and ordinary handshake failures;
        // the TCP connection is already gone either way.
        Err(e) => debug!(remote = %addr, error = %e, "handshake not completed"),
    }
}
