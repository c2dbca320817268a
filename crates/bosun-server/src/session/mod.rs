//! Session engine: one live connection bound to one resource.
//!
//! Every accepted upgrade becomes a session owning exactly one handle: a
//! PTY process, a poller, or an attached process stream. The handle's
//! lifetime is bounded by the session's: teardown is a single synchronous
//! step (kill / stop / drop) reachable from every exit path, and closing
//! the client connection is the sole cancellation signal.

pub mod factory;
pub mod poller;
pub mod pty;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::docker::DockerCli;
use crate::router::{Route, SessionKind};

/// The accepted server-side WebSocket stream.
pub type WsStream = WebSocketStream<TcpStream>;

/// Shared dependencies injected into every session factory.
pub struct SessionContext {
    /// Shell program for host PTY sessions.
    pub shell_program: String,
    /// TERM value exported into PTY sessions.
    pub term: String,
    pub docker: DockerCli,
    /// Tick interval shared by both telemetry pollers.
    pub poll_interval: Duration,
    pub registry: SessionRegistry,
    /// Daemon-wide shutdown; each session observes a child token.
    pub shutdown: CancellationToken,
}

/// Tracks live sessions for logging and shutdown diagnostics.
///
/// Deliberately not an admission policy: every accepted upgrade gets a
/// session, with no cap and no rate limit.
#[derive(Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, SessionKind>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: SessionKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.insert(id, kind);
        info!(session = id, kind = kind.as_str(), live = live.len(), "session started");
        id
    }

    pub fn unregister(&self, id: u64) {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        if live.remove(&id).is_some() {
            info!(session = id, live = live.len(), "session closed");
        }
    }

    pub fn count(&self) -> usize {
        self.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Run one session to completion: construct the handle via the matching
/// factory, pump until the connection closes, release the handle.
pub async fn run(route: Route, ws: WsStream, ctx: Arc<SessionContext>) {
    let id = ctx.registry.register(route.kind);
    let cancel = ctx.shutdown.child_token();

    let result = match route.kind {
        SessionKind::Shell => factory::shell(ws, &ctx, &cancel).await,
        SessionKind::ContainerExec => {
            factory::container_exec(route.param, ws, &ctx, &cancel).await
        }
        SessionKind::ContainerList => factory::container_list(ws, &ctx, &cancel).await,
        SessionKind::ContainerLog => factory::container_log(route.param, ws, &ctx, &cancel).await,
        SessionKind::HostMetrics => factory::host_metrics(ws, &ctx, &cancel).await,
        SessionKind::NetworkPing => factory::network_ping(route.param, ws, &cancel).await,
    };

    ctx.registry.unregister(id);

    match result {
        Ok(()) => debug!(session = id, "session torn down cleanly"),
        Err(e) => info!(session = id, error = %e, "session ended"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_counts_live_sessions() {
        let registry = SessionRegistry::new();
        let a = registry.register(SessionKind::Shell);
        let b = registry.register(SessionKind::HostMetrics);
        assert_eq!(registry.count(), 2);
        registry.unregister(a);
        registry.unregister(b);
        assert_eq!(registry.count(), 0);
        // Unregistering twice is harmless.
        registry.unregister(a);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn registry_ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.register(SessionKind::NetworkPing);
        let b = registry.register(SessionKind::NetworkPing);
        assert_ne!(a, b);
    }
}
