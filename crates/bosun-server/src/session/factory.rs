//! The six session factories.
//!
//! Each factory constructs exactly one handle for its connection (a PTY
//! process, a poller, or a piped child process) and hands off to the
//! matching pump loop. The pump loops `select!` over outbound chunks,
//! inbound client frames and the shutdown token; on any exit they release
//! the handle in one step and return.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use bosun_core::{BosunError, BosunResult, ControlMessage, TelemetryFrame};

use super::poller::Poller;
use super::pty::PtyAdapter;
use super::{SessionContext, WsStream};

use crate::docker::DockerCli;
use crate::metrics::HostMonitor;

/// Initial PTY geometry; the client sends a resize once it knows better.
const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 30;

/// Host shell session: spawn the configured shell on a PTY.
pub async fn shell(
    ws: WsStream,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let env = pty_env(ctx);
    let home = dirs::home_dir();
    let (pty, output) = PtyAdapter::spawn(
        &ctx.shell_program,
        &[],
        &env,
        home.as_deref(),
        DEFAULT_COLS,
        DEFAULT_ROWS,
    )?;
    pump_pty(ws, pty, output, cancel).await
}

/// Container exec session: interactive shell inside the target container,
/// with the bash→sh fallback composed into a single command string.
pub async fn container_exec(
    param: Option<String>,
    mut ws: WsStream,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let Some(container) = param else {
        let _ = ws.close(None).await;
        return Err(BosunError::MissingParameter("container id"));
    };
    let args = DockerCli::exec_shell_args(&container);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let env = pty_env(ctx);
    let home = dirs::home_dir();
    let (pty, output) = PtyAdapter::spawn(
        ctx.docker.bin(),
        &arg_refs,
        &env,
        home.as_deref(),
        DEFAULT_COLS,
        DEFAULT_ROWS,
    )?;
    pump_pty(ws, pty, output, cancel).await
}

/// Container-list telemetry: one private poller pushing the enveloped
/// container table every tick.
pub async fn container_list(
    ws: WsStream,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let docker = ctx.docker.clone();
    let (tx, frames) = mpsc::channel(16);
    let poller = Poller::start("container-list", ctx.poll_interval, tx, move || {
        let docker = docker.clone();
        async move {
            let frame = TelemetryFrame::AllContainers(docker.list_containers().await?);
            serde_json::to_string(&frame).map_err(|e| BosunError::Snapshot(e.to_string()))
        }
    });
    pump_poller(ws, poller, frames, cancel).await
}

/// Host-metrics telemetry: one private poller pushing the stats frame
/// every tick. Each session owns its own monitor so concurrent sessions
/// never share or skew each other's counters.
pub async fn host_metrics(
    ws: WsStream,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let monitor = Arc::new(HostMonitor::new());
    let (tx, frames) = mpsc::channel(16);
    let poller = Poller::start("host-metrics", ctx.poll_interval, tx, move || {
        let monitor = monitor.clone();
        async move {
            let stats = monitor.snapshot().await?;
            serde_json::to_string(&stats).map_err(|e| BosunError::Snapshot(e.to_string()))
        }
    });
    pump_poller(ws, poller, frames, cancel).await
}

/// Container log tail: verify the container exists, then follow its
/// combined output stream. Unknown containers close with no data sent.
pub async fn container_log(
    param: Option<String>,
    mut ws: WsStream,
    ctx: &SessionContext,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let Some(container) = param else {
        let _ = ws.close(None).await;
        return Err(BosunError::Attach("no container id in path".into()));
    };
    if !ctx.docker.container_exists(&container).await {
        let _ = ws.close(None).await;
        return Err(BosunError::Attach(format!("no such container: {container}")));
    }
    let child = Command::new(ctx.docker.bin())
        .args(DockerCli::log_follow_args(&container))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BosunError::Attach(format!("log attach failed: {e}")))?;
    pump_process(ws, child, cancel).await
}

/// Network ping: requires a `host` query parameter; forwards every line
/// of ping output as produced, and kills the process on close.
pub async fn network_ping(
    param: Option<String>,
    mut ws: WsStream,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let Some(host) = param else {
        let _ = ws.close(None).await;
        return Err(BosunError::MissingParameter("host"));
    };
    let child = Command::new("ping")
        .arg(&host)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BosunError::Spawn(format!("ping spawn failed: {e}")))?;
    pump_process(ws, child, cancel).await
}

fn pty_env(ctx: &SessionContext) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("TERM".to_string(), ctx.term.clone());
    env
}

/// Bidirectional pump for PTY sessions: raw output chunks one way, the
/// `input`/`resize` control protocol the other.
async fn pump_pty(
    mut ws: WsStream,
    pty: PtyAdapter,
    mut output: mpsc::Receiver<Vec<u8>>,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let mut output_open = true;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            chunk = output.recv(), if output_open => match chunk {
                Some(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    if ws.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                // Process exit does not close the connection; only the
                // client side does.
                None => output_open = false,
            },

            inbound = ws.next() => match inbound {
                Some(Ok(Message::Text(raw))) => match ControlMessage::decode(&raw) {
                    Ok(ControlMessage::Input(data)) => pty.write(data.as_bytes()),
                    Ok(ControlMessage::Resize(size)) => {
                        if let Err(e) = pty.resize(size.cols, size.rows) {
                            debug!(error = %e, "resize failed");
                        }
                    }
                    // A malformed frame is logged and dropped; it must
                    // never take the session (or the daemon) down.
                    Err(e) => warn!(error = %e, "control message dropped"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "connection error");
                    break;
                }
            },
        }
    }

    // Single teardown step, reachable from every exit above.
    pty.kill();
    Ok(())
}

/// Pump for poller-backed telemetry sessions. Inbound frames other than
/// transport pings are ignored.
async fn pump_poller(
    mut ws: WsStream,
    poller: Poller,
    mut frames: mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = frames.recv() => match frame {
                Some(json) => {
                    if ws.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },

            inbound = ws.next() => match inbound {
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "connection error");
                    break;
                }
            },
        }
    }

    poller.stop();
    Ok(())
}

/// Pump for piped child processes (log tail, ping): stdout and stderr
/// chunks are forwarded verbatim as they arrive; connection close kills
/// the process directly.
async fn pump_process(
    mut ws: WsStream,
    mut child: Child,
    cancel: &CancellationToken,
) -> BosunResult<()> {
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| BosunError::Other("child stdout not piped".into()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| BosunError::Other("child stderr not piped".into()))?;

    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut out_open = true;
    let mut err_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&out_buf[..n]).into_owned();
                    if ws.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            },

            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&err_buf[..n]).into_owned();
                    if ws.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            },

            inbound = ws.next() => match inbound {
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "connection error");
                    break;
                }
            },
        }
    }

    // Direct kill, no graceful handshake; a dead child just errors here
    // and that is ignored.
    let _ = child.start_kill();
    Ok(())
}
