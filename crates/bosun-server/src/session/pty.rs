//! PTY process adapter using portable-pty.
//!
//! Spawns one OS process bound to a pseudo-terminal and pumps its output
//! into a channel owned by the session. Used identically for the host
//! shell and for container exec.

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

use bosun_core::{BosunError, BosunResult};

/// Output chunk size for the blocking read pump.
const READ_BUF_SIZE: usize = 4096;

/// Channel depth between the read pump and the session loop.
const OUTPUT_CHANNEL_DEPTH: usize = 64;

/// One spawned process bound to a pseudo-terminal.
///
/// The adapter owns the PTY master for resize, the writer for input, and
/// the child handle for kill. Output is delivered through the receiver
/// returned by [`PtyAdapter::spawn`]; the channel closes when the process
/// exits or the PTY is torn down.
pub struct PtyAdapter {
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: Arc<Mutex<Box<dyn portable_pty::Child + Send + Sync>>>,
    killed: AtomicBool,
    size: Mutex<(u16, u16)>,
}

impl PtyAdapter {
    /// Spawn `program` with `args` on a fresh PTY at the given geometry.
    ///
    /// Returns the adapter plus the output channel. Spawn failure (binary
    /// not found, bad working directory) is fatal to the owning session.
    pub fn spawn(
        program: &str,
        args: &[&str],
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
        cols: u16,
        rows: u16,
    ) -> BosunResult<(Self, mpsc::Receiver<Vec<u8>>)> {
        let pty_system = native_pty_system();

        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(size)
            .map_err(|e| BosunError::Spawn(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(program);
        for arg in args {
            cmd.arg(arg);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }
        if let Some(dir) = cwd {
            cmd.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| BosunError::Spawn(format!("failed to spawn {program}: {e}")))?;

        info!(program, cols, rows, "PTY spawned");

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| BosunError::Spawn(format!("failed to clone PTY reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| BosunError::Spawn(format!("failed to take PTY writer: {e}")))?;

        let child: Arc<Mutex<Box<dyn portable_pty::Child + Send + Sync>>> =
            Arc::new(Mutex::new(child));

        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_DEPTH);

        // Blocking read pump: raw chunks, forwarded verbatim. Exits on
        // process exit (EOF/EIO after kill) or when the session drops the
        // receiver; reaps the child on the way out.
        let pump_child = child.clone();
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; READ_BUF_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if out_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
            let mut child = pump_child.lock().unwrap_or_else(|e| e.into_inner());
            let _ = child.wait();
            debug!("PTY read pump exited");
        });

        Ok((
            Self {
                writer: Mutex::new(writer),
                master: Mutex::new(pair.master),
                child,
                killed: AtomicBool::new(false),
                size: Mutex::new((cols, rows)),
            },
            out_rx,
        ))
    }

    /// Forward raw bytes to the process input.
    ///
    /// Errors are swallowed once the process is gone; there is no
    /// buffering beyond the OS pipe.
    pub fn write(&self, data: &[u8]) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writer.write_all(data).and_then(|_| writer.flush());
    }

    /// Update the PTY window size. No-op when unchanged; safe to repeat.
    pub fn resize(&self, cols: u16, rows: u16) -> BosunResult<()> {
        let mut size = self.size.lock().unwrap_or_else(|e| e.into_inner());
        if *size == (cols, rows) {
            return Ok(());
        }
        let master = self.master.lock().unwrap_or_else(|e| e.into_inner());
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| BosunError::Other(format!("PTY resize failed: {e}")))?;
        drop(master);
        *size = (cols, rows);
        debug!(cols, rows, "PTY resized");
        Ok(())
    }

    /// Send the child its termination signal.
    ///
    /// Fire-and-forget and idempotent: the signal is delivered at most
    /// once even when connection-close and process-exit teardown race.
    pub fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = child.kill() {
            debug!(error = %e, "PTY kill (process already gone)");
        }
    }

    /// Current terminal geometry.
    pub fn size(&self) -> (u16, u16) {
        *self.size.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_sh(args: &[&str]) -> (PtyAdapter, mpsc::Receiver<Vec<u8>>) {
        PtyAdapter::spawn("sh", args, &HashMap::new(), None, 80, 24).unwrap()
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let err = PtyAdapter::spawn(
            "definitely-not-a-real-binary",
            &[],
            &HashMap::new(),
            None,
            80,
            24,
        )
        .err();
        assert!(matches!(err, Some(BosunError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_round_trip_and_teardown() {
        let (pty, mut rx) = spawn_sh(&[]);
        pty.write(b"echo bosun-marker\n");

        let mut collected = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let chunk = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("timed out waiting for PTY output")
                .expect("PTY output channel closed early");
            collected.extend_from_slice(&chunk);
            if String::from_utf8_lossy(&collected).contains("bosun-marker") {
                break;
            }
        }

        pty.kill();
        // After kill the pump drains to EOF and the channel closes.
        while rx.recv().await.is_some() {}
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_is_idempotent() {
        let (pty, mut rx) = spawn_sh(&["-c", "sleep 30"]);
        pty.kill();
        pty.kill();
        pty.kill();
        while rx.recv().await.is_some() {}
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resize_tracks_geometry() {
        let (pty, _rx) = spawn_sh(&["-c", "sleep 30"]);
        assert_eq!(pty.size(), (80, 24));
        pty.resize(132, 43).unwrap();
        assert_eq!(pty.size(), (132, 43));
        // Unchanged geometry is a no-op, not an error.
        pty.resize(132, 43).unwrap();
        pty.kill();
    }
}
