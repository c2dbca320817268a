//! Docker CLI wrapper.
//!
//! All container interaction goes through the `docker` binary: listing for
//! the container-list poller, an existence probe before log attach, and
//! the argument vectors for the log-follow and exec-shell processes.

use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use bosun_core::{BosunError, BosunResult, ContainerSummary};

/// Composed fallback shell for container exec: try an interactive bash,
/// fall back to sh where the image has none.
const EXEC_FALLBACK_SHELL: &str = "TERM=xterm-256color /bin/bash || /bin/sh";

/// One line of `docker ps --format '{{json .}}'` output.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Ports", default)]
    ports: String,
}

/// Thin handle around the configured docker binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// List all containers (running and stopped), mapped to the summary
    /// rows the container-list frame carries.
    pub async fn list_containers(&self) -> BosunResult<Vec<ContainerSummary>> {
        let output = Command::new(&self.bin)
            .args(["ps", "--all", "--no-trunc", "--format", "{{json .}}"])
            .output()
            .await
            .map_err(|e| BosunError::Snapshot(format!("docker ps failed to run: {e}")))?;

        if !output.status.success() {
            return Err(BosunError::Snapshot(format!(
                "docker ps exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Whether a container with this id or name exists.
    pub async fn container_exists(&self, container: &str) -> bool {
        let status = Command::new(&self.bin)
            .args(["inspect", "--format", "{{.Id}}", container])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(s) => s.success(),
            Err(e) => {
                debug!(error = %e, "docker inspect failed to run");
                false
            }
        }
    }

    /// Argument vector for following a container's combined log stream,
    /// full history included.
    pub fn log_follow_args(container: &str) -> Vec<String> {
        vec!["logs".into(), "--follow".into(), container.into()]
    }

    /// Argument vector for an interactive exec shell inside a container.
    pub fn exec_shell_args(container: &str) -> Vec<String> {
        vec![
            "exec".into(),
            "-it".into(),
            container.into(),
            "sh".into(),
            "-c".into(),
            EXEC_FALLBACK_SHELL.into(),
        ]
    }
}

/// Parse newline-delimited `{{json .}}` rows into container summaries.
fn parse_ps_output(raw: &str) -> BosunResult<Vec<ContainerSummary>> {
    let mut containers = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let row: PsLine = serde_json::from_str(line)
            .map_err(|e| BosunError::Snapshot(format!("unparseable docker ps row: {e}")))?;
        containers.push(ContainerSummary {
            id: row.id,
            name: first_name(&row.names),
            image: row.image,
            state: row.state,
            status: row.status,
            ports: row.ports,
        });
    }
    Ok(containers)
}

/// First of the comma-joined container names, without any leading slash.
fn first_name(names: &str) -> String {
    let name = names
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('/');
    if name.is_empty() {
        "(no name)".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ps_rows() {
        let raw = concat!(
            r#"{"ID":"abc123","Names":"web","Image":"nginx:latest","State":"running","Status":"Up 2 hours","Ports":"0.0.0.0:8080->80/tcp"}"#,
            "\n",
            r#"{"ID":"def456","Names":"","Image":"redis:7","State":"exited","Status":"Exited (0) 3 days ago","Ports":""}"#,
            "\n",
        );
        let rows = parse_ps_output(raw).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "abc123");
        assert_eq!(rows[0].name, "web");
        assert_eq!(rows[0].ports, "0.0.0.0:8080->80/tcp");
        assert_eq!(rows[1].name, "(no name)");
        assert_eq!(rows[1].state, "exited");
    }

    #[test]
    fn empty_output_is_empty_list() {
        assert!(parse_ps_output("\n").unwrap().is_empty());
    }

    #[test]
    fn garbage_row_is_a_snapshot_error() {
        assert!(matches!(
            parse_ps_output("not-json\n"),
            Err(BosunError::Snapshot(_))
        ));
    }

    #[test]
    fn first_name_strips_and_falls_back() {
        assert_eq!(first_name("/web,/web-alias"), "web");
        assert_eq!(first_name(""), "(no name)");
    }

    #[test]
    fn exec_args_compose_the_fallback_shell() {
        let args = DockerCli::exec_shell_args("cafe01");
        assert_eq!(args[..3], ["exec", "-it", "cafe01"]);
        assert_eq!(args[3..5], ["sh", "-c"]);
        assert!(args[5].contains("/bin/bash || /bin/sh"));
    }

    #[test]
    fn log_args_follow_with_history() {
        assert_eq!(DockerCli::log_follow_args("cafe01"), ["logs", "--follow", "cafe01"]);
    }
}
