//! Daemon configuration: TOML file + CLI overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use bosun_core::{BosunError, BosunResult};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub shell: ShellSection,
    #[serde(default)]
    pub docker: DockerSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// `[shell]` section: host PTY sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellSection {
    #[serde(default = "default_shell")]
    pub program: String,
    #[serde(default = "default_term")]
    pub term: String,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            program: default_shell(),
            term: default_term(),
        }
    }
}

/// `[docker]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerSection {
    #[serde(default = "default_docker_bin")]
    pub bin: String,
}

impl Default for DockerSection {
    fn default() -> Self {
        Self {
            bin: default_docker_bin(),
        }
    }
}

/// `[telemetry]` section: poller cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_shell() -> String {
    if cfg!(windows) {
        "powershell.exe".to_string()
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string())
    }
}
fn default_term() -> String {
    "xterm-256color".to_string()
}
fn default_docker_bin() -> String {
    "docker".to_string()
}
fn default_interval_ms() -> u64 {
    2000
}

/// Resolved daemon configuration (file values with CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub shell_program: String,
    pub term: String,
    pub docker_bin: String,
    pub poll_interval_ms: u64,
}

impl ServerConfig {
    /// Load config from a TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_port: Option<u16>,
        cli_bind: Option<&str>,
        cli_interval_ms: Option<u64>,
    ) -> BosunResult<Self> {
        let file_config = if let Some(path) = config_path {
            let expanded = expand_tilde(path);
            if expanded.exists() {
                info!(path = %expanded.display(), "loading config file");
                let content = std::fs::read_to_string(&expanded)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| BosunError::Other(format!("config parse error: {e}")))?
            } else {
                info!(path = %expanded.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
        } else {
            ConfigFile::default()
        };

        Ok(Self {
            port: cli_port.unwrap_or(file_config.server.port),
            bind: cli_bind
                .map(str::to_string)
                .unwrap_or(file_config.server.bind),
            shell_program: file_config.shell.program,
            term: file_config.shell.term,
            docker_bin: file_config.docker.bin,
            poll_interval_ms: cli_interval_ms.unwrap_or(file_config.telemetry.interval_ms),
        })
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let config = ServerConfig::load(None, None, None, None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.docker_bin, "docker");
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn cli_overrides_win() {
        let config = ServerConfig::load(None, Some(8080), Some("127.0.0.1"), Some(500)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let parsed: ConfigFile = toml::from_str(
            r#"
            [server]
            port = 4000

            [telemetry]
            interval_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.port, 4000);
        assert_eq!(parsed.server.bind, "0.0.0.0");
        assert_eq!(parsed.telemetry.interval_ms, 1000);
        assert_eq!(parsed.docker.bin, "docker");
    }
}
