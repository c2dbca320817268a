//! Upgrade router: maps the path of an inbound upgrade request to a
//! session kind.
//!
//! The table is fixed, built once at daemon start, and handed by reference
//! to the listener; there is no ambient registry. Matching is
//! longest-specific-prefix; trailing path segments and the query string
//! carry the per-session parameters.

use bosun_core::{BosunError, BosunResult};

/// The six live-channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Shell,
    ContainerExec,
    ContainerList,
    ContainerLog,
    HostMetrics,
    NetworkPing,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Shell => "shell",
            SessionKind::ContainerExec => "container-exec",
            SessionKind::ContainerList => "container-list",
            SessionKind::ContainerLog => "container-log",
            SessionKind::HostMetrics => "host-metrics",
            SessionKind::NetworkPing => "network-ping",
        }
    }
}

/// A matched route: the session kind plus its extracted parameter
/// (container id, ping target), when the kind takes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: SessionKind,
    pub param: Option<String>,
}

/// Fixed prefix table, matched longest-first.
pub struct RouteTable {
    entries: Vec<(&'static str, SessionKind)>,
}

impl RouteTable {
    pub fn new() -> Self {
        let mut entries = vec![
            ("/api/docker/stats", SessionKind::ContainerList),
            ("/api/docker/containers/", SessionKind::ContainerLog),
            ("/api/docker/shell/", SessionKind::ContainerExec),
            ("/api/system/stats", SessionKind::HostMetrics),
            ("/api/network/ping", SessionKind::NetworkPing),
            ("/api/shell", SessionKind::Shell),
        ];
        entries.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));
        Self { entries }
    }

    /// Resolve an upgrade request path (and query string) to a route.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> BosunResult<Route> {
        let (_, kind) = self
            .entries
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .ok_or_else(|| BosunError::RouteNotFound(path.to_string()))?;

        let param = match kind {
            // /api/docker/containers/{id}/logs: id is the 4th segment
            SessionKind::ContainerLog => path
                .split('/')
                .nth(4)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            // /api/docker/shell/{id}: id is the last segment
            SessionKind::ContainerExec => path
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            SessionKind::NetworkPing => query.and_then(|q| query_param(q, "host")),
            _ => None,
        };

        Ok(Route { kind: *kind, param })
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract and percent-decode one query parameter.
fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key && !v.is_empty() {
            Some(
                urlencoding::decode(v)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| v.to_string()),
            )
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str, query: Option<&str>) -> BosunResult<Route> {
        RouteTable::new().resolve(path, query)
    }

    #[test]
    fn routes_every_kind() {
        assert_eq!(
            resolve("/api/docker/stats", None).unwrap().kind,
            SessionKind::ContainerList
        );
        assert_eq!(
            resolve("/api/docker/containers/abc/logs", None).unwrap().kind,
            SessionKind::ContainerLog
        );
        assert_eq!(
            resolve("/api/system/stats", None).unwrap().kind,
            SessionKind::HostMetrics
        );
        assert_eq!(
            resolve("/api/network/ping", Some("host=example.org")).unwrap().kind,
            SessionKind::NetworkPing
        );
        assert_eq!(resolve("/api/shell", None).unwrap().kind, SessionKind::Shell);
        assert_eq!(
            resolve("/api/docker/shell/abc", None).unwrap().kind,
            SessionKind::ContainerExec
        );
    }

    #[test]
    fn unmatched_paths_are_rejected() {
        assert!(matches!(
            resolve("/api/unknown", None),
            Err(BosunError::RouteNotFound(_))
        ));
        assert!(resolve("/", None).is_err());
        assert!(resolve("/api", None).is_err());
    }

    #[test]
    fn prefix_match_tolerates_suffixes() {
        // Matching is purely prefix-based.
        let route = resolve("/api/shell?foo=1", None).unwrap();
        assert_eq!(route.kind, SessionKind::Shell);
        assert_eq!(
            resolve("/api/system/stats/extra", None).unwrap().kind,
            SessionKind::HostMetrics
        );
    }

    #[test]
    fn extracts_container_ids() {
        assert_eq!(
            resolve("/api/docker/containers/cafe01/logs", None).unwrap().param.as_deref(),
            Some("cafe01")
        );
        assert_eq!(
            resolve("/api/docker/shell/cafe01", None).unwrap().param.as_deref(),
            Some("cafe01")
        );
        // Missing id segments resolve with no parameter; the factory closes.
        assert_eq!(resolve("/api/docker/containers/", None).unwrap().param, None);
        assert_eq!(resolve("/api/docker/shell/", None).unwrap().param, None);
    }

    #[test]
    fn extracts_ping_host_from_query() {
        let route = resolve("/api/network/ping", Some("host=10.0.0.1")).unwrap();
        assert_eq!(route.param.as_deref(), Some("10.0.0.1"));

        let encoded = resolve("/api/network/ping", Some("host=my%2Dhost&count=3")).unwrap();
        assert_eq!(encoded.param.as_deref(), Some("my-host"));

        assert_eq!(resolve("/api/network/ping", None).unwrap().param, None);
        assert_eq!(
            resolve("/api/network/ping", Some("target=x")).unwrap().param,
            None
        );
    }
}
