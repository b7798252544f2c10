//! Target options: what the caller asks to forward, and their validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ForwardError, Result};

/// Kind of object a target names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Pod,
    Service,
}

impl TargetKind {
    /// Maps a kubectl-style resource alias to a kind.
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "po" | "pod" | "pods" => Some(Self::Pod),
            "svc" | "service" | "services" => Some(Self::Service),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits a `<kind>/<name>` source descriptor.
pub fn parse_source(source: &str) -> Result<(TargetKind, String)> {
    let parts: Vec<&str> = source.split('/').collect();
    let [kind, name] = parts.as_slice() else {
        return Err(ForwardError::InvalidSource(source.to_string()));
    };

    let kind = TargetKind::from_alias(kind)
        .ok_or_else(|| ForwardError::InvalidSource(source.to_string()))?;

    if name.is_empty() {
        return Err(ForwardError::InvalidSource(source.to_string()));
    }

    Ok((kind, name.to_string()))
}

/// A forwarding request as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOption {
    /// Desired local port; 0 lets the forwarder pick a free one.
    #[serde(default)]
    pub local_port: u16,
    /// Container port; 0 means the pod's first declared container port.
    #[serde(default)]
    pub remote_port: u16,
    /// Empty means the configured default namespace.
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// `<kind>/<name>`; overrides `pod_name`/`service_name` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TargetOption {
    /// Option forwarding `local_port` to the target named by `source`.
    pub fn from_source(source: &str, local_port: u16) -> Self {
        Self {
            local_port,
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    pub fn with_remote_port(mut self, remote_port: u16) -> Self {
        self.remote_port = remote_port;
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }
}

/// Parses `<kind>/<name>[:<local>[:<remote>]]`.
impl FromStr for TargetOption {
    type Err = ForwardError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let source = parts.next().unwrap_or_default();
        parse_source(source)?;

        let mut port = |label: &str| -> Result<u16> {
            match parts.next() {
                None => Ok(0),
                Some(p) => p.parse().map_err(|_| {
                    ForwardError::InvalidSource(format!("{} ({} port {:?})", s, label, p))
                }),
            }
        };
        let local_port = port("local")?;
        let remote_port = port("remote")?;

        if parts.next().is_some() {
            return Err(ForwardError::InvalidSource(s.to_string()));
        }

        Ok(Self::from_source(source, local_port).with_remote_port(remote_port))
    }
}

/// A validated option naming exactly one pod or service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOption {
    pub namespace: String,
    pub kind: TargetKind,
    pub name: String,
    pub local_port: u16,
    pub remote_port: u16,
}

impl fmt::Display for NormalizedOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} in {}", self.kind, self.name, self.namespace)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Applies the default namespace and `source` to every option and checks
/// that each one names exactly one target.
///
/// A parsed `source` always replaces whatever pod or service name was set.
pub fn normalize_options(
    options: Vec<TargetOption>,
    default_namespace: &str,
) -> Result<Vec<NormalizedOption>> {
    options
        .into_iter()
        .enumerate()
        .map(|(index, option)| normalize_option(index, option, default_namespace))
        .collect()
}

fn normalize_option(
    index: usize,
    option: TargetOption,
    default_namespace: &str,
) -> Result<NormalizedOption> {
    let namespace = if option.namespace.is_empty() {
        default_namespace.to_string()
    } else {
        option.namespace
    };

    let mut pod_name = non_empty(option.pod_name);
    let mut service_name = non_empty(option.service_name);

    if let Some(source) = non_empty(option.source) {
        match parse_source(&source)? {
            (TargetKind::Pod, name) => {
                pod_name = Some(name);
                service_name = None;
            }
            (TargetKind::Service, name) => {
                service_name = Some(name);
                pod_name = None;
            }
        }
    }

    let (kind, name) = match (pod_name, service_name) {
        (Some(pod), None) => (TargetKind::Pod, pod),
        (None, Some(svc)) => (TargetKind::Service, svc),
        (None, None) => return Err(ForwardError::MissingTarget { index }),
        (Some(_), Some(_)) => return Err(ForwardError::AmbiguousTarget { index }),
    };

    Ok(NormalizedOption {
        namespace,
        kind,
        name,
        local_port: option.local_port,
        remote_port: option.remote_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_aliases() {
        for source in ["svc/x", "service/x", "services/x"] {
            let (kind, name) = parse_source(source).unwrap();
            assert_eq!(kind, TargetKind::Service, "{}", source);
            assert_eq!(name, "x");
        }
        for source in ["po/x", "pod/x", "pods/x"] {
            let (kind, name) = parse_source(source).unwrap();
            assert_eq!(kind, TargetKind::Pod, "{}", source);
            assert_eq!(name, "x");
        }
    }

    #[test]
    fn test_parse_source_rejects_malformed() {
        for source in ["bogus/x", "x", "", "svc/x/y", "svc/", "/x"] {
            let err = parse_source(source).unwrap_err();
            assert!(
                matches!(err, ForwardError::InvalidSource(ref s) if s == source),
                "{}: {:?}",
                source,
                err
            );
        }
    }

    #[test]
    fn test_normalize_applies_default_namespace() {
        let options = vec![
            TargetOption::from_source("svc/metrics", 9090),
            TargetOption::from_source("pod/grafana-0", 3000).with_namespace("monitoring"),
        ];

        let normalized = normalize_options(options, "default").unwrap();
        assert_eq!(normalized[0].namespace, "default");
        assert_eq!(normalized[0].kind, TargetKind::Service);
        assert_eq!(normalized[0].name, "metrics");
        assert_eq!(normalized[0].local_port, 9090);
        assert_eq!(normalized[1].namespace, "monitoring");
        assert_eq!(normalized[1].kind, TargetKind::Pod);
    }

    #[test]
    fn test_normalize_source_overrides_names() {
        let option = TargetOption {
            pod_name: Some("explicit-pod".to_string()),
            service_name: Some("explicit-svc".to_string()),
            source: Some("svc/from-source".to_string()),
            ..Default::default()
        };

        let normalized = normalize_options(vec![option], "default").unwrap();
        assert_eq!(normalized[0].kind, TargetKind::Service);
        assert_eq!(normalized[0].name, "from-source");
    }

    #[test]
    fn test_normalize_without_source_uses_names() {
        let option = TargetOption {
            service_name: Some("metrics".to_string()),
            pod_name: Some(String::new()),
            ..Default::default()
        };

        let normalized = normalize_options(vec![option], "default").unwrap();
        assert_eq!(normalized[0].kind, TargetKind::Service);
        assert_eq!(normalized[0].name, "metrics");
    }

    #[test]
    fn test_normalize_missing_target() {
        let options = vec![
            TargetOption::from_source("svc/metrics", 9090),
            TargetOption {
                local_port: 3000,
                ..Default::default()
            },
        ];

        let err = normalize_options(options, "default").unwrap_err();
        assert!(matches!(err, ForwardError::MissingTarget { index: 1 }));
    }

    #[test]
    fn test_normalize_ambiguous_target() {
        let option = TargetOption {
            pod_name: Some("a".to_string()),
            service_name: Some("b".to_string()),
            ..Default::default()
        };

        let err = normalize_options(vec![option], "default").unwrap_err();
        assert!(matches!(err, ForwardError::AmbiguousTarget { index: 0 }));
    }

    #[test]
    fn test_target_option_from_str() {
        let option: TargetOption = "svc/metrics:9090:8080".parse().unwrap();
        assert_eq!(option.source.as_deref(), Some("svc/metrics"));
        assert_eq!(option.local_port, 9090);
        assert_eq!(option.remote_port, 8080);

        let option: TargetOption = "pod/grafana-0".parse().unwrap();
        assert_eq!(option.local_port, 0);
        assert_eq!(option.remote_port, 0);

        assert!("svc/metrics:http".parse::<TargetOption>().is_err());
        assert!("svc/metrics:1:2:3".parse::<TargetOption>().is_err());
        assert!("deploy/metrics:1".parse::<TargetOption>().is_err());
    }

    #[test]
    fn test_target_option_serde() {
        let json = r#"{"localPort": 9090, "source": "svc/metrics"}"#;
        let option: TargetOption = serde_json::from_str(json).unwrap();
        assert_eq!(option, TargetOption::from_source("svc/metrics", 9090));

        let out = serde_json::to_string(&option).unwrap();
        assert!(!out.contains("podName"));
    }
}
