//! Cluster object models, decoded from `kubectl ... -o json`.
//!
//! Only the fields the forwarder needs are modelled; everything else in the
//! kubectl payload is ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Object Metadata
// ============================================================================

/// Metadata shared by pods and services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

// ============================================================================
// Pods
// ============================================================================

/// A port declared on a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// A container in a pod spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

/// A pod as returned by `kubectl get pod -o json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

impl Pod {
    /// Builds a pod with a single container exposing the given ports.
    pub fn new(namespace: &str, name: &str, ports: &[u16]) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                labels: BTreeMap::new(),
            },
            spec: PodSpec {
                containers: vec![Container {
                    name: name.to_string(),
                    ports: ports
                        .iter()
                        .map(|p| ContainerPort {
                            container_port: *p,
                            name: None,
                            protocol: None,
                        })
                        .collect(),
                }],
            },
        }
    }

    /// Adds a label to the pod.
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .labels
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// The first port of the first container, if any.
    pub fn first_container_port(&self) -> Option<u16> {
        self.spec
            .containers
            .first()
            .and_then(|c| c.ports.first())
            .map(|p| p.container_port)
    }

    /// Whether every `key=value` pair of `selector` is among the pod's labels.
    pub fn matches_selector(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.metadata.labels.get(k) == Some(v))
    }
}

/// Response structure for `kubectl get pods -o json`.
#[derive(Debug, Default, Deserialize)]
pub struct PodListResponse {
    #[serde(default)]
    pub items: Vec<Pod>,
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

/// A service as returned by `kubectl get service -o json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
}

impl Service {
    /// Builds a service selecting pods by the given labels.
    pub fn new(namespace: &str, name: &str, selector: &[(&str, &str)]) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                labels: BTreeMap::new(),
            },
            spec: ServiceSpec {
                selector: selector
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The service selector as a label selector string (`k1=v1,k2=v2`).
    pub fn label_selector(&self) -> String {
        self.spec
            .selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parses a `k1=v1,k2=v2` label selector back into a map.
///
/// Entries without `=` are ignored.
pub fn parse_label_selector(selector: &str) -> BTreeMap<String, String> {
    selector
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
