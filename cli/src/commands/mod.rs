//! CLI command implementations.

pub mod config;
pub mod forward;
pub mod presets;

use anyhow::{anyhow, Result};
use perfman_core::{Config, TargetOption};

/// A `<kind>/<name>[:<local>[:<remote>]]` target, or the name of a preset.
pub fn parse_target(config: &Config, target: &str) -> Result<TargetOption> {
    if target.contains('/') {
        return Ok(target.parse()?);
    }

    config.preset(target).ok_or_else(|| {
        anyhow!(
            "unknown target {:?}; use <kind>/<name> or one of: {}",
            target,
            config.presets().into_keys().collect::<Vec<_>>().join(", ")
        )
    })
}

/// `kind/name` of an option, for display.
pub fn describe(option: &TargetOption) -> String {
    if let Some(source) = &option.source {
        return source.clone();
    }
    match (&option.pod_name, &option.service_name) {
        (Some(pod), _) => format!("pod/{}", pod),
        (None, Some(service)) => format!("service/{}", service),
        (None, None) => "-".to_string(),
    }
}

fn port_or_auto(port: u16) -> String {
    if port == 0 {
        "auto".to_string()
    } else {
        port.to_string()
    }
}
