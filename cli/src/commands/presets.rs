//! Presets command - manage saved forwarding targets.

use anyhow::{bail, Result};
use perfman_core::config::builtin_presets;
use perfman_core::{ConfigStore, TargetOption};

use super::{describe, port_or_auto};

pub async fn save(name: &str, target: &str, namespace: Option<String>) -> Result<()> {
    if name.contains('/') {
        bail!("preset names cannot contain '/'");
    }

    let mut option: TargetOption = target.parse()?;
    if let Some(namespace) = namespace {
        option = option.with_namespace(&namespace);
    }

    ConfigStore::new()?.save_target(name, option).await?;
    println!("Saved preset {}", name);
    Ok(())
}

pub async fn remove(name: &str) -> Result<()> {
    if ConfigStore::new()?.remove_target(name).await? {
        println!("Removed preset {}", name);
    } else if builtin_presets().contains_key(name) {
        bail!("{} is a built-in preset", name);
    } else {
        bail!("no saved preset named {}", name);
    }
    Ok(())
}

pub async fn list(json: bool) -> Result<()> {
    let config = ConfigStore::new()?.load().await?;
    let presets = config.presets();

    if json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
        return Ok(());
    }

    println!(
        "{:<16} {:<48} {:<16} {:<6} {:<6} ORIGIN",
        "NAME", "TARGET", "NAMESPACE", "LOCAL", "REMOTE"
    );
    println!("{}", "-".repeat(100));

    for (name, option) in &presets {
        let namespace = if option.namespace.is_empty() {
            config.default_namespace.as_str()
        } else {
            option.namespace.as_str()
        };
        let origin = if config.targets.contains_key(name) {
            "saved"
        } else {
            "built-in"
        };

        println!(
            "{:<16} {:<48} {:<16} {:<6} {:<6} {}",
            name,
            describe(option),
            namespace,
            port_or_auto(option.local_port),
            port_or_auto(option.remote_port),
            origin
        );
    }

    Ok(())
}
