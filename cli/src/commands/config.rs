//! Config command - show effective configuration.

use anyhow::Result;
use perfman_core::ConfigStore;

pub async fn show(json: bool) -> Result<()> {
    let store = ConfigStore::new()?;
    let config = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let cluster = config.cluster_config();
    let display = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("Config file:       {}", store.config_path().display());
    println!("Default namespace: {}", cluster.default_namespace);
    println!("Bind address:      {}", cluster.address);
    println!("kubectl:           {}", display(&cluster.kubectl_path));
    println!("Kubeconfig:        {}", display(&cluster.kubeconfig));
    println!(
        "Context:           {}",
        cluster.context.as_deref().unwrap_or("(current)")
    );
    println!("Request timeout:   {}s", cluster.request_timeout.as_secs());
    println!("Saved targets:     {}", config.targets.len());

    Ok(())
}
