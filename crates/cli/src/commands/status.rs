//! `factctx status`: Show store and selection status.

use super::{load_config, open_store};
use factctx_config::AppConfig;
use factctx_core::FactStore;
use std::path::Path;

pub async fn run(store: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(store)?;
    let db_path = config.store.resolved_path();
    let sel = &config.selection;

    println!("🗂️  factctx Status");
    println!("=================");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Store:           {}", db_path.display());
    println!("  Timeout:         {} ms", config.store.timeout_ms);
    println!("  On unavailable:  {:?}", config.store.on_unavailable);
    println!("  Categories:      {}", config.store.categories.join(", "));
    println!("  Min confidence:  {:.2}", sel.min_confidence);
    println!("  Max facts:       {}", sel.max_facts);
    println!("  Allow conflicts: {}", sel.allow_conflicts);
    println!("  Scope order:     {}", sel.scope_priority_order.join(" > "));
    for (request_type, categories) in &sel.relevance_map {
        println!("  Relevance:       {request_type} → {}", categories.join(", "));
    }

    if db_path.exists() {
        let size_kb = std::fs::metadata(&db_path)?.len() as f64 / 1024.0;
        let store = open_store(&config).await?;
        let count = store.count().await?;
        println!("\n  ✅ Store holds {count} fact(s) ({size_kb:.1} KB)");
    } else {
        println!("\n  ⚠️  Store not created yet; add a fact with `factctx fact add`");
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file; run `factctx config init` to create one");
    }

    Ok(())
}
