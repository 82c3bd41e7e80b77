//! `pipeagent models`: List the model catalog.

use pipeagent_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("  Current: {} ({})", config.model, config.base_url);
    println!();
    for entry in &config.models {
        let marker = if entry.id == config.model { "*" } else { " " };
        let endpoint = entry.base_url.as_deref().unwrap_or("(keeps current endpoint)");
        println!("  {marker} {:<28} {endpoint}", entry.id);
    }
    println!();
    println!("  Switch inside a chat with /model <id>.");
    Ok(())
}
