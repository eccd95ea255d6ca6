//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use trigger_broker::PaperSink;
use trigger_config::load_config_or_default;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) => println!("Validating configuration: {:?}", path),
        None => println!("Validating defaults and TRIGGER__* environment"),
    }

    let config = match load_config_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    let engine = match config.engine.to_settings() {
        Ok(engine) => engine,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    let paper = Arc::new(PaperSink::new(config.paper.initial_cash));
    let registry = match config.sink_registry(paper) {
        Ok(registry) => registry,
        Err(e) => {
            println!("Trade sink error: {}", e);
            return Err(e.into());
        }
    };
    let mut backends: Vec<String> = registry.backends().iter().map(ToString::to_string).collect();
    backends.sort();

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Stale cutoff: {}", engine.stale_cutoff);
    println!("Stale multiplier: {}", engine.stale_multiplier);
    println!("Deal timeout: {}s", engine.deal_timeout.as_secs());
    println!("Clock: {:?}", engine.clock);
    println!("Holidays: {}", config.calendar.holidays.len());
    println!("Stop rules: {}", config.stops.rules().len());
    println!("Rules file: {}", config.paths.rules.display());
    println!("Consumed store: {}", config.paths.consumed_store.display());
    println!("Paper cash: {}", config.paper.initial_cash);
    println!("Backends: {}", backends.join(", "));
    println!(
        "Desktop bridge: {}",
        config.desktop.program.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "Streaming gateway: {}",
        config.streaming.base_url.as_deref().unwrap_or("(not configured)")
    );

    Ok(())
}
