mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands};
use emby_latest::config::{default_config_path, load_config_value};
use emby_latest::prelude::*;

fn read_snapshot(path: Option<&Path>) -> HostSnapshot {
    let Some(path) = path else { return HostSnapshot::new() };
    let parsed = std::fs::read_to_string(path)
        .context("reading host state")
        .and_then(|text| HostSnapshot::from_json_str(&text).context("parsing host state"));
    match parsed {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "using empty host state");
            HostSnapshot::new()
        }
    }
}

fn configured_card(config: Option<&Path>) -> Result<CardController> {
    let path = match config {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    let value = load_config_value(&path)?;
    let mut card = CardController::new();
    if let Err(e) = card.configure(value) {
        println!("{}", card.to_html());
        return Err(e).with_context(|| format!("invalid card configuration in {}", path.display()));
    }
    Ok(card)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut card = configured_card(cli.config.as_deref())?;

    match cli.command {
        Commands::Sections => {
            if let Some(cfg) = card.config() {
                for (pos, key) in cfg.active().iter().enumerate() {
                    let label = card.registry().get(key.as_str()).map(|s| cfg.section(*key, s.default_label()));
                    match label {
                        Ok(sc) => {
                            let mode = match &sc.entity_id {
                                Some(id) => format!("entity {}", id),
                                None => "emby api".to_string(),
                            };
                            println!("{}. {} \"{}\" ({}, max {})", pos + 1, key, sc.label, mode, sc.max_items);
                        }
                        Err(e) => eprintln!("{}", e),
                    }
                }
                println!("card size: {} rows", card.card_size());
            }
        }
        Commands::Render { state, collapse } => {
            card.on_tick(&read_snapshot(state.as_deref())).await;
            for key in &collapse {
                if !card.click(key) {
                    tracing::warn!(section = %key, "no such section to collapse");
                }
            }
            println!("{}", card.to_html());
        }
        Commands::Watch { state, interval, ticks } => {
            let mut timer = tokio::time::interval(Duration::from_secs(interval.max(1)));
            let mut done = 0u64;
            loop {
                timer.tick().await;
                card.on_tick(&read_snapshot(state.as_deref())).await;
                println!("{}", card.to_html());
                done += 1;
                if ticks.is_some_and(|limit| done >= limit) {
                    break;
                }
            }
            tracing::info!(ticks = done, "watch finished");
        }
    }
    Ok(())
}
