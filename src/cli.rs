use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Render the recently-added card outside a dashboard
#[derive(Parser)]
#[command(name = "emby-latest")]
#[command(about = "Compose recently added Emby movies and series into card sections", long_about = None)]
pub struct Cli {
    /// Card config (TOML, or JSON by extension). Defaults to card.toml in the user config dir
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the active sections in display order
    Sections,
    /// Run one tick and print the card markup
    Render {
        /// Host state snapshot (JSON object keyed by entity id)
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Click these section headers after the tick
        #[arg(long, value_name = "SECTION")]
        collapse: Vec<String>,
    },
    /// Tick repeatedly, re-reading the state file each time
    Watch {
        #[arg(short, long)]
        state: Option<PathBuf>,
        /// Seconds between ticks
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },
}
