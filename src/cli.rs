//! CLI interface for the job tracker

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "job-tracker")]
#[command(about = "Job market tracking: ingest, search, and trend forecasting")]
#[command(
    long_about = "Ingest scraped job postings, deduplicate and tag them with skills, then explore the market through semantic search, trend forecasts, and city heatmaps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync: ingest, tag, embed, and notify subscribers
    Run {
        /// Scraped postings file (JSON array of raw records)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run the sync on a schedule until interrupted
    Watch {
        /// Scraped postings file, re-read on every tick
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Semantic search over stored postings
    Search {
        /// Free-text query
        query: String,

        /// Restrict to a city (exact, case-insensitive)
        #[arg(long)]
        city: Option<String>,

        /// Restrict to a role keyword (substring)
        #[arg(long)]
        role: Option<String>,

        /// Restrict to postings tagged with a skill
        #[arg(long)]
        skill: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Minimum cosine similarity (0.0 to 1.0)
        #[arg(short, long, default_value_t = 0.3)]
        threshold: f32,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Find postings similar to an existing one
    Similar {
        /// Posting id (from search output)
        id: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(short, long, default_value_t = 0.3)]
        threshold: f32,

        #[arg(long)]
        json: bool,
    },

    /// List postings by structured filters, no ranking
    List {
        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        skill: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Forecast skill demand trends
    Forecast {
        /// Forecast one skill instead of the overall top skills
        #[arg(short, long)]
        skill: Option<String>,

        /// How many top skills to forecast
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print the month-by-month history table instead
        #[arg(long)]
        history: bool,

        /// Print the posting count per city instead
        #[arg(long)]
        cities: bool,

        #[arg(long)]
        json: bool,
    },

    /// City by skill demand matrix
    Heatmap {
        /// Number of skill columns
        #[arg(long, default_value_t = 10)]
        top_skills: usize,

        #[arg(long)]
        json: bool,
    },

    /// Register a digest subscription
    Subscribe {
        /// Delivery address
        email: String,

        /// Keyword matched against new postings
        keyword: String,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,
}
