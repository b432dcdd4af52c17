//! Job tracker: ingest scraped postings, search them, forecast skill demand

use clap::Parser;
use job_tracker::cli::{Cli, Commands, ConfigAction};
use job_tracker::config::Config;
use job_tracker::embedding::{Embedder, HashEmbedder};
use job_tracker::error::{JobTrackerError, Result};
use job_tracker::forecast::{Forecaster, SkillForecast};
use job_tracker::heatmap::HeatmapBuilder;
use job_tracker::ingest::JsonSource;
use job_tracker::pipeline::{load_subscriptions, LogNotifier, Pipeline};
use job_tracker::posting::{Snapshot, Subscription};
use job_tracker::search::{SearchEngine, SearchFilters, SearchHit};
use job_tracker::store::{JobStore, JsonStore};
use log::{error, warn};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
}

async fn run_command(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Run { input } => {
            let pipeline = build_pipeline(&config, input)?;
            let report = pipeline.run().await?;

            println!("✅ Sync complete (snapshot v{})", report.snapshot_version);
            println!("   Fetched:    {}", report.fetched);
            println!("   Normalized: {}", report.normalized);
            println!("   New:        {}", report.new_postings);
            println!("   Updated:    {}", report.updated);
            println!("   Embedded:   {}", report.embedded);
            if report.failed_embedding_batches > 0 {
                println!(
                    "   ⚠ {} embedding batch(es) failed; they retry next run",
                    report.failed_embedding_batches
                );
            }
            for digest in &report.digests {
                println!(
                    "   📬 {} <- {} match(es) for '{}' ({} delivered)",
                    digest.email, digest.matched, digest.keyword, digest.delivered
                );
            }
            Ok(())
        }

        Commands::Watch { input } => {
            let pipeline = build_pipeline(&config, input)?;
            println!(
                "⏱  Syncing every {} minute(s); Ctrl-C to stop",
                config.pipeline.sync_interval_minutes
            );
            pipeline.watch().await
        }

        Commands::Search {
            query,
            city,
            role,
            skill,
            limit,
            threshold,
            json,
        } => {
            let (snapshot, engine) = open_search(&config)?;
            let filters = SearchFilters { city, role, skill };

            match engine.hybrid_search(&snapshot, &query, &filters, limit, threshold) {
                Ok(hits) => print_hits(&hits, json),
                Err(JobTrackerError::BackendUnavailable(reason)) => {
                    warn!("Embedding backend unavailable ({}); listing by filters only", reason);
                    let listed = engine.filter(&snapshot, &filters, limit);
                    let hits: Vec<SearchHit> = listed
                        .into_iter()
                        .map(|posting| SearchHit {
                            posting,
                            similarity: 0.0,
                        })
                        .collect();
                    print_hits(&hits, json)
                }
                Err(e) => Err(e),
            }
        }

        Commands::Similar {
            id,
            limit,
            threshold,
            json,
        } => {
            let (snapshot, engine) = open_search(&config)?;
            let hits = engine.similar_to(&snapshot, &id, limit, threshold)?;
            if hits.is_empty() {
                println!("No similar postings found for {}", id);
                return Ok(());
            }
            print_hits(&hits, json)
        }

        Commands::List {
            city,
            role,
            skill,
            limit,
            json,
        } => {
            let (snapshot, engine) = open_search(&config)?;
            let filters = SearchFilters { city, role, skill };
            let postings = engine.filter(&snapshot, &filters, limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&postings)?);
                return Ok(());
            }
            println!("📋 {} posting(s)", postings.len());
            for posting in &postings {
                println!(
                    "  [{}] {} at {} ({})",
                    posting.id, posting.title, posting.company, posting.city
                );
            }
            Ok(())
        }

        Commands::Forecast {
            skill,
            top,
            history,
            cities,
            json,
        } => {
            let snapshot = open_snapshot(&config)?;
            let forecaster = Forecaster::new(config.trends.clone());

            if cities {
                let distribution = forecaster.city_distribution(&snapshot);
                if json {
                    println!("{}", serde_json::to_string_pretty(&distribution)?);
                    return Ok(());
                }
                println!("🏙  Postings by city");
                for (city, count) in &distribution {
                    println!("  {:<12} {}", city, count);
                }
                return Ok(());
            }

            if history {
                let table = forecaster.history(&snapshot, skill.as_deref(), top);
                if json {
                    println!("{}", serde_json::to_string_pretty(&table)?);
                    return Ok(());
                }
                println!("📈 Monthly counts for: {}", table.skills.join(", "));
                for row in &table.rows {
                    let cells: Vec<String> = table
                        .skills
                        .iter()
                        .map(|s| format!("{}={}", s, row.counts.get(s).copied().unwrap_or(0)))
                        .collect();
                    println!("  {}  {}", row.month, cells.join("  "));
                }
                return Ok(());
            }

            let forecasts = forecaster.forecast(&snapshot, skill.as_deref(), top);
            if json {
                println!("{}", serde_json::to_string_pretty(&forecasts)?);
                return Ok(());
            }
            print_forecasts(&forecasts);
            Ok(())
        }

        Commands::Heatmap { top_skills, json } => {
            let snapshot = open_snapshot(&config)?;
            let heatmap = HeatmapBuilder::new(config.trends.clone()).build(&snapshot, top_skills);

            if json {
                println!("{}", serde_json::to_string_pretty(&heatmap)?);
                return Ok(());
            }
            println!(
                "🗺  Skill demand by city ({} postings)",
                heatmap.total_postings
            );
            for row in &heatmap.rows {
                print!("  {:<12} total={:<4}", row.city, row.total_jobs);
                if let Some(dominant) = &row.dominant_skill {
                    print!(
                        " dominant={} ({} / {:.1}%)",
                        dominant.skill, dominant.count, dominant.percentage
                    );
                }
                println!();
                let cells: Vec<String> = heatmap
                    .skills
                    .iter()
                    .map(|s| format!("{}={}", s, row.counts.get(s).copied().unwrap_or(0)))
                    .collect();
                println!("      {}", cells.join("  "));
            }
            Ok(())
        }

        Commands::Subscribe { email, keyword } => {
            if email.trim().is_empty() || !email.contains('@') {
                return Err(JobTrackerError::InvalidInput(format!(
                    "Not a usable email address: '{}'",
                    email
                )));
            }
            if keyword.trim().is_empty() {
                return Err(JobTrackerError::InvalidInput(
                    "Subscription keyword must not be empty".to_string(),
                ));
            }

            let path = &config.storage.subscriptions_file;
            let mut subscriptions = load_subscriptions(path)?;

            let subscription = Subscription { email, keyword };
            if subscriptions.contains(&subscription) {
                println!("Already subscribed: {} / '{}'", subscription.email, subscription.keyword);
                return Ok(());
            }
            subscriptions.push(subscription.clone());

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&subscriptions)?)?;
            println!(
                "✅ Subscribed {} to new postings matching '{}'",
                subscription.email, subscription.keyword
            );
            Ok(())
        }

        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                let rendered = toml::to_string_pretty(&config).map_err(|e| {
                    JobTrackerError::Configuration(format!("Failed to render config: {}", e))
                })?;
                println!("{}", rendered);
                Ok(())
            }
            ConfigAction::Reset => {
                Config::default().save()?;
                println!("✅ Configuration reset to defaults");
                Ok(())
            }
        },
    }
}

fn build_pipeline(config: &Config, input: PathBuf) -> Result<Pipeline> {
    let source = Arc::new(JsonSource::new(input));
    let store = Arc::new(JsonStore::open(config.storage.data_file.clone())?);
    let embedder = Arc::new(HashEmbedder::new(config.embedding.dimension));
    let subscriptions = load_subscriptions(&config.storage.subscriptions_file)?;

    Pipeline::new(
        source,
        store,
        embedder,
        Arc::new(LogNotifier),
        subscriptions,
        config.pipeline.clone(),
        &config.embedding,
    )
}

fn open_snapshot(config: &Config) -> Result<Arc<Snapshot>> {
    let store = JsonStore::open(config.storage.data_file.clone())?;
    Ok(Snapshot::new(store.load_all()?, 0))
}

fn open_search(config: &Config) -> Result<(Arc<Snapshot>, SearchEngine)> {
    let snapshot = open_snapshot(config)?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(config.embedding.dimension));
    let engine = SearchEngine::new(embedder, config.search.clone());
    Ok((snapshot, engine))
}

fn print_hits(hits: &[SearchHit], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matching postings");
        return Ok(());
    }
    println!("🔍 {} result(s)", hits.len());
    for hit in hits {
        println!(
            "  {:.3}  [{}] {} at {} ({})",
            hit.similarity,
            hit.posting.id,
            hit.posting.title,
            hit.posting.company,
            hit.posting.city
        );
        if !hit.posting.skills.is_empty() {
            println!("         skills: {}", hit.posting.skills.join(", "));
        }
    }
    Ok(())
}

fn print_forecasts(forecasts: &[SkillForecast]) {
    println!("📊 Skill demand forecast");
    for forecast in forecasts {
        match forecast {
            SkillForecast::InsufficientData {
                skill,
                months_observed,
            } => {
                println!(
                    "  {:<18} insufficient data ({} month(s) observed)",
                    skill, months_observed
                );
            }
            SkillForecast::Success(result) => {
                let change = match result.predicted_change_pct {
                    Some(pct) => format!("{:+.1}%", pct),
                    None => "n/a".to_string(),
                };
                println!(
                    "  {:<18} {:?}/{:?}  slope={:+.2}  now={}  next~{} ({})",
                    result.skill,
                    result.trend,
                    result.trend_strength,
                    result.slope,
                    result.current_month_count,
                    result.predicted_next_month,
                    change
                );
            }
        }
    }
}
