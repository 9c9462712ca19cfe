use std::path::PathBuf;

use anyhow::Result;

use rift_predictor::champion_tags::ChampionTagCatalog;
use rift_predictor::config::PipelineConfig;
use rift_predictor::features::FeatureAggregator;
use rift_predictor::http_client::http_client;
use rift_predictor::profile_scrape::ProfileScraper;
use rift_predictor::reconcile::TrainingSetReconciler;
use rift_predictor::riot_api::RateLimitedClient;
use rift_predictor::store::SqliteStore;
use rift_predictor::telemetry;

fn main() -> Result<()> {
    telemetry::init();
    let mut cfg = PipelineConfig::from_env()?;
    if let Some(path) = parse_path_arg("--db") {
        cfg.db_path = path;
    }
    if let Some(path) = parse_path_arg("--champions") {
        cfg.champion_data_path = path;
    }

    let schema = cfg.schema.clone();
    let catalog = ChampionTagCatalog::load(&cfg.champion_data_path, &schema)?;
    let mut store = SqliteStore::open(&cfg.db_path)?;
    let http = http_client()?;
    let scraper = ProfileScraper::new(http, &cfg)?;
    let refresh = cfg.refresh_names;
    let client = RateLimitedClient::new(http, cfg);

    let aggregator = FeatureAggregator::new(&client, &scraper, &catalog, &schema);
    let reconciler = TrainingSetReconciler::new(&client, aggregator).refresh_names(refresh);
    let summary = reconciler.reconcile_backlog(&mut store)?;

    println!("Reconcile complete");
    println!("Backlog: {}", summary.backlog);
    println!("Persisted: {}", summary.persisted);
    println!("Deleted (insufficient data): {}", summary.deleted);
    println!("Skipped: {}", summary.skipped);
    println!("Requests sent: {}", client.requests_sent());
    if !summary.failures.is_empty() {
        println!("Failures: {}", summary.failures.len());
        for err in summary.failures.iter().take(10) {
            println!(" - {err}");
        }
    }
    Ok(())
}

fn parse_path_arg(flag: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
