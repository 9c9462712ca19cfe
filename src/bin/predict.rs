use std::path::PathBuf;

use anyhow::{Result, anyhow};

use rift_predictor::champion_tags::ChampionTagCatalog;
use rift_predictor::config::PipelineConfig;
use rift_predictor::features::FeatureAggregator;
use rift_predictor::http_client::http_client;
use rift_predictor::live_predict::predict_live;
use rift_predictor::model::LogisticModel;
use rift_predictor::profile_scrape::ProfileScraper;
use rift_predictor::riot_api::RateLimitedClient;
use rift_predictor::telemetry;

const VALUE_FLAGS: &[&str] = &["--model", "--champions"];

fn main() -> Result<()> {
    telemetry::init();
    let mut cfg = PipelineConfig::from_env()?;
    if let Some(path) = parse_path_arg("--model") {
        cfg.model_path = path;
    }
    if let Some(path) = parse_path_arg("--champions") {
        cfg.champion_data_path = path;
    }
    let name = positional_args().join(" ");
    if name.trim().is_empty() {
        return Err(anyhow!("usage: predict [--model PATH] [--champions PATH] <summoner name>"));
    }

    let schema = cfg.schema.clone();
    let model = LogisticModel::load(&cfg.model_path, &schema)?;
    let catalog = ChampionTagCatalog::load(&cfg.champion_data_path, &schema)?;
    let http = http_client()?;
    let scraper = ProfileScraper::new(http, &cfg)?;
    let client = RateLimitedClient::new(http, cfg);
    let aggregator = FeatureAggregator::new(&client, &scraper, &catalog, &schema);

    let outlook = predict_live(&client, &aggregator, &model, &name)?;
    println!("Game {} (team {})", outlook.game_id, outlook.subject_side.team_id());
    println!("{outlook}");
    if let Some(report) = model.report() {
        println!(
            "Model holdout accuracy {:.1}% over {} games",
            report.accuracy * 100.0,
            report.holdout_rows
        );
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

fn positional_args() -> Vec<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            out.push(arg);
        }
    }
    out
}
