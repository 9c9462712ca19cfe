use std::path::PathBuf;

use anyhow::{Result, anyhow};

use rift_predictor::config::PipelineConfig;
use rift_predictor::http_client::http_client;
use rift_predictor::ingest::update_summoner;
use rift_predictor::riot_api::RateLimitedClient;
use rift_predictor::store::SqliteStore;
use rift_predictor::telemetry;

fn main() -> Result<()> {
    telemetry::init();
    let mut cfg = PipelineConfig::from_env()?;
    if let Some(path) = parse_path_arg("--db") {
        cfg.db_path = path;
    }
    let names = positional_args();
    if names.is_empty() {
        return Err(anyhow!("usage: ingest [--db PATH] <summoner name>..."));
    }

    let mut store = SqliteStore::open(&cfg.db_path)?;
    let db_path = cfg.db_path.clone();
    let client = RateLimitedClient::new(http_client()?, cfg);

    println!("Ingest into {}", db_path.display());
    for name in &names {
        match update_summoner(&mut store, &client, name) {
            Ok(summary) => {
                println!(
                    "{}: matches {} new / {} listed, performances {} new",
                    summary.summoner,
                    summary.matches_inserted,
                    summary.match_ids.len(),
                    summary.performances_inserted
                );
                if let Some(form) = &summary.form {
                    println!(
                        "  {:.1}/{:.1}/{:.1} dmg={:.0} cs/min={:.2} W/L={}/{} pentas={} {}",
                        form.kills,
                        form.deaths,
                        form.assists,
                        form.damage,
                        form.cs_per_min,
                        form.wins,
                        form.losses,
                        form.pentakills,
                        form.badge
                    );
                }
                if !summary.errors.is_empty() {
                    println!("  errors: {}", summary.errors.len());
                    for err in summary.errors.iter().take(6) {
                        println!("   - {err}");
                    }
                }
            }
            Err(err) => println!("{name}: failed: {err:#}"),
        }
    }
    println!("Requests sent: {}", client.requests_sent());
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
        if arg == "--db" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        let trimmed = arg.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
    out
}
