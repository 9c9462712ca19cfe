pub mod champion_tags;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod http_client;
pub mod ingest;
pub mod live_predict;
pub mod model;
pub mod participants;
pub mod profile_scrape;
pub mod reconcile;
pub mod riot_api;
pub mod schema;
pub mod store;
pub mod telemetry;
