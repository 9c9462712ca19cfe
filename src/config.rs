use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::riot_api::RetryPolicy;
use crate::schema::FeatureSchema;

const APP_DIR: &str = "rift_predictor";
const DEFAULT_REGION: &str = "vn2";
const DEFAULT_QUEUE_ID: u32 = 450;
const DEFAULT_MATCH_COUNT: u32 = 5;
const DEFAULT_BACKOFF_SECS: u64 = 10;
const DEFAULT_PROFILE_BASE: &str = "https://blitz.gg";
const DEFAULT_PROFILE_QUEUE: &str = "HOWLING_ABYSS_ARAM";

const ROUTING_GROUPS: &[(&str, &str)] = &[
    ("oc1", "sea"),
    ("ph2", "sea"),
    ("sg2", "sea"),
    ("th2", "sea"),
    ("tw2", "sea"),
    ("vn2", "sea"),
    ("jp1", "asia"),
    ("kr", "asia"),
    ("na1", "americas"),
    ("br1", "americas"),
    ("la1", "americas"),
    ("la2", "americas"),
    ("eun1", "europe"),
    ("euw1", "europe"),
    ("tr1", "europe"),
    ("ru", "europe"),
];

/// Region plus the routing group its match history lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRoute {
    pub platform: String,
    pub group: String,
}

impl RegionRoute {
    pub fn for_platform(platform: &str) -> Result<Self> {
        let platform = platform.trim().to_ascii_lowercase();
        let group = ROUTING_GROUPS
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, g)| g.to_string())
            .ok_or_else(|| PipelineError::Config(format!("unknown region {platform:?}")))?;
        Ok(Self { platform, group })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub route: RegionRoute,
    pub queue_id: u32,
    pub match_count: u32,
    pub retry: RetryPolicy,
    pub profile_base_url: String,
    pub profile_queue: String,
    pub champion_data_path: PathBuf,
    pub db_path: PathBuf,
    pub model_path: PathBuf,
    pub refresh_names: bool,
    pub schema: FeatureSchema,
}

impl PipelineConfig {
    pub fn new(api_key: impl Into<String>, region: &str) -> Result<Self> {
        let data_dir = app_data_dir().unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            api_key: api_key.into(),
            route: RegionRoute::for_platform(region)?,
            queue_id: DEFAULT_QUEUE_ID,
            match_count: DEFAULT_MATCH_COUNT,
            retry: RetryPolicy::default(),
            profile_base_url: DEFAULT_PROFILE_BASE.to_string(),
            profile_queue: DEFAULT_PROFILE_QUEUE.to_string(),
            champion_data_path: PathBuf::from("champion.json"),
            db_path: data_dir.join("league.db"),
            model_path: data_dir.join("league_model.json"),
            refresh_names: true,
            schema: FeatureSchema::default(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::load_env(true)
    }

    /// Same as [`PipelineConfig::from_env`] for commands that never call the API.
    pub fn from_env_offline() -> Result<Self> {
        Self::load_env(false)
    }

    fn load_env(require_key: bool) -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let api_key = match env_string("RIOT_API_KEY") {
            Some(key) => key,
            None if !require_key => String::new(),
            None => return Err(PipelineError::Config("RIOT_API_KEY is not set".to_string())),
        };
        let region = env_string("RIOT_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut cfg = Self::new(api_key, &region)?;

        if let Some(v) = env_parse::<u32>("RIOT_QUEUE_ID") {
            cfg.queue_id = v;
        }
        if let Some(v) = env_parse::<u32>("RIOT_MATCH_COUNT") {
            cfg.match_count = v.clamp(1, 100);
        }
        let backoff = env_parse::<u64>("RATE_LIMIT_BACKOFF_SECS").unwrap_or(DEFAULT_BACKOFF_SECS);
        cfg.retry = RetryPolicy {
            backoff: Duration::from_secs(backoff),
            max_attempts: env_parse::<u32>("RATE_LIMIT_MAX_RETRIES").map(|n| n.max(1)),
        };
        if let Some(v) = env_string("PROFILE_BASE_URL") {
            cfg.profile_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = env_string("PROFILE_QUEUE") {
            cfg.profile_queue = v;
        }
        if let Some(v) = env_string("CHAMPION_DATA_PATH") {
            cfg.champion_data_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("RIFT_DB_PATH") {
            cfg.db_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("RIFT_MODEL_PATH") {
            cfg.model_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("RIFT_REFRESH_NAMES") {
            cfg.refresh_names = !matches!(
                v.to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        if let Some(v) = env_string("RIFT_TRACKED_STATS") {
            cfg.schema = FeatureSchema::parse_stats(&v)?;
        }
        Ok(cfg)
    }

    pub fn platform_host(&self) -> String {
        format!("https://{}.api.riotgames.com", self.route.platform)
    }

    pub fn routing_host(&self) -> String {
        format!("https://{}.api.riotgames.com", self.route.group)
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse::<T>().ok())
}
