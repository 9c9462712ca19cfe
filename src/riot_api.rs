use std::cell::Cell;
use std::thread;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::http_client::{HttpResponse, HttpTransport};

const STATUS_NOT_FOUND: u16 = 404;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
const TOKEN_HEADER: &str = "X-Riot-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// `None` keeps retrying for as long as the endpoint throttles.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    SummonerByName { name: String },
    SummonerById { summoner_id: String },
    MatchIds { puuid: String, count: u32, queue: u32 },
    MatchDetail { match_id: String },
    ActiveGame { summoner_id: String },
    Mastery { summoner_id: String, champion_id: u32 },
}

impl Endpoint {
    fn uses_routing_group(&self) -> bool {
        matches!(self, Endpoint::MatchIds { .. } | Endpoint::MatchDetail { .. })
    }

    pub fn url(&self, cfg: &PipelineConfig) -> Result<String> {
        let host = if self.uses_routing_group() {
            cfg.routing_host()
        } else {
            cfg.platform_host()
        };
        let mut url = Url::parse(&host)
            .map_err(|err| PipelineError::Config(format!("bad api host {host}: {err}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PipelineError::Config(format!("api host {host} cannot be a base")))?;
            segments.pop_if_empty();
            match self {
                Endpoint::SummonerByName { name } => {
                    segments.extend([
                        "lol",
                        "summoner",
                        "v4",
                        "summoners",
                        "by-name",
                        name.as_str(),
                    ]);
                }
                Endpoint::SummonerById { summoner_id } => {
                    segments.extend([
                        "lol",
                        "summoner",
                        "v4",
                        "summoners",
                        summoner_id.as_str(),
                    ]);
                }
                Endpoint::MatchIds { puuid, .. } => {
                    segments.extend([
                        "lol",
                        "match",
                        "v5",
                        "matches",
                        "by-puuid",
                        puuid.as_str(),
                        "ids",
                    ]);
                }
                Endpoint::MatchDetail { match_id } => {
                    segments.extend(["lol", "match", "v5", "matches", match_id.as_str()]);
                }
                Endpoint::ActiveGame { summoner_id } => {
                    segments.extend([
                        "lol",
                        "spectator",
                        "v4",
                        "active-games",
                        "by-summoner",
                        summoner_id.as_str(),
                    ]);
                }
                Endpoint::Mastery {
                    summoner_id,
                    champion_id,
                } => {
                    let champion = champion_id.to_string();
                    segments.extend([
                        "lol",
                        "champion-mastery",
                        "v4",
                        "champion-masteries",
                        "by-summoner",
                        summoner_id.as_str(),
                        "by-champion",
                        champion.as_str(),
                    ]);
                }
            }
        }
        if let Endpoint::MatchIds { count, queue, .. } = self {
            url.query_pairs_mut()
                .append_pair("start", "0")
                .append_pair("count", &count.to_string())
                .append_pair("queue", &queue.to_string());
        }
        Ok(url.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    pub id: String,
    pub puuid: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mastery {
    #[serde(default)]
    pub champion_points: f64,
}

impl Mastery {
    pub fn zero() -> Self {
        Self {
            champion_points: 0.0,
        }
    }
}

/// Outcome of one logical fetch once throttling has been absorbed.
enum Fetched {
    Body(String),
    NotFound,
}

pub struct RateLimitedClient<T, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    cfg: PipelineConfig,
    requests: Cell<u64>,
}

impl<T: HttpTransport> RateLimitedClient<T, ThreadSleeper> {
    pub fn new(transport: T, cfg: PipelineConfig) -> Self {
        Self::with_sleeper(transport, ThreadSleeper, cfg)
    }
}

impl<T: HttpTransport, S: Sleeper> RateLimitedClient<T, S> {
    pub fn with_sleeper(transport: T, sleeper: S, cfg: PipelineConfig) -> Self {
        Self {
            transport,
            sleeper,
            cfg,
            requests: Cell::new(0),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Total HTTP requests issued, retries included.
    pub fn requests_sent(&self) -> u64 {
        self.requests.get()
    }

    pub fn fetch(&self, endpoint: &Endpoint) -> Result<Value> {
        let url = endpoint.url(&self.cfg)?;
        match self.fetch_url(&url)? {
            Fetched::Body(body) => parse_json(&url, &body),
            Fetched::NotFound => Err(PipelineError::RemoteFetch {
                url,
                status: STATUS_NOT_FOUND,
            }),
        }
    }

    pub fn summoner_by_name(&self, name: &str) -> Result<Summoner> {
        let endpoint = Endpoint::SummonerByName {
            name: name.to_string(),
        };
        decode(&endpoint, self.fetch(&endpoint)?)
    }

    pub fn summoner_name(&self, summoner_id: &str) -> Result<String> {
        let endpoint = Endpoint::SummonerById {
            summoner_id: summoner_id.to_string(),
        };
        let summoner: Summoner = decode(&endpoint, self.fetch(&endpoint)?)?;
        Ok(summoner.name)
    }

    pub fn match_ids(&self, puuid: &str) -> Result<Vec<String>> {
        let endpoint = Endpoint::MatchIds {
            puuid: puuid.to_string(),
            count: self.cfg.match_count,
            queue: self.cfg.queue_id,
        };
        decode(&endpoint, self.fetch(&endpoint)?)
    }

    pub fn match_detail(&self, match_id: &str) -> Result<Value> {
        self.fetch(&Endpoint::MatchDetail {
            match_id: match_id.to_string(),
        })
    }

    /// `None` when the summoner is not currently in a game.
    pub fn active_game(&self, summoner_id: &str) -> Result<Option<Value>> {
        let endpoint = Endpoint::ActiveGame {
            summoner_id: summoner_id.to_string(),
        };
        let url = endpoint.url(&self.cfg)?;
        match self.fetch_url(&url)? {
            Fetched::Body(body) => parse_json(&url, &body).map(Some),
            Fetched::NotFound => Ok(None),
        }
    }

    /// Unknown summoner/champion pairs read as zero mastery.
    pub fn mastery(&self, summoner_id: &str, champion_id: u32) -> Result<Mastery> {
        let endpoint = Endpoint::Mastery {
            summoner_id: summoner_id.to_string(),
            champion_id,
        };
        let url = endpoint.url(&self.cfg)?;
        match self.fetch_url(&url)? {
            Fetched::Body(body) => {
                let value = parse_json(&url, &body)?;
                decode(&endpoint, value)
            }
            Fetched::NotFound => {
                debug!(summoner_id, champion_id, "mastery not found, using zero");
                Ok(Mastery::zero())
            }
        }
    }

    fn fetch_url(&self, url: &str) -> Result<Fetched> {
        let policy = self.cfg.retry;
        let headers = [(TOKEN_HEADER, self.cfg.api_key.as_str())];
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            self.requests.set(self.requests.get() + 1);
            let resp = self
                .transport
                .get(url, &headers)
                .map_err(|err| PipelineError::Transport {
                    url: url.to_string(),
                    reason: format!("{err:#}"),
                })?;

            match classify(resp) {
                Classified::Ok(body) => return Ok(Fetched::Body(body)),
                Classified::NotFound => return Ok(Fetched::NotFound),
                Classified::Throttled => {
                    if policy.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(PipelineError::RateLimitExhausted {
                            url: url.to_string(),
                            attempts,
                        });
                    }
                    warn!(
                        attempt = attempts,
                        backoff_secs = policy.backoff.as_secs_f64(),
                        "rate limit hit, sleeping"
                    );
                    self.sleeper.sleep(policy.backoff);
                }
                Classified::Failed(status) => {
                    return Err(PipelineError::RemoteFetch {
                        url: url.to_string(),
                        status,
                    });
                }
            }
        }
    }
}

enum Classified {
    Ok(String),
    NotFound,
    Throttled,
    Failed(u16),
}

fn classify(resp: HttpResponse) -> Classified {
    if resp.is_success() {
        return Classified::Ok(resp.body);
    }
    match resp.status {
        STATUS_TOO_MANY_REQUESTS => Classified::Throttled,
        STATUS_NOT_FOUND => Classified::NotFound,
        other => Classified::Failed(other),
    }
}

fn parse_json(url: &str, body: &str) -> Result<Value> {
    serde_json::from_str::<Value>(body.trim()).map_err(|source| PipelineError::Json {
        url: url.to_string(),
        source,
    })
}

fn decode<D: for<'de> Deserialize<'de>>(endpoint: &Endpoint, value: Value) -> Result<D> {
    serde_json::from_value(value)
        .map_err(|err| PipelineError::malformed(format!("{endpoint:?}: {err}")))
}
