use std::fmt;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::http_client::HttpTransport;
use crate::participants::match_summary;
use crate::riot_api::{RateLimitedClient, Sleeper};
use crate::store::{RecordStore, SummonerRecord, profile_url};

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub summoner: String,
    pub puuid: String,
    pub match_ids: Vec<String>,
    pub matches_inserted: usize,
    pub performances_inserted: usize,
    pub errors: Vec<String>,
    pub form: Option<RecentForm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    GuardianAngel,
    DeathsDance,
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::GuardianAngel => f.write_str("Guardian Angel"),
            Badge::DeathsDance => f.write_str("Death's Dance"),
        }
    }
}

/// Averages over the player's own rows in the fetched matches.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentForm {
    pub games: usize,
    pub kills: f64,
    pub deaths: f64,
    pub assists: f64,
    pub champions: Vec<String>,
    pub damage: f64,
    pub pentakills: u64,
    pub wins: usize,
    pub losses: usize,
    pub duration_mins: f64,
    pub time_alive: f64,
    pub time_dead: f64,
    pub heals_on_teammates: f64,
    pub cs: f64,
    pub cs_per_min: f64,
    pub badge: Badge,
}

impl RecentForm {
    /// `games` pairs each player row with its match duration in seconds.
    pub fn from_games(games: &[(Value, i64)]) -> Option<Self> {
        if games.is_empty() {
            return None;
        }
        let n = games.len() as f64;
        let mean = |key: &str| games.iter().map(|(p, _)| num(p, key)).sum::<f64>() / n;

        let wins = games
            .iter()
            .filter(|(p, _)| p.get("win").and_then(|v| v.as_bool()) == Some(true))
            .count();
        let duration_mins =
            (games.iter().map(|(_, secs)| *secs as f64).sum::<f64>() / n / 60.0).floor();
        let cs = mean("totalMinionsKilled");
        let cs_per_min = if duration_mins > 0.0 {
            (cs / duration_mins * 100.0).round() / 100.0
        } else {
            0.0
        };
        let time_alive = mean("longestTimeSpentLiving");
        let time_dead = mean("totalTimeSpentDead");

        Some(Self {
            games: games.len(),
            kills: mean("kills"),
            deaths: mean("deaths"),
            assists: mean("assists"),
            champions: games
                .iter()
                .filter_map(|(p, _)| p.get("championName").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect(),
            damage: mean("totalDamageDealtToChampions"),
            pentakills: games
                .iter()
                .map(|(p, _)| num(p, "pentaKills") as u64)
                .sum(),
            wins,
            losses: games.len() - wins,
            duration_mins,
            time_alive,
            time_dead,
            heals_on_teammates: mean("totalHealsOnTeammates"),
            cs,
            cs_per_min,
            badge: if time_alive > time_dead {
                Badge::GuardianAngel
            } else {
                Badge::DeathsDance
            },
        })
    }
}

fn num(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(|x| x.as_f64()).unwrap_or(0.0)
}

/// The participant row belonging to `puuid`, looked up by position in
/// `metadata.participants` and falling back to the row's own puuid field.
pub fn player_row<'a>(payload: &'a Value, puuid: &str) -> Option<&'a Value> {
    let rows = payload.get("info")?.get("participants")?.as_array()?;
    let by_index = payload
        .get("metadata")
        .and_then(|m| m.get("participants"))
        .and_then(|p| p.as_array())
        .and_then(|ids| ids.iter().position(|id| id.as_str() == Some(puuid)))
        .and_then(|idx| rows.get(idx));
    by_index.or_else(|| {
        rows.iter()
            .find(|r| r.get("puuid").and_then(|v| v.as_str()) == Some(puuid))
    })
}

/// Pulls the summoner's latest matches into the store.
pub fn update_summoner<R, T, S>(
    store: &mut R,
    client: &RateLimitedClient<T, S>,
    name: &str,
) -> Result<IngestSummary>
where
    R: RecordStore,
    T: HttpTransport,
    S: Sleeper,
{
    let summoner = client
        .summoner_by_name(name)
        .with_context(|| format!("look up summoner {name}"))?;
    let match_ids = client
        .match_ids(&summoner.puuid)
        .with_context(|| format!("list matches for {name}"))?;
    info!(summoner = name, matches = match_ids.len(), "ingesting");

    let mut summary = IngestSummary {
        summoner: name.to_string(),
        puuid: summoner.puuid.clone(),
        match_ids: match_ids.clone(),
        matches_inserted: 0,
        performances_inserted: 0,
        errors: Vec::new(),
        form: None,
    };

    let mut games = Vec::with_capacity(match_ids.len());
    for match_id in &match_ids {
        let payload = match client.match_detail(match_id) {
            Ok(payload) => payload,
            Err(err @ PipelineError::Config(_)) => return Err(err.into()),
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "match fetch failed");
                summary.errors.push(format!("{match_id}: {err}"));
                continue;
            }
        };
        let meta = match match_summary(&payload) {
            Ok(meta) => meta,
            Err(err) => {
                summary.errors.push(format!("{match_id}: {err}"));
                continue;
            }
        };
        if store.insert_match(&meta)? {
            summary.matches_inserted += 1;
        }
        match player_row(&payload, &summoner.puuid) {
            Some(row) => {
                if store.insert_performance(&summoner.puuid, &meta.id, row)? {
                    summary.performances_inserted += 1;
                }
                games.push((row.clone(), meta.duration_secs));
            }
            None => summary
                .errors
                .push(format!("{match_id}: summoner not among participants")),
        }
    }

    let region = client.config().route.platform.clone();
    let display = if summoner.name.is_empty() {
        name.to_string()
    } else {
        summoner.name.clone()
    };
    let record = SummonerRecord {
        puuid: summoner.puuid.clone(),
        profile_url: profile_url(&region, &display)?,
        name: display,
        region,
    };
    if !store.insert_summoner(&record)? {
        info!(summoner = name, "summoner already stored");
    }

    summary.form = RecentForm::from_games(&games);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(win: bool, alive: f64, dead: f64) -> Value {
        json!({
            "kills": 4, "deaths": 2, "assists": 10,
            "championName": "Ahri",
            "totalDamageDealtToChampions": 20000,
            "pentaKills": 1,
            "win": win,
            "longestTimeSpentLiving": alive,
            "totalTimeSpentDead": dead,
            "totalHealsOnTeammates": 0,
            "totalMinionsKilled": 30
        })
    }

    #[test]
    fn form_averages_and_badge() {
        let form = RecentForm::from_games(&[
            (row(true, 300.0, 100.0), 1200),
            (row(false, 200.0, 100.0), 1200),
        ])
        .unwrap();
        assert_eq!(form.games, 2);
        assert_eq!(form.wins, 1);
        assert_eq!(form.losses, 1);
        assert_eq!(form.pentakills, 2);
        assert_eq!(form.duration_mins, 20.0);
        assert_eq!(form.cs_per_min, 1.5);
        assert_eq!(form.badge, Badge::GuardianAngel);
        assert_eq!(form.badge.to_string(), "Guardian Angel");

        let form = RecentForm::from_games(&[(row(true, 50.0, 90.0), 600)]).unwrap();
        assert_eq!(form.badge, Badge::DeathsDance);
        assert!(RecentForm::from_games(&[]).is_none());
    }

    #[test]
    fn finds_player_row_by_metadata_index() {
        let payload = json!({
            "metadata": {"participants": ["a", "b"]},
            "info": {"participants": [{"kills": 1}, {"kills": 7}]}
        });
        assert_eq!(player_row(&payload, "b").unwrap()["kills"], 7);
        assert!(player_row(&payload, "zzz").is_none());
    }
}
