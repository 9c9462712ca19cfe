use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Team 100. Positive ratios and `label == true` always refer to this side.
    Blue,
    Red,
}

impl Side {
    pub fn from_team_id(team_id: i64) -> Option<Self> {
        match team_id {
            100 => Some(Side::Blue),
            200 => Some(Side::Red),
            _ => None,
        }
    }

    pub fn team_id(self) -> u32 {
        match self {
            Side::Blue => 100,
            Side::Red => 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub match_id: String,
    pub summoner_id: String,
    pub puuid: Option<String>,
    pub champion_id: u32,
    pub side: Side,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub duration_secs: i64,
}

#[derive(Debug, Clone)]
pub struct ResolvedMatch {
    pub summary: MatchSummary,
    pub participants: Vec<Participant>,
    /// Whether team 100 won.
    pub label: bool,
}

#[derive(Debug, Clone)]
pub struct LiveMatch {
    pub game_id: String,
    pub participants: Vec<Participant>,
    pub subject_side: Side,
}

/// Decodes a finished match detail payload (`metadata` + `info`).
pub fn resolve_match(payload: &Value) -> Result<ResolvedMatch> {
    let info = payload
        .get("info")
        .ok_or_else(|| PipelineError::malformed("match payload has no info"))?;
    let summary = match_summary(payload)?;
    let participants = participant_list(info, &summary.id)?;
    let label = team_100_won(info)?;
    Ok(ResolvedMatch {
        summary,
        participants,
        label,
    })
}

pub fn match_summary(payload: &Value) -> Result<MatchSummary> {
    let info = payload
        .get("info")
        .ok_or_else(|| PipelineError::malformed("match payload has no info"))?;
    let id = payload
        .get("metadata")
        .and_then(|m| m.get("matchId"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| {
            let platform = info.get("platformId")?.as_str()?;
            let game = info.get("gameId")?.as_i64()?;
            Some(format!("{platform}_{game}"))
        })
        .ok_or_else(|| PipelineError::malformed("match payload has no match id"))?;
    let created_ms = info
        .get("gameCreation")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| PipelineError::malformed(format!("{id}: missing gameCreation")))?;
    let created_at = Utc
        .timestamp_millis_opt(created_ms)
        .single()
        .ok_or_else(|| PipelineError::malformed(format!("{id}: bad gameCreation {created_ms}")))?;
    let duration_secs = info
        .get("gameDuration")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| PipelineError::malformed(format!("{id}: missing gameDuration")))?;
    Ok(MatchSummary {
        id,
        created_at,
        duration_secs,
    })
}

/// The label assumes team 100 is present; payloads without it are rejected.
pub fn team_100_won(info: &Value) -> Result<bool> {
    let teams = info
        .get("teams")
        .and_then(|t| t.as_array())
        .ok_or_else(|| PipelineError::malformed("match info has no teams"))?;
    teams
        .iter()
        .find(|t| t.get("teamId").and_then(|v| v.as_i64()) == Some(100))
        .and_then(|t| t.get("win"))
        .and_then(|v| v.as_bool())
        .ok_or_else(|| PipelineError::malformed("team 100 missing or has no win flag"))
}

/// Decodes a spectator payload and finds which side `subject_name` plays on.
pub fn resolve_live(payload: &Value, subject_name: &str) -> Result<LiveMatch> {
    let game_id = match (
        payload.get("platformId").and_then(|v| v.as_str()),
        payload.get("gameId").and_then(|v| v.as_i64()),
    ) {
        (Some(platform), Some(game)) => format!("{platform}_{game}"),
        (None, Some(game)) => game.to_string(),
        _ => return Err(PipelineError::malformed("live payload has no gameId")),
    };
    let participants = participant_list(payload, &game_id)?;
    let subject = subject_name.trim();
    let subject_side = participants
        .iter()
        .find(|p| p.display_name.trim().eq_ignore_ascii_case(subject))
        .map(|p| p.side)
        .unwrap_or(Side::Blue);
    Ok(LiveMatch {
        game_id,
        participants,
        subject_side,
    })
}

fn participant_list(container: &Value, match_id: &str) -> Result<Vec<Participant>> {
    let list = container
        .get("participants")
        .and_then(|p| p.as_array())
        .ok_or_else(|| PipelineError::malformed(format!("{match_id}: no participants list")))?;
    if list.is_empty() {
        return Err(PipelineError::malformed(format!(
            "{match_id}: empty participants list"
        )));
    }
    list.iter()
        .enumerate()
        .map(|(idx, raw)| participant(raw, match_id, idx))
        .collect()
}

fn participant(raw: &Value, match_id: &str, idx: usize) -> Result<Participant> {
    let field = |name: &str| {
        raw.get(name).ok_or_else(|| {
            PipelineError::malformed(format!("{match_id}: participant {idx} has no {name}"))
        })
    };
    let summoner_id = field("summonerId")?
        .as_str()
        .ok_or_else(|| PipelineError::malformed(format!("{match_id}: bad summonerId")))?
        .to_string();
    let champion_id = field("championId")?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| PipelineError::malformed(format!("{match_id}: bad championId")))?;
    let team_id = field("teamId")?
        .as_i64()
        .ok_or_else(|| PipelineError::malformed(format!("{match_id}: bad teamId")))?;
    let side = Side::from_team_id(team_id)
        .ok_or_else(|| PipelineError::malformed(format!("{match_id}: unknown team {team_id}")))?;
    let puuid = raw
        .get("puuid")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let display_name = raw
        .get("summonerName")
        .or_else(|| raw.get("riotIdGameName"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    Ok(Participant {
        match_id: match_id.to_string(),
        summoner_id,
        puuid,
        champion_id,
        side,
        display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail() -> Value {
        json!({
            "metadata": {"matchId": "VN2_1", "participants": ["p1", "p2"]},
            "info": {
                "gameCreation": 1_700_000_000_000_i64,
                "gameDuration": 1043,
                "participants": [
                    {"summonerId": "s1", "puuid": "p1", "championId": 266, "teamId": 100, "summonerName": "Alpha"},
                    {"summonerId": "s2", "puuid": "p2", "championId": 103, "teamId": 200, "summonerName": "Beta"}
                ],
                "teams": [{"teamId": 100, "win": false}, {"teamId": 200, "win": true}]
            }
        })
    }

    #[test]
    fn resolves_detail_payload() {
        let m = resolve_match(&detail()).unwrap();
        assert_eq!(m.summary.id, "VN2_1");
        assert_eq!(m.summary.duration_secs, 1043);
        assert!(!m.label);
        assert_eq!(m.participants.len(), 2);
        assert_eq!(m.participants[1].side, Side::Red);
        assert_eq!(m.participants[0].puuid.as_deref(), Some("p1"));
        assert_eq!(m.participants[0].match_id, "VN2_1");
    }

    #[test]
    fn missing_team_100_is_malformed() {
        let info = json!({"teams": [{"teamId": 200, "win": true}]});
        assert!(matches!(
            team_100_won(&info),
            Err(PipelineError::MalformedPayload(_))
        ));
    }

    #[test]
    fn rejects_unknown_team_and_missing_fields() {
        let mut bad = detail();
        bad["info"]["participants"][0]["teamId"] = json!(300);
        assert!(resolve_match(&bad).is_err());

        let mut bad = detail();
        bad["info"]["participants"][1]
            .as_object_mut()
            .unwrap()
            .remove("championId");
        assert!(resolve_match(&bad).is_err());

        assert!(resolve_match(&json!({"metadata": {}})).is_err());
    }

    #[test]
    fn live_subject_side_defaults_to_blue() {
        let live = json!({
            "gameId": 42,
            "platformId": "VN2",
            "participants": [
                {"summonerId": "s1", "championId": 1, "teamId": 100, "summonerName": "Alpha"},
                {"summonerId": "s2", "championId": 2, "teamId": 200, "summonerName": "Beta"}
            ]
        });
        let m = resolve_live(&live, "beta").unwrap();
        assert_eq!(m.game_id, "VN2_42");
        assert_eq!(m.subject_side, Side::Red);
        let m = resolve_live(&live, "Nobody").unwrap();
        assert_eq!(m.subject_side, Side::Blue);
    }
}
