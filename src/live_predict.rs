use std::fmt;

use anyhow::{Context, Result};
use tracing::info;

use crate::error::PipelineError;
use crate::features::{FeatureAggregator, MasterySource, ProfileSource};
use crate::http_client::HttpTransport;
use crate::model::{Model, Prediction};
use crate::participants::{Side, resolve_live};
use crate::reconcile::refresh_display_names;
use crate::riot_api::{RateLimitedClient, Sleeper};

/// Win chances from the subject's point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct WinOutlook {
    pub game_id: String,
    pub subject_side: Side,
    pub your_team: f64,
    pub enemy_team: f64,
}

impl WinOutlook {
    /// Predictions are always about team 100; flip them for a red-side subject.
    pub fn orient(game_id: String, subject_side: Side, prediction: &Prediction) -> Self {
        let blue_wins = prediction.win_probability();
        let blue_loses = 1.0 - blue_wins;
        let (your_team, enemy_team) = match subject_side {
            Side::Blue => (blue_wins, blue_loses),
            Side::Red => (blue_loses, blue_wins),
        };
        Self {
            game_id,
            subject_side,
            your_team,
            enemy_team,
        }
    }
}

impl fmt::Display for WinOutlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "your team ---{:.1}% - {:.1}%--- enemy team",
            self.your_team * 100.0,
            self.enemy_team * 100.0
        )
    }
}

pub fn predict_live<T, S, M, P, Md>(
    client: &RateLimitedClient<T, S>,
    aggregator: &FeatureAggregator<'_, M, P>,
    model: &Md,
    summoner_name: &str,
) -> Result<WinOutlook>
where
    T: HttpTransport,
    S: Sleeper,
    M: MasterySource,
    P: ProfileSource,
    Md: Model,
{
    let summoner = client
        .summoner_by_name(summoner_name)
        .with_context(|| format!("look up summoner {summoner_name}"))?;
    let payload = client
        .active_game(&summoner.id)?
        .ok_or_else(|| PipelineError::NotInGame {
            summoner: summoner_name.to_string(),
        })?;
    let mut live = resolve_live(&payload, summoner_name)?;
    refresh_display_names(client, &mut live.participants)?;
    info!(
        game_id = %live.game_id,
        side = live.subject_side.team_id(),
        "live game found"
    );

    let features = aggregator
        .aggregate(&live.participants)?
        .ok_or_else(|| PipelineError::InsufficientData {
            match_id: live.game_id.clone(),
        })?;
    let prediction = model.predict(&features.feature_row())?;
    Ok(WinOutlook::orient(live.game_id, live.subject_side, &prediction))
}
