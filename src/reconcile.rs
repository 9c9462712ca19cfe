use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::features::{FeatureAggregator, MasterySource, ProfileSource};
use crate::http_client::HttpTransport;
use crate::participants::{Participant, resolve_match};
use crate::riot_api::{RateLimitedClient, Sleeper};
use crate::store::{RecordStore, TagRecord, TrainingRecord};

/// Where finished match payloads and current display names come from.
pub trait MatchSource {
    fn match_payload(&self, match_id: &str) -> Result<Value>;
    fn display_name(&self, summoner_id: &str) -> Result<String>;
}

impl<T: HttpTransport, S: Sleeper> MatchSource for RateLimitedClient<T, S> {
    fn match_payload(&self, match_id: &str) -> Result<Value> {
        self.match_detail(match_id)
    }

    fn display_name(&self, summoner_id: &str) -> Result<String> {
        self.summoner_name(summoner_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub backlog: usize,
    pub persisted: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failures: Vec<String>,
}

pub struct TrainingSetReconciler<'a, S, M, P> {
    source: &'a S,
    aggregator: FeatureAggregator<'a, M, P>,
    refresh_names: bool,
}

impl<'a, S, M, P> TrainingSetReconciler<'a, S, M, P>
where
    S: MatchSource,
    M: MasterySource,
    P: ProfileSource,
{
    pub fn new(source: &'a S, aggregator: FeatureAggregator<'a, M, P>) -> Self {
        Self {
            source,
            aggregator,
            refresh_names: false,
        }
    }

    /// Re-read each participant's display name before scraping; payload
    /// names can be stale after a rename.
    pub fn refresh_names(mut self, on: bool) -> Self {
        self.refresh_names = on;
        self
    }

    pub fn reconcile_backlog<R: RecordStore>(
        &self,
        store: &mut R,
    ) -> anyhow::Result<ReconcileSummary> {
        let backlog = store.backlog()?;
        self.reconcile(store, &backlog)
    }

    pub fn reconcile<R: RecordStore>(
        &self,
        store: &mut R,
        backlog: &[String],
    ) -> anyhow::Result<ReconcileSummary> {
        let mut summary = ReconcileSummary {
            backlog: backlog.len(),
            ..ReconcileSummary::default()
        };
        info!(matches = backlog.len(), "reconciling backlog");

        for (idx, match_id) in backlog.iter().enumerate() {
            if store.has_training(match_id)? && store.has_tags(match_id)? {
                summary.skipped += 1;
                continue;
            }
            match self.build_records(match_id) {
                Ok((training, tags)) => {
                    let wrote_training = store.insert_training(&training)?;
                    let wrote_tags = store.insert_tags(&tags)?;
                    if wrote_training || wrote_tags {
                        summary.persisted += 1;
                        info!(
                            match_id = %match_id,
                            progress = %format!("{}/{}", idx + 1, backlog.len()),
                            "persisted training row"
                        );
                    } else {
                        summary.skipped += 1;
                    }
                }
                Err(PipelineError::InsufficientData { match_id }) => {
                    store.delete_match(&match_id)?;
                    summary.deleted += 1;
                    info!(match_id = %match_id, "insufficient data, match deleted");
                }
                Err(err) if err.is_match_scoped() => {
                    warn!(match_id = %match_id, error = %err, "match failed, left in backlog");
                    summary.failures.push(format!("{match_id}: {err}"));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(summary)
    }

    fn build_records(&self, match_id: &str) -> Result<(TrainingRecord, TagRecord)> {
        let payload = self.source.match_payload(match_id)?;
        let resolved = resolve_match(&payload)?;
        let participants = self.with_fresh_names(resolved.participants)?;
        let features = self
            .aggregator
            .aggregate(&participants)?
            .ok_or_else(|| PipelineError::InsufficientData {
                match_id: match_id.to_string(),
            })?;
        Ok((
            TrainingRecord {
                match_id: match_id.to_string(),
                ratios: features.ratios,
                label: resolved.label,
            },
            TagRecord {
                match_id: match_id.to_string(),
                ally: features.ally_tags,
                enemy: features.enemy_tags,
            },
        ))
    }

    fn with_fresh_names(&self, mut participants: Vec<Participant>) -> Result<Vec<Participant>> {
        if self.refresh_names {
            refresh_display_names(self.source, &mut participants)?;
        }
        Ok(participants)
    }
}

/// Replaces payload names with the current ones; blank answers keep the old name.
pub fn refresh_display_names<S: MatchSource + ?Sized>(
    source: &S,
    participants: &mut [Participant],
) -> Result<()> {
    for p in participants.iter_mut() {
        let name = source.display_name(&p.summoner_id)?;
        if !name.trim().is_empty() {
            p.display_name = name;
        }
    }
    Ok(())
}
