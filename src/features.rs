use tracing::{debug, warn};

use crate::champion_tags::{ChampionTagCatalog, TagVector};
use crate::error::{PipelineError, Result};
use crate::http_client::HttpTransport;
use crate::participants::{Participant, Side};
use crate::profile_scrape::ProfileScraper;
use crate::riot_api::{RateLimitedClient, Sleeper};
use crate::schema::{FeatureSchema, StatName};

/// Mastery points for one summoner on one champion, `None` when unusable.
pub trait MasterySource {
    fn mastery_points(&self, summoner_id: &str, champion_id: u32) -> Result<Option<f64>>;
}

/// Scraped per-player statistics in the requested order, `None` when unusable.
pub trait ProfileSource {
    fn profile_stats(
        &self,
        summoner_name: &str,
        champion_id: u32,
        stats: &[StatName],
    ) -> Result<Option<Vec<f64>>>;
}

impl<T: HttpTransport, S: Sleeper> MasterySource for RateLimitedClient<T, S> {
    /// A non-success status counts as no data; transport and throttling
    /// errors still propagate.
    fn mastery_points(&self, summoner_id: &str, champion_id: u32) -> Result<Option<f64>> {
        match self.mastery(summoner_id, champion_id) {
            Ok(mastery) => Ok(Some(mastery.champion_points)),
            Err(PipelineError::RemoteFetch { url, status }) => {
                warn!(%url, status, "mastery lookup failed");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl<T: HttpTransport> ProfileSource for ProfileScraper<T> {
    fn profile_stats(
        &self,
        summoner_name: &str,
        champion_id: u32,
        stats: &[StatName],
    ) -> Result<Option<Vec<f64>>> {
        self.scrape(summoner_name, champion_id, stats)
    }
}

/// Team-100-minus-team-200 totals, one entry per tracked statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioVector {
    entries: Vec<(StatName, f64)>,
}

impl RatioVector {
    pub fn from_totals(stats: &[StatName], allies: &[f64], enemies: &[f64]) -> Self {
        let values = team_difference(allies, enemies);
        Self {
            entries: stats.iter().copied().zip(values).collect(),
        }
    }

    pub fn get(&self, stat: StatName) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| *s == stat)
            .map(|(_, v)| *v)
    }

    pub fn entries(&self) -> &[(StatName, f64)] {
        &self.entries
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn team_difference(allies: &[f64], enemies: &[f64]) -> Vec<f64> {
    allies.iter().zip(enemies).map(|(a, e)| a - e).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchFeatures {
    pub ratios: RatioVector,
    pub ally_tags: TagVector,
    pub enemy_tags: TagVector,
}

impl MatchFeatures {
    /// Ratios, then ally tag counts, then enemy tag counts.
    pub fn feature_row(&self) -> Vec<f64> {
        let mut row = self.ratios.values();
        row.extend(self.ally_tags.values().map(|n| *n as f64));
        row.extend(self.enemy_tags.values().map(|n| *n as f64));
        row
    }
}

pub struct FeatureAggregator<'a, M, P> {
    mastery: &'a M,
    profiles: &'a P,
    catalog: &'a ChampionTagCatalog,
    schema: &'a FeatureSchema,
}

impl<'a, M: MasterySource, P: ProfileSource> FeatureAggregator<'a, M, P> {
    pub fn new(
        mastery: &'a M,
        profiles: &'a P,
        catalog: &'a ChampionTagCatalog,
        schema: &'a FeatureSchema,
    ) -> Self {
        Self {
            mastery,
            profiles,
            catalog,
            schema,
        }
    }

    /// All-or-nothing: one participant without usable data voids the match.
    pub fn aggregate(&self, participants: &[Participant]) -> Result<Option<MatchFeatures>> {
        let stats = self.schema.ratio_stats();
        let Some((allies, enemies)) = self.ratio_totals(participants)? else {
            return Ok(None);
        };
        let (ally_tags, enemy_tags) = self.tag_totals(participants);
        Ok(Some(MatchFeatures {
            ratios: RatioVector::from_totals(&stats, &allies, &enemies),
            ally_tags,
            enemy_tags,
        }))
    }

    fn ratio_totals(&self, participants: &[Participant]) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
        let scraped = self.schema.scraped_stats();
        let width = self.schema.ratio_len();
        let mut allies = vec![0.0; width];
        let mut enemies = vec![0.0; width];

        for p in participants {
            let Some(points) = self.mastery.mastery_points(&p.summoner_id, p.champion_id)? else {
                warn!(
                    summoner_id = %p.summoner_id,
                    champion_id = p.champion_id,
                    "no mastery data"
                );
                return Ok(None);
            };

            let mut row = match self
                .profiles
                .profile_stats(&p.display_name, p.champion_id, scraped)
            {
                Ok(Some(row)) => row,
                Ok(None) => {
                    warn!(summoner = %p.display_name, "no usable profile stats");
                    return Ok(None);
                }
                Err(PipelineError::ScrapeParse { field, raw }) => {
                    warn!(
                        summoner = %p.display_name,
                        %field,
                        raw = %raw,
                        "unparseable profile stat"
                    );
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            if row.len() != scraped.len() {
                warn!(
                    summoner = %p.display_name,
                    expected = scraped.len(),
                    got = row.len(),
                    "profile stats have the wrong width"
                );
                return Ok(None);
            }
            row.push(points);

            let totals = match p.side {
                Side::Blue => &mut allies,
                Side::Red => &mut enemies,
            };
            for (total, v) in totals.iter_mut().zip(&row) {
                *total += v;
            }
        }
        debug!(?allies, ?enemies, "team totals");
        Ok(Some((allies, enemies)))
    }

    /// Tag counts are kept per side, never differenced.
    pub fn tag_totals(&self, participants: &[Participant]) -> (TagVector, TagVector) {
        let mut allies = self.catalog.empty_vector();
        let mut enemies = self.catalog.empty_vector();
        for p in participants {
            let totals = match p.side {
                Side::Blue => &mut allies,
                Side::Red => &mut enemies,
            };
            for (tag, n) in self.catalog.tag_vector(p.champion_id) {
                *totals.entry(tag).or_insert(0) += n;
            }
        }
        (allies, enemies)
    }
}
