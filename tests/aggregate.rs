mod common;

use std::collections::{HashMap, HashSet};

use rift_predictor::error::{PipelineError, Result};
use rift_predictor::features::{FeatureAggregator, MasterySource, ProfileSource};
use rift_predictor::participants::{Participant, Side};
use rift_predictor::schema::{FeatureSchema, RoleTag, StatName};

use common::catalog;

#[derive(Default)]
struct StubMastery {
    points: HashMap<String, f64>,
}

impl MasterySource for StubMastery {
    fn mastery_points(&self, summoner_id: &str, _champion_id: u32) -> Result<Option<f64>> {
        Ok(self.points.get(summoner_id).copied())
    }
}

#[derive(Default)]
struct StubProfiles {
    stats: HashMap<String, HashMap<StatName, f64>>,
    broken: HashSet<String>,
}

impl ProfileSource for StubProfiles {
    fn profile_stats(
        &self,
        summoner_name: &str,
        _champion_id: u32,
        stats: &[StatName],
    ) -> Result<Option<Vec<f64>>> {
        if self.broken.contains(summoner_name) {
            return Err(PipelineError::ScrapeParse {
                field: StatName::Damage,
                raw: "??".to_string(),
            });
        }
        let Some(known) = self.stats.get(summoner_name) else {
            return Ok(None);
        };
        Ok(stats.iter().map(|s| known.get(s).copied()).collect())
    }
}

fn player(idx: usize, champion_id: u32, side: Side) -> Participant {
    Participant {
        match_id: "VN2_1".to_string(),
        summoner_id: format!("sid-{idx}"),
        puuid: None,
        champion_id,
        side,
        display_name: format!("p{idx}"),
    }
}

/// Two per side; blue has win rate 0.6 + 0.5 and kda 4 + 2, red 0.4 + 0.3 and 1 + 1.
fn sources() -> (StubMastery, StubProfiles, Vec<Participant>) {
    let mut mastery = StubMastery::default();
    let mut profiles = StubProfiles::default();
    let rows = [
        (0, 266, Side::Blue, 0.6, 4.0, 1000.0),
        (1, 103, Side::Blue, 0.5, 2.0, 2000.0),
        (2, 222, Side::Red, 0.4, 1.0, 500.0),
        (3, 201, Side::Red, 0.3, 1.0, 4000.0),
    ];
    let mut participants = Vec::new();
    for (idx, champ, side, wr, kda, points) in rows {
        let p = player(idx, champ, side);
        mastery.points.insert(p.summoner_id.clone(), points);
        profiles.stats.insert(
            p.display_name.clone(),
            HashMap::from([(StatName::WinRate, wr), (StatName::Kda, kda)]),
        );
        participants.push(p);
    }
    (mastery, profiles, participants)
}

fn schema() -> FeatureSchema {
    FeatureSchema::with_stats(vec![StatName::WinRate, StatName::Kda]).unwrap()
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let v = actual.expect("stat present");
    assert!((v - expected).abs() < 1e-9, "{v} != {expected}");
}

#[test]
fn ratios_point_toward_team_100() {
    let (mastery, profiles, participants) = sources();
    let catalog = catalog();
    let schema = schema();
    let aggregator = FeatureAggregator::new(&mastery, &profiles, &catalog, &schema);

    let features = aggregator.aggregate(&participants).unwrap().unwrap();
    assert_eq!(features.ratios.len(), 3);
    assert_close(features.ratios.get(StatName::WinRate), 0.4);
    assert_close(features.ratios.get(StatName::Kda), 4.0);
    assert_close(features.ratios.get(StatName::Mastery), -1500.0);

    let mut shuffled = participants.clone();
    shuffled.reverse();
    shuffled.swap(0, 2);
    let again = aggregator.aggregate(&shuffled).unwrap().unwrap();
    for ((a, x), (b, y)) in features.ratios.entries().iter().zip(again.ratios.entries()) {
        assert_eq!(a, b);
        assert!((x - y).abs() < 1e-9);
    }
}

#[test]
fn tags_are_summed_per_side_not_differenced() {
    let (mastery, profiles, participants) = sources();
    let catalog = catalog();
    let schema = schema();
    let aggregator = FeatureAggregator::new(&mastery, &profiles, &catalog, &schema);

    let features = aggregator.aggregate(&participants).unwrap().unwrap();
    // Blue: Aatrox (Fighter, Tank) + Ahri (Mage, Assassin).
    assert_eq!(features.ally_tags[&RoleTag::Fighter], 1);
    assert_eq!(features.ally_tags[&RoleTag::Tank], 1);
    assert_eq!(features.ally_tags[&RoleTag::Mage], 1);
    assert_eq!(features.ally_tags[&RoleTag::Support], 0);
    // Red: Jinx (Marksman) + Braum (Support, Tank).
    assert_eq!(features.enemy_tags[&RoleTag::Tank], 1);
    assert_eq!(features.enemy_tags[&RoleTag::Marksman], 1);
    assert_eq!(features.enemy_tags[&RoleTag::Support], 1);

    let row = features.feature_row();
    assert_eq!(row.len(), 3 + 12);
    assert_eq!(row.len(), schema.feature_columns().len());
}

#[test]
fn missing_mastery_voids_the_match() {
    let (mut mastery, profiles, participants) = sources();
    mastery.points.remove("sid-3");
    let catalog = catalog();
    let schema = schema();
    let aggregator = FeatureAggregator::new(&mastery, &profiles, &catalog, &schema);
    assert!(aggregator.aggregate(&participants).unwrap().is_none());
}

#[test]
fn missing_or_broken_profile_voids_the_match() {
    let (mastery, mut profiles, participants) = sources();
    let catalog = catalog();
    let schema = schema();

    profiles.stats.remove("p1");
    {
        let aggregator = FeatureAggregator::new(&mastery, &profiles, &catalog, &schema);
        assert!(aggregator.aggregate(&participants).unwrap().is_none());
    }

    let (_, mut profiles, _) = sources();
    profiles.broken.insert("p2".to_string());
    let aggregator = FeatureAggregator::new(&mastery, &profiles, &catalog, &schema);
    assert!(aggregator.aggregate(&participants).unwrap().is_none());
}

#[test]
fn unknown_champion_contributes_no_tags() {
    let (mastery, profiles, mut participants) = sources();
    participants[0].champion_id = 4242;
    let catalog = catalog();
    let schema = schema();
    let aggregator = FeatureAggregator::new(&mastery, &profiles, &catalog, &schema);
    let features = aggregator.aggregate(&participants).unwrap().unwrap();
    assert_eq!(features.ally_tags[&RoleTag::Fighter], 0);
    assert_eq!(features.ally_tags.values().sum::<u32>(), 2);
}
