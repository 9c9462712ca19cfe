use std::fmt;

use crate::error::{PipelineError, Result};

/// Bumped whenever the column layout of training rows changes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatName {
    WinRate,
    Kda,
    Damage,
    GamesPlayed,
    Mastery,
}

impl StatName {
    pub const SCRAPED: [StatName; 4] = [
        StatName::WinRate,
        StatName::Kda,
        StatName::Damage,
        StatName::GamesPlayed,
    ];

    pub fn column(self) -> &'static str {
        match self {
            StatName::WinRate => "m_winrate",
            StatName::Kda => "m_kda",
            StatName::Damage => "m_dmg",
            StatName::GamesPlayed => "m_nof_games",
            StatName::Mastery => "m_mastery",
        }
    }

    /// Neutral value used when a profile shows no history at all.
    pub fn fallback(self) -> f64 {
        match self {
            StatName::WinRate => 0.5,
            StatName::Kda => 3.0,
            StatName::Damage => 800.0,
            StatName::GamesPlayed => 5.0,
            StatName::Mastery => 0.0,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        let key = key.strip_prefix("m_").unwrap_or(&key);
        match key {
            "winrate" | "win_rate" => Some(StatName::WinRate),
            "kda" => Some(StatName::Kda),
            "dmg" | "damage" => Some(StatName::Damage),
            "nof_games" | "games" | "games_played" => Some(StatName::GamesPlayed),
            "mastery" => Some(StatName::Mastery),
            _ => None,
        }
    }
}

impl fmt::Display for StatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatName::WinRate => "win rate",
            StatName::Kda => "KDA",
            StatName::Damage => "damage",
            StatName::GamesPlayed => "games played",
            StatName::Mastery => "mastery",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleTag {
    Mage,
    Marksman,
    Tank,
    Assassin,
    Support,
    Fighter,
}

impl RoleTag {
    pub const ALL: [RoleTag; 6] = [
        RoleTag::Mage,
        RoleTag::Marksman,
        RoleTag::Tank,
        RoleTag::Assassin,
        RoleTag::Support,
        RoleTag::Fighter,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RoleTag::Mage => "Mage",
            RoleTag::Marksman => "Marksman",
            RoleTag::Tank => "Tank",
            RoleTag::Assassin => "Assassin",
            RoleTag::Support => "Support",
            RoleTag::Fighter => "Fighter",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        RoleTag::ALL
            .into_iter()
            .find(|tag| tag.label().eq_ignore_ascii_case(raw.trim()))
    }

    pub fn ally_column(self) -> String {
        format!("a_{}", self.label().to_ascii_lowercase())
    }

    pub fn enemy_column(self) -> String {
        format!("e_{}", self.label().to_ascii_lowercase())
    }
}

/// Column layout shared by the scraper, the tag catalog, the store and the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    version: u32,
    scraped: Vec<StatName>,
    tags: Vec<RoleTag>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            scraped: StatName::SCRAPED.to_vec(),
            tags: RoleTag::ALL.to_vec(),
        }
    }
}

impl FeatureSchema {
    /// Mastery is always appended as the trailing ratio and must not be listed.
    pub fn with_stats(stats: Vec<StatName>) -> Result<Self> {
        if stats.is_empty() {
            return Err(PipelineError::Config("no tracked statistics".to_string()));
        }
        let mut scraped: Vec<StatName> = Vec::with_capacity(stats.len());
        for stat in stats {
            if stat == StatName::Mastery {
                return Err(PipelineError::Config(
                    "mastery is fetched from the api, not scraped".to_string(),
                ));
            }
            if scraped.contains(&stat) {
                return Err(PipelineError::Config(format!("duplicate stat {stat}")));
            }
            scraped.push(stat);
        }
        Ok(Self {
            scraped,
            ..Self::default()
        })
    }

    pub fn parse_stats(raw: &str) -> Result<Self> {
        let mut stats = Vec::new();
        for part in raw.split([',', ';', ' ']).filter(|p| !p.trim().is_empty()) {
            let stat = StatName::parse(part)
                .ok_or_else(|| PipelineError::Config(format!("unknown stat {part:?}")))?;
            if stat != StatName::Mastery {
                stats.push(stat);
            }
        }
        Self::with_stats(stats)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn scraped_stats(&self) -> &[StatName] {
        &self.scraped
    }

    pub fn ratio_stats(&self) -> Vec<StatName> {
        let mut out = self.scraped.clone();
        out.push(StatName::Mastery);
        out
    }

    pub fn ratio_len(&self) -> usize {
        self.scraped.len() + 1
    }

    pub fn tags(&self) -> &[RoleTag] {
        &self.tags
    }

    pub fn ratio_columns(&self) -> Vec<String> {
        self.ratio_stats()
            .into_iter()
            .map(|s| s.column().to_string())
            .collect()
    }

    pub fn tag_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = self.tags.iter().map(|t| t.ally_column()).collect();
        out.extend(self.tags.iter().map(|t| t.enemy_column()));
        out
    }

    pub fn feature_columns(&self) -> Vec<String> {
        let mut out = self.ratio_columns();
        out.extend(self.tag_columns());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_columns_follow_training_layout() {
        let schema = FeatureSchema::default();
        assert_eq!(
            schema.ratio_columns(),
            vec!["m_winrate", "m_kda", "m_dmg", "m_nof_games", "m_mastery"]
        );
        let tags = schema.tag_columns();
        assert_eq!(tags.len(), 12);
        assert_eq!(tags[0], "a_mage");
        assert_eq!(tags[6], "e_mage");
        assert_eq!(tags[11], "e_fighter");
    }

    #[test]
    fn parse_stats_keeps_order_and_drops_mastery() {
        let schema = FeatureSchema::parse_stats("m_kda, winrate,m_mastery").unwrap();
        assert_eq!(schema.scraped_stats(), &[StatName::Kda, StatName::WinRate]);
        assert_eq!(schema.ratio_len(), 3);
    }

    #[test]
    fn rejects_duplicates_and_unknown() {
        assert!(FeatureSchema::parse_stats("kda,kda").is_err());
        assert!(FeatureSchema::parse_stats("gold").is_err());
        assert!(FeatureSchema::parse_stats("").is_err());
    }
}
