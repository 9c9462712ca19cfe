use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::schema::{FeatureSchema, RoleTag};

/// Role-tag counts in universe order; every tag of the schema is present.
pub type TagVector = BTreeMap<RoleTag, u32>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChampionInfo {
    #[serde(default)]
    pub attack: u8,
    #[serde(default)]
    pub defense: u8,
    #[serde(default)]
    pub magic: u8,
    #[serde(default)]
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChampionEntry {
    pub name: String,
    pub info: ChampionInfo,
    pub tags: Vec<RoleTag>,
}

#[derive(Debug, Deserialize)]
struct ChampionFile {
    data: HashMap<String, RawChampion>,
}

#[derive(Debug, Deserialize)]
struct RawChampion {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    info: ChampionInfo,
    #[serde(default)]
    tags: Vec<String>,
}

/// Static champion id → role tags lookup, read once from the reference dataset.
#[derive(Debug, Clone)]
pub struct ChampionTagCatalog {
    by_id: HashMap<u32, ChampionEntry>,
    universe: Vec<RoleTag>,
}

impl ChampionTagCatalog {
    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read champion data {}", path.display()))?;
        Self::from_json(&raw, schema)
            .with_context(|| format!("parse champion data {}", path.display()))
    }

    pub fn from_json(raw: &str, schema: &FeatureSchema) -> Result<Self> {
        let file: ChampionFile = serde_json::from_str(raw).context("invalid champion json")?;
        let mut by_id = HashMap::with_capacity(file.data.len());
        for (slug, champ) in file.data {
            let id = champ
                .key
                .trim()
                .parse::<u32>()
                .map_err(|_| anyhow!("champion {slug} has non-numeric key {:?}", champ.key))?;
            let tags = champ
                .tags
                .iter()
                .filter_map(|t| RoleTag::from_label(t))
                .collect();
            by_id.insert(
                id,
                ChampionEntry {
                    name: champ.name.unwrap_or(slug),
                    info: champ.info,
                    tags,
                },
            );
        }
        Ok(Self {
            by_id,
            universe: schema.tags().to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, champion_id: u32) -> Option<&ChampionEntry> {
        self.by_id.get(&champion_id)
    }

    /// Only the champion's own tags, each counted once.
    pub fn tag_counts_for(&self, champion_id: u32) -> Option<BTreeMap<RoleTag, u32>> {
        let entry = self.by_id.get(&champion_id)?;
        Some(
            entry
                .tags
                .iter()
                .filter(|t| self.universe.contains(t))
                .map(|t| (*t, 1))
                .collect(),
        )
    }

    pub fn tag_vector(&self, champion_id: u32) -> TagVector {
        let mut out = self.empty_vector();
        match self.tag_counts_for(champion_id) {
            Some(counts) => {
                for (tag, n) in counts {
                    *out.entry(tag).or_insert(0) += n;
                }
            }
            None => debug!(champion_id, "champion missing from catalog, no tags"),
        }
        out
    }

    pub fn empty_vector(&self) -> TagVector {
        self.universe.iter().map(|t| (*t, 0)).collect()
    }
}
