use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;

use crate::champion_tags::TagVector;
use crate::features::RatioVector;
use crate::participants::MatchSummary;
use crate::schema::{FeatureSchema, RoleTag, StatName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummonerRecord {
    pub puuid: String,
    pub name: String,
    pub region: String,
    pub profile_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    pub match_id: String,
    pub ratios: RatioVector,
    pub label: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub match_id: String,
    pub ally: TagVector,
    pub enemy: TagVector,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub columns: Vec<String>,
    pub match_ids: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inserts are insert-if-absent: a `false` return means the key already existed.
pub trait RecordStore {
    fn insert_summoner(&mut self, summoner: &SummonerRecord) -> Result<bool>;
    fn insert_match(&mut self, summary: &MatchSummary) -> Result<bool>;
    fn insert_performance(&mut self, puuid: &str, match_id: &str, raw: &Value) -> Result<bool>;
    fn has_match(&self, match_id: &str) -> Result<bool>;
    /// Matches with neither a training row nor a tag row.
    fn backlog(&self) -> Result<Vec<String>>;
    fn has_training(&self, match_id: &str) -> Result<bool>;
    fn has_tags(&self, match_id: &str) -> Result<bool>;
    fn insert_training(&mut self, record: &TrainingRecord) -> Result<bool>;
    fn insert_tags(&mut self, record: &TagRecord) -> Result<bool>;
    fn delete_match(&mut self, match_id: &str) -> Result<()>;
    fn performances(&self, puuid: &str) -> Result<Vec<Value>>;
    fn load_training_set(&self, schema: &FeatureSchema) -> Result<TrainingSet>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS summoners (
                    s_id TEXT PRIMARY KEY,
                    s_name TEXT NOT NULL,
                    s_region TEXT NOT NULL,
                    s_url TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS matches (
                    m_id TEXT PRIMARY KEY,
                    m_date TEXT NOT NULL,
                    m_duration INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS performs (
                    s_id TEXT NOT NULL,
                    m_id TEXT NOT NULL,
                    p_stats TEXT NOT NULL,
                    PRIMARY KEY (s_id, m_id)
                );
                CREATE INDEX IF NOT EXISTS idx_performs_match ON performs(m_id);
                "#,
            )
            .context("create sqlite schema")?;
        self.conn
            .execute_batch(&training_ddl())
            .context("create training table")?;
        self.conn
            .execute_batch(&tags_ddl())
            .context("create tags table")?;
        Ok(())
    }

    fn exists(&self, sql: &str, key: &[&str]) -> Result<bool> {
        let found = self
            .conn
            .query_row(sql, params_from_iter(key.iter()), |_| Ok(()))
            .optional()
            .with_context(|| format!("lookup: {sql}"))?;
        Ok(found.is_some())
    }
}

fn training_ddl() -> String {
    let mut cols = vec!["m_id TEXT PRIMARY KEY".to_string()];
    for stat in StatName::SCRAPED.iter().chain([StatName::Mastery].iter()) {
        cols.push(format!("{} REAL NULL", stat.column()));
    }
    cols.push("m_win INTEGER NOT NULL".to_string());
    format!(
        "CREATE TABLE IF NOT EXISTS training ({});",
        cols.join(", ")
    )
}

fn tags_ddl() -> String {
    let mut cols = vec!["m_id TEXT PRIMARY KEY".to_string()];
    for tag in RoleTag::ALL {
        cols.push(format!("{} INTEGER NOT NULL DEFAULT 0", tag.ally_column()));
    }
    for tag in RoleTag::ALL {
        cols.push(format!("{} INTEGER NOT NULL DEFAULT 0", tag.enemy_column()));
    }
    format!("CREATE TABLE IF NOT EXISTS tags ({});", cols.join(", "))
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

impl RecordStore for SqliteStore {
    fn insert_summoner(&mut self, s: &SummonerRecord) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "INSERT INTO summoners (s_id, s_name, s_region, s_url) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(s_id) DO NOTHING",
                params![s.puuid, s.name, s.region, s.profile_url],
            )
            .context("insert summoner")?;
        Ok(n > 0)
    }

    fn insert_match(&mut self, m: &MatchSummary) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "INSERT INTO matches (m_id, m_date, m_duration) VALUES (?1, ?2, ?3)
                 ON CONFLICT(m_id) DO NOTHING",
                params![m.id, m.created_at.to_rfc3339(), m.duration_secs],
            )
            .context("insert match")?;
        Ok(n > 0)
    }

    fn insert_performance(&mut self, puuid: &str, match_id: &str, raw: &Value) -> Result<bool> {
        let json = serde_json::to_string(raw).context("serialize performance")?;
        let n = self
            .conn
            .execute(
                "INSERT INTO performs (s_id, m_id, p_stats) VALUES (?1, ?2, ?3)
                 ON CONFLICT(s_id, m_id) DO NOTHING",
                params![puuid, match_id, json],
            )
            .context("insert performance")?;
        Ok(n > 0)
    }

    fn has_match(&self, match_id: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM matches WHERE m_id = ?1", &[match_id])
    }

    fn backlog(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT m_id FROM matches
                WHERE m_id NOT IN (SELECT m_id FROM training)
                  AND m_id NOT IN (SELECT m_id FROM tags)
                ORDER BY m_date ASC, m_id ASC
                "#,
            )
            .context("prepare backlog query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query backlog")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode backlog row")?);
        }
        Ok(out)
    }

    fn has_training(&self, match_id: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM training WHERE m_id = ?1", &[match_id])
    }

    fn has_tags(&self, match_id: &str) -> Result<bool> {
        self.exists("SELECT 1 FROM tags WHERE m_id = ?1", &[match_id])
    }

    fn insert_training(&mut self, record: &TrainingRecord) -> Result<bool> {
        if self.has_training(&record.match_id)? {
            return Ok(false);
        }
        let mut columns = vec!["m_id".to_string()];
        let mut values = vec![SqlValue::Text(record.match_id.clone())];
        for (stat, v) in record.ratios.entries() {
            columns.push(stat.column().to_string());
            values.push(SqlValue::Real(*v));
        }
        columns.push("m_win".to_string());
        values.push(SqlValue::Integer(i64::from(record.label)));
        let sql = format!(
            "INSERT INTO training ({}) VALUES ({})",
            columns.join(", "),
            placeholders(values.len())
        );
        self.conn
            .execute(&sql, params_from_iter(values))
            .context("insert training row")?;
        Ok(true)
    }

    fn insert_tags(&mut self, record: &TagRecord) -> Result<bool> {
        if self.has_tags(&record.match_id)? {
            return Ok(false);
        }
        let mut columns = vec!["m_id".to_string()];
        let mut values = vec![SqlValue::Text(record.match_id.clone())];
        for (tag, n) in &record.ally {
            columns.push(tag.ally_column());
            values.push(SqlValue::Integer(i64::from(*n)));
        }
        for (tag, n) in &record.enemy {
            columns.push(tag.enemy_column());
            values.push(SqlValue::Integer(i64::from(*n)));
        }
        let sql = format!(
            "INSERT INTO tags ({}) VALUES ({})",
            columns.join(", "),
            placeholders(values.len())
        );
        self.conn
            .execute(&sql, params_from_iter(values))
            .context("insert tag row")?;
        Ok(true)
    }

    fn delete_match(&mut self, match_id: &str) -> Result<()> {
        let tx = self.conn.transaction().context("begin delete transaction")?;
        tx.execute("DELETE FROM performs WHERE m_id = ?1", params![match_id])
            .context("delete performances")?;
        tx.execute("DELETE FROM matches WHERE m_id = ?1", params![match_id])
            .context("delete match")?;
        tx.commit().context("commit delete transaction")?;
        Ok(())
    }

    fn performances(&self, puuid: &str) -> Result<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT performs.p_stats FROM performs
                 LEFT JOIN matches ON matches.m_id = performs.m_id
                 WHERE performs.s_id = ?1
                 ORDER BY matches.m_date DESC",
            )
            .context("prepare performances query")?;
        let rows = stmt
            .query_map(params![puuid], |row| row.get::<_, String>(0))
            .context("query performances")?;
        let mut out = Vec::new();
        for row in rows {
            let raw = row.context("decode performance row")?;
            out.push(serde_json::from_str(&raw).context("invalid stored performance json")?);
        }
        Ok(out)
    }

    fn load_training_set(&self, schema: &FeatureSchema) -> Result<TrainingSet> {
        let ratio_cols = schema.ratio_columns();
        let tag_cols = schema.tag_columns();
        let select = ratio_cols
            .iter()
            .map(|c| format!("training.{c}"))
            .chain(tag_cols.iter().map(|c| format!("tags.{c}")))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT training.m_id, {select}, training.m_win
             FROM training
             INNER JOIN tags ON training.m_id = tags.m_id
             ORDER BY training.m_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare training query")?;
        let width = ratio_cols.len() + tag_cols.len();
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let mut features = Vec::with_capacity(width);
                for idx in 0..ratio_cols.len() {
                    features.push(row.get::<_, Option<f64>>(idx + 1)?);
                }
                for idx in 0..tag_cols.len() {
                    let n: i64 = row.get(ratio_cols.len() + idx + 1)?;
                    features.push(Some(n as f64));
                }
                let win: i64 = row.get(width + 1)?;
                Ok((id, features, win != 0))
            })
            .context("query training rows")?;

        let mut out = TrainingSet {
            columns: schema.feature_columns(),
            ..TrainingSet::default()
        };
        for row in rows {
            let (id, features, label) = row.context("decode training row")?;
            // Rows written under a narrower stat list have NULLs here.
            let Some(features) = features.into_iter().collect::<Option<Vec<f64>>>() else {
                continue;
            };
            out.match_ids.push(id);
            out.rows.push(features);
            out.labels.push(label);
        }
        Ok(out)
    }
}

/// Profile URL stored alongside each summoner; op.gg drops the shard digit.
pub fn profile_url(platform: &str, name: &str) -> Result<String> {
    let region = platform
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_ascii_lowercase();
    let mut url = reqwest::Url::parse("https://www.op.gg").context("profile host")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("profile host cannot be a base"))?
        .pop_if_empty()
        .extend(["summoners", region.as_str(), name]);
    Ok(url.to_string())
}
