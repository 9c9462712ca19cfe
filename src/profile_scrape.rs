use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::http_client::HttpTransport;
use crate::schema::StatName;

const KDA_FALLBACK: f64 = 10.0;

const SECTION_WIN_RATE: usize = 0;
const SECTION_KDA: usize = 1;
const SECTION_DAMAGE: usize = 3;

/// CSS selectors describing where the stat cards live on a profile page.
#[derive(Debug, Clone)]
pub struct ProfileLayout {
    section: Selector,
    value: Selector,
    games: Selector,
    games_index: usize,
}

impl ProfileLayout {
    pub fn new(section: &str, value: &str, games: &str, games_index: usize) -> Result<Self> {
        Ok(Self {
            section: selector(section)?,
            value: selector(value)?,
            games: selector(games)?,
            games_index,
        })
    }

    pub fn blitz() -> Result<Self> {
        Self::new("section.span-quarter.card-body", "h3", "span.type-body2", 1)
    }
}

fn selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|err| PipelineError::Config(format!("selector {raw:?}: {err}")))
}

/// Text pulled out of a profile page before any numeric parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSections {
    pub values: Vec<Option<String>>,
    pub games: Option<String>,
}

impl ProfileSections {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }
}

/// Pages without the games-played marker carry no usable history.
pub fn parse_profile_page(html: &str, layout: &ProfileLayout) -> ProfileSections {
    let doc = Html::parse_document(html);
    let Some(games) = doc
        .select(&layout.games)
        .nth(layout.games_index)
        .map(element_text)
    else {
        return ProfileSections::default();
    };
    let values = doc
        .select(&layout.section)
        .map(|section| section.select(&layout.value).next().map(element_text))
        .collect();
    ProfileSections {
        values,
        games: Some(games),
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// `Ok(None)` means the page explicitly reports no data for the field.
pub fn parse_stat(stat: StatName, page: &ProfileSections) -> Result<Option<f64>> {
    match stat {
        StatName::WinRate => {
            let raw = required(stat, page.value(SECTION_WIN_RATE))?;
            let pct = raw.trim().trim_end_matches('%').trim();
            let value = parse_f64(stat, pct, raw)?;
            Ok(Some(value / 100.0))
        }
        StatName::Kda => match page.value(SECTION_KDA) {
            Some(raw) if raw.trim().eq_ignore_ascii_case("nan") => Ok(None),
            Some(raw) => Ok(Some(
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .unwrap_or(KDA_FALLBACK),
            )),
            None => Ok(Some(KDA_FALLBACK)),
        },
        StatName::Damage => {
            let raw = required(stat, page.value(SECTION_DAMAGE))?;
            let cleaned = raw.trim().replace(',', "");
            parse_f64(stat, &cleaned, raw).map(Some)
        }
        StatName::GamesPlayed => {
            let raw = required(stat, page.games.as_deref())?;
            let first = raw.split_whitespace().next().unwrap_or_default();
            let games = first
                .parse::<i64>()
                .map_err(|_| PipelineError::ScrapeParse {
                    field: stat,
                    raw: raw.to_string(),
                })?;
            Ok(Some(games as f64))
        }
        StatName::Mastery => Err(PipelineError::ScrapeParse {
            field: stat,
            raw: "mastery is not shown on profile pages".to_string(),
        }),
    }
}

fn required(stat: StatName, raw: Option<&str>) -> Result<&str> {
    raw.ok_or_else(|| PipelineError::ScrapeParse {
        field: stat,
        raw: String::new(),
    })
}

fn parse_f64(stat: StatName, cleaned: &str, raw: &str) -> Result<f64> {
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PipelineError::ScrapeParse {
            field: stat,
            raw: raw.to_string(),
        })
}

pub fn fallback_vector(stats: &[StatName]) -> Vec<f64> {
    stats.iter().map(|s| s.fallback()).collect()
}

pub struct ProfileScraper<T> {
    transport: T,
    base_url: String,
    region: String,
    queue: String,
    layout: ProfileLayout,
}

impl<T: HttpTransport> ProfileScraper<T> {
    pub fn new(transport: T, cfg: &PipelineConfig) -> Result<Self> {
        Ok(Self::with_layout(transport, cfg, ProfileLayout::blitz()?))
    }

    pub fn with_layout(transport: T, cfg: &PipelineConfig, layout: ProfileLayout) -> Self {
        Self {
            transport,
            base_url: cfg.profile_base_url.clone(),
            region: cfg.route.platform.clone(),
            queue: cfg.profile_queue.clone(),
            layout,
        }
    }

    pub fn profile_url(&self, summoner_name: &str, champion_id: Option<u32>) -> Result<String> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            PipelineError::Config(format!("bad profile base {}: {err}", self.base_url))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                PipelineError::Config(format!("profile base {} cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend([
                "lol",
                "profile",
                self.region.as_str(),
                summoner_name,
                "champions",
                "all",
            ]);
            if let Some(id) = champion_id {
                segments.push(&id.to_string());
            }
        }
        url.query_pairs_mut().append_pair("queue", &self.queue);
        Ok(url.to_string())
    }

    pub fn scrape(
        &self,
        summoner_name: &str,
        champion_id: u32,
        stats: &[StatName],
    ) -> Result<Option<Vec<f64>>> {
        let mut page = self.fetch_sections(summoner_name, Some(champion_id))?;
        if page.is_empty() {
            debug!(summoner_name, champion_id, "no champion stats, trying all champions");
            page = self.fetch_sections(summoner_name, None)?;
        }
        if page.is_empty() {
            info!(summoner_name, champion_id, "no visible history, using fallback stats");
            return Ok(Some(fallback_vector(stats)));
        }

        let mut features = Vec::with_capacity(stats.len());
        for stat in stats {
            match parse_stat(*stat, &page)? {
                Some(v) => features.push(v),
                None => {
                    warn!(summoner_name, field = %stat, "profile reports no data");
                    return Ok(None);
                }
            }
        }
        debug!(summoner_name, champion_id, ?features, "scraped profile");
        Ok(Some(features))
    }

    fn fetch_sections(
        &self,
        summoner_name: &str,
        champion_id: Option<u32>,
    ) -> Result<ProfileSections> {
        let url = self.profile_url(summoner_name, champion_id)?;
        match self.transport.get(&url, &[]) {
            Ok(resp) if resp.is_success() => Ok(parse_profile_page(&resp.body, &self.layout)),
            Ok(resp) => {
                warn!(%url, status = resp.status, "profile page unavailable");
                Ok(ProfileSections::default())
            }
            Err(err) => {
                warn!(%url, error = %format!("{err:#}"), "profile request failed");
                Ok(ProfileSections::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(values: &[&str], games: &str) -> ProfileSections {
        ProfileSections {
            values: values.iter().map(|v| Some(v.to_string())).collect(),
            games: Some(games.to_string()),
        }
    }

    #[test]
    fn parses_each_field() {
        let p = page(&["62.5%", "3.41", "x", "21,450"], "14 Games");
        assert_eq!(parse_stat(StatName::WinRate, &p).unwrap(), Some(0.625));
        assert_eq!(parse_stat(StatName::Kda, &p).unwrap(), Some(3.41));
        assert_eq!(parse_stat(StatName::Damage, &p).unwrap(), Some(21450.0));
        assert_eq!(parse_stat(StatName::GamesPlayed, &p).unwrap(), Some(14.0));
    }

    #[test]
    fn kda_tolerates_garbage_but_not_nan() {
        let p = page(&["50%", "Perfect"], "3 Games");
        assert_eq!(parse_stat(StatName::Kda, &p).unwrap(), Some(10.0));
        let p = page(&["50%", "NaN"], "3 Games");
        assert_eq!(parse_stat(StatName::Kda, &p).unwrap(), None);
        let p = page(&["50%"], "3 Games");
        assert_eq!(parse_stat(StatName::Kda, &p).unwrap(), Some(10.0));
    }

    #[test]
    fn kda_never_yields_a_non_finite_value() {
        for raw in ["inf", "Infinity", "-inf"] {
            let p = page(&["50%", raw], "3 Games");
            assert_eq!(parse_stat(StatName::Kda, &p).unwrap(), Some(10.0), "{raw}");
        }
        for raw in ["nan", "NAN", " NaN "] {
            let p = page(&["50%", raw], "3 Games");
            assert_eq!(parse_stat(StatName::Kda, &p).unwrap(), None, "{raw}");
        }
    }

    #[test]
    fn other_fields_report_the_failing_field() {
        let p = page(&["fifty%", "2.0"], "many games");
        for stat in [StatName::WinRate, StatName::Damage, StatName::GamesPlayed] {
            match parse_stat(stat, &p) {
                Err(PipelineError::ScrapeParse { field, .. }) => assert_eq!(field, stat),
                other => panic!("expected parse error for {stat}, got {other:?}"),
            }
        }
    }

    #[test]
    fn page_without_games_marker_is_empty() {
        let layout = ProfileLayout::blitz().unwrap();
        let html = r#"<html><body>
            <section class="span-quarter card-body"><h3>51%</h3></section>
            <span class="type-body2">Ranked</span>
        </body></html>"#;
        assert!(parse_profile_page(html, &layout).is_empty());
    }

    #[test]
    fn fallback_follows_requested_order() {
        assert_eq!(
            fallback_vector(&StatName::SCRAPED),
            vec![0.5, 3.0, 800.0, 5.0]
        );
        assert_eq!(
            fallback_vector(&[StatName::Damage, StatName::WinRate]),
            vec![800.0, 0.5]
        );
    }
}
