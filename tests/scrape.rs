mod common;

use rift_predictor::error::PipelineError;
use rift_predictor::profile_scrape::{ProfileLayout, ProfileScraper, parse_profile_page, parse_stat};
use rift_predictor::schema::StatName;

use common::{ScriptedTransport, ok, read_fixture, status, test_config};

#[test]
fn parses_profile_fixture() {
    let layout = ProfileLayout::blitz().unwrap();
    let page = parse_profile_page(&read_fixture("profile_champion.html"), &layout);
    assert_eq!(page.values.len(), 4);
    assert_eq!(page.games.as_deref(), Some("14 Games"));
    assert_eq!(parse_stat(StatName::WinRate, &page).unwrap(), Some(0.625));
    assert_eq!(parse_stat(StatName::Damage, &page).unwrap(), Some(21450.0));
    assert!(parse_stat(StatName::Mastery, &page).is_err());
}

#[test]
fn scrapes_champion_page_first() {
    let transport = ScriptedTransport::new().route(
        "/champions/all/103",
        vec![ok(read_fixture("profile_champion.html"))],
    );
    let scraper = ProfileScraper::new(&transport, &test_config()).unwrap();
    let stats = scraper
        .scrape("Moonlit", 103, &StatName::SCRAPED)
        .unwrap()
        .unwrap();
    assert_eq!(stats, vec![0.625, 3.41, 21450.0, 14.0]);
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(
        transport.requests()[0],
        "https://blitz.gg/lol/profile/vn2/Moonlit/champions/all/103?queue=HOWLING_ABYSS_ARAM"
    );
}

#[test]
fn falls_back_to_all_champions_page() {
    let transport = ScriptedTransport::new()
        .route("/champions/all/103", vec![ok(read_fixture("profile_empty.html"))])
        .route("/champions/all?", vec![ok(read_fixture("profile_champion.html"))]);
    let scraper = ProfileScraper::new(&transport, &test_config()).unwrap();
    let stats = scraper
        .scrape("Moonlit", 103, &[StatName::GamesPlayed, StatName::Kda])
        .unwrap()
        .unwrap();
    assert_eq!(stats, vec![14.0, 3.41]);
    assert_eq!(transport.requests().len(), 2);
}

#[test]
fn empty_history_yields_fallback_vector() {
    for transport in [
        ScriptedTransport::new().route("/champions/all", vec![ok(read_fixture("profile_empty.html"))]),
        ScriptedTransport::new().route("/champions/all", vec![status(503)]),
        ScriptedTransport::new().failing("blitz.gg"),
    ] {
        let scraper = ProfileScraper::new(&transport, &test_config()).unwrap();
        let stats = scraper.scrape("Nobody", 1, &StatName::SCRAPED).unwrap();
        assert_eq!(stats, Some(vec![0.5, 3.0, 800.0, 5.0]));
        assert_eq!(transport.requests().len(), 2);
    }
}

#[test]
fn nan_kda_means_no_usable_data() {
    let transport = ScriptedTransport::new()
        .route("/champions/all", vec![ok(read_fixture("profile_nan_kda.html"))]);
    let scraper = ProfileScraper::new(&transport, &test_config()).unwrap();
    assert_eq!(scraper.scrape("Shade", 238, &StatName::SCRAPED).unwrap(), None);
    // Win rate alone still parses.
    assert_eq!(
        scraper.scrape("Shade", 238, &[StatName::WinRate]).unwrap(),
        Some(vec![0.0])
    );
}

#[test]
fn malformed_field_names_the_field() {
    let html = read_fixture("profile_champion.html").replace("21,450", "lots");
    let transport = ScriptedTransport::new().route("/champions/all", vec![ok(html)]);
    let scraper = ProfileScraper::new(&transport, &test_config()).unwrap();
    match scraper.scrape("Moonlit", 103, &StatName::SCRAPED) {
        Err(PipelineError::ScrapeParse { field, raw }) => {
            assert_eq!(field, StatName::Damage);
            assert_eq!(raw, "lots");
        }
        other => panic!("expected scrape parse error, got {other:?}"),
    }
}
