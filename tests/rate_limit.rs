mod common;

use std::time::Duration;

use rift_predictor::error::PipelineError;
use rift_predictor::riot_api::{Endpoint, RateLimitedClient, RetryPolicy};

use common::{CountingSleeper, ScriptedTransport, ok, status, test_config};

#[test]
fn retries_through_two_throttles() {
    let transport = ScriptedTransport::new().route(
        "/matches/VN2_1",
        vec![status(429), status(429), ok(r#"{"info": {"gameId": 1}}"#)],
    );
    let sleeper = CountingSleeper::default();
    let client = RateLimitedClient::with_sleeper(&transport, &sleeper, test_config());

    let payload = client
        .fetch(&Endpoint::MatchDetail {
            match_id: "VN2_1".to_string(),
        })
        .expect("third attempt should succeed");

    assert_eq!(payload["info"]["gameId"], 1);
    assert_eq!(sleeper.calls(), 2);
    assert_eq!(sleeper.total(), Duration::from_secs(20));
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(client.requests_sent(), 3);
    assert!(transport.header_sent("X-Riot-Token", "test-key"));
}

#[test]
fn bounded_policy_gives_up() {
    let transport = ScriptedTransport::new().route("/matches/VN2_1", vec![status(429)]);
    let sleeper = CountingSleeper::default();
    let mut cfg = test_config();
    cfg.retry = RetryPolicy {
        backoff: Duration::from_secs(1),
        max_attempts: Some(3),
    };
    let client = RateLimitedClient::with_sleeper(&transport, &sleeper, cfg);

    let err = client.match_detail("VN2_1").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::RateLimitExhausted { attempts: 3, .. }
    ));
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(sleeper.calls(), 2);
}

#[test]
fn mastery_not_found_reads_as_zero() {
    let transport = ScriptedTransport::new();
    let sleeper = CountingSleeper::default();
    let client = RateLimitedClient::with_sleeper(&transport, &sleeper, test_config());

    let mastery = client.mastery("sid-0", 266).unwrap();
    assert_eq!(mastery.champion_points, 0.0);
    assert_eq!(sleeper.calls(), 0);
}

#[test]
fn mastery_points_are_decoded() {
    let transport = ScriptedTransport::new().route(
        "by-champion/266",
        vec![ok(r#"{"championId": 266, "championLevel": 7, "championPoints": 123456}"#)],
    );
    let client =
        RateLimitedClient::with_sleeper(&transport, CountingSleeper::default(), test_config());
    assert_eq!(client.mastery("sid-0", 266).unwrap().champion_points, 123456.0);
}

#[test]
fn other_statuses_are_remote_fetch_errors() {
    let transport = ScriptedTransport::new()
        .route("/matches/VN2_1", vec![status(503)])
        .route("by-champion", vec![status(403)]);
    let client =
        RateLimitedClient::with_sleeper(&transport, CountingSleeper::default(), test_config());

    match client.match_detail("VN2_1") {
        Err(PipelineError::RemoteFetch { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected remote fetch error, got {other:?}"),
    }
    assert!(matches!(
        client.mastery("sid-0", 1),
        Err(PipelineError::RemoteFetch { status: 403, .. })
    ));
    // 404 outside mastery/spectator is a failure too.
    assert!(matches!(
        client.match_detail("VN2_2"),
        Err(PipelineError::RemoteFetch { status: 404, .. })
    ));
}

#[test]
fn not_in_game_is_none() {
    let transport = ScriptedTransport::new();
    let client =
        RateLimitedClient::with_sleeper(&transport, CountingSleeper::default(), test_config());
    assert!(client.active_game("sid-0").unwrap().is_none());
}

#[test]
fn transport_failures_are_typed() {
    let transport = ScriptedTransport::new().failing("/matches/");
    let client =
        RateLimitedClient::with_sleeper(&transport, CountingSleeper::default(), test_config());
    assert!(matches!(
        client.match_detail("VN2_1"),
        Err(PipelineError::Transport { .. })
    ));
}

#[test]
fn summoner_lookup_and_match_ids() {
    let transport = ScriptedTransport::new()
        .route(
            "by-name/Cozy%20Bear",
            vec![ok(r#"{"id": "sid-0", "puuid": "puuid-0", "name": "Cozy Bear", "summonerLevel": 300}"#)],
        )
        .route("by-puuid/puuid-0/ids", vec![ok(r#"["VN2_3", "VN2_2"]"#)]);
    let client =
        RateLimitedClient::with_sleeper(&transport, CountingSleeper::default(), test_config());

    let summoner = client.summoner_by_name("Cozy Bear").unwrap();
    assert_eq!(summoner.puuid, "puuid-0");
    assert_eq!(client.match_ids(&summoner.puuid).unwrap(), vec!["VN2_3", "VN2_2"]);
    assert!(transport.requests()[1].contains("sea.api.riotgames.com"));
    assert!(transport.requests()[1].ends_with("count=5&queue=450"));
}
