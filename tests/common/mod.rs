#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};

use rift_predictor::champion_tags::ChampionTagCatalog;
use rift_predictor::config::PipelineConfig;
use rift_predictor::http_client::{HttpResponse, HttpTransport};
use rift_predictor::riot_api::Sleeper;
use rift_predictor::schema::FeatureSchema;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

pub fn catalog() -> ChampionTagCatalog {
    ChampionTagCatalog::load(&fixture_path("champion.json"), &FeatureSchema::default())
        .expect("champion fixture should load")
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig::new("test-key", "vn2").expect("vn2 is a known region")
}

pub fn ok(body: impl Into<String>) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: body.into(),
    }
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        body: String::new(),
    }
}

struct Route {
    pattern: String,
    responses: VecDeque<HttpResponse>,
}

/// Answers by the first route whose pattern is a substring of the URL.
/// A route replays its last response once the queue is down to one;
/// URLs with no route get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: RefCell<Vec<Route>>,
    requests: RefCell<Vec<(String, Vec<(String, String)>)>>,
    fail_pattern: RefCell<Option<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, responses: Vec<HttpResponse>) -> Self {
        self.routes.borrow_mut().push(Route {
            pattern: pattern.to_string(),
            responses: responses.into(),
        });
        self
    }

    /// URLs containing `pattern` fail at the transport level.
    pub fn failing(self, pattern: &str) -> Self {
        *self.fail_pattern.borrow_mut() = Some(pattern.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn request_count(&self, pattern: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(u, _)| u.contains(pattern))
            .count()
    }

    pub fn header_sent(&self, name: &str, value: &str) -> bool {
        self.requests
            .borrow()
            .iter()
            .all(|(_, h)| h.iter().any(|(n, v)| n == name && v == value))
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.requests.borrow_mut().push((
            url.to_string(),
            headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        ));
        if let Some(pattern) = self.fail_pattern.borrow().as_deref()
            && url.contains(pattern)
        {
            return Err(anyhow!("connection reset"));
        }
        let mut routes = self.routes.borrow_mut();
        let Some(route) = routes.iter_mut().find(|r| url.contains(&r.pattern)) else {
            return Ok(status(404));
        };
        match route.responses.len() {
            0 => Ok(status(404)),
            1 => Ok(route.responses[0].clone()),
            _ => Ok(route
                .responses
                .pop_front()
                .expect("queue has more than one response")),
        }
    }
}

#[derive(Default)]
pub struct CountingSleeper {
    calls: Cell<u32>,
    total: Cell<Duration>,
}

impl CountingSleeper {
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    pub fn total(&self) -> Duration {
        self.total.get()
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.set(self.calls.get() + 1);
        self.total.set(self.total.get() + duration);
    }
}
