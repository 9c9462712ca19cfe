use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const AGENT: &str = "Mozilla/5.0 (rift-predictor)";

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single blocking GET. Status codes are returned, never turned into errors.
pub trait HttpTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        (**self).get(url, headers)
    }
}

impl HttpTransport for Client {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut req = Client::get(self, url).header(USER_AGENT, AGENT);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().context("request failed")?;
        let status = resp.status().as_u16();
        let body = resp.text().context("failed reading body")?;
        Ok(HttpResponse { status, body })
    }
}
