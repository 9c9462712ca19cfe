use thiserror::Error;

use crate::schema::StatName;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("http {status} from {url}")]
    RemoteFetch { url: String, status: u16 },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("still rate limited after {attempts} attempts on {url}")]
    RateLimitExhausted { url: String, attempts: u32 },

    #[error("could not parse scraped {field}: {raw:?}")]
    ScrapeParse { field: StatName, raw: String },

    #[error("insufficient data for match {match_id}")]
    InsufficientData { match_id: String },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid json from {url}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration: {0}")]
    Config(String),

    #[error("{summoner} is not in a game")]
    NotInGame { summoner: String },
}

impl PipelineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        PipelineError::MalformedPayload(msg.into())
    }

    /// Errors that only affect the current match and should not stop a batch.
    pub fn is_match_scoped(&self) -> bool {
        !matches!(self, PipelineError::Config(_))
    }
}
