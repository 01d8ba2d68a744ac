use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Rate limited by upstream source, gave up after {0} retries")]
    RetriesExhausted(u32),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
