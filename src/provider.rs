use crate::data_structures::DailyBar;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("Rate limited")]
    RateLimit,
    #[error("No data")]
    NoData,
}

/// Source of daily price history for a single symbol.
///
/// Implementations return bars sorted oldest first. A response shorter than
/// requested is not an error.
#[async_trait]
pub trait PriceHistoryProvider {
    async fn daily_history(&mut self, symbol: &str, days: u32) -> Result<Vec<DailyBar>, ProviderError>;
}
