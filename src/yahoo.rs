use crate::data_structures::DailyBar;
use crate::provider::{PriceHistoryProvider, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

pub struct YahooClient {
    client: Client,
    base_url: String,
    user_agents: Vec<String>,
    random_agent: bool,
}

impl YahooClient {
    pub fn new(base_url: &str, timeout: Duration, random_agent: bool) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        Ok(YahooClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agents,
            random_agent,
        })
    }

    fn get_user_agent(&self) -> String {
        if self.random_agent {
            use rand::seq::IndexedRandom;
            self.user_agents
                .choose(&mut rand::rng())
                .unwrap_or(&self.user_agents[0])
                .clone()
        } else {
            self.user_agents[0].clone()
        }
    }

    fn chart_url(&self, symbol: &str, days: u32) -> String {
        format!(
            "{}/v8/finance/chart/{}?range={}d&interval=1d",
            self.base_url,
            urlencoding::encode(symbol),
            days
        )
    }

    async fn make_request(&self, url: &str) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("User-Agent", self.get_user_agent())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimit);
        }

        // Unknown symbols come back as 404 with a JSON error body, so the body is read first.
        let body = response.text().await?;
        match serde_json::from_str::<Value>(&body) {
            Ok(data) => Ok(data),
            Err(_) if !status.is_success() => Err(ProviderError::InvalidResponse(format!("HTTP {}", status))),
            Err(e) => Err(ProviderError::Serialization(e)),
        }
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooClient {
    async fn daily_history(&mut self, symbol: &str, days: u32) -> Result<Vec<DailyBar>, ProviderError> {
        let url = self.chart_url(symbol, days);
        debug!(symbol, %url, "Requesting daily chart");

        let response_data = self.make_request(&url).await?;
        parse_chart(symbol, &response_data)
    }
}

/// Extracts daily closes from a chart response. Bars without a close are dropped.
pub fn parse_chart(symbol: &str, response_data: &Value) -> Result<Vec<DailyBar>, ProviderError> {
    let chart = response_data
        .get("chart")
        .ok_or_else(|| ProviderError::InvalidResponse("Missing key: chart".to_string()))?;

    if let Some(error) = chart.get("error").filter(|e| !e.is_null()) {
        let description = error
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("unknown error");
        return Err(ProviderError::SymbolNotFound(format!("{}: {}", symbol, description)));
    }

    let data_item = chart
        .get("result")
        .and_then(|r| r.as_array())
        .and_then(|r| r.first())
        .ok_or(ProviderError::NoData)?;

    // A listed symbol with no trading in range has no timestamp array at all.
    let times = match data_item.get("timestamp").and_then(|t| t.as_array()) {
        Some(times) => times,
        None => return Ok(Vec::new()),
    };

    let closes = data_item
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.as_array())
        .and_then(|q| q.first())
        .and_then(|q| q.get("close"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("Invalid closes".to_string()))?;

    if closes.len() != times.len() {
        return Err(ProviderError::InvalidResponse("Inconsistent array lengths".to_string()));
    }

    let mut result = Vec::with_capacity(times.len());
    for (i, (time, close)) in times.iter().zip(closes).enumerate() {
        let Some(close) = close.as_f64() else {
            continue;
        };
        let timestamp = time.as_i64().ok_or_else(|| {
            ProviderError::InvalidResponse(format!("Invalid timestamp format at index {}: {:?}", i, time))
        })?;
        let time = DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("Cannot convert timestamp {} to DateTime at index {}", timestamp, i))
        })?;
        result.push(DailyBar { time, close });
    }

    result.sort_by(|a, b| a.time.cmp(&b.time));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = YahooClient::new(DEFAULT_BASE_URL, Duration::from_secs(5), true);
        assert!(client.is_ok());
    }

    #[test]
    fn test_chart_url_encodes_symbol() {
        let client = YahooClient::new("https://example.test/", Duration::from_secs(5), false).unwrap();
        assert_eq!(
            client.chart_url("^GSPC", 2),
            "https://example.test/v8/finance/chart/%5EGSPC?range=2d&interval=1d"
        );
        assert_eq!(
            client.chart_url("GC=F", 2),
            "https://example.test/v8/finance/chart/GC%3DF?range=2d&interval=1d"
        );
    }

    #[test]
    fn test_parse_chart_sorts_and_drops_null_closes() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1760620200, 1760533800, 1760706600],
                    "indicators": { "quote": [{ "close": [144.0, 150.0, null] }] }
                }],
                "error": null
            }
        });

        let bars = parse_chart("AAPL", &body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 150.0);
        assert_eq!(bars[1].close, 144.0);
        assert!(bars[0].time < bars[1].time);
    }

    #[test]
    fn test_parse_chart_error_is_symbol_not_found() {
        let body = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });

        match parse_chart("NOPE", &body) {
            Err(ProviderError::SymbolNotFound(message)) => assert!(message.contains("NOPE")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_chart_without_timestamps_is_empty() {
        let body = json!({
            "chart": {
                "result": [{ "meta": { "symbol": "NEW" }, "indicators": { "quote": [{}] } }],
                "error": null
            }
        });

        assert!(parse_chart("NEW", &body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_chart_rejects_mismatched_lengths() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1760533800, 1760620200],
                    "indicators": { "quote": [{ "close": [150.0] }] }
                }],
                "error": null
            }
        });

        assert!(matches!(parse_chart("AAPL", &body), Err(ProviderError::InvalidResponse(_))));
    }
}
