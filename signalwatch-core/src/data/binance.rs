//! Binance spot REST data provider.
//!
//! Fetches the 24h ticker list for universe selection and klines for candle
//! history from the public `/api/v3` endpoints. Handles rate limiting, retries
//! with exponential backoff, response parsing, and the circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, Interval, MarketDataProvider};
use super::universe::{select_universe, Ticker24h};
use crate::domain::Candle;
use chrono::DateTime;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance responds with 418 once an IP is auto-banned after ignoring 429s.
const IM_A_TEAPOT: u16 = 418;

/// Binance spot data provider.
pub struct BinanceProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Self::with_timeout(circuit_breaker, Duration::from_secs(5))
    }

    pub fn with_timeout(
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("signalwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Point the provider at a different host (testnet, mirror, local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn ticker_url(&self) -> String {
        format!("{}/api/v3/ticker/24hr", self.base_url)
    }

    fn klines_url(&self, symbol: &str, interval: Interval, limit: usize) -> String {
        format!(
            "{}/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url
        )
    }

    /// GET `url` and decode the JSON body, with retry and circuit breaker logic.
    fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> Result<T, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(url, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(self.refused());
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status.is_success() {
                let body: T = resp.json().map_err(|e| {
                    DataError::ResponseFormatChanged(format!(
                        "failed to parse response from {url}: {e}"
                    ))
                })?;
                self.circuit_breaker.record_success();
                return Ok(body);
            }

            let hint = retry_after(resp.headers());
            if let Some(reason) = self.circuit_breaker.record_status(status.as_u16(), hint) {
                warn!(
                    %status,
                    reason = reason.as_str(),
                    cooldown_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
                    "circuit breaker opened"
                );
            }

            match status.as_u16() {
                429 => {
                    return Err(DataError::RateLimited {
                        retry_after_secs: self.circuit_breaker.remaining_cooldown().as_secs(),
                    })
                }
                IM_A_TEAPOT | 403 => return Err(DataError::CircuitBreakerTripped),
                // -1121 "Invalid symbol" comes back as a plain 400
                400 => {
                    return Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    })
                }
                500..=599 => {
                    last_error = Some(DataError::Other(format!("HTTP {status} from {url}")));
                }
                _ => return Err(DataError::Other(format!("HTTP {status} from {url}"))),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn refused(&self) -> DataError {
        debug!(
            reason = self.circuit_breaker.open_reason().map(|r| r.as_str()),
            remaining_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
            "circuit breaker open, request refused"
        );
        DataError::CircuitBreakerTripped
    }
}

/// `Retry-After` in whole seconds, as Binance sends it with 429 and 418.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Parse kline rows: `[open_time_ms, "open", "high", "low", "close", "volume", ...]`.
pub fn parse_klines(symbol: &str, rows: &[Vec<Value>]) -> Result<Vec<Candle>, DataError> {
    let candles = rows
        .iter()
        .map(|row| parse_kline_row(row))
        .collect::<Result<Vec<_>, _>>()?;

    if candles.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(candles)
}

fn parse_kline_row(row: &[Value]) -> Result<Candle, DataError> {
    if row.len() < 6 {
        return Err(DataError::ResponseFormatChanged(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let open_ms = row[0]
        .as_i64()
        .ok_or_else(|| DataError::ResponseFormatChanged("kline open time is not an integer".into()))?;
    let open_time = DateTime::from_timestamp_millis(open_ms).ok_or_else(|| {
        DataError::ResponseFormatChanged(format!("invalid kline timestamp: {open_ms}"))
    })?;

    let candle = Candle {
        open_time,
        open: decimal_field(&row[1], "open")?,
        high: decimal_field(&row[2], "high")?,
        low: decimal_field(&row[3], "low")?,
        close: decimal_field(&row[4], "close")?,
        volume: decimal_field(&row[5], "volume")?,
    };
    if !candle.is_sane() {
        return Err(DataError::ResponseFormatChanged(format!(
            "kline at {open_ms} has inconsistent OHLCV values"
        )));
    }
    Ok(candle)
}

/// Binance encodes prices as strings; accept bare numbers too.
fn decimal_field(value: &Value, field: &str) -> Result<f64, DataError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| DataError::ResponseFormatChanged(format!("kline {field} is not a decimal: {value}")))
}

impl MarketDataProvider for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch_universe(&self, limit: usize) -> Result<Vec<String>, DataError> {
        let tickers: Vec<Ticker24h> = self.get_json(&self.ticker_url(), "*")?;
        let universe = select_universe(&tickers, limit);
        if universe.is_empty() {
            return Err(DataError::ResponseFormatChanged(
                "ticker list contained no eligible USDT pairs".into(),
            ));
        }
        Ok(universe)
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let rows: Vec<Vec<Value>> = self.get_json(&self.klines_url(symbol, interval, limit), symbol)?;
        parse_klines(symbol, &rows)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(json: &str) -> Vec<Vec<Value>> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_exchange_kline_rows() {
        let json = r#"[
            [1714564800000, "145.10", "146.00", "144.90", "145.80", "1200.5",
             1714565099999, "174000.1", 310, "600.1", "87000.0", "0"],
            [1714565100000, "145.80", "147.20", "145.70", "147.00", "980.0",
             1714565399999, "143000.0", 250, "500.0", "73000.0", "0"]
        ]"#;
        let candles = parse_klines("SOLUSDT", &rows(json)).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time.timestamp_millis(), 1_714_564_800_000);
        assert_eq!(candles[0].open, 145.10);
        assert_eq!(candles[1].close, 147.00);
        assert_eq!(candles[1].volume, 980.0);
        assert!(candles.iter().all(|c| c.is_sane()));
    }

    #[test]
    fn empty_kline_list_is_symbol_not_found() {
        let err = parse_klines("NOPEUSDT", &[]).unwrap_err();
        assert!(matches!(err, DataError::SymbolNotFound { ref symbol } if symbol == "NOPEUSDT"));
    }

    #[test]
    fn short_row_is_format_change() {
        let err = parse_klines("SOLUSDT", &rows(r#"[[1714564800000, "1.0", "1.0"]]"#)).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn non_numeric_price_is_format_change() {
        let json = r#"[[1714564800000, "abc", "1", "1", "1", "1"]]"#;
        let err = parse_klines("SOLUSDT", &rows(json)).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn non_finite_price_is_format_change() {
        for bad in ["NaN", "inf"] {
            let json = format!(r#"[[1714564800000, "1", "{bad}", "1", "1", "1"]]"#);
            let err = parse_klines("SOLUSDT", &rows(&json)).unwrap_err();
            assert!(matches!(err, DataError::ResponseFormatChanged(_)), "{bad}");
        }
    }

    #[test]
    fn high_below_low_is_format_change() {
        let json = r#"[[1714564800000, "100", "99", "101", "100", "5"]]"#;
        let err = parse_klines("SOLUSDT", &rows(json)).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, "120".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(120)));

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn urls_use_configured_host() {
        let provider = BinanceProvider::new(Arc::new(CircuitBreaker::default()))
            .unwrap()
            .with_base_url("http://localhost:9000/");
        assert_eq!(
            provider.klines_url("SOLUSDT", Interval::FiveMinutes, 100),
            "http://localhost:9000/api/v3/klines?symbol=SOLUSDT&interval=5m&limit=100"
        );
        assert_eq!(provider.ticker_url(), "http://localhost:9000/api/v3/ticker/24hr");
    }

    #[test]
    fn tripped_breaker_short_circuits() {
        let breaker = Arc::new(CircuitBreaker::default());
        breaker.record_status(418, Some(Duration::from_secs(120)));
        let provider = BinanceProvider::new(Arc::clone(&breaker))
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        assert!(!provider.is_available());
        let err = provider
            .fetch_candles("SOLUSDT", Interval::FiveMinutes, 10)
            .unwrap_err();
        assert!(matches!(err, DataError::CircuitBreakerTripped));
    }
}
