//! Trading-universe selection from the exchange's 24h ticker list.

use crate::classifier::compliance::QUOTE_ASSET;
use serde::Deserialize;

/// Used when the ticker endpoint is unreachable.
pub const FALLBACK_UNIVERSE: [&str; 10] = [
    "SOLUSDT", "BNBUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "AVAXUSDT", "TRXUSDT", "DOTUSDT",
    "LINKUSDT", "MATICUSDT",
];

/// Majors and stablecoins never traded by the watcher.
pub const EXCLUDED_BASES: [&str; 10] = [
    "BTC", "ETH", "USDC", "FDUSD", "TUSD", "BUSD", "DAI", "USDP", "EUR", "GBP",
];

/// One row of `/api/v3/ticker/24hr`. Binance sends decimals as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub quote_volume: String,
}

/// Owned copy of the fallback list.
pub fn fallback_universe() -> Vec<String> {
    FALLBACK_UNIVERSE.iter().map(|s| s.to_string()).collect()
}

/// Leveraged tokens: an underlying ticker of 3+ letters followed by UP or
/// DOWN (`BTCUP`, `ETHDOWN`), or anything containing BULL/BEAR.
pub fn is_leveraged(base: &str) -> bool {
    let leveraged_suffix = |suffix: &str| {
        base.strip_suffix(suffix)
            .is_some_and(|underlying| underlying.len() >= 3)
    };
    leveraged_suffix("UP")
        || leveraged_suffix("DOWN")
        || base.contains("BULL")
        || base.contains("BEAR")
}

/// Filter tickers to tradeable USDT pairs and keep the `limit` most liquid.
pub fn select_universe(tickers: &[Ticker24h], limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&str, f64)> = tickers
        .iter()
        .filter_map(|t| {
            let base = t.symbol.strip_suffix(QUOTE_ASSET)?;
            if base.is_empty() || is_leveraged(base) || EXCLUDED_BASES.contains(&base) {
                return None;
            }
            let volume = t.quote_volume.parse::<f64>().ok()?;
            volume
                .is_finite()
                .then_some((t.symbol.as_str(), volume))
        })
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(limit)
        .map(|(symbol, _)| symbol.to_string())
        .collect()
}
