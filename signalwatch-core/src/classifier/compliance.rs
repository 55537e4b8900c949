//! Static compliance allow-list.
//!
//! A pure lookup on the base asset of a pair. The list is advisory and is not
//! a ruling; anything absent is tagged for review.

use crate::domain::{Compliance, ComplianceStatus};

/// Quote asset stripped from pair tickers to get the base asset.
pub const QUOTE_ASSET: &str = "USDT";

/// Base assets generally considered permissible (project-based; excludes
/// interest-based lending and gambling tokens).
pub const ALLOW_LIST: &[&str] = &[
    "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "DOGE", "AVAX", "TRX", "DOT", "LINK", "MATIC", "LTC",
    "BCH", "ATOM", "ETC", "XLM", "HBAR", "FIL", "VET", "QNT", "GRT", "ALGO", "THETA", "SAND",
    "MANA", "AXS", "EGLD", "XTZ", "EOS", "NEAR", "FTM", "GALA", "LDO", "APT", "OP", "ARB", "INJ",
    "RNDR", "PEPE",
];

const COMPLIANT_NOTE: &str = "Project generally considered permissible (verify purification)";
const REVIEW_NOTE: &str = "Not on the permissible list or needs research";

/// Base asset of a pair ticker (`SOLUSDT` → `SOL`).
pub fn base_asset(symbol: &str) -> &str {
    symbol.strip_suffix(QUOTE_ASSET).unwrap_or(symbol)
}

/// Compliance tag for a pair ticker.
pub fn lookup(symbol: &str) -> Compliance {
    if ALLOW_LIST.contains(&base_asset(symbol)) {
        Compliance {
            status: ComplianceStatus::Compliant,
            note: COMPLIANT_NOTE.to_string(),
        }
    } else {
        Compliance {
            status: ComplianceStatus::NeedsReview,
            note: REVIEW_NOTE.to_string(),
        }
    }
}
