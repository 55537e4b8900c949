//! Telegram Bot API notification sink.
//!
//! New signals go out as HTML `sendMessage` calls; the returned `message_id`
//! is kept on the signal and every later status update replies to it, so a
//! signal's history reads as one thread in the chat.

use crate::settings::NotificationSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalwatch_core::classifier::compliance::base_asset;
use signalwatch_core::domain::{MessageId, Signal, SignalStatus};
use signalwatch_core::notify::{NotificationSink, NotifyError};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramSink {
    client: reqwest::blocking::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(settings: &NotificationSettings) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            bot_token: settings.bot_token.trim().to_string(),
            chat_id: settings.chat_id.trim().to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send(&self, text: &str, reply_to: Option<MessageId>) -> Result<Option<MessageId>, NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            reply_to_message_id: reply_to.map(|id| id.0),
        };

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            // reqwest errors embed the URL, which carries the bot token
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        let body: ApiResponse = resp
            .json()
            .map_err(|e| NotifyError::MalformedResponse(e.without_url().to_string()))?;
        parse_response(status.as_u16(), body)
    }
}

fn parse_response(status: u16, body: ApiResponse) -> Result<Option<MessageId>, NotifyError> {
    if !body.ok {
        let reason = body
            .description
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(NotifyError::Rejected(reason));
    }
    Ok(body.result.map(|m| MessageId(m.message_id)))
}

impl NotificationSink for TelegramSink {
    fn deliver_new_signal(&self, signal: &Signal) -> Result<Option<MessageId>, NotifyError> {
        let text = format_new_signal(signal);
        let id = self.send(&text, None)?;
        debug!(id = %signal.id, message_id = ?id, "telegram signal sent");
        Ok(id)
    }

    fn deliver_transition(
        &self,
        before: &Signal,
        after: &Signal,
        hit_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let text = format_transition(before, after, hit_at);
        let reply_to = after.message_id.or(before.message_id);
        self.send(&text, reply_to)?;
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn status_line(status: SignalStatus) -> String {
    match status {
        SignalStatus::SlHit => "🛑 Stop loss hit".to_string(),
        SignalStatus::Closed => "⏹ Closed".to_string(),
        SignalStatus::Active => "Active".to_string(),
        other => match other.target_level() {
            Some(level) => format!("✅ Target {level} hit"),
            None => other.to_string(),
        },
    }
}

/// Body of the new-signal message.
pub fn format_new_signal(signal: &Signal) -> String {
    let compliance = if signal.compliance.is_compliant() {
        "✅ Compliant"
    } else {
        "⚠️ Needs review"
    };
    format!(
        "🟢 <b>New BUY signal: {asset}</b>\n\
         <b>Type:</b> {kind}\n\n\
         <b>Entry:</b> {entry}\n\
         <b>Compliance:</b> {compliance}\n\
         <b>Note:</b> {note}\n\n\
         <b>RSI:</b> {rsi:.1}\n\
         <b>Change:</b> {change:.2}%\n\n\
         🎯 <b>Targets:</b>\n\
         1️⃣ {tp1:.4}\n\
         2️⃣ {tp2:.4}\n\
         3️⃣ {tp3:.4}\n\n\
         🛡 <b>Stop loss:</b> {sl:.4}\n\n\
         ⏱ {time}",
        asset = escape_html(base_asset(signal.symbol())),
        kind = signal.kind.label(),
        entry = signal.entry_price,
        note = escape_html(&signal.compliance.note),
        rsi = signal.rsi,
        change = signal.change_24h,
        tp1 = signal.tps[0],
        tp2 = signal.tps[1],
        tp3 = signal.tps[2],
        sl = signal.sl,
        time = signal.created_at.format("%H:%M:%S UTC"),
    )
}

/// Body of a status-update message.
pub fn format_transition(before: &Signal, after: &Signal, hit_at: DateTime<Utc>) -> String {
    let emoji = match after.status {
        SignalStatus::SlHit => "❌",
        SignalStatus::Closed => "⏹",
        _ => "💰",
    };
    let pnl = after.pnl_pct(after.status).unwrap_or(0.0);
    let minutes = (hit_at - before.created_at).num_minutes();
    format!(
        "{emoji} <b>Signal update: {asset}</b>\n\n\
         <b>Status:</b> {status}\n\
         <b>Entry:</b> {entry}\n\
         <b>Current price:</b> {price}\n\
         <b>P/L:</b> {pnl:.2}%\n\
         <b>Elapsed:</b> {minutes} min\n\n\
         ⏱ {time}",
        asset = escape_html(base_asset(after.symbol())),
        status = status_line(after.status),
        entry = after.entry_price,
        price = after.current_price,
        time = hit_at.format("%H:%M:%S UTC"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use signalwatch_core::domain::{
        Compliance, ComplianceStatus, SignalId, SignalKind, Trend,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn signal() -> Signal {
        Signal {
            id: SignalId::new("SOLUSDT", t0()),
            kind: SignalKind::Primo,
            entry_price: 150.0,
            current_price: 150.0,
            tps: [152.0, 154.0, 156.0],
            sl: 147.0,
            rsi: 61.27,
            ema20: 148.0,
            trend: Trend::Up,
            change_24h: 3.456,
            volume: 1000.0,
            compliance: Compliance {
                status: ComplianceStatus::Compliant,
                note: "ok & fine".into(),
            },
            status: SignalStatus::Active,
            created_at: t0(),
            hit_at: None,
            message_id: Some(MessageId(77)),
        }
    }

    #[test]
    fn new_signal_message_lists_levels() {
        let text = format_new_signal(&signal());
        assert!(text.contains("New BUY signal: SOL</b>"));
        assert!(text.contains("<b>Type:</b> Primo"));
        assert!(text.contains("<b>Entry:</b> 150"));
        assert!(text.contains("✅ Compliant"));
        assert!(text.contains("ok &amp; fine"));
        assert!(text.contains("<b>RSI:</b> 61.3"));
        assert!(text.contains("<b>Change:</b> 3.46%"));
        assert!(text.contains("1️⃣ 152.0000"));
        assert!(text.contains("3️⃣ 156.0000"));
        assert!(text.contains("<b>Stop loss:</b> 147.0000"));
        assert!(text.contains("12:00:00 UTC"));
    }

    #[test]
    fn target_update_reports_profit_at_target() {
        let before = signal();
        let mut after = signal();
        after.current_price = 154.5;
        after.status = SignalStatus::Tp2Hit;
        let hit_at = t0() + chrono::Duration::minutes(42);

        let text = format_transition(&before, &after, hit_at);
        assert!(text.contains("💰"));
        assert!(text.contains("Target 2 hit"));
        assert!(text.contains("<b>Current price:</b> 154.5"));
        // (154 - 150) / 150
        assert!(text.contains("<b>P/L:</b> 2.67%"));
        assert!(text.contains("<b>Elapsed:</b> 42 min"));
    }

    #[test]
    fn stop_update_reports_loss_at_stop() {
        let before = signal();
        let mut after = signal();
        after.current_price = 146.0;
        after.status = SignalStatus::SlHit;

        let text = format_transition(&before, &after, t0() + chrono::Duration::minutes(5));
        assert!(text.contains("❌"));
        assert!(text.contains("Stop loss hit"));
        assert!(text.contains("<b>P/L:</b> -2.00%"));
    }

    #[test]
    fn payload_threads_replies() {
        let payload = SendMessage {
            chat_id: "-100",
            text: "hi",
            parse_mode: "HTML",
            reply_to_message_id: Some(77),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["reply_to_message_id"], 77);
        assert_eq!(json["parse_mode"], "HTML");

        let payload = SendMessage {
            reply_to_message_id: None,
            ..payload
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("reply_to_message_id").is_none());
    }

    #[test]
    fn response_parsing() {
        let ok: ApiResponse =
            serde_json::from_str(r#"{"ok":true,"result":{"message_id":4521,"chat":{"id":-100}}}"#)
                .unwrap();
        assert_eq!(parse_response(200, ok).unwrap(), Some(MessageId(4521)));

        let rejected: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
                .unwrap();
        match parse_response(400, rejected) {
            Err(NotifyError::Rejected(reason)) => assert!(reason.contains("chat not found")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
