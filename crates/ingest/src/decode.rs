//! Feed message decoding.
//!
//! Ticker messages look like:
//!
//! ```json
//! {
//!   "type": "ticker",
//!   "product_id": "BTC-USD",
//!   "price": "11679.01",
//!   "time": "2020-08-21T18:46:09.874Z",
//!   "last_size": "0.001"
//! }
//! ```
//!
//! Subscription acks, heartbeats and other channels share the socket and are
//! ignored.

use chrono::{DateTime, Utc};
use market_pulse_core::Tick;
use serde::{Deserialize, Serialize};

/// Outcome of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Tick(Tick),
    /// Valid message of another type
    Ignored,
    /// Undecodable, or a ticker message without a usable symbol or price
    Malformed(String),
}

/// Subscription request sent right after the handshake.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    channels: [ChannelSpec<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChannelSpec<'a> {
    name: &'a str,
    product_ids: &'a [String],
}

impl<'a> SubscribeRequest<'a> {
    #[must_use]
    pub fn new(channel: &'a str, symbols: &'a [String]) -> Self {
        Self {
            msg_type: "subscribe",
            channels: [ChannelSpec {
                name: channel,
                product_ids: symbols,
            }],
        }
    }
}

/// Numeric field that may arrive as a JSON string or number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    price: Option<Numeric>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    last_size: Option<Numeric>,
    #[serde(default)]
    size: Option<Numeric>,
}

/// Decodes a text frame into a tick for `channel`.
///
/// The embedded `time` is preferred; `received_at` is used when it is absent
/// or unparsable. Volume comes from `last_size`, then `size`, else 0.
#[must_use]
pub fn decode_message(text: &str, channel: &str, received_at: DateTime<Utc>) -> Decoded {
    let msg: FeedMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => return Decoded::Malformed(e.to_string()),
    };

    if msg.msg_type.as_deref() != Some(channel) {
        return Decoded::Ignored;
    }

    let Some(symbol) = msg.product_id.filter(|s| !s.is_empty()) else {
        return Decoded::Malformed("missing product_id".to_string());
    };

    let Some(price) = msg.price.as_ref().and_then(Numeric::as_f64) else {
        return Decoded::Malformed(format!("bad price for {symbol}"));
    };

    let timestamp = msg
        .time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map_or(received_at, |t| t.with_timezone(&Utc));

    let volume = msg
        .last_size
        .as_ref()
        .or(msg.size.as_ref())
        .and_then(Numeric::as_f64)
        .unwrap_or(0.0);

    Decoded::Tick(Tick::new(timestamp, symbol, price, volume))
}
