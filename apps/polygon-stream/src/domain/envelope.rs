//! Polygon WebSocket Envelope Types
//!
//! Wire format types for the Polygon streaming protocol. Every inbound text
//! frame is a JSON array of envelopes; each envelope carries an `ev`
//! discriminant naming its event type.
//!
//! # Wire Format
//!
//! ```json
//! [{"ev":"status","status":"connected","message":"Connected Successfully"}]
//! [{"ev":"T","sym":"AAPL","p":191.12,"s":100},{"ev":"Q","sym":"MSFT"}]
//! ```
//!
//! Outbound control messages use an `{action, params}` shape:
//!
//! ```json
//! {"action":"auth","params":"<api-key>"}
//! ```
//!
//! Only the discriminant and the status fields are interpreted here. Data
//! payloads are handed to the [`EventHandler`](crate::application::ports::EventHandler)
//! untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

/// Discriminant value carried by control envelopes.
pub const STATUS_EVENT: &str = "status";

/// Action name of the authentication control message.
pub const AUTH_ACTION: &str = "auth";

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while decoding inbound envelopes.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a JSON array of objects.
    #[error("invalid message batch: {0}")]
    Batch(#[source] serde_json::Error),

    /// The `ev` discriminant could not be extracted.
    #[error("invalid event discriminant: {0}")]
    Discriminant(#[source] serde_json::Error),

    /// A status envelope did not match the control shape.
    #[error("invalid status message: {0}")]
    Status(#[source] serde_json::Error),
}

// =============================================================================
// Outbound Control Messages
// =============================================================================

/// Outbound control message.
///
/// # Wire Format (JSON)
/// ```json
/// {"action": "auth", "params": "<api-key>"}
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Action to perform.
    pub action: String,
    /// Action parameters.
    pub params: String,
}

impl ControlMessage {
    /// Create the authentication message for an API key.
    #[must_use]
    pub fn auth(api_key: impl Into<String>) -> Self {
        Self {
            action: AUTH_ACTION.to_string(),
            params: api_key.into(),
        }
    }

    /// Serialize to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: &str = if self.action == AUTH_ACTION {
            "[REDACTED]"
        } else {
            &self.params
        };
        f.debug_struct("ControlMessage")
            .field("action", &self.action)
            .field("params", &params)
            .finish()
    }
}

// =============================================================================
// Inbound Envelopes
// =============================================================================

/// Decode a frame into its ordered batch of raw envelopes.
///
/// The envelopes borrow from `text`; nothing beyond the array structure is
/// parsed.
///
/// # Errors
///
/// Returns [`DecodeError::Batch`] if the frame is not a JSON array.
pub fn decode_batch(text: &str) -> Result<Vec<&RawValue>, DecodeError> {
    serde_json::from_str(text).map_err(DecodeError::Batch)
}

/// Routing fields of an envelope.
///
/// A missing or `null` `ev` decodes as an empty discriminant; any other
/// non-string `ev` is a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Discriminant {
    /// Event type tag.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ev: String,

    /// Status value, present on control envelopes.
    #[serde(default)]
    pub status: Option<String>,
}

impl Discriminant {
    /// Extract the routing fields from a raw envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Discriminant`] if the envelope is not an object
    /// or its routing fields have the wrong type.
    pub fn parse(raw: &RawValue) -> Result<Self, DecodeError> {
        serde_json::from_str(raw.get()).map_err(DecodeError::Discriminant)
    }

    /// Decide where this envelope is dispatched.
    #[must_use]
    pub fn route(&self) -> Route<'_> {
        if self.ev == STATUS_EVENT || self.status.is_some() {
            return Route::Control;
        }
        EventType::from_tag(&self.ev).map_or(Route::Unknown(&self.ev), Route::Event)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dispatch target for one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Connection/authentication/subscription status.
    Control,
    /// Recognized market data event.
    Event(EventType),
    /// Unrecognized discriminant.
    Unknown(&'a str),
}

/// Inbound status envelope.
///
/// # Wire Format (JSON)
/// ```json
/// {"ev": "status", "status": "auth_success", "message": "authenticated"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusMessage {
    /// Status value.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,

    /// Human readable message from the server.
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusMessage {
    /// Decode a raw control envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Status`] if the fields have the wrong type.
    pub fn parse(raw: &RawValue) -> Result<Self, DecodeError> {
        serde_json::from_str(raw.get()).map_err(DecodeError::Status)
    }
}

// =============================================================================
// Event Types
// =============================================================================

/// Market data event types recognized by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Trade (stocks, options)
    Trade,
    /// Quote (stocks, options)
    Quote,
    /// Per-second aggregate
    SecondAggregate,
    /// Per-minute aggregate
    MinuteAggregate,
    /// Limit Up/Limit Down band
    LimitUpLimitDown,
    /// Net order imbalance
    Imbalance,
    /// Fair market value
    FairMarketValue,
    /// Forex quote
    ForexQuote,
    /// Forex per-minute aggregate
    ForexAggregate,
    /// Forex per-second aggregate
    ForexSecondAggregate,
    /// Crypto trade
    CryptoTrade,
    /// Crypto quote
    CryptoQuote,
    /// Crypto per-minute aggregate
    CryptoAggregate,
    /// Crypto per-second aggregate
    CryptoSecondAggregate,
    /// Crypto level 2 book
    CryptoLevel2,
}

const EVENT_TAGS: &[(&str, EventType)] = &[
    ("T", EventType::Trade),
    ("Q", EventType::Quote),
    ("A", EventType::SecondAggregate),
    ("AM", EventType::MinuteAggregate),
    ("LULD", EventType::LimitUpLimitDown),
    ("NOI", EventType::Imbalance),
    ("FMV", EventType::FairMarketValue),
    ("C", EventType::ForexQuote),
    ("CA", EventType::ForexAggregate),
    ("CAS", EventType::ForexSecondAggregate),
    ("XT", EventType::CryptoTrade),
    ("XQ", EventType::CryptoQuote),
    ("XA", EventType::CryptoAggregate),
    ("XAS", EventType::CryptoSecondAggregate),
    ("XL2", EventType::CryptoLevel2),
];

impl EventType {
    /// Look up the event type for an `ev` tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        EVENT_TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, event)| *event)
    }

    /// Wire tag of this event type.
    #[must_use]
    pub fn tag(self) -> &'static str {
        EVENT_TAGS
            .iter()
            .find(|(_, event)| *event == self)
            .map_or("", |(t, _)| t)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
