/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use chrono::{TimeZone, Utc};
use serde_json::Value;

/// Errors from payload encoding or decoding.
#[derive(Debug)]
pub enum CodecError {
    /// The payload was not valid JSON, or a value failed to serialize
    Json(serde_json::Error),
    /// The payload parsed but did not have the expected envelope shape
    Shape(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Json(e) => write!(f, "JSON error: {e}"),
            CodecError::Shape(msg) => write!(f, "Payload shape error: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<serde_json::Error> for CodecError {
    fn from(error: serde_json::Error) -> Self {
        CodecError::Json(error)
    }
}

/// A payload decoded from the wire: the message body plus the publisher's
/// timestamp when the envelope carried one.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Decoded message body
    pub value: Value,
    /// Publisher timestamp in unix milliseconds, if the envelope carried one
    pub ts: Option<i64>,
}

/// Conversion seam between JSON message bodies and wire payload bytes.
///
/// A codec is attached to a connection at construction time and applied in
/// both directions: outgoing values pass through [`encode`](PayloadCodec::encode)
/// before publishing, incoming payloads pass through
/// [`decode`](PayloadCodec::decode) before delivery. A payload the codec
/// rejects is logged and dropped without disturbing the connection.
///
/// Implementations must be cheap to call and must not block; decoding runs on
/// the event pump task.
pub trait PayloadCodec: Send + Sync {
    /// Serializes a message body to wire bytes.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Parses wire bytes back into a message body and optional timestamp.
    fn decode(&self, payload: &[u8]) -> Result<Decoded, CodecError>;
}

/// Pass-through codec: payloads are the JSON serialization of the body, with
/// no envelope and no timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        JsonCodec
    }
}

impl PayloadCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, CodecError> {
        let value: Value = serde_json::from_slice(payload)?;
        Ok(Decoded { value, ts: None })
    }
}

/// Envelope codec that stamps outgoing bodies with the publish time.
///
/// The wire payload is a JSON object `{"data": <body>, "ts": <unix millis>,
/// "ispublic": <bool>}`. Decoding unwraps `data` and surfaces `ts`; a missing
/// or non-numeric `ts` is tolerated and reported as `None`, while a payload
/// without a `data` member is rejected as a shape error.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::{PayloadCodec, StampedCodec};
///
/// let codec = StampedCodec::new();
/// let bytes = codec.encode(&serde_json::json!({"c": 21.5}))?;
/// let decoded = codec.decode(&bytes)?;
/// assert_eq!(decoded.value, serde_json::json!({"c": 21.5}));
/// assert!(decoded.ts.is_some());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StampedCodec {
    public: bool,
}

impl StampedCodec {
    /// Creates a codec that marks outgoing envelopes as private.
    pub fn new() -> Self {
        StampedCodec { public: false }
    }

    /// Creates a codec that marks outgoing envelopes as public.
    pub fn public() -> Self {
        StampedCodec { public: true }
    }
}

impl PayloadCodec for StampedCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let envelope = serde_json::json!({
            "data": value,
            "ts": Utc::now().timestamp_millis(),
            "ispublic": self.public,
        });
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Decoded, CodecError> {
        let envelope: Value = serde_json::from_slice(payload)?;
        let mut map = match envelope {
            Value::Object(map) => map,
            _ => {
                return Err(CodecError::Shape(
                    "stamped payload is not a JSON object".to_string(),
                ))
            }
        };
        let ts = map.get("ts").and_then(Value::as_i64);
        let value = map.remove("data").ok_or_else(|| {
            CodecError::Shape("stamped payload has no \"data\" member".to_string())
        })?;
        Ok(Decoded { value, ts })
    }
}

/// Formats a unix-milliseconds timestamp as `YYYY/MM/DD,hh:mm:ss` in the
/// local timezone. Returns an empty string for timestamps outside the
/// representable range.
pub fn millis_to_datestr(ts_millis: i64) -> String {
    chrono::Local
        .timestamp_millis_opt(ts_millis)
        .earliest()
        .map(|dt| dt.format("%Y/%m/%d,%H:%M:%S").to_string())
        .unwrap_or_default()
}
