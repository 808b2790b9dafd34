// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use serde_json::Value;

/// Connect return code reported by the broker in response to a connect
/// attempt.
///
/// The code is carried verbatim from the transport. Code `0` means the
/// session was accepted; codes `1` through `5` are the standard refusal
/// reasons; anything else is preserved as [`ConnectCode::Other`].
///
/// [`Connection::start`](crate::mqtt_mb::Connection::start) returns the code
/// as its `Ok` value even when the broker refused the session, so callers can
/// inspect the refusal reason without treating it as a transport failure.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::ConnectCode;
///
/// let code = ConnectCode::from_raw(5);
/// assert_eq!(code, ConnectCode::NotAuthorized);
/// assert!(!code.is_accepted());
/// println!("{code}"); // "5: connection refused - not authorised"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectCode {
    /// Connection accepted
    Accepted,
    /// Connection refused: unacceptable protocol version
    UnacceptableProtocolVersion,
    /// Connection refused: identifier rejected
    IdentifierRejected,
    /// Connection refused: server unavailable
    ServerUnavailable,
    /// Connection refused: bad user name or password
    BadCredentials,
    /// Connection refused: not authorised
    NotAuthorized,
    /// Any code outside the standard `0..=5` range, preserved as-is
    Other(u8),
}

impl ConnectCode {
    /// Maps a raw broker code to a `ConnectCode`.
    ///
    /// Codes `0..=5` map to the named variants; everything else becomes
    /// [`ConnectCode::Other`].
    pub fn from_raw(code: u8) -> Self {
        match code {
            0 => ConnectCode::Accepted,
            1 => ConnectCode::UnacceptableProtocolVersion,
            2 => ConnectCode::IdentifierRejected,
            3 => ConnectCode::ServerUnavailable,
            4 => ConnectCode::BadCredentials,
            5 => ConnectCode::NotAuthorized,
            other => ConnectCode::Other(other),
        }
    }

    /// Returns the raw numeric code as reported by the broker.
    pub fn raw(&self) -> u8 {
        match self {
            ConnectCode::Accepted => 0,
            ConnectCode::UnacceptableProtocolVersion => 1,
            ConnectCode::IdentifierRejected => 2,
            ConnectCode::ServerUnavailable => 3,
            ConnectCode::BadCredentials => 4,
            ConnectCode::NotAuthorized => 5,
            ConnectCode::Other(code) => *code,
        }
    }

    /// Returns `true` if the broker accepted the session (code `0`).
    pub fn is_accepted(&self) -> bool {
        matches!(self, ConnectCode::Accepted)
    }

    /// Human-readable description of the code.
    pub fn description(&self) -> &'static str {
        match self {
            ConnectCode::Accepted => "connection accepted",
            ConnectCode::UnacceptableProtocolVersion => {
                "connection refused - incorrect protocol version"
            }
            ConnectCode::IdentifierRejected => "connection refused - invalid client identifier",
            ConnectCode::ServerUnavailable => "connection refused - server unavailable",
            ConnectCode::BadCredentials => "connection refused - bad username or password",
            ConnectCode::NotAuthorized => "connection refused - not authorised",
            ConnectCode::Other(_) => "connection refused - unknown reason",
        }
    }
}

impl std::fmt::Display for ConnectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.raw(), self.description())
    }
}

/// MQTT quality-of-service level for publishes and subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Qos {
    /// Fire and forget
    AtMostOnce = 0,
    /// Acknowledged delivery
    AtLeastOnce = 1,
    /// Assured delivery
    ExactlyOnce = 2,
}

impl Qos {
    /// Highest value a broker may grant for a subscription. Anything above
    /// this in a subscribe acknowledgement signals a refused subscription.
    pub const MAX_GRANTED: u8 = 2;
}

impl TryFrom<u8> for Qos {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(other),
        }
    }
}

/// Discriminant of an [`Event`], used to request a particular event from the
/// mailbox without caring about its payload.
///
/// `EventKind::None` is the kind of the sentinel event returned when a timed
/// dequeue expires without anything arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connect acknowledgement arrived
    Connected,
    /// Disconnect completed
    Disconnected,
    /// Subscribe acknowledgement arrived
    Subscribed,
    /// Unsubscribe acknowledgement arrived
    Unsubscribed,
    /// Publish was confirmed
    Published,
    /// An application message arrived
    MessageReceived,
    /// The transport reported a failure
    Error,
    /// Nothing arrived within the dequeue interval
    None,
}

/// A decoded application message delivered on a subscribed topic.
///
/// `ts` is a unix timestamp in milliseconds: the publisher's timestamp when
/// the payload envelope carried one, otherwise the local arrival time.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Topic the message was published on
    pub topic: String,
    /// Decoded message body
    pub value: Value,
    /// Unix timestamp in milliseconds
    pub ts: i64,
}

/// A tagged event produced by the transport and delivered through the
/// [`Mailbox`](crate::mqtt_mb::Mailbox).
///
/// Every transport callback becomes exactly one `Event` in arrival order.
/// Waiters select events by [`kind`](Event::kind); the payload carries the
/// per-kind detail (connect code, granted QoS levels, the decoded message).
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::{Event, EventKind};
///
/// fn describe(event: &Event) {
///     match event {
///         Event::Connected { code, .. } => println!("connected: {code}"),
///         Event::MessageReceived(inbound) => println!("message on {}", inbound.topic),
///         Event::None => println!("nothing yet"),
///         other => println!("{:?}", other.kind()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Connect acknowledgement with the broker's verbatim return code
    Connected {
        code: ConnectCode,
        session_present: bool,
    },
    /// Disconnect completed with the transport's reason code
    Disconnected { code: u8 },
    /// Subscribe acknowledgement with the granted QoS per requested topic
    Subscribed { id: u16, granted: Vec<u8> },
    /// Unsubscribe acknowledgement
    Unsubscribed { id: u16 },
    /// Publish confirmation for the given packet id
    Published { id: u16 },
    /// A decoded application message
    MessageReceived(Inbound),
    /// Transport-reported failure with a human-readable message
    Error(String),
    /// Timed dequeue sentinel; never produced by a transport
    None,
}

impl Event {
    /// Returns the discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connected { .. } => EventKind::Connected,
            Event::Disconnected { .. } => EventKind::Disconnected,
            Event::Subscribed { .. } => EventKind::Subscribed,
            Event::Unsubscribed { .. } => EventKind::Unsubscribed,
            Event::Published { .. } => EventKind::Published,
            Event::MessageReceived(_) => EventKind::MessageReceived,
            Event::Error(_) => EventKind::Error,
            Event::None => EventKind::None,
        }
    }
}
