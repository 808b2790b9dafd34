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

use crate::mqtt_mb::codec::CodecError;
use crate::mqtt_mb::event::EventKind;
use crate::mqtt_mb::transport::TransportError;

/// Comprehensive error type for connection operations.
///
/// This enum represents all possible errors that can occur during connection
/// lifecycle operations, publishing, subscription management, and the
/// request/reply layer. Note that a broker *refusing* a connect is not an
/// error: [`Connection::start`](crate::mqtt_mb::Connection::start) reports
/// refusals through its `Ok` value, the verbatim connect code. Errors are for
/// failures of the machinery itself.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::ConnectionError;
///
/// match connection.send("sensors/temp", &value).await {
///     Ok(()) => println!("confirmed"),
///     Err(ConnectionError::NotActive) => println!("call start() first"),
///     Err(ConnectionError::OperationInFlight(kind)) => {
///         println!("another {kind:?} operation is pending")
///     }
///     Err(e) => eprintln!("send failed: {e}"),
/// }
/// ```
#[derive(Debug)]
pub enum ConnectionError {
    /// The transport failed to carry out a request
    Transport(TransportError),
    /// An outgoing payload could not be encoded
    Codec(CodecError),
    /// The broker answered a subscribe with at least one failure code;
    /// `granted` is the full per-topic answer
    SubscriptionRefused { granted: Vec<u8> },
    /// An operation of the given kind (or one that excludes it) is already
    /// awaiting its confirmation on this connection
    OperationInFlight(EventKind),
    /// The connection has not been started
    NotActive,
    /// `start` was called on a connection that is already running
    AlreadyActive,
    /// The connection was already ended; a connection is not restartable
    AlreadyEnded,
    /// Waiting for a confirmation was cut short by connection shutdown
    Abandoned,
    /// The per-operation deadline expired before the confirmation arrived
    DeadlineExceeded,
    /// No secret could be resolved for the given host at construction time
    CredentialsMissing(String),
    /// Request and reply topics must differ; both were the given topic
    TopicsEqual(String),
    /// No topic to publish to: none was given and none is registered
    NoTopic,
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Transport(e) => write!(f, "Transport error: {e}"),
            ConnectionError::Codec(e) => write!(f, "Codec error: {e}"),
            ConnectionError::SubscriptionRefused { granted } => {
                write!(f, "Subscription refused, granted QoS {granted:?}")
            }
            ConnectionError::OperationInFlight(kind) => {
                write!(f, "Operation already in flight: {kind:?}")
            }
            ConnectionError::NotActive => write!(f, "Connection not active"),
            ConnectionError::AlreadyActive => write!(f, "Connection already active"),
            ConnectionError::AlreadyEnded => write!(f, "Connection already ended"),
            ConnectionError::Abandoned => write!(f, "Wait abandoned by connection shutdown"),
            ConnectionError::DeadlineExceeded => write!(f, "Operation deadline exceeded"),
            ConnectionError::CredentialsMissing(host) => {
                write!(f, "No credentials resolved for host: {host}")
            }
            ConnectionError::TopicsEqual(topic) => {
                write!(f, "Request and reply topics are both: {topic}")
            }
            ConnectionError::NoTopic => write!(f, "No topic to publish to"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Transport(e) => Some(e),
            ConnectionError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

/// Converts transport errors into connection errors.
///
/// This allows transport failures to be propagated with the `?` operator
/// inside connection operations.
impl From<TransportError> for ConnectionError {
    fn from(error: TransportError) -> Self {
        ConnectionError::Transport(error)
    }
}

/// Converts codec errors into connection errors.
///
/// This allows payload encoding failures to be propagated with the `?`
/// operator when publishing.
impl From<CodecError> for ConnectionError {
    fn from(error: CodecError) -> Self {
        ConnectionError::Codec(error)
    }
}
