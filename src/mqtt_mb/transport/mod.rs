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

//! Transport layer abstractions for pub/sub connections.
//!
//! This module defines the seam between the blocking-style connection facade
//! and whatever actually moves bytes. A transport receives commands through
//! the [`Transport`] trait methods and reports everything that happens back
//! through a channel of [`TransportNotice`] values handed to it by
//! [`bind`](Transport::bind).
//!
//! # Built-in Transports
//!
//! - **Memory**: an in-process hub ([`MemoryHub`]) that routes publishes
//!   between endpoints without any network, useful for tests and demos
//!
//! # Custom Transport Implementation
//!
//! Users can integrate a real broker client by implementing the [`Transport`]
//! trait. The implementation must emit one notice per broker acknowledgement
//! (connect, subscribe, unsubscribe, publish confirm, disconnect), one
//! [`TransportNotice::Message`] per inbound application message, and
//! [`TransportNotice::Error`] for asynchronous failures.

mod memory;

pub use memory::{MemoryHub, MemoryTransport};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::mqtt_mb::credential::Credentials;
use crate::mqtt_mb::event::{ConnectCode, Qos};

/// Error types that can occur during transport operations.
#[derive(Debug)]
pub enum TransportError {
    /// An I/O failure in the underlying byte stream
    Io(std::io::Error),
    /// Establishing the connection failed before any acknowledgement
    Connect(String),
    /// The transport reported an asynchronous failure
    Fault(String),
    /// An operation was attempted while the transport was not connected
    NotConnected,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "IO error: {e}"),
            TransportError::Connect(msg) => write!(f, "Connection failed: {msg}"),
            TransportError::Fault(msg) => write!(f, "Transport fault: {msg}"),
            TransportError::NotConnected => write!(f, "Transport not connected"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// Everything a transport can report back to its connection.
///
/// Each notice becomes exactly one mailbox event, in the order the transport
/// sends them. `Message` payloads are raw wire bytes; decoding happens on the
/// connection side.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotice {
    /// Connect acknowledgement with the broker's verbatim return code
    Connected {
        code: ConnectCode,
        session_present: bool,
    },
    /// Disconnect completed with the transport's reason code
    Disconnected { code: u8 },
    /// Subscribe acknowledgement with granted QoS per requested topic
    Subscribed { id: u16, granted: Vec<u8> },
    /// Unsubscribe acknowledgement
    Unsubscribed { id: u16 },
    /// Publish confirmation for the given packet id
    Published { id: u16 },
    /// An inbound application message, payload still encoded
    Message { topic: String, payload: Vec<u8> },
    /// An asynchronous failure with a human-readable message
    Error { message: String },
}

/// One topic of a subscribe request, with the QoS to request for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeEntry {
    pub topic: String,
    pub qos: Qos,
}

impl SubscribeEntry {
    pub fn new(topic: impl Into<String>, qos: Qos) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// Core trait that defines transport operations for pub/sub connections.
///
/// Commands flow in through these methods; results flow out as
/// [`TransportNotice`] values on the channel installed by
/// [`bind`](Transport::bind). A method returning `Ok(())` means the request
/// was handed to the wire, not that the broker confirmed it; confirmation
/// arrives as a notice.
///
/// # Custom Transport Implementation
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::transport::{
///     SubscribeEntry, Transport, TransportError, TransportNotice,
/// };
/// use mqtt_mailbox_tokio::mqtt_mb::{Credentials, Qos};
/// use std::future::Future;
/// use std::pin::Pin;
/// use std::time::Duration;
/// use tokio::sync::mpsc;
///
/// struct MyBrokerTransport {
///     notices: Option<mpsc::UnboundedSender<TransportNotice>>,
/// }
///
/// impl Transport for MyBrokerTransport {
///     fn bind(&mut self, notices: mpsc::UnboundedSender<TransportNotice>) {
///         self.notices = Some(notices);
///     }
///
///     fn connect<'a>(
///         &'a mut self,
///         host: &'a str,
///         port: u16,
///         keep_alive: Duration,
///         clean_session: bool,
///         credentials: Option<&'a Credentials>,
///     ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
///         Box::pin(async move {
///             // Open the socket, send CONNECT, emit
///             // TransportNotice::Connected when CONNACK arrives.
///             Ok(())
///         })
///     }
///
///     // ... disconnect, subscribe, unsubscribe, publish
/// #   fn disconnect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> { unimplemented!() }
/// #   fn subscribe<'a>(&'a mut self, entries: &'a [SubscribeEntry]) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> { unimplemented!() }
/// #   fn unsubscribe<'a>(&'a mut self, topics: &'a [String]) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> { unimplemented!() }
/// #   fn publish<'a>(&'a mut self, topic: &'a str, payload: Vec<u8>, qos: Qos, retain: bool) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> { unimplemented!() }
/// }
/// ```
pub trait Transport {
    /// Installs the notice channel. Called once, before `connect`.
    fn bind(&mut self, notices: mpsc::UnboundedSender<TransportNotice>);

    /// Opens the connection to the broker.
    ///
    /// Success means the connect request is on the wire; the broker's verdict
    /// arrives as [`TransportNotice::Connected`] carrying the return code,
    /// accepted or not.
    fn connect<'a>(
        &'a mut self,
        host: &'a str,
        port: u16,
        keep_alive: Duration,
        clean_session: bool,
        credentials: Option<&'a Credentials>,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Closes the connection. Completion arrives as
    /// [`TransportNotice::Disconnected`], after which the transport must stop
    /// sending notices.
    fn disconnect<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Requests subscriptions for the given entries. The broker's granted QoS
    /// levels arrive as [`TransportNotice::Subscribed`].
    fn subscribe<'a>(
        &'a mut self,
        entries: &'a [SubscribeEntry],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Removes subscriptions for the given topics. Confirmation arrives as
    /// [`TransportNotice::Unsubscribed`].
    fn unsubscribe<'a>(
        &'a mut self,
        topics: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

    /// Publishes a payload. Confirmation arrives as
    /// [`TransportNotice::Published`].
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}

/// Implementation of [`Transport`] for boxed trait objects.
///
/// This allows using transport implementations through trait objects,
/// enabling dynamic dispatch for different transport types at runtime.
impl Transport for Box<dyn Transport + Send> {
    fn bind(&mut self, notices: mpsc::UnboundedSender<TransportNotice>) {
        (**self).bind(notices)
    }

    fn connect<'a>(
        &'a mut self,
        host: &'a str,
        port: u16,
        keep_alive: Duration,
        clean_session: bool,
        credentials: Option<&'a Credentials>,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).connect(host, port, keep_alive, clean_session, credentials)
    }

    fn disconnect<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).disconnect()
    }

    fn subscribe<'a>(
        &'a mut self,
        entries: &'a [SubscribeEntry],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).subscribe(entries)
    }

    fn unsubscribe<'a>(
        &'a mut self,
        topics: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).unsubscribe(topics)
    }

    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        (**self).publish(topic, payload, qos, retain)
    }
}
