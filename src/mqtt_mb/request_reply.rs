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

//! Request/reply messaging over a pair of topics.
//!
//! One side runs a [`ReplyServer`]: it consumes requests from the request
//! topic, passes each decoded body to a handler, and publishes the handler's
//! answer on the reply topic. The other side uses a [`RequestClient`] to
//! publish a request and block until the answer arrives.
//!
//! Both sides refuse construction when the two topics are the same name,
//! since a shared topic would make every participant consume its own
//! traffic.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

use crate::mqtt_mb::codec::{JsonCodec, PayloadCodec};
use crate::mqtt_mb::connection::Connection;
use crate::mqtt_mb::connection_error::ConnectionError;
use crate::mqtt_mb::event::{ConnectCode, Inbound};

/// How a [`ReplyServer`] schedules its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One request at a time; the next request is not consumed until the
    /// current reply is confirmed
    Serial,
    /// Every request is handled on its own task; replies are published in
    /// completion order
    Concurrent,
}

fn validate_topics(request_topic: &str, reply_topic: &str) -> Result<(), ConnectionError> {
    if request_topic.is_empty() || reply_topic.is_empty() {
        return Err(ConnectionError::NoTopic);
    }
    if request_topic == reply_topic {
        return Err(ConnectionError::TopicsEqual(request_topic.to_string()));
    }
    Ok(())
}

/// Serves requests arriving on one topic with replies on another.
///
/// The server owns a [`Connection`]; [`start`](ReplyServer::start) brings it
/// up and subscribes the request topic, [`run`](ReplyServer::run) consumes
/// requests until [`stop`](ReplyServer::stop) is called or the connection
/// goes inactive. In [`DispatchMode::Concurrent`] each request runs on its
/// own task and `run` joins every outstanding task before returning.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::{Connection, DispatchMode, ReplyServer};
///
/// let server = ReplyServer::new(
///     Connection::new(hub.endpoint(), option)?,
///     "orders/request",
///     "orders/reply",
///     DispatchMode::Serial,
/// )?;
/// server.start().await?;
/// server
///     .run(|request| async move { serde_json::json!({"echo": request}) })
///     .await?;
/// ```
pub struct ReplyServer<C = JsonCodec>
where
    C: PayloadCodec,
{
    connection: Connection<C>,
    request_topic: String,
    reply_topic: String,
    mode: DispatchMode,
    active: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C> ReplyServer<C>
where
    C: PayloadCodec + 'static,
{
    /// Creates a server over the given topic pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::TopicsEqual`] when both topics are the
    /// same name and [`ConnectionError::NoTopic`] when either is empty.
    pub fn new(
        connection: Connection<C>,
        request_topic: impl Into<String>,
        reply_topic: impl Into<String>,
        mode: DispatchMode,
    ) -> Result<Self, ConnectionError> {
        let request_topic = request_topic.into();
        let reply_topic = reply_topic.into();
        validate_topics(&request_topic, &reply_topic)?;
        Ok(Self {
            connection,
            request_topic,
            reply_topic,
            mode,
            active: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Starts the connection and subscribes the request topic.
    ///
    /// The connect code is passed through verbatim; when the broker refused
    /// the session no subscription is attempted.
    pub async fn start(&self) -> Result<ConnectCode, ConnectionError> {
        let code = self.connection.start().await?;
        if !code.is_accepted() {
            return Ok(code);
        }
        self.connection
            .subscribe(&[self.request_topic.as_str()])
            .await?;
        Ok(code)
    }

    /// Consumes requests and publishes the handler's replies until stopped.
    ///
    /// The handler receives the decoded request body and returns the reply
    /// body. The loop re-checks [`stop`](ReplyServer::stop) and connection
    /// liveness at least once per poll interval, and joins any outstanding
    /// handler tasks before returning.
    ///
    /// # Errors
    ///
    /// This method can return errors in the following cases:
    /// - The connection is not active
    /// - Receiving a request or publishing a serial reply failed
    pub async fn run<F, Fut>(&self, handler: F) -> Result<(), ConnectionError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        if !self.connection.is_active() {
            return Err(ConnectionError::NotActive);
        }
        let handler = Arc::new(handler);
        self.active.store(true, Ordering::SeqCst);
        let mut outcome = Ok(());
        while self.active.load(Ordering::SeqCst) && self.connection.is_active() {
            let inbound = match self
                .connection
                .receive_next_within(
                    &self.request_topic,
                    *self.connection.option().poll_interval(),
                )
                .await
            {
                Ok(Some(inbound)) => inbound,
                Ok(None) => continue,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            match self.mode {
                DispatchMode::Serial => {
                    let reply = (*handler)(inbound.value).await;
                    if let Err(e) = self.connection.send(&self.reply_topic, &reply).await {
                        outcome = Err(e);
                        break;
                    }
                }
                DispatchMode::Concurrent => {
                    let connection = self.connection.clone();
                    let reply_topic = self.reply_topic.clone();
                    let handler = Arc::clone(&handler);
                    let mut tasks = self.tasks.lock().await;
                    tasks.retain(|task| !task.is_finished());
                    tasks.push(tokio::spawn(async move {
                        let reply = (*handler)(inbound.value).await;
                        if let Err(e) = connection.send(&reply_topic, &reply).await {
                            error!("reply publish on {} failed: {}", reply_topic, e);
                        }
                    }));
                }
            }
        }
        let pending: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in pending {
            let _ = task.await;
        }
        outcome
    }

    /// Asks a running [`run`](ReplyServer::run) loop to return. The loop
    /// notices within one poll interval.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Ends the underlying connection.
    pub async fn end(&self) -> Result<(), ConnectionError> {
        self.connection.end().await
    }

    /// The connection this server runs on.
    pub fn connection(&self) -> &Connection<C> {
        &self.connection
    }
}

/// Sends requests on one topic and waits for the reply on another.
///
/// `call` takes `&mut self`, so one client has at most one request in
/// flight; issue concurrent requests from separate clients.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::{Connection, RequestClient};
///
/// let mut client = RequestClient::new(
///     Connection::new(hub.endpoint(), option)?,
///     "orders/request",
///     "orders/reply",
/// )?;
/// client.start().await?;
/// if let Some(reply) = client.call(&serde_json::json!({"order": 7})).await? {
///     println!("reply: {}", reply.value);
/// }
/// client.stop().await?;
/// ```
pub struct RequestClient<C = JsonCodec>
where
    C: PayloadCodec,
{
    connection: Connection<C>,
    request_topic: String,
    reply_topic: String,
}

impl<C> RequestClient<C>
where
    C: PayloadCodec + 'static,
{
    /// Creates a client over the given topic pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::TopicsEqual`] when both topics are the
    /// same name and [`ConnectionError::NoTopic`] when either is empty.
    pub fn new(
        connection: Connection<C>,
        request_topic: impl Into<String>,
        reply_topic: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let request_topic = request_topic.into();
        let reply_topic = reply_topic.into();
        validate_topics(&request_topic, &reply_topic)?;
        Ok(Self {
            connection,
            request_topic,
            reply_topic,
        })
    }

    /// Starts the connection and subscribes the reply topic.
    ///
    /// The connect code is passed through verbatim; when the broker refused
    /// the session no subscription is attempted.
    pub async fn start(&self) -> Result<ConnectCode, ConnectionError> {
        let code = self.connection.start().await?;
        if !code.is_accepted() {
            return Ok(code);
        }
        self.connection
            .subscribe(&[self.reply_topic.as_str()])
            .await?;
        Ok(code)
    }

    /// Publishes a request and waits for the next message on the reply
    /// topic.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(inbound))` - The reply
    /// * `Ok(None)` - The connection went inactive before a reply arrived
    /// * `Err(ConnectionError)` - Publishing or receiving failed
    pub async fn call(&mut self, value: &Value) -> Result<Option<Inbound>, ConnectionError> {
        self.connection.send(&self.request_topic, value).await?;
        self.connection.receive_next(&self.reply_topic).await
    }

    /// Ends the underlying connection.
    pub async fn stop(&self) -> Result<(), ConnectionError> {
        self.connection.end().await
    }

    /// The connection this client runs on.
    pub fn connection(&self) -> &Connection<C> {
        &self.connection
    }
}
