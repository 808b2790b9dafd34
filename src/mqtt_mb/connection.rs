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

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::mqtt_mb::codec::{JsonCodec, PayloadCodec};
use crate::mqtt_mb::connection_error::ConnectionError;
use crate::mqtt_mb::connection_option::ConnectionOption;
use crate::mqtt_mb::credential::{CredentialSource, Credentials};
use crate::mqtt_mb::event::{ConnectCode, Event, EventKind, Inbound, Qos};
use crate::mqtt_mb::mailbox::Mailbox;
use crate::mqtt_mb::transport::{SubscribeEntry, Transport, TransportError, TransportNotice};

const STATE_FRESH: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_ENDED: u8 = 2;

/// One flag per confirmable operation kind. A set flag marks the matching
/// confirmation event as expected; waiters that pull an unexpected one
/// discard it as stale instead of putting it back.
struct InFlight {
    connecting: AtomicBool,
    disconnecting: AtomicBool,
    subscribing: AtomicBool,
    unsubscribing: AtomicBool,
    publishing: AtomicBool,
}

impl InFlight {
    fn new() -> Self {
        Self {
            connecting: AtomicBool::new(false),
            disconnecting: AtomicBool::new(false),
            subscribing: AtomicBool::new(false),
            unsubscribing: AtomicBool::new(false),
            publishing: AtomicBool::new(false),
        }
    }

    fn flag(&self, kind: EventKind) -> Option<&AtomicBool> {
        match kind {
            EventKind::Connected => Some(&self.connecting),
            EventKind::Disconnected => Some(&self.disconnecting),
            EventKind::Subscribed => Some(&self.subscribing),
            EventKind::Unsubscribed => Some(&self.unsubscribing),
            EventKind::Published => Some(&self.publishing),
            _ => None,
        }
    }

    /// Marks an operation as pending. Fails if the same kind is already
    /// pending, or if a lifecycle transition excludes it: connect and
    /// disconnect exclude each other, and subscription changes are refused
    /// while either is pending.
    fn begin(&self, kind: EventKind) -> Result<(), ConnectionError> {
        match kind {
            EventKind::Connected if self.disconnecting.load(Ordering::SeqCst) => {
                return Err(ConnectionError::OperationInFlight(EventKind::Disconnected));
            }
            EventKind::Disconnected if self.connecting.load(Ordering::SeqCst) => {
                return Err(ConnectionError::OperationInFlight(EventKind::Connected));
            }
            EventKind::Subscribed | EventKind::Unsubscribed => {
                if self.connecting.load(Ordering::SeqCst) {
                    return Err(ConnectionError::OperationInFlight(EventKind::Connected));
                }
                if self.disconnecting.load(Ordering::SeqCst) {
                    return Err(ConnectionError::OperationInFlight(EventKind::Disconnected));
                }
            }
            _ => {}
        }
        let flag = match self.flag(kind) {
            Some(flag) => flag,
            None => return Ok(()),
        };
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| ConnectionError::OperationInFlight(kind))
    }

    fn clear(&self, kind: EventKind) {
        if let Some(flag) = self.flag(kind) {
            flag.store(false, Ordering::SeqCst);
        }
    }

    /// Whether an event of this kind is currently expected. Message events
    /// are always expected; they wait in the mailbox until consumed.
    fn expects(&self, kind: EventKind) -> bool {
        match self.flag(kind) {
            Some(flag) => flag.load(Ordering::SeqCst),
            None => true,
        }
    }
}

struct ConnectionInner<C>
where
    C: PayloadCodec,
{
    option: ConnectionOption,
    credentials: Option<Credentials>,
    codec: Arc<C>,
    transport: Mutex<Box<dyn Transport + Send>>,
    mailbox: Mailbox,
    state: AtomicU8,
    in_flight: InFlight,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Blocking-style connection facade over a callback-driven transport.
///
/// A `Connection` turns the transport's asynchronous notices into a
/// sequential request/confirm API: [`start`](Connection::start),
/// [`end`](Connection::end), [`send`](Connection::send),
/// [`subscribe`](Connection::subscribe) and
/// [`unsubscribe`](Connection::unsubscribe) each hand a request to the
/// transport and then wait on the shared [`Mailbox`] until the matching
/// confirmation event arrives. Inbound application messages are consumed with
/// [`receive_next`](Connection::receive_next).
///
/// The connection is cheaply cloneable; clones share the transport, the
/// mailbox and the in-flight bookkeeping, so different tasks can publish and
/// receive concurrently. At most one operation per kind may be waiting at a
/// time; a second one fails fast with
/// [`ConnectionError::OperationInFlight`].
///
/// A connection runs through three states: fresh, active (after `start`),
/// ended (after `end`). It is not restartable; create a new connection to
/// reconnect.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb;
///
/// let hub = mqtt_mb::transport::MemoryHub::new();
/// let option = mqtt_mb::ConnectionOption::builder()
///     .topics(vec!["telemetry".to_string()])
///     .build()?;
/// let connection = mqtt_mb::Connection::new(hub.endpoint(), option)?;
///
/// let code = connection.start().await?;
/// assert!(code.is_accepted());
/// connection.send_to_all(&serde_json::json!({"up": true})).await?;
/// connection.end().await?;
/// ```
pub struct Connection<C = JsonCodec>
where
    C: PayloadCodec,
{
    inner: Arc<ConnectionInner<C>>,
}

impl<C> Clone for Connection<C>
where
    C: PayloadCodec,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for Connection<C>
where
    C: PayloadCodec,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("option", &self.inner.option)
            .field("state", &self.inner.state.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Connection<JsonCodec> {
    /// Create a connection with the plain JSON codec and no credentials.
    ///
    /// # Arguments
    ///
    /// * `transport` - The transport to drive; it must not be bound yet
    /// * `option` - Connection configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::CredentialsMissing`] when the option names
    /// a user, since a user implies a secret that only a
    /// [`CredentialSource`] can provide; use
    /// [`with_credentials`](Connection::with_credentials) instead.
    pub fn new<T>(transport: T, option: ConnectionOption) -> Result<Self, ConnectionError>
    where
        T: Transport + Send + 'static,
    {
        Self::with_codec(transport, option, JsonCodec::new())
    }
}

impl<C> Connection<C>
where
    C: PayloadCodec + 'static,
{
    /// Create a connection with a custom payload codec and no credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::CredentialsMissing`] when the option names
    /// a user; see [`with_credentials`](Connection::with_credentials).
    pub fn with_codec<T>(
        transport: T,
        option: ConnectionOption,
        codec: C,
    ) -> Result<Self, ConnectionError>
    where
        T: Transport + Send + 'static,
    {
        if option.user().is_some() {
            return Err(ConnectionError::CredentialsMissing(option.host().clone()));
        }
        Ok(Self::build(transport, option, codec, None))
    }

    /// Create a connection whose secret is resolved now, from a source.
    ///
    /// The source is consulted once with the option's host, port, first
    /// non-empty registered topic and user. Construction fails when the
    /// source cannot resolve the target, so a missing secret surfaces here
    /// rather than as a refused connect later.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let source = StaticCredentials::new().add_for_host("broker.example.com", "token");
    /// let option = ConnectionOption::builder()
    ///     .host("broker.example.com")
    ///     .user("sensor-1")
    ///     .build()?;
    /// let connection =
    ///     Connection::with_credentials(hub.endpoint(), option, JsonCodec::new(), &source)?;
    /// ```
    pub fn with_credentials<T, S>(
        transport: T,
        option: ConnectionOption,
        codec: C,
        source: &S,
    ) -> Result<Self, ConnectionError>
    where
        T: Transport + Send + 'static,
        S: CredentialSource + ?Sized,
    {
        let secret = source
            .lookup(
                option.host(),
                *option.port(),
                option.first_topic(),
                option.user().as_deref(),
            )
            .ok_or_else(|| ConnectionError::CredentialsMissing(option.host().clone()))?;
        let credentials = Credentials {
            username: option.user().clone(),
            secret,
        };
        Ok(Self::build(transport, option, codec, Some(credentials)))
    }

    fn build<T>(
        transport: T,
        option: ConnectionOption,
        codec: C,
        credentials: Option<Credentials>,
    ) -> Self
    where
        T: Transport + Send + 'static,
    {
        Self {
            inner: Arc::new(ConnectionInner {
                option,
                credentials,
                codec: Arc::new(codec),
                transport: Mutex::new(Box::new(transport)),
                mailbox: Mailbox::new(),
                state: AtomicU8::new(STATE_FRESH),
                in_flight: InFlight::new(),
                pump: Mutex::new(None),
            }),
        }
    }

    /// Whether the connection has been started and not yet ended.
    pub fn is_active(&self) -> bool {
        self.inner.state.load(Ordering::SeqCst) == STATE_ACTIVE
    }

    /// The configuration this connection was built with.
    pub fn option(&self) -> &ConnectionOption {
        &self.inner.option
    }

    /// Connect to the broker and subscribe the registered topics.
    ///
    /// The connect code is returned verbatim as the `Ok` value, whether the
    /// broker accepted or refused: a refusal is the broker's answer, not a
    /// machinery failure. Registered topics are subscribed only after an
    /// accepted connect.
    ///
    /// # Returns
    ///
    /// * `Ok(code)` - The broker's connect code; check
    ///   [`is_accepted`](ConnectCode::is_accepted) before using the
    ///   connection
    /// * `Err(ConnectionError)` - The connect could not be carried out or a
    ///   registered subscription was refused
    ///
    /// # Errors
    ///
    /// This method can return errors in the following cases:
    /// - The connection was already started or already ended
    /// - The transport failed to hand the connect to the wire
    /// - The broker refused a registered subscription
    /// - The per-operation deadline expired
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let code = connection.start().await?;
    /// if !code.is_accepted() {
    ///     eprintln!("broker said no: {code}");
    /// }
    /// ```
    pub async fn start(&self) -> Result<ConnectCode, ConnectionError> {
        match self.inner.state.compare_exchange(
            STATE_FRESH,
            STATE_ACTIVE,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(STATE_ENDED) => return Err(ConnectionError::AlreadyEnded),
            Err(_) => return Err(ConnectionError::AlreadyActive),
        }
        self.inner.in_flight.begin(EventKind::Connected)?;

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        {
            let mut transport = self.inner.transport.lock().await;
            transport.bind(notice_tx);
        }
        let pump = tokio::spawn(pump_notices(
            notice_rx,
            self.inner.mailbox.sender(),
            Arc::clone(&self.inner.codec),
        ));
        *self.inner.pump.lock().await = Some(pump);

        let connect_result = {
            let mut transport = self.inner.transport.lock().await;
            transport
                .connect(
                    self.inner.option.host(),
                    *self.inner.option.port(),
                    *self.inner.option.keep_alive(),
                    *self.inner.option.clean_session(),
                    self.inner.credentials.as_ref(),
                )
                .await
        };
        if let Err(e) = connect_result {
            self.inner.in_flight.clear(EventKind::Connected);
            self.shutdown_pump().await;
            return Err(e.into());
        }

        let code = match self.wait_op(EventKind::Connected).await? {
            Event::Connected { code, .. } => code,
            _ => return Err(ConnectionError::Abandoned),
        };
        if !code.is_accepted() {
            warn!("connect refused: {}", code);
            return Ok(code);
        }

        let entries: Vec<SubscribeEntry> = self
            .inner
            .option
            .topics()
            .iter()
            .filter(|topic| !topic.is_empty())
            .map(|topic| SubscribeEntry::new(topic.as_str(), *self.inner.option.qos()))
            .collect();
        if !entries.is_empty() {
            self.subscribe_entries(&entries).await?;
        }
        Ok(code)
    }

    /// Disconnect from the broker and stop the event pump.
    ///
    /// The disconnect is confirmed before the pump is torn down, so the
    /// confirmation travels the same path as every other event. After `end`
    /// the connection is ended for good; blocked waiters notice within one
    /// poll interval and return.
    ///
    /// # Errors
    ///
    /// This method can return errors in the following cases:
    /// - The connection was never started, or already ended
    /// - A disconnect is already in flight
    /// - The transport failed to carry out the disconnect; a transport
    ///   reporting `NotConnected` is treated as already torn down, not as a
    ///   failure
    /// - The per-operation deadline expired
    pub async fn end(&self) -> Result<(), ConnectionError> {
        match self.inner.state.load(Ordering::SeqCst) {
            STATE_FRESH => return Err(ConnectionError::NotActive),
            STATE_ENDED => return Err(ConnectionError::AlreadyEnded),
            _ => {}
        }
        self.inner.in_flight.begin(EventKind::Disconnected)?;

        let disconnect_result = {
            let mut transport = self.inner.transport.lock().await;
            transport.disconnect().await
        };
        if let Err(e) = disconnect_result {
            self.inner.in_flight.clear(EventKind::Disconnected);
            self.shutdown_pump().await;
            // A transport with nothing to disconnect, for example after a
            // refused connect, reports NotConnected; there is no session
            // left, so teardown is complete.
            return match e {
                TransportError::NotConnected => Ok(()),
                other => Err(other.into()),
            };
        }

        let wait_result = self.wait_op(EventKind::Disconnected).await;
        self.shutdown_pump().await;
        wait_result.map(|_| ())
    }

    /// Publish a value and wait for the publish confirmation.
    ///
    /// Uses the option's QoS and retain defaults. An empty `topic` falls
    /// back to the first non-empty registered topic.
    ///
    /// # Errors
    ///
    /// This method can return errors in the following cases:
    /// - The connection is not active
    /// - `topic` is empty and no topic is registered
    /// - The payload could not be encoded
    /// - Another publish is already awaiting its confirmation
    /// - The transport failed, or the per-operation deadline expired
    pub async fn send(&self, topic: &str, value: &Value) -> Result<(), ConnectionError> {
        self.send_with(
            topic,
            value,
            *self.inner.option.qos(),
            *self.inner.option.retain(),
        )
        .await
    }

    /// Publish a value with explicit QoS and retain flag.
    ///
    /// Same behavior as [`send`](Connection::send) otherwise.
    pub async fn send_with(
        &self,
        topic: &str,
        value: &Value,
        qos: Qos,
        retain: bool,
    ) -> Result<(), ConnectionError> {
        if !self.is_active() {
            return Err(ConnectionError::NotActive);
        }
        let target = if topic.is_empty() {
            self.inner
                .option
                .first_topic()
                .ok_or(ConnectionError::NoTopic)?
        } else {
            topic
        };
        let payload = self.inner.codec.encode(value)?;
        self.inner.in_flight.begin(EventKind::Published)?;
        let publish_result = {
            let mut transport = self.inner.transport.lock().await;
            transport.publish(target, payload, qos, retain).await
        };
        if let Err(e) = publish_result {
            self.inner.in_flight.clear(EventKind::Published);
            return Err(e.into());
        }
        self.wait_op(EventKind::Published).await.map(|_| ())
    }

    /// Publish the same value to every non-empty registered topic, one
    /// confirmed publish at a time.
    pub async fn send_to_all(&self, value: &Value) -> Result<(), ConnectionError> {
        for topic in self.inner.option.topics() {
            if topic.is_empty() {
                continue;
            }
            self.send(topic, value).await?;
        }
        Ok(())
    }

    /// Subscribe additional topics at the option's QoS and wait for the
    /// broker's acknowledgement.
    ///
    /// Empty topics are skipped; when nothing is left the call is a no-op.
    ///
    /// # Returns
    ///
    /// * `Ok(granted)` - Granted QoS per requested topic, as answered by the
    ///   broker
    /// * `Err(ConnectionError)` - The subscribe could not be carried out
    ///
    /// # Errors
    ///
    /// This method can return errors in the following cases:
    /// - The connection is not active
    /// - A connect, disconnect or another subscription change is pending
    /// - The broker granted a value above [`Qos::MAX_GRANTED`] for any topic
    /// - The transport failed, or the per-operation deadline expired
    pub async fn subscribe<S>(&self, topics: &[S]) -> Result<Vec<u8>, ConnectionError>
    where
        S: AsRef<str>,
    {
        if !self.is_active() {
            return Err(ConnectionError::NotActive);
        }
        let entries: Vec<SubscribeEntry> = topics
            .iter()
            .map(AsRef::as_ref)
            .filter(|topic| !topic.is_empty())
            .map(|topic| SubscribeEntry::new(topic, *self.inner.option.qos()))
            .collect();
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.subscribe_entries(&entries).await
    }

    /// Remove subscriptions and wait for the broker's acknowledgement.
    ///
    /// Empty topics are skipped; when nothing is left the call is a no-op.
    pub async fn unsubscribe<S>(&self, topics: &[S]) -> Result<(), ConnectionError>
    where
        S: AsRef<str>,
    {
        if !self.is_active() {
            return Err(ConnectionError::NotActive);
        }
        let targets: Vec<String> = topics
            .iter()
            .map(AsRef::as_ref)
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        self.inner.in_flight.begin(EventKind::Unsubscribed)?;
        let unsubscribe_result = {
            let mut transport = self.inner.transport.lock().await;
            transport.unsubscribe(&targets).await
        };
        if let Err(e) = unsubscribe_result {
            self.inner.in_flight.clear(EventKind::Unsubscribed);
            return Err(e.into());
        }
        self.wait_op(EventKind::Unsubscribed).await.map(|_| ())
    }

    /// Wait for the next message on the given topic.
    ///
    /// Messages on other topics are put back for their own consumers.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(inbound))` - The next message on `topic`
    /// * `Ok(None)` - The connection went inactive while waiting
    /// * `Err(ConnectionError)` - The transport reported a failure
    pub async fn receive_next(&self, topic: &str) -> Result<Option<Inbound>, ConnectionError> {
        loop {
            match self.wait_for(EventKind::MessageReceived).await {
                Event::MessageReceived(inbound) => {
                    if inbound.topic == topic {
                        return Ok(Some(inbound));
                    }
                    debug!(
                        "message on {} put back while waiting on {}",
                        inbound.topic, topic
                    );
                    self.inner.mailbox.requeue(Event::MessageReceived(inbound));
                    sleep(requeue_jitter(*self.inner.option.requeue_jitter_max())).await;
                }
                Event::Error(message) => {
                    return Err(ConnectionError::Transport(TransportError::Fault(message)));
                }
                _ => return Ok(None),
            }
        }
    }

    /// Wait for the next message on the given topic, up to `wait`.
    ///
    /// Returns `Ok(None)` when the interval expires first. Expiry cannot
    /// lose events: messages for other consumers are put back before any
    /// pause, and a message for this call is returned without further
    /// suspension points.
    pub async fn receive_next_within(
        &self,
        topic: &str,
        wait: Duration,
    ) -> Result<Option<Inbound>, ConnectionError> {
        match tokio::time::timeout(wait, self.receive_next(topic)).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    /// Wait until an event of the desired kind (or an error event) arrives.
    ///
    /// This is the cooperative waiting loop behind every confirmed
    /// operation:
    ///
    /// - the desired kind, or any [`Event::Error`], is returned immediately
    /// - the timed-dequeue sentinel keeps the loop polling
    /// - an event another waiter expects is put back at the tail, followed
    ///   by a short random pause so that waiter can reach the mailbox first
    /// - an event no one expects is logged and discarded as stale
    ///
    /// The loop runs only while the connection is active; on shutdown the
    /// last event seen (possibly [`Event::None`]) is returned.
    pub async fn wait_for(&self, desired: EventKind) -> Event {
        let mut last = Event::None;
        while self.is_active() {
            let event = self
                .inner
                .mailbox
                .dequeue(*self.inner.option.poll_interval())
                .await;
            last = event.clone();
            let kind = event.kind();
            if kind == desired || kind == EventKind::Error {
                return event;
            }
            if kind == EventKind::None {
                continue;
            }
            if self.inner.in_flight.expects(kind) {
                debug!("{:?} put back while waiting on {:?}", kind, desired);
                self.inner.mailbox.requeue(event);
                sleep(requeue_jitter(*self.inner.option.requeue_jitter_max())).await;
            } else {
                warn!("discarding stale {:?} while waiting on {:?}", kind, desired);
            }
        }
        last
    }

    /// Waits for the confirmation of a pending operation and releases its
    /// in-flight flag. With a deadline configured, expiry clears the flag so
    /// a confirmation arriving later is discarded as stale.
    async fn wait_op(&self, kind: EventKind) -> Result<Event, ConnectionError> {
        let event = match *self.inner.option.operation_deadline() {
            Some(deadline) => match tokio::time::timeout(deadline, self.wait_for(kind)).await {
                Ok(event) => event,
                Err(_) => {
                    self.inner.in_flight.clear(kind);
                    return Err(ConnectionError::DeadlineExceeded);
                }
            },
            None => self.wait_for(kind).await,
        };
        self.inner.in_flight.clear(kind);
        match event {
            Event::Error(message) => {
                Err(ConnectionError::Transport(TransportError::Fault(message)))
            }
            event if event.kind() == kind => Ok(event),
            _ => Err(ConnectionError::Abandoned),
        }
    }

    async fn subscribe_entries(
        &self,
        entries: &[SubscribeEntry],
    ) -> Result<Vec<u8>, ConnectionError> {
        self.inner.in_flight.begin(EventKind::Subscribed)?;
        let subscribe_result = {
            let mut transport = self.inner.transport.lock().await;
            transport.subscribe(entries).await
        };
        if let Err(e) = subscribe_result {
            self.inner.in_flight.clear(EventKind::Subscribed);
            return Err(e.into());
        }
        let granted = match self.wait_op(EventKind::Subscribed).await? {
            Event::Subscribed { granted, .. } => granted,
            _ => return Err(ConnectionError::Abandoned),
        };
        if granted.iter().any(|&value| value > Qos::MAX_GRANTED) {
            return Err(ConnectionError::SubscriptionRefused { granted });
        }
        Ok(granted)
    }

    async fn shutdown_pump(&self) {
        self.inner.state.store(STATE_ENDED, Ordering::SeqCst);
        if let Some(handle) = self.inner.pump.lock().await.take() {
            handle.abort();
        }
    }
}

/// Drains transport notices into the mailbox, decoding message payloads on
/// the way. Exits when the transport drops its sender or the mailbox is
/// gone.
async fn pump_notices<C>(
    mut notices: mpsc::UnboundedReceiver<TransportNotice>,
    events: mpsc::UnboundedSender<Event>,
    codec: Arc<C>,
) where
    C: PayloadCodec + 'static,
{
    while let Some(notice) = notices.recv().await {
        let event = match notice {
            TransportNotice::Connected {
                code,
                session_present,
            } => Event::Connected {
                code,
                session_present,
            },
            TransportNotice::Disconnected { code } => Event::Disconnected { code },
            TransportNotice::Subscribed { id, granted } => Event::Subscribed { id, granted },
            TransportNotice::Unsubscribed { id } => Event::Unsubscribed { id },
            TransportNotice::Published { id } => Event::Published { id },
            TransportNotice::Message { topic, payload } => match codec.decode(&payload) {
                Ok(decoded) => {
                    let ts = decoded
                        .ts
                        .unwrap_or_else(|| Utc::now().timestamp_millis());
                    Event::MessageReceived(Inbound {
                        topic,
                        value: decoded.value,
                        ts,
                    })
                }
                Err(e) => {
                    warn!("dropping undecodable message on {}: {}", topic, e);
                    continue;
                }
            },
            TransportNotice::Error { message } => Event::Error(message),
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Random pause after putting an event back, bounded by `max`. Pulled out of
/// the async path because `ThreadRng` is not `Send`.
fn requeue_jitter(max: Duration) -> Duration {
    let max_millis = max.as_millis() as u64;
    if max_millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_millis))
}
