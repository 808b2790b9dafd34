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
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::sync::mpsc;

use crate::mqtt_mb::credential::Credentials;
use crate::mqtt_mb::event::{ConnectCode, Qos};
use crate::mqtt_mb::transport::{SubscribeEntry, Transport, TransportError, TransportNotice};

struct Route {
    topic: String,
    endpoint: u64,
    sender: mpsc::UnboundedSender<TransportNotice>,
}

#[derive(Default)]
struct HubState {
    routes: Vec<Route>,
    accounts: HashMap<String, String>,
    require_auth: bool,
    refuse_code: Option<ConnectCode>,
    granted_override: Option<Vec<u8>>,
}

struct HubInner {
    state: Mutex<HubState>,
    next_endpoint: AtomicU64,
}

impl HubInner {
    fn state(&self) -> MutexGuard<'_, HubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// In-process broker that routes publishes between [`MemoryTransport`]
/// endpoints without any network.
///
/// Each call to [`endpoint`](MemoryHub::endpoint) mints a transport that can
/// be handed to a [`Connection`](crate::mqtt_mb::Connection); all endpoints
/// minted from the same hub see each other's publishes on matching topics.
/// The hub follows broker behavior where it matters for the waiting protocol:
/// every operation is confirmed with the corresponding
/// [`TransportNotice`], refused connects are reported through the connect
/// code rather than an error, and a publisher subscribed to its own topic
/// receives its own messages.
///
/// Topic matching is exact string equality; there is no wildcard support and
/// no retained-message store.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::transport::MemoryHub;
///
/// let hub = MemoryHub::new();
/// let sensor_side = hub.endpoint();
/// let display_side = hub.endpoint();
/// // Wrap each side in a Connection; publishes flow between them.
/// ```
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    /// Creates a hub with no accounts and no scripted behavior: every connect
    /// is accepted and subscriptions are granted at the requested QoS.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState::default()),
                next_endpoint: AtomicU64::new(1),
            }),
        }
    }

    /// Mints a new transport endpoint attached to this hub.
    pub fn endpoint(&self) -> MemoryTransport {
        MemoryTransport {
            hub: Arc::clone(&self.inner),
            id: self.inner.next_endpoint.fetch_add(1, Ordering::SeqCst),
            notices: None,
            connected: false,
            next_packet_id: 0,
        }
    }

    /// Makes the hub refuse every subsequent connect with the given code.
    pub fn refuse_connects(&self, code: ConnectCode) {
        self.inner.state().refuse_code = Some(code);
    }

    /// Makes the hub answer every subsequent subscribe with exactly these
    /// granted values instead of echoing the requested QoS. Values above
    /// [`Qos::MAX_GRANTED`] model per-topic subscription failures.
    pub fn grant_only(&self, granted: Vec<u8>) {
        self.inner.state().granted_override = Some(granted);
    }

    /// Registers an account and turns on authentication: connects without
    /// credentials are refused as not authorised, connects with a wrong
    /// secret as bad credentials.
    pub fn require_account(&self, user: impl Into<String>, secret: impl Into<String>) {
        let mut state = self.inner.state();
        state.require_auth = true;
        state.accounts.insert(user.into(), secret.into());
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One endpoint of a [`MemoryHub`]. Implements [`Transport`] for use with a
/// [`Connection`](crate::mqtt_mb::Connection).
pub struct MemoryTransport {
    hub: Arc<HubInner>,
    id: u64,
    notices: Option<mpsc::UnboundedSender<TransportNotice>>,
    connected: bool,
    next_packet_id: u16,
}

impl MemoryTransport {
    fn next_packet_id(&mut self) -> u16 {
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        self.next_packet_id
    }

    fn emit(&self, notice: TransportNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }

    fn verdict(&self, credentials: Option<&Credentials>) -> ConnectCode {
        let state = self.hub.state();
        if let Some(code) = state.refuse_code {
            return code;
        }
        if !state.require_auth {
            return ConnectCode::Accepted;
        }
        match credentials {
            None => ConnectCode::NotAuthorized,
            Some(credentials) => {
                let user = credentials.username.as_deref().unwrap_or("");
                match state.accounts.get(user) {
                    Some(secret) if secret == credentials.secret.expose_secret() => {
                        ConnectCode::Accepted
                    }
                    _ => ConnectCode::BadCredentials,
                }
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn bind(&mut self, notices: mpsc::UnboundedSender<TransportNotice>) {
        self.notices = Some(notices);
    }

    fn connect<'a>(
        &'a mut self,
        _host: &'a str,
        _port: u16,
        _keep_alive: Duration,
        _clean_session: bool,
        credentials: Option<&'a Credentials>,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            if self.notices.is_none() {
                return Err(TransportError::NotConnected);
            }
            let code = self.verdict(credentials);
            self.connected = code.is_accepted();
            self.emit(TransportNotice::Connected {
                code,
                session_present: false,
            });
            Ok(())
        })
    }

    fn disconnect<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            self.hub
                .state()
                .routes
                .retain(|route| route.endpoint != self.id);
            self.connected = false;
            self.emit(TransportNotice::Disconnected { code: 0 });
            // Dropping the sender lets the consumer side observe the close
            // once the final notice is drained.
            self.notices = None;
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a mut self,
        entries: &'a [SubscribeEntry],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let sender = match (&self.notices, self.connected) {
                (Some(tx), true) => tx.clone(),
                _ => return Err(TransportError::NotConnected),
            };
            let granted = {
                let mut state = self.hub.state();
                for entry in entries {
                    // Re-subscribing replaces the old route.
                    state
                        .routes
                        .retain(|route| !(route.endpoint == self.id && route.topic == entry.topic));
                    state.routes.push(Route {
                        topic: entry.topic.clone(),
                        endpoint: self.id,
                        sender: sender.clone(),
                    });
                }
                match &state.granted_override {
                    Some(granted) => granted.clone(),
                    None => entries.iter().map(|entry| entry.qos as u8).collect(),
                }
            };
            let id = self.next_packet_id();
            self.emit(TransportNotice::Subscribed { id, granted });
            Ok(())
        })
    }

    fn unsubscribe<'a>(
        &'a mut self,
        topics: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            self.hub.state().routes.retain(|route| {
                !(route.endpoint == self.id && topics.iter().any(|topic| *topic == route.topic))
            });
            let id = self.next_packet_id();
            self.emit(TransportNotice::Unsubscribed { id });
            Ok(())
        })
    }

    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: Vec<u8>,
        _qos: Qos,
        _retain: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            {
                let state = self.hub.state();
                for route in state.routes.iter().filter(|route| route.topic == topic) {
                    let _ = route.sender.send(TransportNotice::Message {
                        topic: topic.to_string(),
                        payload: payload.clone(),
                    });
                }
            }
            let id = self.next_packet_id();
            self.emit(TransportNotice::Published { id });
            Ok(())
        })
    }
}
