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
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use mqtt_mailbox_tokio::mqtt_mb::{
    Credentials, Qos, SubscribeEntry, Transport, TransportError, TransportNotice,
};

/// Call record for tracking method invocations
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect {
        host: String,
        port: u16,
        clean_session: bool,
        username: Option<String>,
    },
    Disconnect,
    Subscribe {
        entries: Vec<SubscribeEntry>,
    },
    Unsubscribe {
        topics: Vec<String>,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    },
}

/// Response configuration for controlling stub behavior
#[derive(Debug)]
#[allow(dead_code)]
pub enum TransportResponse {
    /// Accept the call without emitting anything
    Ok,
    /// Accept the call and emit these notices in order
    OkWith(Vec<TransportNotice>),
    /// Fail the call
    Err(TransportError),
}

impl Clone for TransportResponse {
    fn clone(&self) -> Self {
        match self {
            TransportResponse::Ok => TransportResponse::Ok,
            TransportResponse::OkWith(notices) => TransportResponse::OkWith(notices.clone()),
            TransportResponse::Err(_) => TransportResponse::Err(TransportError::NotConnected),
        }
    }
}

/// Stub transport implementation for testing
///
/// Every trait call is recorded so tests can assert what reached the wire,
/// and each call consumes one scripted response. The bound notice sender is
/// shared with clones, so a test can keep a clone and play the broker by
/// hand through `emit` while the `Connection` owns the original.
#[derive(Clone)]
pub struct StubTransport {
    /// Record of method calls made to this transport
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    /// Queue of responses to return for method calls
    responses: Arc<Mutex<VecDeque<TransportResponse>>>,
    /// Notice sender captured by `bind`
    notices: Arc<Mutex<Option<mpsc::UnboundedSender<TransportNotice>>>>,
    /// Whether calls without a scripted response succeed or fail
    accept_unscripted: bool,
}

impl StubTransport {
    /// Create a stub that fails any call without a scripted response
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            notices: Arc::new(Mutex::new(None)),
            accept_unscripted: false,
        }
    }

    /// Create a stub that accepts any call without a scripted response,
    /// emitting no notices; the test drives confirmations through `emit`
    #[allow(dead_code)]
    pub fn accepting() -> Self {
        Self {
            accept_unscripted: true,
            ..Self::new()
        }
    }

    /// Add a response to the queue
    pub fn add_response(&self, response: TransportResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Emit a notice as if the broker had produced it
    ///
    /// Panics when the stub has not been bound yet. Emissions after the
    /// consumer is gone are dropped, like writes after a socket close.
    #[allow(dead_code)]
    pub fn emit(&self, notice: TransportNotice) {
        let guard = self.notices.lock().unwrap();
        let sender = guard.as_ref().expect("stub transport is not bound");
        let _ = sender.send(notice);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Clear all recorded calls
    #[allow(dead_code)]
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Record a call, then resolve it against the response queue
    fn complete(&self, call: TransportCall) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(call);

        let scripted = self.responses.lock().unwrap().pop_front();
        let response = match scripted {
            Some(response) => response,
            None if self.accept_unscripted => TransportResponse::Ok,
            None => TransportResponse::Err(TransportError::NotConnected),
        };
        match response {
            TransportResponse::Ok => Ok(()),
            TransportResponse::OkWith(notices) => {
                for notice in notices {
                    self.emit(notice);
                }
                Ok(())
            }
            TransportResponse::Err(err) => Err(err),
        }
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for StubTransport {
    fn bind(&mut self, notices: mpsc::UnboundedSender<TransportNotice>) {
        *self.notices.lock().unwrap() = Some(notices);
    }

    fn connect<'a>(
        &'a mut self,
        host: &'a str,
        port: u16,
        _keep_alive: Duration,
        clean_session: bool,
        credentials: Option<&'a Credentials>,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.complete(TransportCall::Connect {
                host: host.to_string(),
                port,
                clean_session,
                username: credentials.and_then(|c| c.username.clone()),
            })
        })
    }

    fn disconnect<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move { self.complete(TransportCall::Disconnect) })
    }

    fn subscribe<'a>(
        &'a mut self,
        entries: &'a [SubscribeEntry],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.complete(TransportCall::Subscribe {
                entries: entries.to_vec(),
            })
        })
    }

    fn unsubscribe<'a>(
        &'a mut self,
        topics: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.complete(TransportCall::Unsubscribe {
                topics: topics.to_vec(),
            })
        })
    }

    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.complete(TransportCall::Publish {
                topic: topic.to_string(),
                payload,
                qos,
                retain,
            })
        })
    }
}
