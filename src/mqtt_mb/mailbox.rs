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

use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::mqtt_mb::event::Event;

/// Unbounded FIFO queue carrying [`Event`]s from the transport side to
/// blocking-style waiters.
///
/// Producers never block or fail: [`enqueue`](Mailbox::enqueue) appends in
/// arrival order regardless of queue depth. Consumers use
/// [`dequeue`](Mailbox::dequeue) with a timeout; when nothing arrives within
/// the interval a sentinel [`Event::None`] is returned so pollers can re-check
/// liveness between attempts.
///
/// A waiter that pulled an event addressed to a different pending operation
/// puts it back with [`requeue`](Mailbox::requeue); re-enqueued events go to
/// the tail, behind anything that arrived in the meantime.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use mqtt_mailbox_tokio::mqtt_mb::{Event, EventKind, Mailbox};
///
/// let mailbox = Mailbox::new();
/// mailbox.enqueue(Event::Published { id: 1 });
///
/// let event = mailbox.dequeue(Duration::from_secs(1)).await;
/// assert_eq!(event.kind(), EventKind::Published);
///
/// // Nothing else queued: the timed dequeue yields the sentinel.
/// let event = mailbox.dequeue(Duration::from_millis(10)).await;
/// assert_eq!(event.kind(), EventKind::None);
/// ```
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::UnboundedSender<Event>,
    rx: Mutex<mpsc::UnboundedReceiver<Event>>,
}

impl Mailbox {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Appends an event at the tail. Never blocks and never drops.
    pub fn enqueue(&self, event: Event) {
        // Receiver half lives inside self, so the channel cannot be closed
        // while this method is callable.
        let _ = self.tx.send(event);
    }

    /// Puts an event pulled by the wrong waiter back at the tail.
    pub fn requeue(&self, event: Event) {
        self.enqueue(event);
    }

    /// Removes and returns the head event, waiting up to `timeout` for one to
    /// arrive. Returns [`Event::None`] when the interval expires first.
    ///
    /// The receiver lock is taken inside the timed section, so a dequeue
    /// contended by another waiter still returns within one interval.
    pub async fn dequeue(&self, timeout: Duration) -> Event {
        let head = tokio::time::timeout(timeout, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await;
        match head {
            Ok(Some(event)) => event,
            Ok(None) | Err(_) => Event::None,
        }
    }

    /// Returns a producer handle for the transport-facing side.
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
