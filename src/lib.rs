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

//! # MQTT Mailbox Tokio
//!
//! A blocking-style adapter over callback-driven MQTT-like pub/sub transports,
//! built on tokio. Transport callbacks are funneled into a single FIFO mailbox,
//! and every lifecycle operation (`start`, `end`, `send`, `subscribe`,
//! `unsubscribe`) awaits its confirmation event before returning, so callers
//! get sequential request/confirm semantics without writing callback code.
//!
//! ## Features
//!
//! - **Confirmation-Driven Lifecycle**: each operation returns only after the
//!   broker's matching acknowledgement event has been observed
//! - **Single Mailbox**: all transport callbacks become tagged events in one
//!   unbounded FIFO queue, preserving arrival order
//! - **Cooperative Waiting**: concurrent waiters re-enqueue events addressed to
//!   other pending operations and discard stale ones
//! - **Pluggable Payload Codecs**: plain JSON or timestamp-stamped envelopes
//! - **Request/Reply Layer**: a reply server (serial or concurrent dispatch)
//!   and a one-request-at-a-time client over a topic pair
//! - **Transport Abstraction**: bring your own transport; an in-process
//!   memory hub is included for wiring endpoints together
//!
//! ## Quick Start
//!
//! ```ignore
//! use mqtt_mailbox_tokio::mqtt_mb;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = mqtt_mb::transport::MemoryHub::new();
//!
//!     let option = mqtt_mb::ConnectionOption::builder()
//!         .host("localhost")
//!         .port(1883u16)
//!         .topics(vec!["sensors/temp".to_string()])
//!         .build()?;
//!
//!     let connection = mqtt_mb::Connection::new(hub.endpoint(), option)?;
//!
//!     // Connect and subscribe the registered topics; the broker's connect
//!     // code is returned verbatim.
//!     let code = connection.start().await?;
//!     if !code.is_accepted() {
//!         eprintln!("broker refused the session: {code}");
//!         return Ok(());
//!     }
//!
//!     connection.send("sensors/temp", &serde_json::json!({"c": 21.5})).await?;
//!
//!     if let Some(inbound) = connection.receive_next("sensors/temp").await? {
//!         println!("received {} at {}", inbound.value, inbound.ts);
//!     }
//!
//!     connection.end().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`mqtt_mb::connection`]: blocking-style connection facade over a transport
//! - [`mqtt_mb::mailbox`]: unbounded FIFO event queue with timed dequeue
//! - [`mqtt_mb::event`]: tagged transport events and connect codes
//! - [`mqtt_mb::connection_option`]: configuration options for connection behavior
//! - [`mqtt_mb::codec`]: payload encode/decode seam (JSON and stamped envelopes)
//! - [`mqtt_mb::request_reply`]: request/reply server and client over a topic pair
//! - [`mqtt_mb::transport`]: transport abstraction and the in-process memory hub
//! - [`mqtt_mb::connection_error`]: error handling for connection operations

pub mod mqtt_mb;
