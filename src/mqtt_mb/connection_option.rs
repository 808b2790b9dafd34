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

use derive_builder::Builder;
use getset::{CopyGetters, Getters};

use crate::mqtt_mb::event::Qos;

/// Connection Options - Configuration for blocking-style pub/sub connections
///
/// This struct contains the broker target, the topics registered for
/// automatic subscription, publish defaults, and the timing knobs of the
/// waiting protocol. It is immutable once built; construct it through
/// [`builder`](ConnectionOption::builder).
///
/// # Key Features
///
/// - **Broker Target**: host, port, keep alive and session settings
/// - **Registered Topics**: subscribed automatically after an accepted connect
/// - **Publish Defaults**: QoS and retain flag used by `send`
/// - **Waiting Protocol Tuning**: poll interval, re-enqueue jitter bound, and
///   an optional per-operation deadline
///
/// # Usage
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::ConnectionOption;
/// use std::time::Duration;
///
/// let option = ConnectionOption::builder()
///     .host("broker.example.com")
///     .port(1883u16)
///     .topics(vec!["sensors/temp".to_string()])
///     .poll_interval(Duration::from_secs(2))
///     .build()?;
/// ```
#[derive(Debug, Clone, Builder, Getters, CopyGetters)]
#[builder(derive(Debug), pattern = "owned", setter(into))]
pub struct ConnectionOption {
    /// Broker host name or address
    ///
    /// # Default
    /// "" (empty)
    #[builder(default = "String::new()", setter(into))]
    #[getset(get = "pub")]
    host: String,

    /// Broker port
    ///
    /// # Default
    /// 1883
    #[builder(default = "1883", setter(into))]
    #[getset(get = "pub")]
    port: u16,

    /// Keep-alive interval announced to the broker
    ///
    /// # Default
    /// 60 seconds
    #[builder(default = "Duration::from_secs(60)", setter(into))]
    #[getset(get = "pub")]
    keep_alive: Duration,

    /// User name to authenticate as
    ///
    /// Setting a user makes credential resolution mandatory at connection
    /// construction time.
    ///
    /// # Default
    /// None (anonymous)
    #[builder(default, setter(into, strip_option))]
    #[getset(get = "pub")]
    user: Option<String>,

    /// Topics registered for automatic subscription
    ///
    /// After an accepted connect, `start` subscribes every non-empty entry.
    /// Empty entries are skipped, and an empty publish topic falls back to
    /// the first non-empty entry.
    ///
    /// # Default
    /// Empty vector
    #[builder(default, setter(into))]
    #[getset(get = "pub")]
    topics: Vec<String>,

    /// QoS used for subscriptions and as the publish default
    ///
    /// # Default
    /// `Qos::AtMostOnce`
    #[builder(default = "Qos::AtMostOnce", setter(into))]
    #[getset(get = "pub")]
    qos: Qos,

    /// Retain flag used as the publish default
    ///
    /// # Default
    /// false
    #[builder(default = "false", setter(into))]
    #[getset(get = "pub")]
    retain: bool,

    /// Whether to request a clean session on connect
    ///
    /// # Default
    /// true
    #[builder(default = "true", setter(into))]
    #[getset(get = "pub")]
    clean_session: bool,

    /// How long one timed dequeue waits before yielding the sentinel event
    ///
    /// This bounds how quickly a blocked waiter notices connection shutdown.
    ///
    /// # Default
    /// 1 second
    #[builder(default = "Duration::from_secs(1)", setter(into))]
    #[getset(get = "pub")]
    poll_interval: Duration,

    /// Upper bound of the random pause after re-enqueueing an event that
    /// belongs to another waiter
    ///
    /// The pause lets the other waiter reach the mailbox before this one
    /// polls again. Zero disables the pause.
    ///
    /// # Default
    /// 100 milliseconds
    #[builder(default = "Duration::from_millis(100)", setter(into))]
    #[getset(get = "pub")]
    requeue_jitter_max: Duration,

    /// Optional ceiling on how long one operation may wait for its
    /// confirmation event
    ///
    /// When the deadline expires the operation fails with
    /// `DeadlineExceeded` and a confirmation arriving later is discarded as
    /// stale.
    ///
    /// # Default
    /// None (wait as long as the connection is live)
    #[builder(default, setter(into, strip_option))]
    #[getset(get = "pub")]
    operation_deadline: Option<Duration>,
}

/// Default implementation for ConnectionOption
///
/// Provides the same values as an unconfigured builder.
impl Default for ConnectionOption {
    fn default() -> Self {
        Self::builder()
            .host(String::new())
            .port(1883u16)
            .keep_alive(Duration::from_secs(60))
            .topics(Vec::new())
            .qos(Qos::AtMostOnce)
            .retain(false)
            .clean_session(true)
            .poll_interval(Duration::from_secs(1))
            .requeue_jitter_max(Duration::from_millis(100))
            .build()
            .expect("Default ConnectionOption should be valid")
    }
}

impl ConnectionOption {
    /// Create a new builder for ConnectionOption
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let option = ConnectionOption::builder()
    ///     .host("localhost")
    ///     .topics(vec!["commands".to_string()])
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> ConnectionOptionBuilder {
        ConnectionOptionBuilder::default()
    }

    /// Returns the first non-empty registered topic, if any.
    ///
    /// This is the publish fallback target and the topic offered to
    /// credential sources that scope secrets per channel.
    pub fn first_topic(&self) -> Option<&str> {
        self.topics
            .iter()
            .map(String::as_str)
            .find(|topic| !topic.is_empty())
    }
}
