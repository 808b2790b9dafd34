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

use secrecy::SecretString;

/// Authentication material handed to the transport when connecting.
///
/// The secret is held in a [`SecretString`] so it is zeroized on drop and
/// redacted from debug output. Transports call
/// [`expose_secret`](secrecy::ExposeSecret::expose_secret) at the moment they
/// build the connect request.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// User name to present, if the broker expects one
    pub username: Option<String>,
    /// Password or API token
    pub secret: SecretString,
}

/// Resolver mapping a connection target to its secret.
///
/// Resolution happens once, when the connection is constructed; a target the
/// source cannot resolve makes construction fail rather than producing a
/// connection that would be refused later. `topic` is the first registered
/// topic, for sources that scope secrets per channel.
pub trait CredentialSource {
    /// Returns the secret for the given target, or `None` if unknown.
    fn lookup(
        &self,
        host: &str,
        port: u16,
        topic: Option<&str>,
        user: Option<&str>,
    ) -> Option<SecretString>;
}

struct StaticEntry {
    host: Option<String>,
    user: Option<String>,
    secret: SecretString,
}

/// In-memory [`CredentialSource`] built from `(host, user)` entries.
///
/// Entries are consulted in insertion order; an entry with no host or no user
/// matches any. The first matching entry wins, so list specific entries
/// before catch-all ones.
///
/// # Examples
///
/// ```ignore
/// use mqtt_mailbox_tokio::mqtt_mb::StaticCredentials;
///
/// let source = StaticCredentials::new()
///     .add("broker.example.com", "sensor-1", "s3cret")
///     .add_for_host("mqtt.beebotte.com", "channel-token");
/// ```
#[derive(Default)]
pub struct StaticCredentials {
    entries: Vec<StaticEntry>,
}

impl StaticCredentials {
    /// Creates an empty source that resolves nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret for an exact `(host, user)` pair.
    pub fn add(
        mut self,
        host: impl Into<String>,
        user: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.entries.push(StaticEntry {
            host: Some(host.into()),
            user: Some(user.into()),
            secret: SecretString::from(secret.into()),
        });
        self
    }

    /// Adds a secret for every user on the given host.
    pub fn add_for_host(mut self, host: impl Into<String>, secret: impl Into<String>) -> Self {
        self.entries.push(StaticEntry {
            host: Some(host.into()),
            user: None,
            secret: SecretString::from(secret.into()),
        });
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(
        &self,
        host: &str,
        _port: u16,
        _topic: Option<&str>,
        user: Option<&str>,
    ) -> Option<SecretString> {
        self.entries
            .iter()
            .find(|entry| {
                let host_matches = entry.host.as_deref().map_or(true, |h| h == host);
                let user_matches = match (&entry.user, user) {
                    (None, _) => true,
                    (Some(expected), Some(given)) => expected == given,
                    (Some(_), None) => false,
                };
                host_matches && user_matches
            })
            .map(|entry| entry.secret.clone())
    }
}
