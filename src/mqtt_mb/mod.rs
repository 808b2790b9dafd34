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

pub mod codec;
pub mod connection;
pub mod connection_error;
pub mod connection_option;
pub mod credential;
pub mod event;
pub mod mailbox;
pub mod request_reply;
pub mod transport;

pub use codec::{millis_to_datestr, CodecError, Decoded, JsonCodec, PayloadCodec, StampedCodec};
pub use connection::Connection;
pub use connection_error::ConnectionError;
pub use connection_option::ConnectionOption;
pub use credential::{CredentialSource, Credentials, StaticCredentials};
pub use event::{ConnectCode, Event, EventKind, Inbound, Qos};
pub use mailbox::Mailbox;
pub use request_reply::{DispatchMode, ReplyServer, RequestClient};
pub use transport::{SubscribeEntry, Transport, TransportError, TransportNotice};
