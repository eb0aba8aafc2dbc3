//! # Messages and Topology
//!
//! Metadata carried alongside every message body, the delivery handed to
//! consumers, and the declarations that shape broker topology.

use std::collections::BTreeMap;

/// Metadata of a published message.
///
/// Mirrors the AMQP basic properties the request/reply pattern relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// Token matching a reply to its request.
    pub correlation_id: Option<String>,
    /// Queue the responder should publish the reply to.
    pub reply_to: Option<String>,
    /// MIME type of the body.
    pub content_type: Option<String>,
    /// Application headers.
    pub headers: BTreeMap<String, String>,
}

impl MessageProperties {
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Look up an application header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A message as received by a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Exchange the message was published to.
    pub exchange: String,
    /// Routing key it was published with.
    pub routing_key: String,
    pub properties: MessageProperties,
    pub body: Vec<u8>,
    /// Broker-assigned sequence number, unique per session.
    pub delivery_tag: u64,
}

/// Exchange routing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Exact routing-key match.
    Direct,
    /// Dot-separated pattern match with `*` and `#` wildcards.
    Topic,
    /// Every bound queue receives every message.
    Fanout,
}

impl ExchangeKind {
    /// Parse the AMQP exchange type name.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "topic" => Some(Self::Topic),
            "fanout" => Some(Self::Fanout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Topic => "topic",
            Self::Fanout => "fanout",
        }
    }

    /// Whether a binding with `pattern` receives a message routed with `key`.
    pub fn routes(&self, pattern: &str, key: &str) -> bool {
        match self {
            Self::Direct => pattern == key,
            Self::Fanout => true,
            Self::Topic => topic_matches(pattern, key),
        }
    }
}

/// Exchange declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
}

impl ExchangeSpec {
    /// Durable topic exchange, the shape every Core exchange uses.
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
            auto_delete: false,
            internal: false,
        }
    }
}

/// Queue declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSpec {
    /// Queue name; empty asks the broker to generate one.
    pub name: String,
    pub durable: bool,
    /// Only the declaring session may consume it.
    pub exclusive: bool,
    /// Deleted once its last consumer is cancelled.
    pub auto_delete: bool,
}

impl QueueSpec {
    /// Plain non-durable, shared queue.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Exclusive, auto-deleted queue for receiving replies.
    pub fn reply_queue(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

/// Topic pattern match: words are dot-separated, `*` matches exactly one
/// word and `#` matches zero or more words.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&head, tail)) if word == "*" || word == head => match_words(rest, tail),
            _ => false,
        },
    }
}
