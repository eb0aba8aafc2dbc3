//! # AMQP Session
//!
//! [`BrokerSession`] over a RabbitMQ connection using `lapin`. One connection
//! and one channel per session; consumers are forwarded into the same
//! channel-backed [`Consumer`] the in-memory broker hands out.

use crate::consumer::Consumer;
use crate::error::BrokerError;
use crate::message::{Delivery, ExchangeKind, ExchangeSpec, MessageProperties, QueueSpec};
use crate::session::BrokerSession;
use crate::DEFAULT_CONSUMER_CAPACITY;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ConfirmSelectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A live AMQP 0-9-1 connection.
pub struct AmqpSession {
    connection: Connection,
    channel: Channel,
    publish_confirms: bool,
}

impl AmqpSession {
    /// Open a connection and a channel.
    ///
    /// With `publish_confirms`, every publish waits for the broker ack and a
    /// nack surfaces as an error.
    pub async fn connect(uri: &str, publish_confirms: bool) -> Result<Self, BrokerError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        if publish_confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(map_error)?;
        }

        info!(publish_confirms, "AMQP session opened");
        Ok(Self {
            connection,
            channel,
            publish_confirms,
        })
    }
}

fn map_error(err: lapin::Error) -> BrokerError {
    match err {
        lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_) => {
            BrokerError::ConnectionClosed
        }
        lapin::Error::IOError(e) => BrokerError::Connect(e.to_string()),
        other => BrokerError::Protocol(other.to_string()),
    }
}

fn lapin_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
    }
}

fn to_basic_properties(properties: MessageProperties) -> BasicProperties {
    let mut basic = BasicProperties::default();
    if let Some(correlation_id) = properties.correlation_id {
        basic = basic.with_correlation_id(ShortString::from(correlation_id));
    }
    if let Some(reply_to) = properties.reply_to {
        basic = basic.with_reply_to(ShortString::from(reply_to));
    }
    if let Some(content_type) = properties.content_type {
        basic = basic.with_content_type(ShortString::from(content_type));
    }
    if !properties.headers.is_empty() {
        let mut table = FieldTable::default();
        for (name, value) in properties.headers {
            table.insert(
                ShortString::from(name),
                AMQPValue::LongString(LongString::from(value)),
            );
        }
        basic = basic.with_headers(table);
    }
    basic
}

fn from_basic_properties(basic: &BasicProperties) -> MessageProperties {
    let mut headers = BTreeMap::new();
    if let Some(table) = basic.headers() {
        for (name, value) in table.inner() {
            let text = match value {
                AMQPValue::LongString(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
                AMQPValue::ShortString(s) => s.as_str().to_string(),
                _ => continue,
            };
            headers.insert(name.as_str().to_string(), text);
        }
    }
    MessageProperties {
        correlation_id: basic.correlation_id().as_ref().map(|s| s.as_str().to_string()),
        reply_to: basic.reply_to().as_ref().map(|s| s.as_str().to_string()),
        content_type: basic.content_type().as_ref().map(|s| s.as_str().to_string()),
        headers,
    }
}

#[async_trait]
impl BrokerSession for AmqpSession {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        let options = ExchangeDeclareOptions {
            durable: spec.durable,
            auto_delete: spec.auto_delete,
            internal: spec.internal,
            ..ExchangeDeclareOptions::default()
        };
        self.channel
            .exchange_declare(&spec.name, lapin_kind(spec.kind), options, FieldTable::default())
            .await
            .map_err(map_error)?;
        debug!(exchange = %spec.name, "Exchange declared");
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String, BrokerError> {
        let options = QueueDeclareOptions {
            durable: spec.durable,
            exclusive: spec.exclusive,
            auto_delete: spec.auto_delete,
            ..QueueDeclareOptions::default()
        };
        let queue = self
            .channel
            .queue_declare(&spec.name, options, FieldTable::default())
            .await
            .map_err(map_error)?;
        Ok(queue.name().as_str().to_string())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(map_error)
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BrokerError> {
        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                to_basic_properties(properties),
            )
            .await
            .map_err(map_error)?;

        if self.publish_confirms {
            if let Confirmation::Nack(_) = confirm.await.map_err(map_error)? {
                return Err(BrokerError::Protocol(format!(
                    "publish to {exchange}/{routing_key} was nacked"
                )));
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, BrokerError> {
        let options = BasicConsumeOptions {
            no_ack: true,
            ..BasicConsumeOptions::default()
        };
        let mut incoming = self
            .channel
            .basic_consume(queue, consumer_tag, options, FieldTable::default())
            .await
            .map_err(map_error)?;

        let (sender, receiver) = mpsc::channel(DEFAULT_CONSUMER_CAPACITY);
        let tag = consumer_tag.to_string();
        tokio::spawn(async move {
            while let Some(item) = incoming.next().await {
                match item {
                    Ok(message) => {
                        let delivery = Delivery {
                            exchange: message.exchange.as_str().to_string(),
                            routing_key: message.routing_key.as_str().to_string(),
                            properties: from_basic_properties(&message.properties),
                            body: message.data,
                            delivery_tag: message.delivery_tag,
                        };
                        if sender.send(delivery).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(consumer_tag = %tag, error = %e, "AMQP consumer failed");
                        break;
                    }
                }
            }
            debug!(consumer_tag = %tag, "AMQP consumer stream ended");
        });

        Ok(Consumer::new(consumer_tag, queue, receiver))
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(map_error)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.is_open() {
            return Ok(());
        }
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(map_error)
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_convert_both_ways() {
        let props = MessageProperties::default()
            .with_correlation_id("abc")
            .with_reply_to("replies")
            .with_content_type("application/json")
            .with_header("__TypeId__", "Foo");

        let back = from_basic_properties(&to_basic_properties(props.clone()));
        assert_eq!(back, props);
    }

    #[test]
    fn test_exchange_kind_mapping() {
        assert!(matches!(lapin_kind(ExchangeKind::Topic), lapin::ExchangeKind::Topic));
        assert!(matches!(lapin_kind(ExchangeKind::Direct), lapin::ExchangeKind::Direct));
    }
}
