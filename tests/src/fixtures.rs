//! # Test Fixtures
//!
//! Stand-ins for the symbIoTe Core services and for a broken broker.

use async_trait::async_trait;
use core_interface::{CoreInterfaceService, InterfaceConfig};
use shared_bus::{
    BrokerError, BrokerSession, Consumer, Delivery, ExchangeSpec, InMemoryBroker,
    MessageProperties, QueueSpec, DEFAULT_EXCHANGE,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Produces the reply body for one request; `None` leaves it unanswered.
pub type Responder = Arc<dyn Fn(&Delivery) -> Option<Vec<u8>> + Send + Sync>;

/// Start the Core Interface on `broker` with the stock configuration.
pub async fn start_interface(broker: &InMemoryBroker) -> CoreInterfaceService {
    start_interface_with(broker, InterfaceConfig::default()).await
}

pub async fn start_interface_with(
    broker: &InMemoryBroker,
    config: InterfaceConfig,
) -> CoreInterfaceService {
    CoreInterfaceService::start(config, Arc::new(broker.clone()))
        .await
        .expect("core interface starts on the in-memory broker")
}

/// Publish `body` as the reply to `request`.
pub async fn reply(broker: &InMemoryBroker, request: &Delivery, body: Vec<u8>) {
    let properties = MessageProperties {
        correlation_id: request.properties.correlation_id.clone(),
        ..MessageProperties::default()
    };
    let reply_to = request
        .properties
        .reply_to
        .as_deref()
        .expect("request carries reply_to");
    broker
        .publish(DEFAULT_EXCHANGE, reply_to, properties, body)
        .await
        .expect("reply published");
}

/// Queue bound to `exchange` under `routing_key`, as a Core service would
/// declare it.
pub async fn core_queue(broker: &InMemoryBroker, exchange: &str, routing_key: &str) -> Consumer {
    broker
        .declare_exchange(&ExchangeSpec::topic(exchange))
        .await
        .expect("exchange declared");
    let queue = broker
        .declare_queue(&QueueSpec::named(format!("core:{routing_key}")))
        .await
        .expect("queue declared");
    broker
        .bind_queue(&queue, exchange, routing_key)
        .await
        .expect("queue bound");
    broker
        .consume(&queue, &format!("core-service:{routing_key}"))
        .await
        .expect("consumer attached")
}

/// A fake Core service answering every request with `responder`.
///
/// Every request it sees is also forwarded to the returned receiver.
pub async fn fake_core_service(
    broker: &InMemoryBroker,
    exchange: &str,
    routing_key: &str,
    responder: Responder,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<Delivery>) {
    let mut requests = core_queue(broker, exchange, routing_key).await;
    let (seen, received) = mpsc::unbounded_channel();
    let broker = broker.clone();

    let task = tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            if let Some(body) = responder(&request) {
                reply(&broker, &request, body).await;
            }
            let _ = seen.send(request);
        }
    });
    (task, received)
}

/// Responder that always returns `body`.
pub fn constant(body: &'static str) -> Responder {
    Arc::new(move |_: &Delivery| Some(body.as_bytes().to_vec()))
}

/// Session that accepts everything except publishes, like a broker whose
/// channel died after startup.
pub struct FailingSession(pub InMemoryBroker);

#[async_trait]
impl BrokerSession for FailingSession {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        self.0.declare_exchange(spec).await
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String, BrokerError> {
        self.0.declare_queue(spec).await
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.0.bind_queue(queue, exchange, routing_key).await
    }

    async fn publish(
        &self,
        _exchange: &str,
        _routing_key: &str,
        _properties: MessageProperties,
        _body: Vec<u8>,
    ) -> Result<(), BrokerError> {
        Err(BrokerError::ConnectionClosed)
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, BrokerError> {
        self.0.consume(queue, consumer_tag).await
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError> {
        self.0.cancel(consumer_tag).await
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.0.close().await
    }

    fn is_open(&self) -> bool {
        false
    }
}
