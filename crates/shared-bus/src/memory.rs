//! # In-Memory Broker
//!
//! An in-process broker with AMQP routing semantics: exchanges, bindings,
//! queues, and round-robin consumers. Used by the test suites and by the
//! standalone mode of the interface binary.
//!
//! Cloning an [`InMemoryBroker`] yields another handle to the same broker,
//! which is how a test plays both the Core Interface and the Core responder.

use crate::consumer::Consumer;
use crate::error::BrokerError;
use crate::message::{Delivery, ExchangeKind, ExchangeSpec, MessageProperties, QueueSpec};
use crate::session::BrokerSession;
use crate::{DEFAULT_CONSUMER_CAPACITY, DEFAULT_EXCHANGE};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct ExchangeState {
    spec: ExchangeSpec,
    /// (queue, binding pattern)
    bindings: Vec<(String, String)>,
}

struct ConsumerSlot {
    tag: String,
    sender: mpsc::Sender<Delivery>,
}

struct QueueState {
    spec: QueueSpec,
    buffer: VecDeque<Delivery>,
    consumers: Vec<ConsumerSlot>,
    next_consumer: usize,
    /// A task is forwarding `buffer` to consumers
    pumping: bool,
}

impl QueueState {
    fn new(spec: QueueSpec) -> Self {
        Self {
            spec,
            buffer: VecDeque::new(),
            consumers: Vec::new(),
            next_consumer: 0,
            pumping: false,
        }
    }

    /// Hand the delivery to the next consumer with room, or buffer it
    /// behind any backlog.
    ///
    /// Returns true when a pump must be started for the backlog.
    fn enqueue(&mut self, delivery: Delivery) -> bool {
        if self.buffer.is_empty() {
            if let Some(returned) = self.offer(delivery) {
                self.buffer.push_back(returned);
            }
        } else {
            self.buffer.push_back(delivery);
        }
        self.claim_pump()
    }

    /// Try each consumer once; gives the delivery back if none has room.
    fn offer(&mut self, delivery: Delivery) -> Option<Delivery> {
        let mut delivery = delivery;
        let mut attempts = self.consumers.len();
        while attempts > 0 && !self.consumers.is_empty() {
            attempts -= 1;
            let index = self.next_consumer % self.consumers.len();
            match self.consumers[index].sender.try_send(delivery) {
                Ok(()) => {
                    self.next_consumer = index + 1;
                    return None;
                }
                Err(mpsc::error::TrySendError::Full(returned)) => {
                    delivery = returned;
                    self.next_consumer = index + 1;
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    delivery = returned;
                    self.consumers.remove(index);
                }
            }
        }
        Some(delivery)
    }

    /// Mark the backlog as being pumped, if it needs it and nobody is.
    fn claim_pump(&mut self) -> bool {
        if self.pumping || self.buffer.is_empty() || self.consumers.is_empty() {
            return false;
        }
        self.pumping = true;
        true
    }

    /// Next consumer, round-robin, to receive the head of the backlog.
    ///
    /// Clears `pumping` when there is nothing left to forward.
    fn pump_target(&mut self) -> Option<(String, mpsc::Sender<Delivery>)> {
        self.consumers.retain(|slot| !slot.sender.is_closed());
        if self.buffer.is_empty() || self.consumers.is_empty() {
            self.pumping = false;
            return None;
        }
        let index = self.next_consumer % self.consumers.len();
        self.next_consumer = index + 1;
        let slot = &self.consumers[index];
        Some((slot.tag.clone(), slot.sender.clone()))
    }

    /// Move buffered deliveries to a newly attached consumer.
    fn drain_into(&mut self, sender: &mpsc::Sender<Delivery>) {
        while let Some(delivery) = self.buffer.pop_front() {
            if let Err(err) = sender.try_send(delivery) {
                let returned = match err {
                    mpsc::error::TrySendError::Full(d) | mpsc::error::TrySendError::Closed(d) => d,
                };
                self.buffer.push_front(returned);
                break;
            }
        }
    }
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeState>,
    queues: HashMap<String, QueueState>,
    /// consumer tag -> queue name
    consumer_queues: HashMap<String, String>,
    closed: bool,
}

impl BrokerState {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed {
            Err(BrokerError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    fn remove_queue(&mut self, name: &str) -> Option<QueueState> {
        for exchange in self.exchanges.values_mut() {
            exchange.bindings.retain(|(queue, _)| queue.as_str() != name);
        }
        self.consumer_queues.retain(|_, queue| queue.as_str() != name);
        self.queues.remove(name)
    }
}

struct Inner {
    state: Mutex<BrokerState>,
    capacity: usize,
    messages_published: AtomicU64,
    messages_dropped: AtomicU64,
    next_delivery_tag: AtomicU64,
    next_queue_id: AtomicU64,
}

/// In-process broker implementing [`BrokerSession`].
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    /// Create a broker with the default per-consumer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CONSUMER_CAPACITY)
    }

    /// Create a broker with the given per-consumer buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState::default()),
                capacity: capacity.max(1),
                messages_published: AtomicU64::new(0),
                messages_dropped: AtomicU64::new(0),
                next_delivery_tag: AtomicU64::new(1),
                next_queue_id: AtomicU64::new(1),
            }),
        }
    }

    /// Total messages accepted by `publish`.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.inner.messages_published.load(Ordering::Relaxed)
    }

    /// Messages that matched no queue.
    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.inner.messages_dropped.load(Ordering::Relaxed)
    }

    /// Whether a queue with this name exists.
    #[must_use]
    pub fn queue_exists(&self, name: &str) -> bool {
        self.inner.state.lock().queues.contains_key(name)
    }

    /// Deliveries buffered in a queue waiting for a consumer with room.
    #[must_use]
    pub fn queue_depth(&self, name: &str) -> usize {
        self.inner
            .state
            .lock()
            .queues
            .get(name)
            .map_or(0, |queue| queue.buffer.len())
    }

    /// Forward a queue's backlog as its consumers make room.
    fn spawn_pump(&self, queue: String) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let (tag, sender) = {
                    let mut state = inner.state.lock();
                    let Some(target) = state.queues.get_mut(&queue).and_then(QueueState::pump_target)
                    else {
                        return;
                    };
                    target
                };

                // Wait for room without holding the broker lock
                let Ok(permit) = sender.reserve().await else {
                    continue;
                };

                let mut state = inner.state.lock();
                let Some(queue_state) = state.queues.get_mut(&queue) else {
                    return;
                };
                // The consumer may have been cancelled while we waited
                if !queue_state.consumers.iter().any(|slot| slot.tag == tag) {
                    continue;
                }
                if let Some(delivery) = queue_state.buffer.pop_front() {
                    permit.send(delivery);
                }
            }
        });
    }

    /// Number of consumers attached to a queue.
    #[must_use]
    pub fn consumer_count(&self, name: &str) -> usize {
        self.inner
            .state
            .lock()
            .queues
            .get(name)
            .map_or(0, |queue| queue.consumers.len())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerSession for InMemoryBroker {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        if spec.name.is_empty() {
            return Err(BrokerError::Protocol(
                "the default exchange cannot be redeclared".into(),
            ));
        }
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        if let Some(existing) = state.exchanges.get(&spec.name) {
            if existing.spec.kind != spec.kind || existing.spec.durable != spec.durable {
                return Err(BrokerError::Protocol(format!(
                    "inequivalent declaration for exchange {}",
                    spec.name
                )));
            }
            return Ok(());
        }

        debug!(exchange = %spec.name, kind = spec.kind.as_str(), "Exchange declared");
        state.exchanges.insert(
            spec.name.clone(),
            ExchangeState {
                spec: spec.clone(),
                bindings: Vec::new(),
            },
        );
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<String, BrokerError> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        let name = if spec.name.is_empty() {
            let id = self.inner.next_queue_id.fetch_add(1, Ordering::Relaxed);
            format!("amq.gen-{id}")
        } else {
            spec.name.clone()
        };

        if let Some(existing) = state.queues.get(&name) {
            if existing.spec.exclusive != spec.exclusive
                || existing.spec.durable != spec.durable
                || existing.spec.auto_delete != spec.auto_delete
            {
                return Err(BrokerError::ResourceLocked(name));
            }
            return Ok(name);
        }

        let mut stored = spec.clone();
        stored.name = name.clone();
        state.queues.insert(name.clone(), QueueState::new(stored));
        debug!(queue = %name, "Queue declared");
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        if !state.queues.contains_key(queue) {
            return Err(BrokerError::QueueNotFound(queue.to_string()));
        }
        let exchange_state = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BrokerError::ExchangeNotFound(exchange.to_string()))?;

        let binding = (queue.to_string(), routing_key.to_string());
        if !exchange_state.bindings.contains(&binding) {
            exchange_state.bindings.push(binding);
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: MessageProperties,
        body: Vec<u8>,
    ) -> Result<(), BrokerError> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        let targets: Vec<String> = if exchange == DEFAULT_EXCHANGE {
            if state.queues.contains_key(routing_key) {
                vec![routing_key.to_string()]
            } else {
                Vec::new()
            }
        } else {
            let exchange_state = state
                .exchanges
                .get(exchange)
                .ok_or_else(|| BrokerError::ExchangeNotFound(exchange.to_string()))?;
            let kind: ExchangeKind = exchange_state.spec.kind;
            let mut targets: Vec<String> = exchange_state
                .bindings
                .iter()
                .filter(|(_, pattern)| kind.routes(pattern, routing_key))
                .map(|(queue, _)| queue.clone())
                .collect();
            targets.dedup();
            targets
        };

        self.inner.messages_published.fetch_add(1, Ordering::Relaxed);

        if targets.is_empty() {
            self.inner.messages_dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                exchange = exchange,
                routing_key = routing_key,
                "Message unroutable, dropped"
            );
            return Ok(());
        }

        for queue_name in targets {
            if let Some(queue) = state.queues.get_mut(&queue_name) {
                let delivery = Delivery {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    properties: properties.clone(),
                    body: body.clone(),
                    delivery_tag: self.inner.next_delivery_tag.fetch_add(1, Ordering::Relaxed),
                };
                if queue.enqueue(delivery) {
                    self.spawn_pump(queue_name);
                }
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Consumer, BrokerError> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        if state.consumer_queues.contains_key(consumer_tag) {
            return Err(BrokerError::Protocol(format!(
                "consumer tag already in use: {consumer_tag}"
            )));
        }

        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        if queue_state.spec.exclusive && !queue_state.consumers.is_empty() {
            return Err(BrokerError::ResourceLocked(queue.to_string()));
        }

        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        queue_state.drain_into(&sender);
        queue_state.consumers.push(ConsumerSlot {
            tag: consumer_tag.to_string(),
            sender,
        });
        let pump = queue_state.claim_pump();
        state
            .consumer_queues
            .insert(consumer_tag.to_string(), queue.to_string());
        if pump {
            self.spawn_pump(queue.to_string());
        }

        debug!(queue = queue, consumer_tag = consumer_tag, "Consumer attached");
        Ok(Consumer::new(consumer_tag, queue, receiver))
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), BrokerError> {
        let mut state = self.inner.state.lock();
        state.ensure_open()?;

        let queue_name = state
            .consumer_queues
            .remove(consumer_tag)
            .ok_or_else(|| BrokerError::ConsumerNotFound(consumer_tag.to_string()))?;

        let delete = match state.queues.get_mut(&queue_name) {
            Some(queue) => {
                queue.consumers.retain(|slot| slot.tag != consumer_tag);
                queue.spec.auto_delete && queue.consumers.is_empty()
            }
            None => false,
        };
        if delete {
            state.remove_queue(&queue_name);
            debug!(queue = %queue_name, "Auto-delete queue removed");
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        for queue in state.queues.values_mut() {
            queue.consumers.clear();
        }
        state.consumer_queues.clear();
        debug!("In-memory broker closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.inner.state.lock().closed
    }
}
