// ABOUTME: In-process topic message bus for the showtell presentation server
// ABOUTME: Provides publish/subscribe with a bounded delivery queue and the JSON socket protocol

use crate::errors::{Result, ShowError};
use actix_ws::{Message, MessageStream, Session};
use log::{debug, error, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Pending deliveries a bus buffers before publishers start waiting
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Receives every value published on the topic it is subscribed to.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`MessageBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

struct Envelope {
    topic: String,
    value: Value,
}

type TopicTable = HashMap<String, Vec<(SubscriptionId, Handler)>>;

/// Named-topic publish/subscribe.
///
/// Published values go through a bounded queue to a dispatcher task that
/// calls every handler of the topic. When the queue is full `publish` waits
/// for room and `try_publish` fails with [`ShowError::BusQueueFull`].
/// Nothing is persisted: values published to a topic nobody listens on are
/// discarded.
#[derive(Clone)]
pub struct MessageBus {
    topics: Arc<RwLock<TopicTable>>,
    queue: mpsc::Sender<Envelope>,
}

impl MessageBus {
    /// Create a bus and spawn its dispatcher on the current tokio runtime.
    /// The dispatcher stops once every clone of the bus is dropped.
    pub fn new(capacity: usize) -> Self {
        let topics: Arc<RwLock<TopicTable>> = Arc::default();
        let (queue, receiver) = mpsc::channel(capacity.max(1));
        tokio::spawn(dispatch(receiver, Arc::clone(&topics)));
        Self { topics, queue }
    }

    pub fn subscribe(
        &self,
        topic: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        let handler: Handler = Arc::new(handler);
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        debug!("Subscribed {:?} to {:?}", id, topic);
        id
    }

    /// Remove a subscription. Returns false if it was not registered on `topic`.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let Some(handlers) = topics.get_mut(topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    /// Queue `value` for delivery, waiting while the queue is full.
    pub async fn publish(&self, topic: &str, value: Value) -> Result<()> {
        self.queue
            .send(Envelope {
                topic: topic.to_string(),
                value,
            })
            .await
            .map_err(|_| ShowError::BusClosed)
    }

    /// Queue `value` for delivery without waiting.
    pub fn try_publish(&self, topic: &str, value: Value) -> Result<()> {
        let envelope = Envelope {
            topic: topic.to_string(),
            value,
        };
        self.queue.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ShowError::BusQueueFull(topic.to_string()),
            mpsc::error::TrySendError::Closed(_) => ShowError::BusClosed,
        })
    }
}

async fn dispatch(mut receiver: mpsc::Receiver<Envelope>, topics: Arc<RwLock<TopicTable>>) {
    while let Some(envelope) = receiver.recv().await {
        // Handlers run without the table lock so they may subscribe or unsubscribe
        let handlers: Vec<Handler> = topics
            .read()
            .get(&envelope.topic)
            .map(|subscribed| subscribed.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(&envelope.value);
        }
    }
    debug!("Message bus dispatcher stopped");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Subscribe,
    Unsubscribe,
    Publish,
    Message,
    #[serde(other)]
    Unknown,
}

/// One frame of the bus socket protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub value: Value,
}

impl BusMessage {
    pub fn new(kind: MessageType, topic: &str, value: Value) -> Self {
        Self {
            kind,
            topic: topic.to_string(),
            value,
        }
    }
}

/// The bus-side state of one socket client.
///
/// Keeps the subscription handles the client created so an `unsubscribe`
/// frame removes exactly that client's handlers, and closing the client
/// removes all of them.
pub struct BusClient {
    bus: MessageBus,
    outbox: mpsc::UnboundedSender<BusMessage>,
    subscriptions: HashMap<String, Vec<SubscriptionId>>,
}

impl BusClient {
    /// `outbox` receives the `message` frames to write to the client.
    pub fn new(bus: MessageBus, outbox: mpsc::UnboundedSender<BusMessage>) -> Self {
        Self {
            bus,
            outbox,
            subscriptions: HashMap::new(),
        }
    }

    pub async fn handle(&mut self, msg: BusMessage) -> Result<()> {
        match msg.kind {
            MessageType::Subscribe => {
                debug!("Subscribing client to {:?}", msg.topic);
                let outbox = self.outbox.clone();
                let topic = msg.topic.clone();
                let id = self.bus.subscribe(&msg.topic, move |value| {
                    // A closed outbox means the client is going away
                    let frame = BusMessage::new(MessageType::Message, &topic, value.clone());
                    let _ = outbox.send(frame);
                });
                self.subscriptions.entry(msg.topic).or_default().push(id);
            }
            MessageType::Unsubscribe => {
                debug!("Unsubscribing client from {:?}", msg.topic);
                for id in self.subscriptions.remove(&msg.topic).unwrap_or_default() {
                    self.bus.unsubscribe(&msg.topic, id);
                }
            }
            MessageType::Publish => {
                debug!("Publishing message on {:?}", msg.topic);
                self.bus.publish(&msg.topic, msg.value).await?;
            }
            MessageType::Message | MessageType::Unknown => {
                debug!("Ignoring {:?} frame from client", msg.kind);
            }
        }
        Ok(())
    }

    pub fn subscribed_topics(&self) -> Vec<&str> {
        self.subscriptions.keys().map(String::as_str).collect()
    }

    /// Drop every subscription this client holds
    pub fn close(&mut self) {
        for (topic, ids) in self.subscriptions.drain() {
            for id in ids {
                self.bus.unsubscribe(&topic, id);
            }
        }
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drive one message bus socket until the client leaves, a read or write
/// fails, or the server shuts down.
pub async fn run_connection(
    mut session: Session,
    mut msg_stream: MessageStream,
    bus: MessageBus,
    cancel: CancellationToken,
) {
    let (outbox, mut outgoing) = mpsc::unbounded_channel();
    let mut client = BusClient::new(bus, outbox);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Server shutting down, closing message bus connection");
                break;
            }
            Some(msg) = outgoing.recv() => {
                let frame = match serde_json::to_string(&msg) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("Failed to encode bus message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = session.text(frame).await {
                    warn!("Failed to write to client, closing connection: {:?}", e);
                    break;
                }
            }
            msg = msg_stream.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let parsed: BusMessage = match serde_json::from_str(&text) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            error!("Failed to read message from client, closing connection: {}", e);
                            break;
                        }
                    };
                    if let Err(e) = client.handle(parsed).await {
                        error!("Failed to handle client message: {}", e);
                        break;
                    }
                }
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    error!("Failed to read message from client, closing connection: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    client.close();
    let _ = session.close(None).await;
}
