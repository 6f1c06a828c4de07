//! # In-Memory Messaging Fabric
//!
//! Process-local fabric for tests and development.
//!
//! ## Features
//!
//! - **Partition workers**: one sequential worker task per `{service}.{partition}`,
//!   so messages about the same resource are handled in send order
//! - **Scripted replies**: per-service reply handlers; unhandled services reply success
//! - **Reply timeout**: a handler that never answers produces a `SYS.TIMEOUT` reply
//! - **Recording**: every sent or published message is kept for assertions

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::addressing::ServiceAddressing;
use super::fabric::MessagingFabric;
use super::message::{AddressedMessage, MessageReply};
use crate::config::MessagingConfig;
use crate::error::{codes, ErrorDetail};

/// Produces the reply a simulated service gives to a message
pub type ReplyHandler =
    Arc<dyn Fn(AddressedMessage) -> BoxFuture<'static, MessageReply> + Send + Sync>;

struct Envelope {
    message: AddressedMessage,
    reply_to: Option<oneshot::Sender<MessageReply>>,
}

/// In-memory fabric with per-partition sequential delivery
pub struct InMemoryFabric {
    addressing: ServiceAddressing,
    reply_timeout: Duration,
    handlers: Arc<DashMap<String, ReplyHandler>>,
    workers: DashMap<String, mpsc::UnboundedSender<Envelope>>,
    sent: Arc<Mutex<Vec<AddressedMessage>>>,
    published: Mutex<Vec<AddressedMessage>>,
}

impl std::fmt::Debug for InMemoryFabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryFabric")
            .field("partitions", &self.addressing.partitions())
            .field("reply_timeout", &self.reply_timeout)
            .field("handlers", &self.handlers.len())
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl Default for InMemoryFabric {
    fn default() -> Self {
        Self::from_config(&MessagingConfig::default())
    }
}

impl InMemoryFabric {
    pub fn new(addressing: ServiceAddressing, reply_timeout: Duration) -> Self {
        Self {
            addressing,
            reply_timeout,
            handlers: Arc::new(DashMap::new()),
            workers: DashMap::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(ServiceAddressing::from_config(config), config.reply_timeout())
    }

    /// Script the replies of `service` with a synchronous handler
    pub fn set_handler<F>(&self, service: &str, handler: F)
    where
        F: Fn(&AddressedMessage) -> MessageReply + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.handlers.insert(
            service.to_string(),
            Arc::new(move |message: AddressedMessage| {
                let reply = handler(&message);
                async move { reply }.boxed()
            }),
        );
    }

    /// Script the replies of `service` with an asynchronous handler
    pub fn set_async_handler<F, Fut>(&self, service: &str, handler: F)
    where
        F: Fn(AddressedMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = MessageReply> + Send + 'static,
    {
        self.handlers.insert(
            service.to_string(),
            Arc::new(move |message: AddressedMessage| handler(message).boxed()),
        );
    }

    pub fn with_handler<F>(self, service: &str, handler: F) -> Self
    where
        F: Fn(&AddressedMessage) -> MessageReply + Send + Sync + 'static,
    {
        self.set_handler(service, handler);
        self
    }

    pub fn clear_handler(&self, service: &str) {
        self.handlers.remove(service);
    }

    /// Messages sent with [`MessagingFabric::send`], in send order
    pub fn sent_messages(&self) -> Vec<AddressedMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_to_service(&self, service: &str) -> Vec<AddressedMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|message| message.service() == service)
            .cloned()
            .collect()
    }

    pub fn published_messages(&self) -> Vec<AddressedMessage> {
        self.published.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.published.lock().clear();
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn worker_for(&self, service_id: &str) -> mpsc::UnboundedSender<Envelope> {
        if let Some(sender) = self.workers.get(service_id) {
            return sender.value().clone();
        }
        self.workers
            .entry(service_id.to_string())
            .or_insert_with(|| self.spawn_worker(service_id.to_string()))
            .value()
            .clone()
    }

    fn spawn_worker(&self, service_id: String) -> mpsc::UnboundedSender<Envelope> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let handlers = Arc::clone(&self.handlers);
        debug!(service_id = %service_id, "Starting in-memory partition worker");

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let service = envelope.message.service();
                let handler = handlers.get(service).map(|h| Arc::clone(h.value()));
                let reply = match handler {
                    Some(handler) => handler(envelope.message).await,
                    None => MessageReply::ok(),
                };
                if let Some(reply_to) = envelope.reply_to {
                    // sender may have timed out already
                    let _ = reply_to.send(reply);
                }
            }
            debug!(service_id = %service_id, "In-memory partition worker stopped");
        });

        tx
    }
}

#[async_trait]
impl MessagingFabric for InMemoryFabric {
    fn addressing(&self) -> &ServiceAddressing {
        &self.addressing
    }

    async fn send(&self, message: AddressedMessage) -> MessageReply {
        self.sent.lock().push(message.clone());

        let service_id = message.service_id.clone();
        let message_name = message.body.name();
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply_to: Some(reply_tx),
        };

        if self.worker_for(&service_id).send(envelope).is_err() {
            warn!(service_id = %service_id, "Partition worker is gone");
            return MessageReply::failure(ErrorDetail::new(
                codes::NO_ROUTE,
                format!("no worker accepting messages for {service_id}"),
            ));
        }

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => MessageReply::failure(ErrorDetail::new(
                codes::TRANSPORT,
                format!("{message_name} to {service_id} was dropped before a reply"),
            )),
            Err(_) => {
                warn!(
                    service_id = %service_id,
                    message = message_name,
                    timeout_ms = self.reply_timeout.as_millis() as u64,
                    "Timed out waiting for reply"
                );
                MessageReply::failure(ErrorDetail::timeout(format!(
                    "no reply to {message_name} from {service_id} within {:?}",
                    self.reply_timeout
                )))
            }
        }
    }

    async fn publish(&self, message: AddressedMessage) {
        debug!(
            service_id = %message.service_id,
            message = message.body.name(),
            "Publishing event"
        );
        self.published.lock().push(message.clone());
        let service_id = message.service_id.clone();
        let envelope = Envelope {
            message,
            reply_to: None,
        };
        if self.worker_for(&service_id).send(envelope).is_err() {
            warn!(service_id = %service_id, "Dropping event, partition worker is gone");
        }
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::services;
    use crate::messaging::message::MessageBody;

    fn destroy(vm: &str) -> MessageBody {
        MessageBody::DestroyVmInstance {
            vm_instance_uuid: vm.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unscripted_service_replies_success() {
        let fabric = InMemoryFabric::default();
        let message = fabric.make_target(destroy("vm-1"), "vm-1");
        let reply = fabric.send(message).await;
        assert!(reply.is_success());
        assert_eq!(fabric.sent_to_service(services::VM_INSTANCE).len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_returned() {
        let fabric = InMemoryFabric::default().with_handler(services::VM_INSTANCE, |_| {
            MessageReply::failure(ErrorDetail::operation_failure("vm is busy"))
        });
        let reply = fabric.send(fabric.make_target(destroy("vm-1"), "vm-1")).await;
        assert!(!reply.is_success());
        assert_eq!(reply.error.unwrap().description, "vm is busy");
    }

    #[tokio::test]
    async fn test_batch_replies_keep_input_order() {
        let fabric = InMemoryFabric::default();
        fabric.set_handler(services::VM_INSTANCE, |message| match &message.body {
            MessageBody::DestroyVmInstance { vm_instance_uuid } if vm_instance_uuid == "vm-2" => {
                MessageReply::failure(ErrorDetail::operation_failure("vm-2 failed"))
            }
            _ => MessageReply::ok(),
        });
        let batch = ["vm-1", "vm-2", "vm-3"]
            .iter()
            .map(|vm| fabric.make_target(destroy(vm), vm))
            .collect();
        let replies = fabric.send_batch(batch).await;
        let outcomes: Vec<bool> = replies.iter().map(|r| r.success).collect();
        assert_eq!(outcomes, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_silent_service_times_out() {
        let fabric = InMemoryFabric::new(ServiceAddressing::new(4), Duration::from_millis(20));
        fabric.set_async_handler(services::VM_INSTANCE, |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            MessageReply::ok()
        });
        let reply = fabric.send(fabric.make_target(destroy("vm-1"), "vm-1")).await;
        assert!(reply.error.unwrap().is_timeout());
    }

    #[tokio::test]
    async fn test_same_resource_is_processed_in_send_order() {
        let fabric = Arc::new(InMemoryFabric::new(
            ServiceAddressing::new(4),
            Duration::from_secs(5),
        ));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        fabric.set_async_handler(services::VOLUME, move |message| {
            let recorder = Arc::clone(&recorder);
            async move {
                if let MessageBody::DeleteVolume {
                    detach_before_deleting,
                    ..
                } = message.body
                {
                    // first message is slow; it must still be handled first
                    if detach_before_deleting {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                    }
                    recorder.lock().push(detach_before_deleting);
                }
                MessageReply::ok()
            }
        });

        let first = fabric.make_target(
            MessageBody::DeleteVolume {
                volume_uuid: "vol-1".to_string(),
                detach_before_deleting: true,
            },
            "vol-1",
        );
        let second = fabric.make_target(
            MessageBody::DeleteVolume {
                volume_uuid: "vol-1".to_string(),
                detach_before_deleting: false,
            },
            "vol-1",
        );
        let (a, b) = tokio::join!(fabric.send(first), fabric.send(second));
        assert!(a.success && b.success);
        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_publish_records_without_reply() {
        let fabric = InMemoryFabric::default();
        fabric
            .publish(fabric.make_target(destroy("vm-1"), "vm-1"))
            .await;
        assert_eq!(fabric.published_messages().len(), 1);
        assert!(fabric.sent_messages().is_empty());
    }
}
