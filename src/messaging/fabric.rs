//! # Messaging Fabric
//!
//! Contract the core needs from the bus: request/reply to the owner of a
//! resource, ordered batch sends, and fire-and-forget events. Providers decide
//! transport; the core only ever sees [`MessageReply`] values.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::addressing::ServiceAddressing;
use super::message::{AddressedMessage, MessageBody, MessageReply};

#[async_trait]
pub trait MessagingFabric: Send + Sync + 'static {
    /// Addressing scheme used to build partitioned service ids
    fn addressing(&self) -> &ServiceAddressing;

    /// Deliver one message and wait for its reply.
    ///
    /// Transport failures and reply timeouts surface as failed replies, never
    /// as panics or hangs.
    async fn send(&self, message: AddressedMessage) -> MessageReply;

    /// Deliver a batch concurrently. Replies come back in the input order.
    async fn send_batch(&self, messages: Vec<AddressedMessage>) -> Vec<MessageReply> {
        join_all(messages.into_iter().map(|message| self.send(message))).await
    }

    /// Fire-and-forget event; no reply is expected
    async fn publish(&self, message: AddressedMessage);

    fn provider_name(&self) -> &'static str;

    /// Address `body` to the partition owning `resource_uuid`
    fn make_target(&self, body: MessageBody, resource_uuid: &str) -> AddressedMessage {
        self.addressing().address(body, resource_uuid)
    }
}

/// Callback-style sends for call sites holding a shared fabric handle.
///
/// The callback runs on a spawned task, so these must be called from inside a
/// tokio runtime.
pub trait MessagingFabricExt {
    fn send_then<F>(&self, message: AddressedMessage, on_reply: F)
    where
        F: FnOnce(MessageReply) + Send + 'static;

    fn send_batch_then<F>(&self, messages: Vec<AddressedMessage>, on_replies: F)
    where
        F: FnOnce(Vec<MessageReply>) + Send + 'static;
}

impl MessagingFabricExt for Arc<dyn MessagingFabric> {
    fn send_then<F>(&self, message: AddressedMessage, on_reply: F)
    where
        F: FnOnce(MessageReply) + Send + 'static,
    {
        let fabric = Arc::clone(self);
        tokio::spawn(async move {
            let reply = fabric.send(message).await;
            on_reply(reply);
        });
    }

    fn send_batch_then<F>(&self, messages: Vec<AddressedMessage>, on_replies: F)
    where
        F: FnOnce(Vec<MessageReply>) + Send + 'static,
    {
        let fabric = Arc::clone(self);
        tokio::spawn(async move {
            let replies = fabric.send_batch(messages).await;
            on_replies(replies);
        });
    }
}
