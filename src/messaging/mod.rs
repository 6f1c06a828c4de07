//! # Messaging Module
//!
//! Client side of the messaging fabric: partitioned addressing, the fabric
//! contract, and an in-memory provider used by tests and local development.

pub mod addressing;
pub mod fabric;
pub mod in_memory;
pub mod message;

pub use addressing::ServiceAddressing;
pub use fabric::{MessagingFabric, MessagingFabricExt};
pub use in_memory::{InMemoryFabric, ReplyHandler};
pub use message::{AddressedMessage, MessageBody, MessageReply};
