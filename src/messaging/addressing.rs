//! # Service Addressing
//!
//! Deterministic mapping from a resource uuid onto one logical worker of a
//! service. The same uuid always lands on the same partition, which is what
//! gives per-resource ordering.

use chrono::Utc;
use uuid::Uuid;

use super::message::{AddressedMessage, MessageBody};
use crate::config::MessagingConfig;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceAddressing {
    partitions: u32,
}

impl ServiceAddressing {
    /// `partitions` of zero is treated as one
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(config.partitions_per_service)
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn partition_of(&self, resource_uuid: &str) -> u32 {
        // FNV-1a: stable across processes and builds
        let hash = resource_uuid
            .bytes()
            .fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
            });
        (hash % u64::from(self.partitions)) as u32
    }

    pub fn make_target_service_id_by_resource_uuid(
        &self,
        service: &str,
        resource_uuid: &str,
    ) -> String {
        format!("{service}.{}", self.partition_of(resource_uuid))
    }

    /// Build a message addressed to the owner of `resource_uuid`
    pub fn address(&self, body: MessageBody, resource_uuid: impl Into<String>) -> AddressedMessage {
        let resource_uuid = resource_uuid.into();
        AddressedMessage {
            id: Uuid::new_v4(),
            service_id: self.make_target_service_id_by_resource_uuid(body.service(), &resource_uuid),
            resource_uuid,
            created_at: Utc::now(),
            body,
        }
    }
}

impl Default for ServiceAddressing {
    fn default() -> Self {
        Self::from_config(&MessagingConfig::default())
    }
}
