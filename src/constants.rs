//! # System Constants
//!
//! Names shared between the cascade engine, the extensions and the flow
//! pipeline. Resource type names double as graph node labels and capability
//! keys, so they must stay stable.

/// Cascade graph node labels
pub mod resource_types {
    use crate::models::ResourceTypeName;

    pub const HOST: ResourceTypeName = ResourceTypeName::from_static("HostVO");
    pub const PRIMARY_STORAGE: ResourceTypeName = ResourceTypeName::from_static("PrimaryStorageVO");
    pub const VM_INSTANCE: ResourceTypeName = ResourceTypeName::from_static("VmInstanceVO");
    pub const VOLUME: ResourceTypeName = ResourceTypeName::from_static("VolumeVO");
    pub const VOLUME_SNAPSHOT: ResourceTypeName = ResourceTypeName::from_static("VolumeSnapshotVO");
}

/// Service ids used as messaging address prefixes
pub mod services {
    pub const VM_INSTANCE: &str = "vmInstance";
    pub const VOLUME: &str = "volume";
    pub const VOLUME_SNAPSHOT: &str = "volumeSnapshot";
    pub const PRIMARY_STORAGE: &str = "primaryStorage";
}

/// Hypervisor type names
pub mod hypervisors {
    pub const KVM: &str = "KVM";
    pub const SIMULATOR: &str = "Simulator";
}

/// Storage backend type names
pub mod storage_types {
    pub const LOCAL_STORAGE: &str = "LocalStorage";
    pub const NFS: &str = "NFS";
    pub const CEPH: &str = "Ceph";
    pub const SFTP_BACKUP_STORAGE: &str = "SftpBackupStorage";
    pub const CEPH_BACKUP_STORAGE: &str = "CephBackupStorage";
}

/// Well-known step names of the VM operation pipelines
pub mod flows {
    pub const VM_ALLOCATE_HOST: &str = "VmAllocateHostFlow";
    pub const VM_ALLOCATE_PRIMARY_STORAGE: &str = "VmAllocatePrimaryStorageFlow";
    pub const VM_ALLOCATE_PRIMARY_STORAGE_FOR_ATTACHING_DISK: &str =
        "VmAllocatePrimaryStorageForAttachingDiskFlow";
    pub const VM_INSTANTIATE_ATTACHING_VOLUME: &str = "VmInstantiateAttachingVolumeFlow";
    pub const VM_MIGRATE_ON_HYPERVISOR: &str = "VmMigrateOnHypervisorFlow";
    pub const VM_CREATE_ON_HYPERVISOR: &str = "VmCreateOnHypervisorFlow";

    pub const LOCAL_STORAGE_ALLOCATE_CAPACITY: &str = "LocalStorageAllocateCapacityFlow";
    pub const LOCAL_STORAGE_ALLOCATE_CAPACITY_FOR_ATTACHING_VOLUME: &str =
        "LocalStorageAllocateCapacityForAttachingVolumeFlow";
    pub const LOCAL_STORAGE_KVM_MIGRATE_VM: &str = "LocalStorageKvmMigrateVmFlow";
}
