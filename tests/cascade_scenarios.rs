//! End-to-end cascade scenarios over the built-in extensions.
//!
//! Each test wires the in-memory inventory and fabric, issues one root
//! action and asserts on the outcome and on the messages the fabric saw.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cascade_core::bootstrap::ExtensionCatalog;
use cascade_core::cascade::{ActionCode, CascadeAction, CascadeExtension};
use cascade_core::completion::{Completion, CompletionResult};
use cascade_core::config::CascadeConfig;
use cascade_core::constants::{resource_types, services};
use cascade_core::error::{codes, CascadeError, CascadeResult, ErrorDetail};
use cascade_core::messaging::{MessageBody, MessageReply};
use cascade_core::models::{InventoryRecord, ResourceTypeName, VolumeSnapshotType, VolumeType};
use common::*;

fn action(
    code: ActionCode,
    issuer: ResourceTypeName,
    context: Vec<InventoryRecord>,
) -> CascadeAction {
    CascadeAction::new(code, issuer, context).expect("well-formed action")
}

/// Host h1 runs vm-1 and vm-2, each with its own root volume
fn two_vms_on_one_host(harness: &Harness) -> InventoryRecord {
    let h1 = host("h1", "cluster-1");
    harness.inventory.add_host(h1.clone());
    harness.inventory.add_vm_instance(vm("vm-1", "h1", "root-1"));
    harness.inventory.add_vm_instance(vm("vm-2", "h1", "root-2"));
    h1.into()
}

#[tokio::test]
async fn test_no_dependents_resolves_without_messages() {
    let harness = Harness::new();
    let snap = snapshot("s1", "vol-1", "t1", None, VolumeSnapshotType::Hypervisor);

    let result = harness
        .system
        .engine
        .cascade(action(
            ActionCode::Delete,
            resource_types::VOLUME_SNAPSHOT,
            vec![snap.into()],
        ))
        .await;

    assert!(result.is_ok());
    assert!(harness.fabric.sent_messages().is_empty());
}

#[tokio::test]
async fn test_delete_succeeds_when_all_replies_succeed() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);

    let result = harness
        .system
        .engine
        .cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]))
        .await;

    assert!(result.is_ok());
    let destroyed: Vec<String> = harness
        .fabric
        .sent_to_service(services::VM_INSTANCE)
        .into_iter()
        .filter_map(|msg| match msg.body {
            MessageBody::DestroyVmInstance { vm_instance_uuid } => Some(vm_instance_uuid),
            _ => None,
        })
        .collect();
    assert_eq!(destroyed, vec!["vm-1".to_string(), "vm-2".to_string()]);
}

#[tokio::test]
async fn test_delete_fails_with_the_failed_reply_detail() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);
    harness.fabric.set_handler(services::VM_INSTANCE, |msg| match &msg.body {
        MessageBody::DestroyVmInstance { vm_instance_uuid } if vm_instance_uuid == "vm-2" => {
            MessageReply::failure(ErrorDetail::operation_failure("hypervisor unreachable"))
        }
        _ => MessageReply::ok(),
    });

    let error = harness
        .system
        .engine
        .cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]))
        .await
        .unwrap_err();

    assert_eq!(error.code, codes::OPERATION_FAILURE);
    assert_eq!(error.description, "hypervisor unreachable");
}

#[tokio::test]
async fn test_force_delete_succeeds_despite_failed_replies() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);
    harness.fail_service(services::VM_INSTANCE, "hypervisor unreachable");

    let result = harness
        .system
        .engine
        .cascade(action(ActionCode::ForceDelete, resource_types::HOST, vec![h1]))
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.fabric.sent_to_service(services::VM_INSTANCE).len(), 2);
}

#[tokio::test]
async fn test_volume_delete_emits_one_message_per_hypervisor_chain() {
    let harness = Harness::new();
    let volume_x = volume("volume-x", None, Some("ps-1"), VolumeType::Data);
    harness.inventory.add_volume(volume_x.clone());
    harness.inventory.add_snapshot(snapshot(
        "S1",
        "volume-x",
        "C1",
        None,
        VolumeSnapshotType::Hypervisor,
    ));
    harness.inventory.add_snapshot(snapshot(
        "S2",
        "volume-x",
        "C1",
        Some("S1"),
        VolumeSnapshotType::Hypervisor,
    ));

    let result = harness
        .system
        .engine
        .cascade(action(
            ActionCode::Delete,
            resource_types::VOLUME,
            vec![volume_x.into()],
        ))
        .await;

    assert!(result.is_ok());
    let sent = harness.fabric.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].resource_uuid, "volume-x");
    assert_eq!(
        sent[0].body,
        MessageBody::VolumeSnapshotDeletion {
            snapshot_uuid: "S1".to_string(),
            tree_uuid: "C1".to_string(),
            volume_uuid: Some("volume-x".to_string()),
            volume_deletion: true,
        }
    );
}

#[tokio::test]
async fn test_storage_snapshot_tree_is_left_alone_on_volume_delete() {
    let harness = Harness::new();
    let volume_x = volume("volume-x", None, Some("ps-1"), VolumeType::Data);
    harness.inventory.add_volume(volume_x.clone());
    harness.inventory.add_snapshot(snapshot(
        "S1",
        "volume-x",
        "C1",
        None,
        VolumeSnapshotType::Storage,
    ));

    let result = harness
        .system
        .engine
        .cascade(action(
            ActionCode::Delete,
            resource_types::VOLUME,
            vec![volume_x.into()],
        ))
        .await;

    assert!(result.is_ok());
    assert!(harness.fabric.sent_messages().is_empty());
}

#[tokio::test]
async fn test_force_delete_vm_without_snapshots_sends_nothing() {
    let harness = Harness::new();
    let vm_y = vm("vm-y", "h1", "root-y");
    harness.inventory.add_vm_instance(vm_y.clone());
    harness
        .inventory
        .add_volume(volume("root-y", Some("vm-y"), Some("ps-1"), VolumeType::Root));

    let result = harness
        .system
        .engine
        .cascade(action(
            ActionCode::ForceDelete,
            resource_types::VM_INSTANCE,
            vec![vm_y.into()],
        ))
        .await;

    assert!(result.is_ok());
    assert!(harness.fabric.sent_messages().is_empty());
}

#[tokio::test]
async fn test_direct_snapshot_delete_only_physically_deletes_chain_roots() {
    let harness = Harness::new();
    let root = snapshot("S1", "vol-1", "C1", None, VolumeSnapshotType::Hypervisor);
    let child = snapshot("S2", "vol-1", "C1", Some("S1"), VolumeSnapshotType::Hypervisor);
    let storage = snapshot("S3", "vol-1", "C2", None, VolumeSnapshotType::Storage);

    for non_root in [child, storage] {
        let result = harness
            .system
            .engine
            .cascade_full(action(
                ActionCode::Delete,
                resource_types::VOLUME_SNAPSHOT,
                vec![non_root.into()],
            ))
            .await;
        assert!(result.is_ok());
    }
    assert!(harness.fabric.sent_messages().is_empty());

    let result = harness
        .system
        .engine
        .cascade_full(action(
            ActionCode::Delete,
            resource_types::VOLUME_SNAPSHOT,
            vec![root.into()],
        ))
        .await;

    assert!(result.is_ok());
    let sent = harness.fabric.sent_messages();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0].body,
        MessageBody::VolumeSnapshotDeletion { snapshot_uuid, volume_deletion: false, .. }
            if snapshot_uuid == "S1"
    ));
}

#[tokio::test]
async fn test_host_delete_reaches_snapshots_before_destroying_vms() {
    let harness = Harness::new();
    let h1 = host("h1", "cluster-1");
    harness.inventory.add_host(h1.clone());
    harness.inventory.add_vm_instance(vm("vm-1", "h1", "root-1"));
    harness
        .inventory
        .add_volume(volume("root-1", Some("vm-1"), Some("ps-1"), VolumeType::Root));
    harness.inventory.add_snapshot(snapshot(
        "S1",
        "root-1",
        "T1",
        None,
        VolumeSnapshotType::Hypervisor,
    ));

    let result = harness
        .system
        .engine
        .cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1.into()]))
        .await;

    assert!(result.is_ok());
    let names: Vec<&str> = harness
        .fabric
        .sent_messages()
        .iter()
        .map(|msg| msg.body.name())
        .collect();
    assert_eq!(names, vec!["VolumeSnapshotDeletionMsg", "DestroyVmInstanceMsg"]);
}

#[tokio::test]
async fn test_downstream_failure_stops_delete_before_parent_handler() {
    let harness = Harness::new();
    let h1 = host("h1", "cluster-1");
    harness.inventory.add_host(h1.clone());
    harness.inventory.add_vm_instance(vm("vm-1", "h1", "root-1"));
    harness.inventory.add_snapshot(snapshot(
        "S1",
        "root-1",
        "T1",
        None,
        VolumeSnapshotType::Hypervisor,
    ));
    harness.fail_service(services::VOLUME_SNAPSHOT, "snapshot busy");

    let error = harness
        .system
        .engine
        .cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1.into()]))
        .await
        .unwrap_err();

    assert_eq!(error.description, "snapshot busy");
    assert!(harness.fabric.sent_to_service(services::VM_INSTANCE).is_empty());
}

#[tokio::test]
async fn test_check_deletable_derives_nothing_and_succeeds() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);

    let result = harness
        .system
        .engine
        .cascade(action(ActionCode::CheckDeletable, resource_types::HOST, vec![h1]))
        .await;

    assert!(result.is_ok());
    assert!(harness.fabric.sent_messages().is_empty());
}

#[tokio::test]
async fn test_cleanup_purges_soft_deleted_rows() {
    let harness = Harness::new();
    let vm_1 = vm("vm-1", "h1", "root-1");
    harness
        .inventory
        .mark_soft_deleted(resource_types::VM_INSTANCE, "vm-old");
    harness
        .inventory
        .mark_soft_deleted(resource_types::VOLUME_SNAPSHOT, "snap-old");

    let result = harness
        .system
        .engine
        .cascade_full(action(
            ActionCode::Cleanup,
            resource_types::VM_INSTANCE,
            vec![vm_1.into()],
        ))
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.inventory.soft_deleted_count(&resource_types::VM_INSTANCE), 0);
    assert_eq!(
        harness
            .inventory
            .soft_deleted_count(&resource_types::VOLUME_SNAPSHOT),
        0
    );
    assert!(harness.fabric.sent_messages().is_empty());
}

#[test]
fn test_mismatched_root_context_is_rejected() {
    let error = CascadeAction::new(
        ActionCode::Delete,
        resource_types::VOLUME,
        vec![host("h1", "cluster-1").into()],
    )
    .unwrap_err();

    assert!(matches!(error, CascadeError::MalformedAction { .. }));
}

const SCRIPTED: ResourceTypeName = ResourceTypeName::from_static("ScriptedVO");

/// Reacts to hosts; derivation and handling are scripted per test
struct ScriptedExtension {
    derive: fn(&CascadeAction) -> CascadeResult<Option<CascadeAction>>,
    handle: fn(&CascadeAction) -> CompletionResult,
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl CascadeExtension for ScriptedExtension {
    fn cascade_resource_name(&self) -> ResourceTypeName {
        SCRIPTED
    }

    fn edge_names(&self) -> Vec<ResourceTypeName> {
        vec![resource_types::HOST]
    }

    async fn cascade(&self, action: &CascadeAction) -> CompletionResult {
        self.handled.fetch_add(1, Ordering::SeqCst);
        (self.handle)(action)
    }

    async fn create_action_for_child_resource(
        &self,
        action: &CascadeAction,
    ) -> CascadeResult<Option<CascadeAction>> {
        (self.derive)(action)
    }
}

fn harness_with_scripted(
    derive: fn(&CascadeAction) -> CascadeResult<Option<CascadeAction>>,
) -> (Harness, Arc<AtomicUsize>) {
    harness_with_scripted_handler(derive, |_| Ok(()))
}

fn harness_with_scripted_handler(
    derive: fn(&CascadeAction) -> CascadeResult<Option<CascadeAction>>,
    handle: fn(&CascadeAction) -> CompletionResult,
) -> (Harness, Arc<AtomicUsize>) {
    let handled = Arc::new(AtomicUsize::new(0));
    let scripted = Arc::new(ScriptedExtension {
        derive,
        handle,
        handled: Arc::clone(&handled),
    });
    let harness = Harness::with_catalog(move |repository, fabric| {
        ExtensionCatalog::with_builtin(repository, fabric).cascade_extension(scripted)
    });
    (harness, handled)
}

#[tokio::test]
async fn test_child_issued_by_foreign_type_fails_before_fanout() {
    let (harness, handled) =
        harness_with_scripted(|action| Ok(Some(action.derive(resource_types::VOLUME, vec![])?)));
    let h1 = two_vms_on_one_host(&harness);

    let error = harness
        .system
        .engine
        .cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]))
        .await
        .unwrap_err();

    assert_eq!(error.code, codes::MALFORMED_ACTION);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert!(harness.fabric.sent_messages().is_empty());
}

#[tokio::test]
async fn test_derivation_error_fails_before_any_branch_runs() {
    let (harness, handled) = harness_with_scripted(|_| {
        Err(CascadeError::configuration("ScriptedVO", "inventory unavailable"))
    });
    let h1 = two_vms_on_one_host(&harness);

    let error = harness
        .system
        .engine
        .cascade(action(ActionCode::ForceDelete, resource_types::HOST, vec![h1]))
        .await
        .unwrap_err();

    assert_eq!(error.code, codes::CONFIGURATION);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert!(harness.fabric.sent_messages().is_empty());
}

#[tokio::test]
async fn test_sibling_branches_all_run() {
    let (harness, handled) = harness_with_scripted(|_| Ok(None));
    let h1 = two_vms_on_one_host(&harness);

    let result = harness
        .system
        .engine
        .cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]))
        .await;

    assert!(result.is_ok());
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(harness.fabric.sent_to_service(services::VM_INSTANCE).len(), 2);
}

#[tokio::test]
async fn test_async_cascade_resolves_the_completion() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);
    let (completion, rx) = Completion::channel();

    harness
        .system
        .engine
        .async_cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]), completion);

    assert_eq!(rx.await.unwrap(), Ok(()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_cascade_returns_success() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);
    let engine = Arc::clone(&harness.system.engine);

    let result = tokio::task::spawn_blocking(move || {
        engine.sync_cascade(
            action(ActionCode::Delete, resource_types::HOST, vec![h1]),
            Duration::from_secs(5),
        )
    })
    .await
    .unwrap();

    assert!(result.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_cascade_times_out_on_slow_replies() {
    let harness = Harness::new();
    let h1 = two_vms_on_one_host(&harness);
    harness
        .fabric
        .set_async_handler(services::VM_INSTANCE, |_message| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            MessageReply::ok()
        });
    let engine = Arc::clone(&harness.system.engine);

    let result = tokio::task::spawn_blocking(move || {
        engine.sync_cascade(
            action(ActionCode::Delete, resource_types::HOST, vec![h1]),
            Duration::from_millis(100),
        )
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(CascadeError::Timeout { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_system_sync_cascade_is_bounded_by_configured_default_timeout() {
    let mut config = CascadeConfig::default();
    config.completion.default_timeout_ms = 100;
    let harness = Arc::new(Harness::with_config(config));
    let h1 = two_vms_on_one_host(&harness);
    harness
        .fabric
        .set_async_handler(services::VM_INSTANCE, |_message| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            MessageReply::ok()
        });

    let blocking = Arc::clone(&harness);
    let result = tokio::task::spawn_blocking(move || {
        blocking
            .system
            .sync_cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]))
    })
    .await
    .unwrap();

    match result {
        Err(CascadeError::Timeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(100))
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_system_sync_cascade_succeeds_within_default_timeout() {
    let harness = Arc::new(Harness::new());
    let h1 = two_vms_on_one_host(&harness);

    let blocking = Arc::clone(&harness);
    let result = tokio::task::spawn_blocking(move || {
        blocking
            .system
            .sync_cascade(action(ActionCode::Delete, resource_types::HOST, vec![h1]))
    })
    .await
    .unwrap();

    assert!(result.is_ok());
    assert_eq!(harness.fabric.sent_messages().len(), 2);
}

#[tokio::test]
async fn test_check_deletable_veto_fails_the_cascade() {
    let (harness, handled) = harness_with_scripted_handler(
        |_| Ok(None),
        |action| match action.action_code() {
            ActionCode::CheckDeletable => {
                Err(CascadeError::veto("host h1 still hosts a scripted resource").into())
            }
            _ => Ok(()),
        },
    );
    let h1 = two_vms_on_one_host(&harness);

    let error = harness
        .system
        .engine
        .cascade(action(ActionCode::CheckDeletable, resource_types::HOST, vec![h1]))
        .await
        .unwrap_err();

    assert_eq!(error.description, "host h1 still hosts a scripted resource");
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert!(harness.fabric.sent_messages().is_empty());
}
