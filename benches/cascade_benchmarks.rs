use std::sync::Arc;

use cascade_core::bootstrap::{CascadeSystem, ExtensionCatalog};
use cascade_core::cascade::{ActionCode, CascadeAction};
use cascade_core::config::CascadeConfig;
use cascade_core::constants::resource_types;
use cascade_core::messaging::{InMemoryFabric, MessagingFabric, ServiceAddressing};
use cascade_core::models::{HostInventory, VmInstanceInventory};
use cascade_core::repository::{CascadeRepository, InMemoryInventory};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_partition_of(c: &mut Criterion) {
    let addressing = ServiceAddressing::new(16);
    c.bench_function("partition_of", |b| {
        b.iter(|| addressing.partition_of(black_box("3f9a1c2e8b7d4e6fa0b1c2d3e4f5a6b7")))
    });
}

fn benchmark_host_force_delete(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("benchmark runtime");

    let inventory = Arc::new(InMemoryInventory::new());
    let host = HostInventory {
        uuid: "h1".to_string(),
        name: "h1".to_string(),
        cluster_uuid: "cluster-1".to_string(),
        hypervisor_type: "KVM".to_string(),
    };
    inventory.add_host(host.clone());
    for index in 0..64 {
        inventory.add_vm_instance(VmInstanceInventory {
            uuid: format!("vm-{index}"),
            name: format!("vm-{index}"),
            hypervisor_type: "KVM".to_string(),
            host_uuid: Some("h1".to_string()),
            cluster_uuid: Some("cluster-1".to_string()),
            root_volume_uuid: Some(format!("root-{index}")),
            all_volumes: Vec::new(),
        });
    }

    let repository: Arc<dyn CascadeRepository> = inventory;
    let fabric: Arc<dyn MessagingFabric> = Arc::new(InMemoryFabric::default());
    let catalog = ExtensionCatalog::with_builtin(&repository, &fabric);
    let system = {
        // engine keeps the benchmark runtime's handle
        let _guard = runtime.enter();
        CascadeSystem::bootstrap(CascadeConfig::default(), fabric, repository, catalog)
            .expect("bootstrap")
    };

    c.bench_function("host_force_delete_64_vms", |b| {
        b.iter(|| {
            let action =
                CascadeAction::new(ActionCode::ForceDelete, resource_types::HOST, vec![host.clone().into()])
                    .expect("action");
            runtime.block_on(system.engine.cascade(action))
        })
    });
}

criterion_group!(benches, benchmark_partition_of, benchmark_host_force_delete);
criterion_main!(benches);
