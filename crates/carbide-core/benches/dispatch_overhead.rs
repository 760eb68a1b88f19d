//! Dispatch and pooling overhead on the host reference driver
//!
//! Measures the cost of the core's bookkeeping (lifecycle checks, argument
//! marshalling, shape derivation) rather than kernel runtime, which is why
//! everything goes through the no-op kernel and small buffers.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use carbide_core::{BackendRegistry, ComputeArgs, ComputeBuffer, ComputeContext, ComputeSize, MemoryPool};

fn host_context() -> ComputeContext {
    let registry = BackendRegistry::new();
    let device = registry.create_device().expect("host device");
    device.create_context()
}

fn benchmark_noop_dispatch(c: &mut Criterion) {
    let context = host_context();
    let queue = context.create_queue().expect("queue");
    let module = context.load_module_source("").expect("module");
    let noop = module.get_function("noop").expect("noop kernel");

    let global = ComputeSize::linear(1024).expect("global size");
    let group = ComputeSize::linear(256).expect("group size");
    let args = ComputeArgs::new();

    c.bench_function("dispatch_noop", |b| {
        b.iter(|| {
            queue
                .dispatch(black_box(&noop), black_box(global), black_box(group), black_box(&args))
                .expect("dispatch");
        });
    });
}

fn benchmark_copy_dispatch(c: &mut Criterion) {
    let context = host_context();
    let queue = context.create_queue().expect("queue");
    let module = context.load_module_source("").expect("module");
    let copy = module.get_function("copy").expect("copy kernel");

    let mut group_bench = c.benchmark_group("dispatch_copy");
    for size in [1_024u64, 65_536, 1_048_576] {
        let src = context.allocate_bytes(size).expect("src");
        let dst = context.allocate_bytes(size).expect("dst");
        let args = ComputeArgs::new()
            .buffer(&src)
            .expect("src arg")
            .buffer(&dst)
            .expect("dst arg");

        let global = ComputeSize::linear(size as i64).expect("global size");
        let group = ComputeSize::linear(256).expect("group size");

        group_bench.bench_function(format!("{size}B"), |b| {
            b.iter(|| {
                queue
                    .dispatch(black_box(&copy), black_box(global), black_box(group), black_box(&args))
                    .expect("dispatch");
            });
        });
    }
    group_bench.finish();
}

fn benchmark_pool_reuse(c: &mut Criterion) {
    let context = host_context();

    c.bench_function("allocate_free_cycle", |b| {
        b.iter(|| {
            let buffer = context.allocate_bytes(black_box(65_536)).expect("allocate");
            black_box(&buffer);
            carbide_core::Freeable::free(&buffer).expect("free");
        });
    });

    let pool: MemoryPool<u64, ComputeBuffer> = context.create_pool();
    c.bench_function("pool_acquire_release_cycle", |b| {
        b.iter(|| {
            let lease = pool
                .acquire(black_box(65_536), || context.allocate_bytes(65_536))
                .expect("acquire");
            black_box(&*lease);
        });
    });
}

criterion_group!(
    benches,
    benchmark_noop_dispatch,
    benchmark_copy_dispatch,
    benchmark_pool_reuse
);
criterion_main!(benches);
