//! End-to-end dispatch through the host reference driver

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use carbide_core::{BackendRegistry, ComputeArgs, ComputeContext, ComputeSize, Error, Freeable};

fn context() -> ComputeContext {
    carbide_tracing::init_for_tests();
    let registry = BackendRegistry::new();
    let device = registry.create_device().expect("host device");
    device.create_context()
}

#[test]
fn write_dispatch_read_scenario() {
    // Allocate a 1024-byte buffer, write 256 int32 values, dispatch an
    // identity kernel, await completion, read back 256 int32 values.
    let context = context();
    let mut arena = context.create_arena();

    let queue = arena.create_queue().unwrap();
    let input = arena.allocate_bytes(1024).unwrap();
    let output = arena.allocate_bytes(1024).unwrap();

    let data: Vec<i32> = (0..256).collect();
    input.write(&data).unwrap();

    let module = context.load_module_source("copy\nnoop\n").unwrap();
    let kernel = module.get_function("copy").unwrap();
    assert_eq!(kernel.name(), "copy");
    assert!(kernel.max_work_group_size() >= 64);

    let args = ComputeArgs::new().buffer(&input).unwrap().buffer(&output).unwrap();
    queue
        .dispatch(
            &kernel,
            ComputeSize::linear(256).unwrap(),
            ComputeSize::linear(64).unwrap(),
            &args,
        )
        .unwrap();
    queue.synchronize().unwrap();

    let mut result = vec![0i32; 256];
    output.get(&mut result).unwrap();
    assert_eq!(result, data);

    arena.close().unwrap();
}

#[test]
fn noop_dispatch_leaves_buffer_untouched() {
    let context = context();
    let queue = context.create_queue().unwrap();

    let data: Vec<i32> = (0..64).collect();
    let buffer = context.allocate_slice(&data).unwrap();

    let module = context.load_module_source("").unwrap();
    let noop = module.get_function("noop").unwrap();

    let args = ComputeArgs::new().buffer(&buffer).unwrap();
    queue
        .dispatch(&noop, ComputeSize::linear(64).unwrap(), ComputeSize::linear(64).unwrap(), &args)
        .unwrap();

    let mut out = vec![0i32; 64];
    buffer.get(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn async_dispatch_resolves_an_event() {
    let context = context();
    let queue = context.create_queue().unwrap();

    let x = context.allocate_slice(&vec![1.0f32; 128]).unwrap();
    let y = context.allocate_slice(&vec![10.0f32; 128]).unwrap();

    let module = context.load_module_source("").unwrap();
    let axpy = module.get_function("axpy_f32").unwrap();

    let args = ComputeArgs::new().f32_val(2.5).buffer(&x).unwrap().buffer(&y).unwrap();
    let event = queue
        .dispatch_async(
            &axpy,
            ComputeSize::linear(128).unwrap(),
            ComputeSize::linear(32).unwrap(),
            &args,
        )
        .unwrap();

    event.wait().unwrap();
    assert!(event.is_completed());
    assert!(!event.is_failed());

    // Waiting again and observing through a clone are both idempotent.
    event.wait().unwrap();
    let observer = event.clone();
    observer.wait().unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&notified);
    event.on_completion(move |result| {
        assert!(result.is_ok());
        probe.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    let mut out = vec![0.0f32; 128];
    y.get(&mut out).unwrap();
    assert!(out.iter().all(|&v| v == 12.5));
}

#[test]
fn scalar_arguments_reach_the_kernel() {
    let context = context();
    let queue = context.create_queue().unwrap();

    let buffer = context.allocate_bytes(64 * 4).unwrap();
    let module = context.load_module_source("").unwrap();
    let fill = module.get_function("fill_f32").unwrap();

    let args = ComputeArgs::new().buffer(&buffer).unwrap().f32_val(3.25);
    queue
        .dispatch(
            &fill,
            ComputeSize::linear(64).unwrap(),
            ComputeSize::linear(16).unwrap(),
            &args,
        )
        .unwrap();

    let mut out = vec![0.0f32; 64];
    buffer.get(&mut out).unwrap();
    assert!(out.iter().all(|&v| v == 3.25));
}

#[test]
fn oversized_group_still_covers_the_problem() {
    let context = context();
    let queue = context.create_queue().unwrap();

    let buffer = context.allocate_bytes(8 * 4).unwrap();
    let module = context.load_module_source("").unwrap();
    let fill = module.get_function("fill_f32").unwrap();

    // Group larger than the global size: the effective local size is
    // clamped, one group runs.
    let args = ComputeArgs::new().buffer(&buffer).unwrap().f32_val(1.0);
    queue
        .dispatch(
            &fill,
            ComputeSize::linear(8).unwrap(),
            ComputeSize::linear(256).unwrap(),
            &args,
        )
        .unwrap();

    let mut out = vec![0.0f32; 8];
    buffer.get(&mut out).unwrap();
    assert!(out.iter().all(|&v| v == 1.0));
}

#[test]
fn dispatch_rejects_buffer_freed_after_arg_construction() {
    let context = context();
    let queue = context.create_queue().unwrap();

    let buffer = context.allocate_bytes(64).unwrap();
    let module = context.load_module_source("").unwrap();
    let noop = module.get_function("noop").unwrap();

    // Alive when added, freed before dispatch: the dispatch-time re-check
    // must catch it.
    let args = ComputeArgs::new().buffer(&buffer).unwrap();
    buffer.free().unwrap();

    let result = queue.dispatch(
        &noop,
        ComputeSize::linear(1).unwrap(),
        ComputeSize::linear(1).unwrap(),
        &args,
    );
    assert!(matches!(result, Err(Error::DeadArgument { position: 0 })));
}

#[test]
fn dispatch_on_freed_queue_fails() {
    let context = context();
    let queue = context.create_queue().unwrap();
    let module = context.load_module_source("").unwrap();
    let noop = module.get_function("noop").unwrap();

    queue.free().unwrap();

    let result = queue.dispatch(
        &noop,
        ComputeSize::linear(1).unwrap(),
        ComputeSize::linear(1).unwrap(),
        &ComputeArgs::new(),
    );
    assert!(matches!(result, Err(Error::DeadResource { .. })));
}

#[test]
fn missing_function_is_reported_by_name() {
    let context = context();
    let module = context.load_module_source("").unwrap();

    match module.get_function("transmogrify") {
        Err(Error::Driver(carbide_core::DriverError::FunctionNotFound { name })) => {
            assert_eq!(name, "transmogrify");
        }
        other => panic!("expected FunctionNotFound, got {other:?}"),
    }
}

#[test]
fn module_manifest_errors_surface() {
    let context = context();
    assert!(matches!(
        context.load_module_source("definitely_not_a_kernel"),
        Err(Error::Driver(carbide_core::DriverError::ModuleLoad { .. }))
    ));
}

#[test]
fn module_loads_from_disk() {
    let context = context();

    let dir = std::env::temp_dir().join("carbide-module-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("kernels.manifest");
    std::fs::write(&path, "copy\n").unwrap();

    let module = context.load_module(&path).unwrap();
    assert!(module.get_function("copy").is_ok());

    assert!(matches!(
        context.load_module(&dir.join("missing.manifest")),
        Err(Error::ModuleRead { .. })
    ));
}

#[test]
fn in_order_queue_applies_dispatches_sequentially() {
    let context = context();
    let queue = context.create_queue().unwrap();

    let buffer = context.allocate_bytes(16 * 4).unwrap();
    let module = context.load_module_source("").unwrap();
    let fill = module.get_function("fill_f32").unwrap();

    for value in [1.0f32, 2.0, 3.0] {
        let args = ComputeArgs::new().buffer(&buffer).unwrap().f32_val(value);
        queue
            .dispatch(
                &fill,
                ComputeSize::linear(16).unwrap(),
                ComputeSize::linear(16).unwrap(),
                &args,
            )
            .unwrap();
    }
    queue.synchronize().unwrap();

    // The last submission wins under in-order semantics.
    let mut out = vec![0.0f32; 16];
    buffer.get(&mut out).unwrap();
    assert!(out.iter().all(|&v| v == 3.0));
}
