//! Lifecycle invariants across buffers, queues, arenas, and pools

use carbide_core::{
    ArgValue, BackendRegistry, ComputeArgs, ComputeContext, Error, Freeable, MemoryPool, MemoryState,
};

fn context() -> ComputeContext {
    carbide_tracing::init_for_tests();
    let registry = BackendRegistry::new();
    let device = registry.create_device().expect("host device");
    device.create_context()
}

#[test]
fn free_is_idempotent() {
    let context = context();
    let buffer = context.allocate_bytes(64).unwrap();

    assert!(buffer.is_alive());
    buffer.free().unwrap();
    assert_eq!(buffer.state(), MemoryState::Free);

    // Second free is a no-op, not an error.
    buffer.free().unwrap();
    assert_eq!(buffer.state(), MemoryState::Free);
}

#[test]
fn operations_on_freed_buffer_fail() {
    let context = context();
    let buffer = context.allocate_bytes(64).unwrap();
    buffer.free().unwrap();

    assert!(matches!(buffer.write(&[0u8; 8]), Err(Error::DeadResource { .. })));
    let mut out = [0u8; 8];
    assert!(matches!(buffer.get(&mut out), Err(Error::DeadResource { .. })));
    assert!(matches!(buffer.duplicate(), Err(Error::DeadResource { .. })));
}

#[test]
fn clones_share_one_lifecycle() {
    let context = context();
    let buffer = context.allocate_bytes(16).unwrap();
    let handle = buffer.clone();

    buffer.free().unwrap();
    assert!(!handle.is_alive());
}

#[test]
fn freed_queue_rejects_synchronize() {
    let context = context();
    let queue = context.create_queue().unwrap();

    queue.free().unwrap();
    assert!(matches!(queue.synchronize(), Err(Error::DeadResource { .. })));
    queue.free().unwrap(); // still idempotent
}

#[test]
fn args_reject_dead_buffer_at_construction() {
    let context = context();
    let live = context.allocate_bytes(8).unwrap();
    let dead = context.allocate_bytes(8).unwrap();
    dead.free().unwrap();

    match ComputeArgs::of([ArgValue::from(&live), ArgValue::from(&dead)]) {
        Err(Error::DeadArgument { position: 1 }) => {}
        other => panic!("expected DeadArgument at 1, got {other:?}"),
    }

    match ComputeArgs::new().buffer(&dead) {
        Err(Error::DeadArgument { position: 0 }) => {}
        other => panic!("expected DeadArgument at 0, got {other:?}"),
    }
}

#[test]
fn arena_frees_buffers_on_close() {
    let context = context();
    let mut arena = context.create_arena();

    let queue = arena.create_queue().unwrap();
    let a = arena.allocate_bytes(32).unwrap();
    let b = arena.allocate_slice(&[1i32, 2, 3]).unwrap();
    let c = arena.allocate_half(&[1.0f32, 2.0]).unwrap();
    assert_eq!(arena.len(), 4);

    arena.close().unwrap();

    assert!(!queue.is_alive());
    assert!(!a.is_alive());
    assert!(!b.is_alive());
    assert!(!c.is_alive());
}

#[test]
fn arena_drop_frees_on_early_exit() {
    let context = context();

    fn early_exit(context: &ComputeContext) -> (carbide_core::ComputeBuffer, Result<(), Error>) {
        let mut arena = context.create_arena();
        let buffer = arena.allocate_bytes(8).unwrap();
        (buffer, Err(Error::NoBackend)) // arena drops here
    }

    let (buffer, _) = early_exit(&context);
    assert!(!buffer.is_alive());
}

#[test]
fn pool_reuses_buffers_across_cycles() {
    let context = context();
    let pool: MemoryPool<u64, carbide_core::ComputeBuffer> = context.create_pool();

    // First cycle: allocate, mark, retire.
    {
        let lease = pool.acquire(1024, || context.allocate_bytes(1024)).unwrap();
        lease.write(&[0xA5u8; 1024]).unwrap();
    }
    assert_eq!(pool.idle_count(), 1);

    // Second cycle under the same key: the marked buffer comes back, still
    // alive, without touching the allocator.
    {
        let lease = pool
            .acquire(1024, || panic!("allocator must not run on reuse"))
            .unwrap();
        let mut out = [0u8; 1024];
        lease.get(&mut out).unwrap();
        assert_eq!(out, [0xA5u8; 1024]);
    }

    // A different key allocates fresh.
    let lease = pool.acquire(2048, || context.allocate_bytes(2048)).unwrap();
    assert_eq!(lease.len(), 2048);
    lease.close();

    pool.free().unwrap();
    assert_eq!(pool.idle_count(), 0);
}

#[test]
fn pool_explicit_close_is_one_shot() {
    let context = context();
    let pool: MemoryPool<u32, carbide_core::ComputeBuffer> = context.create_pool();

    let lease = pool.acquire(7, || context.allocate_bytes(64)).unwrap();
    lease.close();
    assert_eq!(pool.idle_count(), 1);
}
