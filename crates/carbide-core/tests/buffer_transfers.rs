//! Host round-trip laws for typed buffer transfers
//!
//! Writing an array whose byte size fits the buffer and reading it back
//! must reproduce the exact bit patterns for every supported element type.
//! Writes larger than the buffer fail with no partial write; reads into a
//! larger host array fail; reads into a smaller host array yield a prefix.

use carbide_core::{BackendRegistry, ComputeContext, Error, Freeable};

fn context() -> ComputeContext {
    carbide_tracing::init_for_tests();
    let registry = BackendRegistry::new();
    let device = registry.create_device().expect("host device");
    device.create_context()
}

fn roundtrip_exact<T: bytemuck::Pod + PartialEq + std::fmt::Debug>(context: &ComputeContext, data: &[T]) {
    let bytes = std::mem::size_of_val(data) as u64;
    let buffer = context.allocate_bytes(bytes).unwrap();

    buffer.write(data).unwrap();
    let mut out = vec![T::zeroed(); data.len()];
    buffer.get(&mut out).unwrap();

    assert_eq!(out.as_slice(), data);
    buffer.free().unwrap();
}

#[test]
fn roundtrip_i8() {
    let context = context();
    roundtrip_exact(&context, &[0i8, 1, -1, 42, i8::MIN, i8::MAX]);
}

#[test]
fn roundtrip_i16() {
    let context = context();
    roundtrip_exact(&context, &[0i16, -1, 42, -1234, i16::MIN, i16::MAX]);
}

#[test]
fn roundtrip_i32() {
    let context = context();
    roundtrip_exact(&context, &[0i32, -1, 42, -1337, i32::MIN, i32::MAX]);
}

#[test]
fn roundtrip_i64() {
    let context = context();
    roundtrip_exact(&context, &[0i64, -1, 42, -999_999_999, i64::MIN, i64::MAX]);
}

#[test]
fn roundtrip_f32_bit_patterns() {
    let context = context();
    let data = [0.0f32, -0.0, 1.25, -13.5, f32::MIN_POSITIVE, f32::MAX, f32::INFINITY, f32::NEG_INFINITY, f32::NAN];

    let buffer = context.allocate_slice(&data).unwrap();
    let mut out = [0.0f32; 9];
    buffer.get(&mut out).unwrap();

    for (expected, actual) in data.iter().zip(&out) {
        assert_eq!(expected.to_bits(), actual.to_bits());
    }
}

#[test]
fn roundtrip_f64_bit_patterns() {
    let context = context();
    let data = [0.0f64, -0.0, 1.5, -7.25, f64::MIN_POSITIVE, f64::MAX, f64::INFINITY, f64::NAN];

    let buffer = context.allocate_slice(&data).unwrap();
    let mut out = [0.0f64; 8];
    buffer.get(&mut out).unwrap();

    for (expected, actual) in data.iter().zip(&out) {
        assert_eq!(expected.to_bits(), actual.to_bits());
    }
}

#[test]
fn write_overflow_fails_without_partial_write() {
    let context = context();
    let buffer = context.allocate_bytes(8).unwrap();
    buffer.write(&[1u8; 8]).unwrap();

    let result = buffer.write(&[0i32; 4]);
    match result {
        Err(Error::OutOfRange { op: "write", requested: 16, capacity: 8 }) => {}
        other => panic!("expected OutOfRange, got {other:?}"),
    }

    // The original contents survived intact.
    let mut out = [0u8; 8];
    buffer.get(&mut out).unwrap();
    assert_eq!(out, [1u8; 8]);
}

#[test]
fn read_overflow_fails() {
    let context = context();
    let buffer = context.allocate_bytes(8).unwrap();

    let mut out = [0i64; 2];
    assert!(matches!(
        buffer.get(&mut out),
        Err(Error::OutOfRange { op: "read", requested: 16, capacity: 8 })
    ));
}

#[test]
fn read_underflow_yields_prefix() {
    let context = context();
    let data: Vec<i32> = (0..8).collect();
    let buffer = context.allocate_slice(&data).unwrap();

    let mut out = [0i32; 4];
    buffer.get(&mut out).unwrap();
    assert_eq!(out, [0, 1, 2, 3]);
}

#[test]
fn write_underflow_is_permitted() {
    let context = context();
    let buffer = context.allocate_bytes(32).unwrap();

    buffer.write(&[7u8; 8]).unwrap();
    let mut out = [0u8; 8];
    buffer.get(&mut out).unwrap();
    assert_eq!(out, [7u8; 8]);
}

#[test]
fn half_buffers_roundtrip_through_f32() {
    let context = context();
    let data = [0.0f32, -0.0, 1.0, -2.0, 0.5, 65504.0];

    let buffer = context.allocate_half(&data).unwrap();
    assert_eq!(buffer.len(), (data.len() * 2) as u64);

    let mut out = [0.0f32; 6];
    buffer.get_half(&mut out).unwrap();
    for (expected, actual) in data.iter().zip(&out) {
        assert_eq!(expected.to_bits(), actual.to_bits());
    }
}

#[test]
fn duplicate_copies_contents() {
    let context = context();
    let data: Vec<i32> = (0..64).collect();
    let buffer = context.allocate_slice(&data).unwrap();

    let copy = buffer.duplicate().unwrap();
    assert_eq!(copy.len(), buffer.len());

    let mut out = vec![0i32; 64];
    copy.get(&mut out).unwrap();
    assert_eq!(out, data);

    // Independent allocations: mutating the copy leaves the source alone.
    copy.write(&vec![0i32; 64]).unwrap();
    buffer.get(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn copy_into_rejects_smaller_destination() {
    let context = context();
    let src = context.allocate_bytes(16).unwrap();
    let dst = context.allocate_bytes(8).unwrap();

    assert!(matches!(
        src.copy_into(&dst),
        Err(Error::OutOfRange { op: "device copy", .. })
    ));
}

#[test]
fn copy_into_rejects_dead_peer() {
    let context = context();
    let src = context.allocate_bytes(8).unwrap();
    let dst = context.allocate_bytes(8).unwrap();

    dst.free().unwrap();
    assert!(matches!(src.copy_into(&dst), Err(Error::DeadPeer { .. })));
}

#[test]
fn zero_length_buffer_is_legal() {
    let context = context();
    let buffer = context.allocate_bytes(0).unwrap();
    assert!(buffer.is_empty());

    let empty: [u8; 0] = [];
    buffer.write(&empty).unwrap();
}
