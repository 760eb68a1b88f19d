//! Built-in kernel table for the host reference driver
//!
//! The host driver does not compile kernel sources; its modules resolve
//! functions against this fixed table. The set is intentionally small: just
//! enough to drive the dispatch protocol end-to-end (buffer arguments,
//! scalar arguments, grid-bounded iteration) without GPU hardware.

use rayon::prelude::*;

use super::memory::HostAllocation;
use crate::error::{DriverError, Result};
use crate::types::{LaunchShape, Scalar};

/// Argument list after buffer handles have been resolved to allocations.
pub(crate) enum ResolvedArg {
    Buffer(HostAllocation),
    Scalar(Scalar),
    Text(String),
}

pub(crate) type KernelFn = fn(&LaunchShape, &[ResolvedArg]) -> Result<()>;

/// One entry in the built-in kernel table.
#[derive(Clone, Copy)]
pub(crate) struct BuiltinKernel {
    pub(crate) name: &'static str,
    func: KernelFn,
}

impl BuiltinKernel {
    pub(crate) fn execute(&self, shape: &LaunchShape, args: &[ResolvedArg]) -> Result<()> {
        (self.func)(shape, args)
    }
}

/// Kernels the host driver exports.
///
/// - `noop` - retires immediately, arguments ignored
/// - `copy` - `(src buffer, dst buffer)`: byte copy of the common prefix
/// - `fill_f32` - `(dst buffer, f32 value)`: fill grid-bounded f32 elements
/// - `axpy_f32` - `(f32 a, x buffer, y buffer)`: `y[i] += a * x[i]`
const BUILTINS: &[BuiltinKernel] = &[
    BuiltinKernel {
        name: "noop",
        func: kernel_noop,
    },
    BuiltinKernel {
        name: "copy",
        func: kernel_copy,
    },
    BuiltinKernel {
        name: "fill_f32",
        func: kernel_fill_f32,
    },
    BuiltinKernel {
        name: "axpy_f32",
        func: kernel_axpy_f32,
    },
];

/// Look up a built-in kernel by name
pub(crate) fn builtin(name: &str) -> Option<BuiltinKernel> {
    BUILTINS.iter().copied().find(|kernel| kernel.name == name)
}

/// Names of every built-in kernel
pub(crate) fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|kernel| kernel.name)
}

// ================================================================================================
// Argument accessors
// ================================================================================================

fn expect_arg_count(kernel: &'static str, args: &[ResolvedArg], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(DriverError::InvalidArguments {
            kernel: kernel.to_string(),
            reason: format!("expected {expected} argument(s), got {}", args.len()),
        });
    }
    Ok(())
}

fn expect_buffer(kernel: &'static str, args: &[ResolvedArg], position: usize) -> Result<HostAllocation> {
    match &args[position] {
        ResolvedArg::Buffer(allocation) => Ok(allocation.clone()),
        ResolvedArg::Scalar(_) | ResolvedArg::Text(_) => Err(DriverError::InvalidArguments {
            kernel: kernel.to_string(),
            reason: format!("argument {position} must be a buffer"),
        }),
    }
}

fn expect_f32(kernel: &'static str, args: &[ResolvedArg], position: usize) -> Result<f32> {
    match &args[position] {
        ResolvedArg::Scalar(Scalar::F32(value)) => Ok(*value),
        ResolvedArg::Buffer(_) | ResolvedArg::Scalar(_) | ResolvedArg::Text(_) => {
            Err(DriverError::InvalidArguments {
                kernel: kernel.to_string(),
                reason: format!("argument {position} must be an f32 scalar"),
            })
        }
    }
}

fn read_f32(chunk: &[u8]) -> f32 {
    f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
}

// ================================================================================================
// Kernel bodies
// ================================================================================================

fn kernel_noop(_shape: &LaunchShape, _args: &[ResolvedArg]) -> Result<()> {
    Ok(())
}

/// Byte copy of the common prefix of two buffers.
///
/// The source is snapshotted before the destination lock is taken, so the
/// same buffer may appear as both operands without self-deadlock.
fn kernel_copy(_shape: &LaunchShape, args: &[ResolvedArg]) -> Result<()> {
    expect_arg_count("copy", args, 2)?;
    let src = expect_buffer("copy", args, 0)?;
    let dst = expect_buffer("copy", args, 1)?;

    let snapshot = src.lock().clone();

    let mut dst = dst.lock();
    let len = snapshot.len().min(dst.len());
    dst[..len].copy_from_slice(&snapshot[..len]);

    Ok(())
}

/// Fill grid-bounded f32 elements of the destination with a constant.
fn kernel_fill_f32(shape: &LaunchShape, args: &[ResolvedArg]) -> Result<()> {
    expect_arg_count("fill_f32", args, 2)?;
    let dst = expect_buffer("fill_f32", args, 0)?;
    let value = expect_f32("fill_f32", args, 1)?;

    let mut dst = dst.lock();
    let capacity = dst.len() / 4;
    let n = (shape.linear_invocations() as usize).min(capacity);

    let image = value.to_ne_bytes();
    for chunk in dst.chunks_exact_mut(4).take(n) {
        chunk.copy_from_slice(&image);
    }

    Ok(())
}

/// `y[i] += a * x[i]` over grid-bounded elements, parallel across chunks.
fn kernel_axpy_f32(shape: &LaunchShape, args: &[ResolvedArg]) -> Result<()> {
    expect_arg_count("axpy_f32", args, 3)?;
    let a = expect_f32("axpy_f32", args, 0)?;
    let x = expect_buffer("axpy_f32", args, 1)?;
    let y = expect_buffer("axpy_f32", args, 2)?;

    let x_snapshot = x.lock().clone();

    let mut y = y.lock();
    let n = (shape.linear_invocations() as usize)
        .min(x_snapshot.len() / 4)
        .min(y.len() / 4);

    y[..n * 4]
        .par_chunks_exact_mut(4)
        .zip(x_snapshot[..n * 4].par_chunks_exact(4))
        .for_each(|(y_chunk, x_chunk)| {
            let result = read_f32(y_chunk) + a * read_f32(x_chunk);
            y_chunk.copy_from_slice(&result.to_ne_bytes());
        });

    Ok(())
}

// ================================================================================================
// Tests
// ================================================================================================
