//! Ordered, validated kernel-argument container
//!
//! Arguments are tagged at insertion time, so the dispatch marshaller can
//! match exhaustively instead of type-testing values at launch. Insertion
//! order is dispatch order (positional, matching native kernel parameter
//! order). Buffer arguments must be alive when added; the queue re-checks
//! them at dispatch time.

use carbide_backends::Scalar;

use crate::buffer::ComputeBuffer;
use crate::error::{Error, Result};
use crate::memory::Freeable;

/// One tagged argument value.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// Device buffer reference (pointer-sized slot at launch)
    Buffer(ComputeBuffer),
    /// Scalar (natively-sized slot at launch)
    Scalar(Scalar),
    /// Text, for drivers that accept it
    Text(String),
}

impl From<&ComputeBuffer> for ArgValue {
    fn from(buffer: &ComputeBuffer) -> Self {
        Self::Buffer(buffer.clone())
    }
}

impl From<ComputeBuffer> for ArgValue {
    fn from(buffer: ComputeBuffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<&str> for ArgValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

macro_rules! scalar_arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for ArgValue {
            fn from(value: $ty) -> Self {
                Self::Scalar(Scalar::$variant(value))
            }
        })*
    };
}

scalar_arg_from! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

/// Ordered heterogeneous argument list consumed by dispatch.
#[derive(Debug, Clone, Default)]
pub struct ComputeArgs {
    values: Vec<ArgValue>,
}

impl ComputeArgs {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an argument list, validating that every buffer value is alive.
    ///
    /// Fails with [`Error::DeadArgument`] naming the offending position.
    pub fn of<I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = ArgValue>,
    {
        let values: Vec<ArgValue> = values.into_iter().collect();
        for (position, value) in values.iter().enumerate() {
            if let ArgValue::Buffer(buffer) = value {
                if !buffer.is_alive() {
                    return Err(Error::DeadArgument { position });
                }
            }
        }
        Ok(Self { values })
    }

    /// Append a buffer argument, validating it is alive
    pub fn buffer(mut self, buffer: &ComputeBuffer) -> Result<Self> {
        if !buffer.is_alive() {
            return Err(Error::DeadArgument {
                position: self.values.len(),
            });
        }
        self.values.push(ArgValue::Buffer(buffer.clone()));
        Ok(self)
    }

    pub fn i8_val(mut self, value: i8) -> Self {
        self.values.push(ArgValue::Scalar(Scalar::I8(value)));
        self
    }

    pub fn i16_val(mut self, value: i16) -> Self {
        self.values.push(ArgValue::Scalar(Scalar::I16(value)));
        self
    }

    pub fn i32_val(mut self, value: i32) -> Self {
        self.values.push(ArgValue::Scalar(Scalar::I32(value)));
        self
    }

    pub fn i64_val(mut self, value: i64) -> Self {
        self.values.push(ArgValue::Scalar(Scalar::I64(value)));
        self
    }

    pub fn f32_val(mut self, value: f32) -> Self {
        self.values.push(ArgValue::Scalar(Scalar::F32(value)));
        self
    }

    pub fn f64_val(mut self, value: f64) -> Self {
        self.values.push(ArgValue::Scalar(Scalar::F64(value)));
        self
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.values.push(ArgValue::Text(value.into()));
        self
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Ordered view for the dispatch marshaller
    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }
}

// ================================================================================================
// Tests
// ================================================================================================
