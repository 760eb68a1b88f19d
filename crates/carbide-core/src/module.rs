//! Loaded kernel containers and their entry points

use carbide_backends::{NativeFunction, NativeModule};

use crate::error::Result;

/// A loaded compute module containing one or more functions.
///
/// Modules are created by a [`crate::context::ComputeContext`] and act as a
/// lookup container for compiled kernels.
#[derive(Debug)]
pub struct ComputeModule {
    native: NativeModule,
}

impl ComputeModule {
    pub(crate) fn from_native(native: NativeModule) -> Self {
        Self { native }
    }

    /// Retrieve a function by name.
    pub fn get_function(&self, name: &str) -> Result<ComputeFunction> {
        let native = self.native.function(name)?;
        Ok(ComputeFunction { native })
    }
}

/// A compiled kernel inside a module.
#[derive(Debug, Clone)]
pub struct ComputeFunction {
    native: NativeFunction,
}

impl ComputeFunction {
    /// Entry point name
    pub fn name(&self) -> &str {
        self.native.name()
    }

    /// Maximum work-group size supported for this function
    pub fn max_work_group_size(&self) -> u32 {
        self.native.max_work_group_size()
    }

    pub(crate) fn native(&self) -> &NativeFunction {
        &self.native
    }
}
