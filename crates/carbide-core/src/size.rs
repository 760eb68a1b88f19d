//! Three-dimensional extents for grids and work-groups

use std::fmt;

use crate::error::{Error, Result};

/// Validated 3D extent used for global and group sizes in dispatch.
///
/// Every component must be a positive integer; construction fails otherwise.
/// The constructor takes signed inputs so negative values are caught at
/// runtime instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputeSize {
    x: u32,
    y: u32,
    z: u32,
}

impl ComputeSize {
    /// Create a new extent, validating every component.
    pub fn new(x: i64, y: i64, z: i64) -> Result<Self> {
        Ok(Self {
            x: Self::component('x', x)?,
            y: Self::component('y', y)?,
            z: Self::component('z', z)?,
        })
    }

    /// Create a 1D extent
    pub fn linear(x: i64) -> Result<Self> {
        Self::new(x, 1, 1)
    }

    fn component(axis: char, value: i64) -> Result<u32> {
        if value <= 0 || value > u32::MAX as i64 {
            return Err(Error::InvalidExtent { axis, value });
        }
        Ok(value as u32)
    }

    pub const fn x(&self) -> u32 {
        self.x
    }

    pub const fn y(&self) -> u32 {
        self.y
    }

    pub const fn z(&self) -> u32 {
        self.z
    }

    /// Effective work dimension: 1, 2, or 3 depending on non-unit components
    pub const fn work_dim(&self) -> u32 {
        if self.z > 1 {
            return 3;
        }
        if self.y > 1 {
            return 2;
        }
        1
    }

    /// Total invocation count across all axes
    pub const fn total(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Component-wise minimum; components stay positive by construction
    pub(crate) const fn component_min(&self, other: &Self) -> Self {
        Self {
            x: if self.x < other.x { self.x } else { other.x },
            y: if self.y < other.y { self.y } else { other.y },
            z: if self.z < other.z { self.z } else { other.z },
        }
    }

    pub(crate) const fn as_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for ComputeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ================================================================================================
// Tests
// ================================================================================================
