// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A 32-bit VM cell. Every operand slot, stack slot, and global-memory cell
/// is a `Value`; the opcode consuming it decides whether to read it as a
/// signed integer, unsigned integer, float, or opaque handle/address. No
/// runtime type tag is stored, matching the source interpreter's bare
/// `rtmc_value_t` union.
#[derive(Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct Value(pub u32);

impl Value {
    pub const ZERO: Self = Self(0);

    pub fn from_i32(v: i32) -> Self {
        Self(v as u32)
    }

    pub fn from_u32(v: u32) -> Self {
        Self(v)
    }

    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits())
    }

    /// A small-integer handle (task/semaphore/queue id, global address, …)
    /// encoded the same way an unsigned value is.
    pub fn from_handle(v: u32) -> Self {
        Self(v)
    }

    pub fn as_i32(self) -> i32 {
        self.0 as i32
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }

    pub fn as_handle(self) -> u32 {
        self.0
    }

    /// Truthiness used by `JUMPIF_TRUE`/`JUMPIF_FALSE`: non-zero as a signed
    /// 32-bit integer.
    pub fn is_truthy(self) -> bool {
        self.as_i32() != 0
    }

    pub fn from_bool(b: bool) -> Self {
        Self(b as u32)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::from_i32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::from_u32(v)
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Value({:#010x})", self.0)
    }
}
