// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RT-Micro-C VM ABI: wire and logical types shared between the binary
//! loader, the execution engine, the RTOS bridge, and the hardware
//! abstraction layer.
//!
//! Kept `no_std` so it can be pulled directly into a Cortex-M target with no
//! adaptation, the same way the kernel/userspace split shares its `abi`
//! crate.

#![cfg_attr(not(feature = "std"), no_std)]

mod fault;
mod opcode;
mod table;
mod task;
mod value;

pub use fault::{ImageError, KernelFault, ResourceKind, Table, VmFault};
pub use opcode::Opcode;
pub use table::Limits;
pub use task::{DiagFlags, LifecycleState};
pub use value::Value;

/// Magic number at the start of every binary image: `'R','T','M','C'`, read
/// little-endian as a `u32`.
pub const IMAGE_MAGIC: u32 = 0x434D_5452;

/// The only binary image format version this VM understands.
pub const IMAGE_VERSION: u32 = 1;

/// A single decoded instruction: an opcode, up to four operand words, and
/// the source line it was compiled from (carried through purely for
/// diagnostics and trace output).
///
/// The opcode is kept as the raw byte from the image rather than a decoded
/// [`Opcode`]: the loader never rejects an unrecognised opcode value, it is
/// the *engine* that faults a task with `InvalidOpcode` the moment it tries
/// to dispatch one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode_raw: u8,
    pub operand_count: u8,
    pub operands: [Value; 4],
    pub line: u32,
}

impl Instruction {
    /// Operand `idx`, or a zero `Value` if the instruction was not encoded
    /// with that many operands. Opcodes always know their own arity, so this
    /// is only ever reached with `idx < operand_count`.
    pub fn operand(&self, idx: usize) -> Value {
        self.operands[idx]
    }

    /// Decodes [`Self::opcode_raw`] into an [`Opcode`], or `None` if the
    /// image contains a byte value the VM has never heard of.
    pub fn opcode(&self) -> Option<Opcode> {
        num_traits::FromPrimitive::from_u8(self.opcode_raw)
    }
}
