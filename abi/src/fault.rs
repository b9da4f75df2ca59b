// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::Opcode;
use core::fmt;

/// Which bounded table a loader or opcode ran out of room in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Table {
    Instructions,
    Constants,
    Strings,
    Functions,
    Symbols,
    Tasks,
    Semaphores,
    MessageQueues,
    AdcChannels,
    NativeCallbacks,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Table::Instructions => "instructions",
            Table::Constants => "constants",
            Table::Strings => "strings",
            Table::Functions => "functions",
            Table::Symbols => "symbols",
            Table::Tasks => "tasks",
            Table::Semaphores => "semaphores",
            Table::MessageQueues => "message queues",
            Table::AdcChannels => "ADC channels",
            Table::NativeCallbacks => "native callbacks",
        };
        f.write_str(s)
    }
}

/// Returned by `load()` when a binary image fails validation; the VM is
/// left unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageError {
    /// Buffer is shorter than a header, or a declared section runs past the
    /// end of the buffer.
    SizeOverflow,
    BadMagic,
    BadVersion,
    CrcMismatch { expected: u32, computed: u32 },
    TableOverflow(Table),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::SizeOverflow => {
                write!(f, "image buffer too short for its declared sections")
            }
            ImageError::BadMagic => write!(f, "bad magic number"),
            ImageError::BadVersion => write!(f, "unsupported image version"),
            ImageError::CrcMismatch { expected, computed } => write!(
                f,
                "CRC-32 mismatch: header says {expected:#010x}, body computes to {computed:#010x}"
            ),
            ImageError::TableOverflow(table) => {
                write!(f, "image declares more {table} than the VM supports")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ImageError {}

/// A live-allocation opcode hit a full table. Surfaced to the caller as a
/// zero/sentinel push plus an error log; the task is not faulted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Task,
    Semaphore,
    Queue,
    Adc,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Task => "task",
            ResourceKind::Semaphore => "semaphore",
            ResourceKind::Queue => "message queue",
            ResourceKind::Adc => "ADC channel",
        };
        f.write_str(s)
    }
}

/// Terminates the faulting task only; the rest of the VM keeps running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VmFault {
    StackOverflow,
    StackUnderflow,
    CallStackOverflow,
    CallStackUnderflow,
    DivisionByZero,
    InvalidOpcode(u8),
    /// A recognised but never-specified opcode: the
    /// struct/array/frame family, or the UART/SPI/I2C bus family.
    Unsupported(Opcode),
}

impl fmt::Display for VmFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmFault::StackOverflow => write!(f, "operand stack overflow"),
            VmFault::StackUnderflow => write!(f, "operand stack underflow"),
            VmFault::CallStackOverflow => write!(f, "call stack overflow"),
            VmFault::CallStackUnderflow => write!(f, "call stack underflow"),
            VmFault::DivisionByZero => write!(f, "division by zero"),
            VmFault::InvalidOpcode(op) => write!(f, "invalid opcode {op:#04x}"),
            VmFault::Unsupported(op) => write!(f, "unsupported opcode {op:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VmFault {}

/// Propagated to the opcode's caller as a zero/sentinel push and logged;
/// never fatal to the VM.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelFault {
    TaskCreateFailed,
    SemaphoreCreateFailed,
    QueueCreateFailed,
}

impl fmt::Display for KernelFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelFault::TaskCreateFailed => "kernel task creation failed",
            KernelFault::SemaphoreCreateFailed => "kernel semaphore creation failed",
            KernelFault::QueueCreateFailed => "kernel queue creation failed",
        };
        f.write_str(s)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KernelFault {}
