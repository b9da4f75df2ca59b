// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use num_derive::{FromPrimitive, ToPrimitive};

/// RT-Micro-C bytecode opcodes.
///
/// Numeric values match the `rtmc_opcode_t` enum of the original C
/// interpreter (`original_source/.../rtmc_interpreter.h`) so that images
/// produced by the existing compiler decode unchanged. A handful of values
/// declared there are never emitted by the dispatch switch of the original
/// interpreter (the struct/array/frame family, and the UART/SPI/I2C family);
/// those are kept here for binary compatibility but are rejected by the
/// engine with [`crate::VmFault::Unsupported`] rather than silently
/// misbehaving.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum Opcode {
    Jump = 1,
    JumpIfTrue,
    JumpIfFalse,
    Call,
    Ret,

    LoadConst,
    LoadVar,
    StoreVar,
    LoadStructMember,
    StoreStructMember,
    LoadStructMemberBit,
    StoreStructMemberBit,

    LoadAddr,
    LoadDeref,
    StoreDeref,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Not,
    Xor,

    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,

    AllocVar,
    FreeVar,
    AllocStruct,
    AllocFrame,
    FreeFrame,

    AllocArray,
    LoadArrayElem,
    StoreArrayElem,

    RtosCreateTask,
    RtosDeleteTask,
    RtosDelayMs,
    RtosSemaphoreCreate,
    RtosSemaphoreTake,
    RtosSemaphoreGive,
    RtosYield,
    RtosSuspendTask,
    RtosResumeTask,

    GlobalVarDeclare,

    MsgDeclare,
    MsgSend,
    MsgRecv,

    HwGpioInit,
    HwGpioSet,
    HwGpioGet,

    HwTimerInit,
    HwTimerStart,
    HwTimerStop,
    HwTimerSetPwmDuty,

    HwAdcInit,
    HwAdcRead,

    HwUartWrite,
    HwSpiTransfer,
    HwI2cWrite,
    HwI2cRead,

    Print,
    Printf,
    DbgBreakpoint,
    Syscall,

    Halt,
    Nop,
    Comment,
}

impl Opcode {
    /// True for the opcodes that set the program counter themselves; every
    /// other opcode advances PC by one after a successful step.
    pub fn sets_pc(self) -> bool {
        matches!(
            self,
            Opcode::Jump
            | Opcode::JumpIfTrue
            | Opcode::JumpIfFalse
            | Opcode::Call
            | Opcode::Ret
        )
    }

    /// True for opcodes that cooperatively yield the core after stepping.
    /// Harmless but redundant under a strictly preemptive kernel.
    pub fn yields_after(self) -> bool {
        matches!(self, Opcode::RtosYield | Opcode::RtosDelayMs)
    }

    /// The struct/array/frame opcode family the original compiler never
    /// settled a calling convention for. Parsed and
    /// named, never executed.
    pub fn is_unsupported_frame_op(self) -> bool {
        matches!(
            self,
            Opcode::LoadStructMember
            | Opcode::StoreStructMember
            | Opcode::LoadStructMemberBit
            | Opcode::StoreStructMemberBit
            | Opcode::AllocVar
            | Opcode::FreeVar
            | Opcode::AllocStruct
            | Opcode::AllocFrame
            | Opcode::FreeFrame
            | Opcode::AllocArray
            | Opcode::LoadArrayElem
            | Opcode::StoreArrayElem
        )
    }

    /// The serial/SPI/I2C bus family: declared in the original header, never
    /// implemented by the original dispatcher, and out of scope for this VM
    /// (only GPIO/PWM/ADC are implemented peripherals). Parsed and named,
    /// never executed.
    pub fn is_unsupported_bus_op(self) -> bool {
        matches!(
            self,
            Opcode::HwUartWrite | Opcode::HwSpiTransfer | Opcode::HwI2cWrite | Opcode::HwI2cRead
        )
    }
}
