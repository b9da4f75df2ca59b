// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Fixed table capacities for the VM's bounded resources. The binary loader rejects any
/// image whose declared section counts exceed these; the VM Controller
/// rejects any live-allocation opcode (`RTOS_CREATE_TASK`, …) once the
/// corresponding table is full.
pub struct Limits;

impl Limits {
    pub const MAX_INSTRUCTIONS: usize = 10_000;
    pub const MAX_CONSTANTS: usize = 1_000;
    pub const MAX_STRINGS: usize = 500;
    pub const MAX_FUNCTIONS: usize = 100;
    pub const MAX_SYMBOLS: usize = 1_000;

    pub const MAX_TASKS: usize = 16;
    pub const MAX_SEMAPHORES: usize = 32;
    pub const MAX_MESSAGE_QUEUES: usize = 16;
    pub const MESSAGE_QUEUE_CAPACITY: usize = 10;

    pub const OPERAND_STACK_DEPTH: usize = 256;
    pub const CALL_STACK_DEPTH: usize = 32;

    pub const GLOBAL_MEMORY_SIZE: usize = 4_096;

    pub const MAX_GPIO_PINS: usize = 30;
    pub const MAX_TIMERS: usize = 8;
    pub const MAX_ADC_CHANNELS: usize = 4;

    pub const MAX_NAME_LEN: usize = 31;
    pub const MAX_STRING_LEN: usize = 63;

    /// Capacity of the `SYSCALL` native-callback table.
    pub const MAX_NATIVE_CALLBACKS: usize = 16;
}
