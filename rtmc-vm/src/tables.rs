// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The live-object tables the VM Controller owns: tasks, semaphores, message
//! queues, and the `SYSCALL` native-callback table. Indices
//! into each `heapless::Vec` *are* the VM-level handles an RTOS opcode pushes
//! or pops — stable once assigned, per `SPEC_FULL.md`'s "arena+index"
//! resolution of the Context→VM back-reference cycle.

use rtmc_abi::{LifecycleState, Limits};
use rtmc_engine::NativeCallback;
use rtmc_rtos::{QueueHandle, SemaphoreHandle, TaskHandle};

/// A live task record. `kernel_handle` is `None` only for the
/// brief window between reserving a table slot and the `Kernel` call that
/// fills it in succeeding.
pub struct TaskRecord {
    pub name: heapless::String<{ Limits::MAX_NAME_LEN + 1 }>,
    pub entry_address: u32,
    pub priority: u8,
    pub core: u8,
    pub stack_size: u32,
    pub state: LifecycleState,
    pub kernel_handle: Option<TaskHandle>,
}

pub struct SemaphoreRecord {
    pub kernel_handle: SemaphoreHandle,
}

pub struct QueueRecord {
    pub name: heapless::String<{ Limits::MAX_NAME_LEN + 1 }>,
    pub message_type: u32,
    pub kernel_handle: QueueHandle,
}

/// Fixed-capacity tables, each guarded by one mutation lock. Reads of an already-assigned index never race a write
/// to a *different* index, but since `heapless::Vec` has no internal
/// synchronisation we still take the lock for reads — cheap, and correct
/// under the spec's "low rate" assumption.
#[derive(Default)]
pub struct Tables {
    pub tasks: heapless::Vec<TaskRecord, { Limits::MAX_TASKS }>,
    pub semaphores: heapless::Vec<SemaphoreRecord, { Limits::MAX_SEMAPHORES }>,
    pub queues: heapless::Vec<QueueRecord, { Limits::MAX_MESSAGE_QUEUES }>,
    pub native_callbacks: heapless::Vec<Option<NativeCallback>, { Limits::MAX_NATIVE_CALLBACKS }>,
}
