// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTOS Bridge: maps the VM's concurrency opcodes onto a
//! real kernel's scheduler, semaphores, and queues.
//!
//! [`Kernel`] is the seam, in the same spirit as Hubris's `userlib`:
//! one trait the engine programs against, with a host-side simulation
//! (`StdKernel`) for testing and a real backend (`rp2040` feature) for the
//! target board.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "std")]
mod std_kernel;

#[cfg(feature = "rp2040")]
mod rp2040_kernel;

#[cfg(feature = "std")]
pub use std_kernel::StdKernel;

#[cfg(feature = "rp2040")]
pub use rp2040_kernel::Rp2040Kernel;

use rtmc_abi::KernelFault;

/// Opaque handle to a kernel-owned task, returned by [`Kernel::create_task`]
/// and threaded back through `RTOS_DELETE_TASK`/`RTOS_SUSPEND_TASK`/
/// `RTOS_RESUME_TASK`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskHandle(pub u32);

/// Opaque handle to a kernel-owned binary semaphore.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SemaphoreHandle(pub u32);

/// Opaque handle to a kernel-owned fixed-capacity queue.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueHandle(pub u32);

/// `-1` as a millisecond timeout means "wait forever".
pub const WAIT_FOREVER: i32 = -1;

/// The capacity of every VM-level message queue.
pub const QUEUE_CAPACITY: usize = 10;

/// A unit of work a created task runs: the execution loop closure supplied
/// by `rtmc-vm`. `'static` because the kernel may run it on a freshly
/// spawned native stack with no lifetime tying it back to the caller.
pub trait TaskBody: FnOnce() + Send + 'static {}
impl<T: FnOnce() + Send + 'static> TaskBody for T {}

/// Everything the Execution Engine needs from a real-time kernel to carry
/// out the RTOS opcode group.
///
/// Implementations are expected to be cheap to clone/share (a thin handle
/// to kernel state) since every task's execution loop holds one.
pub trait Kernel {
    /// Spawns a kernel task with the given priority, stack size, and core
    /// affinity, running `body`. `core` is a hint; implementations that
    /// cannot pin tasks to a specific core may ignore it.
    fn create_task(
        &self,
        priority: u8,
        core: u8,
        stack_size: usize,
        body: impl TaskBody,
    ) -> Result<TaskHandle, KernelFault>;

    /// Requests deletion of a kernel task. Idempotent: deleting an
    /// already-deleted handle is not an error.
    fn delete_task(&self, task: TaskHandle);

    /// Requests that a kernel task stop being scheduled without destroying
    /// it (`RTOS_SUSPEND_TASK`).
    fn suspend_task(&self, task: TaskHandle);

    /// Reverses [`Self::suspend_task`] (`RTOS_RESUME_TASK`).
    fn resume_task(&self, task: TaskHandle);

    /// Blocks the calling task for at least `ms` milliseconds, converting
    /// to the kernel's native tick rate.
    fn delay_ms(&self, ms: u32);

    /// Cooperative yield hint; a no-op under a strictly preemptive kernel
    /// but harmless.
    fn yield_now(&self);

    /// Creates a binary semaphore (count = 1, max = 1).
    fn create_semaphore(&self) -> Result<SemaphoreHandle, KernelFault>;

    /// Waits up to `timeout_ms` (or forever if [`WAIT_FOREVER`]) for `sem`.
    /// Returns `true` on acquisition, `false` on timeout.
    fn semaphore_take(&self, sem: SemaphoreHandle, timeout_ms: i32) -> bool;

    /// Releases `sem`.
    fn semaphore_give(&self, sem: SemaphoreHandle);

    /// Releases the kernel resources backing `sem`. Called once, by
    /// `destroy()`, after every task referencing it has already stopped.
    /// Idempotent: deleting an already-deleted handle is not an error.
    fn delete_semaphore(&self, sem: SemaphoreHandle);

    /// Creates a fixed-capacity queue of [`QUEUE_CAPACITY`] `Value`-sized
    /// cells.
    fn create_queue(&self) -> Result<QueueHandle, KernelFault>;

    /// Non-blocking send; drops the value silently if the queue is full.
    fn queue_send(&self, queue: QueueHandle, value: u32);

    /// Waits up to `timeout_ms` for a value on `queue`. `None` on timeout.
    fn queue_recv(&self, queue: QueueHandle, timeout_ms: i32) -> Option<u32>;

    /// Releases the kernel resources backing `queue`. Called once, by
    /// `destroy()`, after every task referencing it has already stopped.
    /// Idempotent: deleting an already-deleted handle is not an error.
    fn delete_queue(&self, queue: QueueHandle);
}
