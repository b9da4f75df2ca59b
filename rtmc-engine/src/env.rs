// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seam between the Execution Engine and everything it dispatches to:
//! global memory, the RTOS Bridge, the Hardware Abstraction layer, and the
//! diagnostic channel.
//!
//! Modeled on the teacher's `task-hiffy` interpreter, which is generic over
//! a `Functions` table of host callbacks (I2C, GPIO, sensor reads, …) so
//! the HIF bytecode stays host-agnostic; here `Environment` plays that
//! role, implemented once by `rtmc-vm`'s VM Controller, which is the sole
//! owner of the Program Image's sibling tables.

use rtmc_abi::{KernelFault, Value};

/// One registered `SYSCALL` native callback: pops its arguments from (and
/// pushes its result to) the slice the engine hands it, exactly like a
/// `CALL`/`RET` pair.
pub type NativeCallback = fn(args: &[Value]) -> Value;

/// Everything the Execution Engine needs from the outside world to
/// dispatch a single instruction. All methods take `&mut self` uniformly:
/// even read-only-looking operations (`read_global`) may need to log or
/// update cached state (trace counters, lazily-initialised records).
pub trait Environment {
    fn read_global(&mut self, addr: u32) -> Value;
    fn write_global(&mut self, addr: u32, value: Value);

    /// `RTOS_CREATE_TASK`: allocates a Task record, spawns its Execution
    /// Context at `entry_pc`, and asks the host kernel to schedule it.
    /// Returns the new VM-level task handle.
    fn create_task(
        &mut self,
        entry_pc: u32,
        priority: u8,
        core: u8,
        stack_size: u32,
    ) -> Result<u32, KernelFault>;
    fn delete_task(&mut self, task: u32);
    fn suspend_task(&mut self, task: u32);
    fn resume_task(&mut self, task: u32);
    fn delay_ms(&mut self, ms: u32);
    fn yield_now(&mut self);

    fn semaphore_create(&mut self) -> Result<u32, KernelFault>;
    fn semaphore_take(&mut self, handle: u32, timeout_ms: i32) -> bool;
    fn semaphore_give(&mut self, handle: u32);

    fn queue_create(&mut self) -> Result<u32, KernelFault>;
    fn queue_send(&mut self, handle: u32, value: Value);
    fn queue_recv(&mut self, handle: u32, timeout_ms: i32) -> Option<Value>;

    fn gpio_init(&mut self, pin: u32, mode: u32) -> bool;
    fn gpio_set(&mut self, pin: u32, value: u32) -> bool;
    fn gpio_get(&mut self, pin: u32) -> Option<bool>;

    fn timer_init(&mut self, timer: u32, frequency_hz: u32) -> bool;
    fn timer_start(&mut self, timer: u32) -> bool;
    fn timer_stop(&mut self, timer: u32) -> bool;
    fn timer_set_pwm_duty(&mut self, timer: u32, duty_percent: u32) -> bool;

    fn adc_init(&mut self, pin: u32) -> Option<u32>;
    fn adc_read(&mut self, channel: u32) -> Option<u32>;

    /// Looks up the `idx`-th registered `SYSCALL` callback, if any.
    fn native_callback(&self, idx: u32) -> Option<NativeCallback>;

    /// Emits a `[RTMC DEBUG]` diagnostic line (only when `debug`/`trace`
    /// mode is enabled; the implementation decides).
    fn diag_debug(&mut self, task_id: u32, pc: u32, message: &str);
    /// Emits a `[RTMC ERROR]` diagnostic line; always surfaced.
    fn diag_error(&mut self, task_id: u32, message: &str);
    /// Emits program output from `PRINT`/`PRINTF`, unconditionally — this is
    /// the running program's own diagnostic channel, distinct from the VM's
    /// `DEBUG`/`ERROR` classes.
    fn diag_print(&mut self, task_id: u32, message: &str);
}
