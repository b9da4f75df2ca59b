// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`Environment`] implementation: the one place VM-level RTOS/hardware
//! opcodes get translated into calls on the real `Kernel`/`Peripherals`
//! backends and mutations of the VM Controller's tables. A cheap
//! `Arc`-backed handle, one instance per running task, exactly the way
//! `task-hiffy`'s board-specific `Functions` impls are the sole place HIF
//! opcodes touch real I2C/GPIO hardware.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rtmc_abi::{DiagFlags, KernelFault, Limits, Value};
use rtmc_engine::{Environment, NativeCallback};
use rtmc_hal::{GpioDirection, GpioPull, Peripherals};
use rtmc_ringbuf::TraceEntry;
use rtmc_rtos::Kernel;

use crate::shared::Shared;
use crate::tables::SemaphoreRecord;

pub struct EnvHandle<K, P> {
    pub shared: Arc<Shared<K, P>>,
}

impl<K, P> EnvHandle<K, P> {
    pub fn new(shared: Arc<Shared<K, P>>) -> Self {
        Self { shared }
    }
}

impl<K, P> Environment for EnvHandle<K, P>
where
K: Kernel + Send + Sync + 'static,
P: Peripherals + Send + 'static,
{
    fn read_global(&mut self, addr: u32) -> Value {
        Value::from_u32(self.shared.memory[addr as usize].load(Ordering::Relaxed))
    }

    fn write_global(&mut self, addr: u32, value: Value) {
        self.shared.memory[addr as usize].store(value.as_u32(), Ordering::Relaxed);
    }

    fn create_task(&mut self, entry_pc: u32, priority: u8, core: u8, stack_size: u32) -> Result<u32, KernelFault> {
        crate::controller::spawn_task(&self.shared, entry_pc, priority, core, stack_size)
    }

    fn delete_task(&mut self, task: u32) {
        let mut tables = self.shared.tables.lock().unwrap();
        if let Some(record) = tables.tasks.get_mut(task as usize) {
            record.state = rtmc_abi::LifecycleState::Deleted;
            let kernel_handle = record.kernel_handle;
            drop(tables);
            if let Some(h) = kernel_handle {
                self.shared.kernel.delete_task(h);
            }
        } else {
            self.diag_error(task, "RTOS_DELETE_TASK: invalid task handle");
        }
    }

    fn suspend_task(&mut self, task: u32) {
        let mut tables = self.shared.tables.lock().unwrap();
        if let Some(record) = tables.tasks.get_mut(task as usize) {
            if record.state != rtmc_abi::LifecycleState::Deleted {
                record.state = rtmc_abi::LifecycleState::Suspended;
            }
            let kernel_handle = record.kernel_handle;
            drop(tables);
            if let Some(h) = kernel_handle {
                self.shared.kernel.suspend_task(h);
            }
        } else {
            self.diag_error(task, "RTOS_SUSPEND_TASK: invalid task handle");
        }
    }

    fn resume_task(&mut self, task: u32) {
        let mut tables = self.shared.tables.lock().unwrap();
        if let Some(record) = tables.tasks.get_mut(task as usize) {
            if record.state == rtmc_abi::LifecycleState::Suspended {
                record.state = rtmc_abi::LifecycleState::Ready;
            }
            let kernel_handle = record.kernel_handle;
            drop(tables);
            if let Some(h) = kernel_handle {
                self.shared.kernel.resume_task(h);
            }
        } else {
            self.diag_error(task, "RTOS_RESUME_TASK: invalid task handle");
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        self.shared.kernel.delay_ms(ms);
    }

    fn yield_now(&mut self) {
        self.shared.kernel.yield_now();
    }

    fn semaphore_create(&mut self) -> Result<u32, KernelFault> {
        let mut tables = self.shared.tables.lock().unwrap();
        if tables.semaphores.len() >= Limits::MAX_SEMAPHORES {
            return Err(KernelFault::SemaphoreCreateFailed);
        }
        let kernel_handle = self.shared.kernel.create_semaphore()?;
        let id = tables.semaphores.len() as u32;
        // Capacity already checked above.
        let _ = tables.semaphores.push(SemaphoreRecord { kernel_handle });
        Ok(id)
    }

    fn semaphore_take(&mut self, handle: u32, timeout_ms: i32) -> bool {
        let kernel_handle = {
            let tables = self.shared.tables.lock().unwrap();
            tables.semaphores.get(handle as usize).map(|r| r.kernel_handle)
        };
        match kernel_handle {
            Some(kh) => self.shared.kernel.semaphore_take(kh, timeout_ms),
            None => {
                self.diag_error(0, "RTOS_SEMAPHORE_TAKE: invalid semaphore handle");
                false
            }
        }
    }

    fn semaphore_give(&mut self, handle: u32) {
        let kernel_handle = {
            let tables = self.shared.tables.lock().unwrap();
            tables.semaphores.get(handle as usize).map(|r| r.kernel_handle)
        };
        match kernel_handle {
            Some(kh) => self.shared.kernel.semaphore_give(kh),
            None => self.diag_error(0, "RTOS_SEMAPHORE_GIVE: invalid semaphore handle"),
        }
    }

    fn queue_create(&mut self) -> Result<u32, KernelFault> {
        // Not reachable from the opcode set: every queue in a loaded program
        // is declared up front by `MSG_DECLARE` and created during `load()`
        //. Kept so `Environment` stays a complete seam
        // for a future dynamic-queue opcode.
        let mut tables = self.shared.tables.lock().unwrap();
        if tables.queues.len() >= Limits::MAX_MESSAGE_QUEUES {
            return Err(KernelFault::QueueCreateFailed);
        }
        let kernel_handle = self.shared.kernel.create_queue()?;
        let id = tables.queues.len() as u32;
        let mut name: heapless::String<{ Limits::MAX_NAME_LEN + 1 }> = heapless::String::new();
        let _ = core::fmt::write(&mut name, format_args!("MessageQueue_{id}"));
        let _ = tables.queues.push(crate::tables::QueueRecord {
                name,
                message_type: 0,
                kernel_handle,
        });
        Ok(id)
    }

    fn queue_send(&mut self, handle: u32, value: Value) {
        let kernel_handle = {
            let tables = self.shared.tables.lock().unwrap();
            tables.queues.get(handle as usize).map(|r| r.kernel_handle)
        };
        match kernel_handle {
            Some(kh) => self.shared.kernel.queue_send(kh, value.as_u32()),
            None => self.diag_error(0, "MSG_SEND: invalid queue handle"),
        }
    }

    fn queue_recv(&mut self, handle: u32, timeout_ms: i32) -> Option<Value> {
        let kernel_handle = {
            let tables = self.shared.tables.lock().unwrap();
            tables.queues.get(handle as usize).map(|r| r.kernel_handle)
        };
        match kernel_handle {
            Some(kh) => self.shared.kernel.queue_recv(kh, timeout_ms).map(Value::from_u32),
            None => {
                self.diag_error(0, "MSG_RECV: invalid queue handle");
                None
            }
        }
    }

    fn gpio_init(&mut self, pin: u32, mode: u32) -> bool {
        let (direction, pull) = decode_gpio_mode(mode);
        self.shared.peripherals.lock().unwrap().gpio_init(pin, direction, pull).is_ok()
    }

    fn gpio_set(&mut self, pin: u32, value: u32) -> bool {
        self.shared.peripherals.lock().unwrap().gpio_set(pin, value != 0).is_ok()
    }

    fn gpio_get(&mut self, pin: u32) -> Option<bool> {
        self.shared.peripherals.lock().unwrap().gpio_get(pin).ok()
    }

    fn timer_init(&mut self, timer: u32, frequency_hz: u32) -> bool {
        self.shared.peripherals.lock().unwrap().timer_init(timer, frequency_hz).is_ok()
    }

    fn timer_start(&mut self, timer: u32) -> bool {
        self.shared.peripherals.lock().unwrap().timer_start(timer).is_ok()
    }

    fn timer_stop(&mut self, timer: u32) -> bool {
        self.shared.peripherals.lock().unwrap().timer_stop(timer).is_ok()
    }

    fn timer_set_pwm_duty(&mut self, timer: u32, duty_percent: u32) -> bool {
        self.shared.peripherals.lock().unwrap().timer_set_pwm_duty(timer, duty_percent).is_ok()
    }

    fn adc_init(&mut self, pin: u32) -> Option<u32> {
        self.shared.peripherals.lock().unwrap().adc_init(pin).ok()
    }

    fn adc_read(&mut self, channel: u32) -> Option<u32> {
        self.shared.peripherals.lock().unwrap().adc_read(channel).ok()
    }

    fn native_callback(&self, idx: u32) -> Option<NativeCallback> {
        self.shared.tables.lock().unwrap().native_callbacks.get(idx as usize).copied().flatten()
    }

    fn diag_debug(&mut self, task_id: u32, pc: u32, message: &str) {
        if self.shared.flags.contains(DiagFlags::DEBUG) {
            let name = task_name(&self.shared, task_id);
            log::debug!(target: "rtmc", "[RTMC DEBUG] task={name} pc={pc} {message}");
        }
        if self.shared.flags.contains(DiagFlags::TRACE) {
            self.shared.trace.lock().unwrap().push(TraceEntry { task_id, pc });
        }
    }

    fn diag_error(&mut self, task_id: u32, message: &str) {
        log::error!(target: "rtmc", "[RTMC ERROR] task={task_id} {message}");
    }

    fn diag_print(&mut self, task_id: u32, message: &str) {
        log::info!(target: "rtmc::print", "task={task_id} {message}");
    }
}

/// Resolves a task's synthesized `"Task-{id}"` name for the trace line.
/// `task_id` is the task's stable index into `tables.tasks`; falls back to
/// the bare id if the record isn't there (e.g. a fault during spawn, before
/// the record was pushed).
fn task_name<K, P>(shared: &Shared<K, P>, task_id: u32) -> heapless::String<{ Limits::MAX_NAME_LEN + 1 }> {
    let tables = shared.tables.lock().unwrap();
    match tables.tasks.get(task_id as usize) {
        Some(task) => task.name.clone(),
        None => {
            let mut name = heapless::String::new();
            let _ = core::fmt::write(&mut name, format_args!("Task-{task_id}"));
            name
        }
    }
}

/// `HW_GPIO_INIT`'s `mode` operand packs direction and pull into a single
/// word the way the original `rtmc_hw_gpio_init(vm, pin, mode)` does:
/// `0`=input/no-pull, `1`=output, `2`=input/pull-up, `3`=input/pull-down.
fn decode_gpio_mode(mode: u32) -> (GpioDirection, GpioPull) {
    match mode {
        1 => (GpioDirection::Out, GpioPull::None),
        2 => (GpioDirection::In, GpioPull::Up),
        3 => (GpioDirection::In, GpioPull::Down),
        _ => (GpioDirection::In, GpioPull::None),
    }
}
