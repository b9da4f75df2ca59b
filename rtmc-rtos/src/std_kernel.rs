// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side kernel simulation used by `rtmc-cli` and the test suite.
//! Backed by `std::thread` and `std::sync`, the same way the pack's
//! daemon-shaped repos simulate a scheduler for host testing rather than
//! pulling in real kernel bindings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rtmc_abi::KernelFault;

use crate::{Kernel, QueueHandle, SemaphoreHandle, TaskBody, TaskHandle, QUEUE_CAPACITY, WAIT_FOREVER};

struct Semaphore {
    state: Mutex<bool>,
    cv: Condvar,
}

struct Queue {
    state: Mutex<VecDeque<u32>>,
    cv: Condvar,
}

/// A `Kernel` that runs each VM task on its own OS thread and implements
/// semaphores/queues with `std::sync` primitives. Priority and core
/// affinity are accepted but not enforced: the host OS scheduler decides.
#[derive(Default)]
pub struct StdKernel {
    next_handle: AtomicU32,
    semaphores: Mutex<heapless::FnvIndexMap<u32, Arc<Semaphore>, 64>>,
    queues: Mutex<heapless::FnvIndexMap<u32, Arc<Queue>, 64>>,
}

impl StdKernel {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl Kernel for StdKernel {
    fn create_task(
        &self,
        _priority: u8,
        _core: u8,
        _stack_size: usize,
        body: impl TaskBody,
    ) -> Result<TaskHandle, KernelFault> {
        let handle = TaskHandle(self.next());
        std::thread::Builder::new()
        .name(format!("rtmc-task-{}", handle.0))
        .spawn(body)
        .map_err(|_| KernelFault::TaskCreateFailed)?;
        Ok(handle)
    }

    fn delete_task(&self, _task: TaskHandle) {
        // OS threads can't be force-killed from the outside; the execution
        // loop itself observes `ctx.running == false` and exits.
    }

    fn suspend_task(&self, _task: TaskHandle) {
        // No host-thread suspend primitive; suspend state is tracked in the
        // Task record and checked by the owning execution loop instead.
    }

    fn resume_task(&self, _task: TaskHandle) {}

    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle, KernelFault> {
        let handle = self.next();
        // FreeRTOS's `xSemaphoreCreateBinary` (the real backend, see
        // `rp2040_kernel.rs`) starts a binary semaphore empty/taken: the
        // first `give` is what makes it takeable. A handoff semaphore is
        // routinely created before the producer has anything to hand off, and
        // must not be takeable until then.
        let sem = Arc::new(Semaphore {
            state: Mutex::new(false),
            cv: Condvar::new(),
        });
        self.semaphores
        .lock()
        .unwrap()
        .insert(handle, sem)
        .map_err(|_| KernelFault::SemaphoreCreateFailed)?;
        Ok(SemaphoreHandle(handle))
    }

    fn semaphore_take(&self, sem: SemaphoreHandle, timeout_ms: i32) -> bool {
        let Some(sem) = self.semaphores.lock().unwrap().get(&sem.0).cloned() else {
            return false;
        };
        let mut available = sem.state.lock().unwrap();
        if timeout_ms == WAIT_FOREVER {
            while !*available {
                available = sem.cv.wait(available).unwrap();
            }
            *available = false;
            true
        } else {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms.max(0) as u64);
            while !*available {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return false;
                }
                let (next, timed_out) = sem.cv.wait_timeout(available, remaining).unwrap();
                available = next;
                if timed_out.timed_out() && !*available {
                    return false;
                }
            }
            *available = false;
            true
        }
    }

    fn semaphore_give(&self, sem: SemaphoreHandle) {
        if let Some(sem) = self.semaphores.lock().unwrap().get(&sem.0).cloned() {
            *sem.state.lock().unwrap() = true;
            sem.cv.notify_one();
        }
    }

    fn delete_semaphore(&self, sem: SemaphoreHandle) {
        self.semaphores.lock().unwrap().remove(&sem.0);
    }

    fn create_queue(&self) -> Result<QueueHandle, KernelFault> {
        let handle = self.next();
        let queue = Arc::new(Queue {
            state: Mutex::new(VecDeque::with_capacity(QUEUE_CAPACITY)),
            cv: Condvar::new(),
        });
        self.queues
        .lock()
        .unwrap()
        .insert(handle, queue)
        .map_err(|_| KernelFault::QueueCreateFailed)?;
        Ok(QueueHandle(handle))
    }

    fn queue_send(&self, queue: QueueHandle, value: u32) {
        if let Some(queue) = self.queues.lock().unwrap().get(&queue.0).cloned() {
            let mut items = queue.state.lock().unwrap();
            if items.len() < QUEUE_CAPACITY {
                items.push_back(value);
                queue.cv.notify_one();
            }
            // Full queue: drop silently.
        }
    }

    fn queue_recv(&self, queue: QueueHandle, timeout_ms: i32) -> Option<u32> {
        let queue = self.queues.lock().unwrap().get(&queue.0).cloned()?;
        let mut items = queue.state.lock().unwrap();
        if timeout_ms == WAIT_FOREVER {
            while items.is_empty() {
                items = queue.cv.wait(items).unwrap();
            }
            items.pop_front()
        } else {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms.max(0) as u64);
            while items.is_empty() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return None;
                }
                let (next, _) = queue.cv.wait_timeout(items, remaining).unwrap();
                items = next;
            }
            items.pop_front()
        }
    }

    fn delete_queue(&self, queue: QueueHandle) {
        self.queues.lock().unwrap().remove(&queue.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semaphore_starts_taken() {
        let kernel = StdKernel::new();
        let sem = kernel.create_semaphore().unwrap();
        assert!(!kernel.semaphore_take(sem, 10));
        kernel.semaphore_give(sem);
        assert!(kernel.semaphore_take(sem, WAIT_FOREVER));
        assert!(!kernel.semaphore_take(sem, 10));
    }

    #[test]
    fn queue_is_fifo() {
        let kernel = StdKernel::new();
        let queue = kernel.create_queue().unwrap();
        kernel.queue_send(queue, 1);
        kernel.queue_send(queue, 2);
        kernel.queue_send(queue, 3);
        assert_eq!(kernel.queue_recv(queue, 0), Some(1));
        assert_eq!(kernel.queue_recv(queue, 0), Some(2));
        assert_eq!(kernel.queue_recv(queue, 0), Some(3));
        assert_eq!(kernel.queue_recv(queue, 50), None);
    }

    #[test]
    fn queue_drops_silently_when_full() {
        let kernel = StdKernel::new();
        let queue = kernel.create_queue().unwrap();
        for i in 0..(QUEUE_CAPACITY as u32 + 5) {
            kernel.queue_send(queue, i);
        }
        for i in 0..QUEUE_CAPACITY as u32 {
            assert_eq!(kernel.queue_recv(queue, 0), Some(i));
        }
        assert_eq!(kernel.queue_recv(queue, 10), None);
    }

    #[test]
    fn delete_semaphore_and_queue_remove_the_handle() {
        let kernel = StdKernel::new();
        let sem = kernel.create_semaphore().unwrap();
        let queue = kernel.create_queue().unwrap();
        kernel.delete_semaphore(sem);
        kernel.delete_queue(queue);
        assert!(!kernel.semaphore_take(sem, 0));
        assert_eq!(kernel.queue_recv(queue, 0), None);
    }
}
