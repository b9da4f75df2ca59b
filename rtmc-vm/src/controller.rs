// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VM Controller: the lifecycle state machine a host
//! embeds — `create → load → run → stop → destroy` — and the task-spawn
//! machinery that turns `RTOS_CREATE_TASK` and the bootstrap `main` function
//! into a running kernel task.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rtmc_abi::{DiagFlags, KernelFault, LifecycleState, Limits, Opcode, Value};
use rtmc_engine::{run_context, Context, NativeCallback};
use rtmc_hal::Peripherals;
use rtmc_image::ProgramImage;
use rtmc_rtos::Kernel;

use crate::config::Config;
use crate::environment::EnvHandle;
use crate::error::VmError;
use crate::shared::Shared;
use crate::status::{VmState, VmStatus};
use crate::tables::{QueueRecord, SemaphoreRecord, TaskRecord};

/// Priority, core, and stack size the VM Controller bootstraps `main` with.
/// `spec.md` doesn't give the bootstrap task a distinguished priority, so it
/// runs at the lowest numeric priority (highest urgency, matching FreeRTOS
/// convention) on core 0 with a generous default stack.
const MAIN_TASK_PRIORITY: u8 = 0;
const MAIN_TASK_CORE: u8 = 0;
const MAIN_TASK_STACK_SIZE: u32 = 4096;

/// How often a suspended task's kernel thread polls for resume/stop. Real
/// suspend/resume is a VM Controller table flag, not a kernel primitive
/// (`rp2040_kernel.rs` and `std_kernel.rs` both leave `suspend_task`/
/// `resume_task` as no-ops), so the owning thread parks itself here instead
/// of spinning.
const SUSPEND_POLL_INTERVAL_MS: u32 = 10;

/// Embeddable VM Controller: one instance per loaded program, generic over
/// the RTOS Bridge and Hardware Abstraction backends so the same controller
/// code runs against `StdKernel`/`MockPeripherals` in tests and
/// `Rp2040Kernel`/`Rp2040Peripherals` on target.
pub struct VmController<K, P> {
    shared: Arc<Shared<K, P>>,
}

impl<K, P> VmController<K, P>
where
K: Kernel + Send + Sync + 'static,
P: Peripherals + Send + 'static,
{
    /// `spec.md` §6: `create(debug, trace)`, generalised to the full
    /// [`Config`] the control shell may supply.
    pub fn create(config: Config, kernel: K, peripherals: P) -> Self {
        Self {
            shared: Arc::new(Shared::new(kernel, peripherals, config.diag_flags())),
        }
    }

    /// Decodes and validates `image`, seeds global memory from
    /// `GLOBAL_VAR_DECLARE` instructions, and creates a message queue per
    /// `MSG_DECLARE` instruction. Leaves the VM
    /// unchanged on any error. Valid from `Created` (first load) or
    /// `Stopped` (re-load after a prior run), per `spec.md` §6.
    pub fn load(&self, image: &[u8]) -> Result<(), VmError> {
        let actual = *self.shared.state.lock().unwrap();
        if actual != VmState::Created && actual != VmState::Stopped {
            return Err(VmError::WrongState {
                operation: "load",
                expected: VmState::Created,
                actual,
            });
        }
        if actual == VmState::Stopped {
            // Re-loading discards the previous image's task/semaphore/queue
            // tables: `load` is about to repopulate them from the new image,
            // and the previous image's kernel-owned semaphores and queues
            // have no remaining owner to reach them through.
            release_kernel_resources(&self.shared);
        }

        let program = rtmc_image::decode(image)?;
        for inst in program.instructions.iter() {
            match inst.opcode() {
                Some(Opcode::GlobalVarDeclare) => {
                    // Operand order: address, const_index,
                    // is_const. `is_const` only matters to the compiler that
                    // emitted the image; the VM just seeds the cell.
                    let address = inst.operand(0).as_u32();
                    let const_index = inst.operand(1).as_u32() as usize;
                    let value = program.constants.get(const_index).copied().unwrap_or(Value::ZERO);
                    if (address as usize) < Limits::GLOBAL_MEMORY_SIZE {
                        self.shared.memory[address as usize].store(value.as_u32(), Ordering::Relaxed);
                    }
                }
                Some(Opcode::MsgDeclare) => {
                    let message_id = inst.operand(0).as_u32();
                    let message_type = inst.operand(1).as_u32();
                    declare_queue(&self.shared, message_id, message_type)?;
                }
                _ => {}
            }
        }

        *self.shared.program.write().unwrap() = Some(Arc::new(program));
        *self.shared.state.lock().unwrap() = VmState::Loaded;
        Ok(())
    }

    /// Starts execution: looks up a function named exactly `"main"`
    /// and, if present, bootstraps it as the first task.
    /// An image with no `main` loads and runs successfully with zero tasks
    /// — nothing for `RTOS_CREATE_TASK` calls from a `SYSCALL` host, or a
    /// future `main`-less test harness, to collide with.
    pub fn run(&self) -> Result<(), VmError> {
        self.require_state("run", VmState::Loaded)?;

        let program = self
        .shared
        .program
        .read()
        .unwrap()
        .clone()
        .expect("state Loaded implies a program is set");

        self.shared.running.store(true, Ordering::Release);
        *self.shared.state.lock().unwrap() = VmState::Running;

        if let Some(entry) = program.function_address("main") {
            spawn_task(&self.shared, entry, MAIN_TASK_PRIORITY, MAIN_TASK_CORE, MAIN_TASK_STACK_SIZE)?;
        }
        Ok(())
    }

    /// Stops the VM: every live task is marked deleted and the kernel is
    /// asked to tear it down. Each task's own execution loop observes
    /// `running == false` and exits rather than being
    /// force-killed.
    pub fn stop(&self) -> Result<(), VmError> {
        self.require_state("stop", VmState::Running)?;

        self.shared.running.store(false, Ordering::Release);
        let mut tables = self.shared.tables.lock().unwrap();
        for task in tables.tasks.iter_mut() {
            let handle = task.kernel_handle;
            task.state = LifecycleState::Deleted;
            if let Some(handle) = handle {
                self.shared.kernel.delete_task(handle);
            }
        }
        drop(tables);

        *self.shared.state.lock().unwrap() = VmState::Stopped;
        Ok(())
    }

    /// Releases everything the VM Controller owns. Valid from any state but
    /// `Destroyed` itself.
    pub fn destroy(&self) -> Result<(), VmError> {
        let mut state = self.shared.state.lock().unwrap();
        if *state == VmState::Destroyed {
            return Err(VmError::WrongState {
                    operation: "destroy",
                    expected: VmState::Stopped,
                    actual: *state,
            });
        }
        drop(state);

        release_kernel_resources(&self.shared);

        *self.shared.state.lock().unwrap() = VmState::Destroyed;
        Ok(())
    }

    /// `spec.md` §6: a snapshot of VM state a control shell can poll at any
    /// time, in any lifecycle state.
    pub fn status(&self) -> VmStatus {
        let state = *self.shared.state.lock().unwrap();
        let tables = self.shared.tables.lock().unwrap();

        let used = tables.tasks.len() * core::mem::size_of::<TaskRecord>()
        + tables.semaphores.len() * core::mem::size_of::<crate::tables::SemaphoreRecord>()
        + tables.queues.len() * core::mem::size_of::<QueueRecord>();
        let capacity = Limits::MAX_TASKS * core::mem::size_of::<TaskRecord>()
        + Limits::MAX_SEMAPHORES * core::mem::size_of::<crate::tables::SemaphoreRecord>()
        + Limits::MAX_MESSAGE_QUEUES * core::mem::size_of::<QueueRecord>();

        VmStatus {
            state,
            task_count: tables.tasks.len(),
            semaphore_count: tables.semaphores.len(),
            queue_count: tables.queues.len(),
            free_table_bytes: capacity.saturating_sub(used),
        }
    }

    /// Registers a native function a running program reaches with
    /// `SYSCALL idx`. `idx` slots below the table's
    /// high-water mark may be overwritten; this is a host wiring call, not
    /// an opcode, so there is no concurrent-task hazard to guard against.
    pub fn register_native_callback(&self, idx: u32, callback: NativeCallback) -> Result<(), VmError> {
        if idx as usize >= Limits::MAX_NATIVE_CALLBACKS {
            return Err(VmError::NativeCallbackOutOfRange(idx));
        }
        let mut tables = self.shared.tables.lock().unwrap();
        while tables.native_callbacks.len() <= idx as usize {
            // Capacity already checked against MAX_NATIVE_CALLBACKS above.
            let _ = tables.native_callbacks.push(None);
        }
        tables.native_callbacks[idx as usize] = Some(callback);
        Ok(())
    }

    fn require_state(&self, operation: &'static str, expected: VmState) -> Result<(), VmError> {
        let actual = *self.shared.state.lock().unwrap();
        if actual == expected {
            Ok(())
        } else {
            Err(VmError::WrongState { operation, expected, actual })
        }
    }
}

/// Releases every kernel-owned semaphore and queue the VM currently holds
/// and empties those tables. Used by `destroy()` (`spec.md` §4.6: "destroy
/// tears down all kernel-owned semaphores and queues") and by `load()` when
/// re-loading a fresh image over a `Stopped` VM, since the previous image's
/// queues and semaphores have no remaining owner once the new image's
/// tables take their place.
fn release_kernel_resources<K: Kernel, P>(shared: &Arc<Shared<K, P>>) {
    let mut tables = shared.tables.lock().unwrap();
    while let Some(semaphore) = tables.semaphores.pop() {
        shared.kernel.delete_semaphore(semaphore.kernel_handle);
    }
    while let Some(queue) = tables.queues.pop() {
        shared.kernel.delete_queue(queue.kernel_handle);
    }
    tables.tasks.clear();
}

/// Creates the message queue a single `MSG_DECLARE` instruction names,
/// during `load()`. `spec.md` has no explicit rule for what happens when a
/// compiler emits message ids out of declaration order; this VM indexes the
/// queue table by declaration order and logs a diagnostic if that doesn't
/// match the declared id, rather than rejecting an otherwise well-formed
/// image.
fn declare_queue<K: Kernel, P>(shared: &Arc<Shared<K, P>>, message_id: u32, message_type: u32) -> Result<(), VmError> {
    let mut name: heapless::String<{ Limits::MAX_NAME_LEN + 1 }> = heapless::String::new();
    let _ = core::fmt::write(&mut name, format_args!("MessageQueue_{message_id}"));

    let mut tables = shared.tables.lock().unwrap();
    if tables.queues.len() as u32 != message_id {
        log::debug!(
            target: "rtmc",
            "MSG_DECLARE id {message_id} does not match declaration order {}; indexing by declaration order",
            tables.queues.len(),
        );
    }
    let kernel_handle = shared
    .kernel
    .create_queue()
    .map_err(|_| rtmc_abi::ImageError::TableOverflow(rtmc_abi::Table::MessageQueues))?;
    tables
    .queues
    .push(QueueRecord { name, message_type, kernel_handle })
    .map_err(|_| rtmc_abi::ImageError::TableOverflow(rtmc_abi::Table::MessageQueues))?;
    Ok(())
}

/// `RTOS_CREATE_TASK` and the `main` bootstrap both funnel through here:
/// reserve a task table slot, ask the kernel to spawn a native task, and
/// hand that task its own [`Context`] and [`EnvHandle`] to run
/// `rtmc-engine`'s execution loop against.
pub(crate) fn spawn_task<K, P>(
    shared: &Arc<Shared<K, P>>,
    entry_pc: u32,
    priority: u8,
    core: u8,
    stack_size: u32,
) -> Result<u32, KernelFault>
where
K: Kernel + Send + Sync + 'static,
P: Peripherals + Send + 'static,
{
    let task_id = {
        let mut tables = shared.tables.lock().unwrap();
        if tables.tasks.len() >= Limits::MAX_TASKS {
            return Err(KernelFault::TaskCreateFailed);
        }
        let id = tables.tasks.len() as u32;
        let mut name: heapless::String<{ Limits::MAX_NAME_LEN + 1 }> = heapless::String::new();
        let _ = core::fmt::write(&mut name, format_args!("Task-{id}"));
        tables
        .tasks
        .push(TaskRecord {
                name,
                entry_address: entry_pc,
                priority,
                core,
                stack_size,
                state: LifecycleState::Ready,
                kernel_handle: None,
        })
        .map_err(|_| KernelFault::TaskCreateFailed)?;
        id
    };

    let program = shared
    .program
    .read()
    .unwrap()
    .clone()
    .expect("RTOS_CREATE_TASK only reachable while a program is loaded");
    let task_shared = Arc::clone(shared);

    let kernel_handle = shared.kernel.create_task(priority, core, stack_size as usize, move || {
            run_task(task_shared, program, task_id, entry_pc);
    })?;

    shared.tables.lock().unwrap().tasks[task_id as usize].kernel_handle = Some(kernel_handle);
    Ok(task_id)
}

/// The body every spawned kernel task runs. Loops `rtmc-engine::run_context`
/// so a task suspended with `RTOS_SUSPEND_TASK` can be resumed from exactly
/// where it left off instead of losing its `Context`.
fn run_task<K, P>(shared: Arc<Shared<K, P>>, program: Arc<ProgramImage>, task_id: u32, entry_pc: u32)
where
K: Kernel + Send + Sync + 'static,
P: Peripherals + Send + 'static,
{
    let mut ctx = Context::new(task_id, entry_pc);
    let mut env = EnvHandle::new(Arc::clone(&shared));
    let trace = shared.flags.contains(DiagFlags::TRACE);

    loop {
        let result = run_context(&program, &mut ctx, &mut env, trace, || {
                shared.is_running() && !task_is_suspended(&shared, task_id)
        });

        if result.is_err() || !ctx.running {
            // Faulted, or exited cleanly via HALT / RET with an empty call
            // stack: either way this task is done.
            break;
        }
        if !shared.is_running() {
            break;
        }

        // `ctx.running` is still true but the loop above stopped early:
        // the task was suspended. Park this kernel thread until it is
        // resumed or the whole VM stops, then resume from `ctx.pc`.
        while shared.is_running() && task_is_suspended(&shared, task_id) {
            shared.kernel.delay_ms(SUSPEND_POLL_INTERVAL_MS);
        }
        if !shared.is_running() {
            break;
        }
    }

    let mut tables = shared.tables.lock().unwrap();
    if let Some(record) = tables.tasks.get_mut(task_id as usize) {
        record.state = LifecycleState::Deleted;
    }
}

fn task_is_suspended<K, P>(shared: &Shared<K, P>, task_id: u32) -> bool {
    shared
    .tables
    .lock()
    .unwrap()
    .tasks
    .get(task_id as usize)
    .map(|t| t.state == LifecycleState::Suspended)
    .unwrap_or(false)
}
