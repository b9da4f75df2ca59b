// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The state every task's Execution Context and the VM Controller itself
//! share. `spec.md` §9 resolves the Context→VM→Program back-reference cycle
//! with an "arena+index" strategy: the VM owns every table by index, and a
//! Context only ever borrows it for the lifetime of the kernel task that
//! runs it. Concretely: one `Arc<Shared<K, P>>` per VM, cloned into every
//! spawned task's closure, so "borrow the VM" becomes "hold a cheap
//! reference-counted handle" instead of a literal lifetime-scoped borrow —
//! unavoidable once tasks run on their own native kernel threads/stacks
//! rather than nesting inside the creator's call frame.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rtmc_abi::{DiagFlags, Limits};
use rtmc_image::ProgramImage;
use rtmc_ringbuf::TraceRingbuf;

use crate::status::VmState;
use crate::tables::Tables;

/// Depth of the instruction-dispatch trace ring buffer kept alongside the
/// `log`-facade output: enough to reconstruct the last
/// few tasks' recent activity without an unbounded allocation.
pub const TRACE_RINGBUF_DEPTH: usize = 512;

pub struct Shared<K, P> {
    pub kernel: K,
    pub peripherals: Mutex<P>,
    /// Global memory: one `AtomicU32` per cell so that
    /// individual reads/writes are atomic at the word level without a
    /// table-wide lock, matching §5's "no per-cell locking... individual
    /// Value reads/writes must be atomic at the word level."
    pub memory: Vec<AtomicU32>,
    pub program: RwLock<Option<Arc<ProgramImage>>>,
    pub tables: Mutex<Tables>,
    pub state: Mutex<VmState>,
    pub running: AtomicBool,
    pub flags: DiagFlags,
    pub trace: Mutex<TraceRingbuf<TRACE_RINGBUF_DEPTH>>,
}

impl<K, P> Shared<K, P> {
    pub fn new(kernel: K, peripherals: P, flags: DiagFlags) -> Self {
        Self {
            kernel,
            peripherals: Mutex::new(peripherals),
            memory: (0..Limits::GLOBAL_MEMORY_SIZE).map(|_| AtomicU32::new(0)).collect(),
            program: RwLock::new(None),
            tables: Mutex::new(Tables::default()),
            state: Mutex::new(VmState::Created),
            running: AtomicBool::new(false),
            flags,
            trace: Mutex::new(TraceRingbuf::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
