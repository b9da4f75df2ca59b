// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `status()`'s snapshot type and the VM Controller's lifecycle states
//!: `Created → Loaded → Running → Stopped →
//! Destroyed`.

/// Lifecycle state of the VM Controller itself — distinct from a task's
/// [`rtmc_abi::LifecycleState`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VmState {
    Created,
    Loaded,
    Running,
    Stopped,
    Destroyed,
}

impl core::fmt::Display for VmState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            VmState::Created => "created",
            VmState::Loaded => "loaded",
            VmState::Running => "running",
            VmState::Stopped => "stopped",
            VmState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Snapshot returned by `status()`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VmStatus {
    pub state: VmState,
    pub task_count: usize,
    pub semaphore_count: usize,
    pub queue_count: usize,
    /// The source interpreter reports a live `malloc` heap's free bytes
    /// here; this VM has no heap; everything it owns lives in the bounded
    /// tables from `spec.md` §3. We report the equivalent — the combined
    /// byte capacity still unused across the task/semaphore/queue tables —
    /// so a shell polling `status()` for resource pressure still gets a
    /// meaningful, monotonically-shrinking number.
    pub free_table_bytes: usize,
}
