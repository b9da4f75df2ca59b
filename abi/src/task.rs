// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

/// Lifecycle state of a task record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Ready,
    Running,
    Blocked,
    Suspended,
    Deleted,
}

bitflags! {
    /// Flags passed to `VmController::create`, mirroring the two booleans
    /// a control shell supplies to `create(debug, trace)`.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DiagFlags: u8 {
        /// Emit `[RTMC DEBUG]` lines for lifecycle and opcode-level events.
        const DEBUG = 0b0000_0001;
        /// Emit one `[RTMC DEBUG]` line per instruction dispatch, with
        /// `(task name, pc)` — implies `DEBUG`-level detail for the engine's
        /// own step loop.
        const TRACE = 0b0000_0010;
    }
}
