// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VM Controller error type. Every fallible lifecycle entry point
//! returns a typed `Result`; `thiserror` generates
//! `Display`/`core::error::Error` the way the teacher's `std`-facing crates
//! do.

use rtmc_abi::{ImageError, KernelFault};

use crate::status::VmState;

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// `ImageInvalid(reason)` from `spec.md` §7, surfaced at `load()`. The
    /// VM is left exactly as it was before the call.
    #[error("image rejected: {0}")]
    Image(#[from] ImageError),

    /// A lifecycle entry point was called in a state `spec.md` §6's
    /// pre-condition table doesn't allow (e.g. `run()` before `load()`).
    #[error("{operation} requires the VM to be {expected}, but it is {actual}")]
    WrongState {
        operation: &'static str,
        expected: VmState,
        actual: VmState,
    },

    /// Spawning the bootstrap `main` task failed at `run()`.
    #[error("bootstrapping the main task failed: {0}")]
    Kernel(#[from] KernelFault),

    /// `register_native_callback` was given an index the `SYSCALL` table has
    /// no room for.
    #[error("native callback index {0} exceeds the configured callback table capacity")]
    NativeCallbackOutOfRange(u32),
}
