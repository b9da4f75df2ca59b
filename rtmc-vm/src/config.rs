// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VM Controller configuration, matching the two flags the control shell
//! supplies to `create()` plus the one tick-rate parameter
//! the RTOS Bridge needs.
//!
//! `serde`-derived so `rtmc-cli` can load it from a TOML file the way the
//! teacher's `app.toml` configures a whole Hubris image, scaled down to the
//! handful of knobs this VM actually has.

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Emits `[RTMC DEBUG]` lines for lifecycle and opcode-level events.
    pub debug: bool,
    /// Emits one `[RTMC DEBUG]` line per instruction dispatch
    /// (`task name, pc`). Implies `debug`.
    pub trace: bool,
    /// The host kernel's scheduling quantum, in Hz, used only for
    /// documentation/`status()` purposes — the RTOS Bridge backends
    /// (`rtmc-rtos`) each convert milliseconds to their own native tick
    /// representation directly.
    pub tick_rate_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            trace: false,
            tick_rate_hz: 1_000,
        }
    }
}

impl Config {
    pub fn diag_flags(&self) -> rtmc_abi::DiagFlags {
        let mut flags = rtmc_abi::DiagFlags::empty();
        if self.debug || self.trace {
            flags |= rtmc_abi::DiagFlags::DEBUG;
        }
        if self.trace {
            flags |= rtmc_abi::DiagFlags::TRACE;
        }
        flags
    }
}
