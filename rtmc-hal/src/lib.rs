// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hardware Abstraction: GPIO/PWM-timer/ADC opcode
//! dispatch against a trait, the same API/implementation split the teacher
//! uses for its `drv-*-api`/`drv-*-sys` driver crates.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod mock;

#[cfg(feature = "rp2040")]
mod rp2040_peripherals;

pub use mock::MockPeripherals;

#[cfg(feature = "rp2040")]
pub use rp2040_peripherals::Rp2040Peripherals;

/// GPIO pin count fixed by the board.
pub const GPIO_PIN_COUNT: usize = 30;
/// PWM timer slot count fixed by the board.
pub const TIMER_COUNT: usize = 8;
/// ADC channel count fixed by the board.
pub const ADC_CHANNEL_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GpioDirection {
    In,
    Out,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GpioPull {
    None,
    Up,
    Down,
}

/// A peripheral opcode addressed an id outside its table's capacity, or a
/// record that has never been initialised, or a record in the wrong mode
/// for the requested operation. `spec.md` §4.5/§7: logged and sentineled,
/// never a `VmFault`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HalError {
    OutOfRange,
    NotInitialised,
    WrongMode,
    ChannelsExhausted,
}

impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            HalError::OutOfRange => "id outside peripheral table capacity",
            HalError::NotInitialised => "peripheral record not initialised",
            HalError::WrongMode => "peripheral record in the wrong mode for this operation",
            HalError::ChannelsExhausted => "no free ADC channel for this pin",
        };
        f.write_str(s)
    }
}

/// Everything the Execution Engine needs from the peripheral driver library
/// to carry out the hardware opcode group.
///
/// Each method validates id range and initialisation state itself and
/// returns [`HalError`] rather than panicking or faulting the task — the
/// engine converts a `HalError` into a logged `[RTMC ERROR]` line plus a
/// zero/sentinel push, per §7's `ResourceExhausted`-style policy for
/// peripheral misuse.
pub trait Peripherals {
    fn gpio_init(&mut self, pin: u32, direction: GpioDirection, pull: GpioPull) -> Result<(), HalError>;
    fn gpio_set(&mut self, pin: u32, value: bool) -> Result<(), HalError>;
    fn gpio_get(&mut self, pin: u32) -> Result<bool, HalError>;

    fn timer_init(&mut self, timer: u32, frequency_hz: u32) -> Result<(), HalError>;
    fn timer_start(&mut self, timer: u32) -> Result<(), HalError>;
    fn timer_stop(&mut self, timer: u32) -> Result<(), HalError>;
    fn timer_set_pwm_duty(&mut self, timer: u32, duty_percent: u32) -> Result<(), HalError>;

    /// Allocates the first free ADC channel bound to `pin`, returning its
    /// channel index.
    fn adc_init(&mut self, pin: u32) -> Result<u32, HalError>;
    fn adc_read(&mut self, channel: u32) -> Result<u32, HalError>;
}
