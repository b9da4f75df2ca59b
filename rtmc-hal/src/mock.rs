// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side peripheral simulation for tests and `rtmc-cli`: tracks the
//! same per-pin/timer/channel state a real board's GPIO/timer/ADC records
//! would, without touching real hardware.

use crate::{GpioDirection, GpioPull, HalError, Peripherals, ADC_CHANNEL_COUNT, GPIO_PIN_COUNT, TIMER_COUNT};

#[derive(Copy, Clone)]
struct GpioRecord {
    direction: GpioDirection,
    pull: GpioPull,
    last_value: bool,
    initialised: bool,
}

impl Default for GpioRecord {
    fn default() -> Self {
        Self {
            direction: GpioDirection::In,
            pull: GpioPull::None,
            last_value: false,
            initialised: false,
        }
    }
}

#[derive(Copy, Clone, Default)]
struct TimerRecord {
    frequency_hz: u32,
    running: bool,
    last_duty: u32,
    initialised: bool,
}

#[derive(Copy, Clone, Default)]
struct AdcRecord {
    pin: u32,
    initialised: bool,
}

/// In-memory [`Peripherals`] implementation. GPIO reads simply return the
/// last value written by [`Peripherals::gpio_set`] (there is no simulated
/// external circuit); ADC reads return a fixed value unless
/// [`MockPeripherals::set_adc_reading`] stubs one in for a test.
pub struct MockPeripherals {
    gpio: [GpioRecord; GPIO_PIN_COUNT],
    timers: [TimerRecord; TIMER_COUNT],
    adc: [AdcRecord; ADC_CHANNEL_COUNT],
    adc_readings: [u32; ADC_CHANNEL_COUNT],
}

impl Default for MockPeripherals {
    fn default() -> Self {
        Self {
            gpio: [GpioRecord::default(); GPIO_PIN_COUNT],
            timers: [TimerRecord::default(); TIMER_COUNT],
            adc: [AdcRecord::default(); ADC_CHANNEL_COUNT],
            adc_readings: [0; ADC_CHANNEL_COUNT],
        }
    }
}

impl MockPeripherals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: stub the value the next `adc_read` on `channel` returns.
    pub fn set_adc_reading(&mut self, channel: u32, value: u32) {
        if let Some(slot) = self.adc_readings.get_mut(channel as usize) {
            *slot = value;
        }
    }
}

impl Peripherals for MockPeripherals {
    fn gpio_init(&mut self, pin: u32, direction: GpioDirection, pull: GpioPull) -> Result<(), HalError> {
        let record = self.gpio.get_mut(pin as usize).ok_or(HalError::OutOfRange)?;
        record.direction = direction;
        record.pull = pull;
        record.initialised = true;
        Ok(())
    }

    fn gpio_set(&mut self, pin: u32, value: bool) -> Result<(), HalError> {
        let record = self.gpio.get_mut(pin as usize).ok_or(HalError::OutOfRange)?;
        if !record.initialised {
            return Err(HalError::NotInitialised);
        }
        if record.direction != GpioDirection::Out {
            return Err(HalError::WrongMode);
        }
        record.last_value = value;
        Ok(())
    }

    fn gpio_get(&mut self, pin: u32) -> Result<bool, HalError> {
        let record = self.gpio.get(pin as usize).ok_or(HalError::OutOfRange)?;
        if !record.initialised {
            return Err(HalError::NotInitialised);
        }
        Ok(record.last_value)
    }

    fn timer_init(&mut self, timer: u32, frequency_hz: u32) -> Result<(), HalError> {
        let record = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        record.frequency_hz = frequency_hz;
        record.initialised = true;
        record.running = false;
        Ok(())
    }

    fn timer_start(&mut self, timer: u32) -> Result<(), HalError> {
        let record = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        if !record.initialised {
            return Err(HalError::NotInitialised);
        }
        record.running = true;
        Ok(())
    }

    fn timer_stop(&mut self, timer: u32) -> Result<(), HalError> {
        let record = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        if !record.initialised {
            return Err(HalError::NotInitialised);
        }
        record.running = false;
        Ok(())
    }

    fn timer_set_pwm_duty(&mut self, timer: u32, duty_percent: u32) -> Result<(), HalError> {
        let record = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        if !record.initialised {
            return Err(HalError::NotInitialised);
        }
        record.last_duty = duty_percent;
        Ok(())
    }

    fn adc_init(&mut self, pin: u32) -> Result<u32, HalError> {
        if let Some((idx, existing)) = self
        .adc
        .iter()
        .enumerate()
        .find(|(_, r)| r.initialised && r.pin == pin)
        {
            let _ = existing;
            return Ok(idx as u32);
        }
        let (idx, slot) = self
        .adc
        .iter_mut()
        .enumerate()
        .find(|(_, r)| !r.initialised)
        .ok_or(HalError::ChannelsExhausted)?;
        slot.pin = pin;
        slot.initialised = true;
        Ok(idx as u32)
    }

    fn adc_read(&mut self, channel: u32) -> Result<u32, HalError> {
        let record = self.adc.get(channel as usize).ok_or(HalError::OutOfRange)?;
        if !record.initialised {
            return Err(HalError::NotInitialised);
        }
        Ok(self.adc_readings[channel as usize])
    }
}
