use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::SensorConfig;
use crate::LoadCell;

pub mod calibration;

pub const HX711_MINIMUM: i32 = -(1 << 23);
pub const HX711_MAXIMUM: i32 = (1 << 23) - 1;
const HX711_DELAY_TIME_US: u32 = 1;
const HX711_DATA_BITS: usize = 24;

/// Channel and gain of the next conversion, encoded as the number of extra
/// clock pulses sent after the 24 data bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    A128 = 1, // extra pulses
    B32 = 2,
    A64 = 3,
}

impl Mode {
    pub fn gain_pulses(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error<E> {
    #[error("gpio error: {0:?}")]
    Pin(E),
    /// The data line stayed high for the whole ready timeout, in ms.
    #[error("hx711 not ready after {0} ms")]
    NotReady(u32),
    #[error("sample count must be at least 1")]
    NoSamples,
    #[error("scale divisor must be finite and positive")]
    InvalidScale,
}

pub struct Hx711<SckPin, DtPin, Delay> {
    sck_pin: SckPin,
    dt_pin: DtPin,
    delay: Delay,
    mode: Mode,
    offset: i32, // tare
    scale: f32,  // calibration value
    ready_poll_ms: u32,
    ready_timeout_ms: Option<u32>,
    settle_ms: u32,
}

impl<SckPin, DtPin, Delay, E> Hx711<SckPin, DtPin, Delay>
where
    SckPin: OutputPin<Error = E>,
    DtPin: InputPin<Error = E>,
    Delay: DelayNs,
{
    /// Take ownership of the lines and idle the clock low. Offset starts at
    /// zero and scale at one until [`LoadCell::tare`] and
    /// [`LoadCell::set_scale`] are called.
    pub fn new(
        mut sck_pin: SckPin,
        dt_pin: DtPin,
        delay: Delay,
        config: &SensorConfig,
    ) -> Result<Self, Error<E>> {
        sck_pin.set_low().map_err(Error::Pin)?;
        Ok(Self {
            sck_pin,
            dt_pin,
            delay,
            mode: config.mode,
            offset: 0,
            scale: 1.0,
            ready_poll_ms: config.ready_poll_ms,
            ready_timeout_ms: config.ready_timeout_ms,
            settle_ms: config.settle_ms,
        })
    }

    /// Construct, tare with the configured sample count, then apply the
    /// configured scale. The load cell must be unloaded.
    pub fn calibrated(
        sck_pin: SckPin,
        dt_pin: DtPin,
        delay: Delay,
        config: &SensorConfig,
    ) -> Result<Self, Error<E>> {
        let mut hx711 = Self::new(sck_pin, dt_pin, delay, config)?;
        hx711.tare(config.tare_samples)?;
        hx711.set_scale(config.scale)?;
        Ok(hx711)
    }

    pub fn is_ready(&mut self) -> Result<bool, Error<E>> {
        // if the dt pin is low, device is ready for read
        self.dt_pin.is_low().map_err(Error::Pin)
    }

    pub fn get_gain_mode(&self) -> Mode {
        self.mode
    }

    /// Block until a conversion is available and clock it out.
    ///
    /// The gain pulses for the following conversion are sent before
    /// returning. Fails with [`Error::NotReady`] if a ready timeout is
    /// configured and the data line stays high for longer than it.
    pub fn read_raw(&mut self) -> Result<i32, Error<E>> {
        self.wait_ready()?;

        // SCK held high for more than 60us powers the chip down, so the pulse
        // train must not be interrupted.
        let value = critical_section::with(|_cs| -> Result<u32, Error<E>> {
            let mut value: u32 = 0;
            for _ in 0..HX711_DATA_BITS {
                // bits arrive MSB first
                value = (value << 1) | u32::from(self.read_hx711_bit()?);
            }
            // send gain mode for next reading
            for _ in 0..self.mode.gain_pulses() {
                self.toggle_sck_bit()?;
            }
            Ok(value)
        })?;

        Ok(i24_to_i32(value))
    }

    fn wait_ready(&mut self) -> Result<(), Error<E>> {
        let mut waited_ms: u32 = 0;
        while !self.is_ready()? {
            if let Some(timeout) = self.ready_timeout_ms {
                if waited_ms >= timeout {
                    return Err(Error::NotReady(timeout));
                }
            }
            self.delay.delay_ms(self.ready_poll_ms);
            waited_ms = waited_ms.saturating_add(self.ready_poll_ms);
        }
        Ok(())
    }

    fn read_hx711_bit(&mut self) -> Result<bool, Error<E>> {
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);

        let bit = self.dt_pin.is_high().map_err(Error::Pin)?;

        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);

        Ok(bit)
    }

    fn toggle_sck_bit(&mut self) -> Result<(), Error<E>> {
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);
        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);
        Ok(())
    }
}

/// Sign extend a 24 bit two's complement value.
fn i24_to_i32(mut value: u32) -> i32 {
    value &= 0x00FF_FFFF;
    if value & 0x0080_0000 != 0 {
        // negative, fill with 1s
        value |= 0xFF00_0000;
    }
    value as i32
}
