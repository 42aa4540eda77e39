//! Averaging, tare and scale conversion on top of the raw sample driver.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, info};

use crate::hx711::{Error, Hx711};
use crate::LoadCell;

impl<SckPin, DtPin, Delay, E> LoadCell for Hx711<SckPin, DtPin, Delay>
where
    SckPin: OutputPin<Error = E>,
    DtPin: InputPin<Error = E>,
    Delay: DelayNs,
{
    type Error = Error<E>;

    fn read(&mut self) -> Result<i32, Self::Error> {
        self.read_raw()
    }

    fn read_average(&mut self, times: usize) -> Result<i32, Self::Error> {
        if times == 0 {
            return Err(Error::NoSamples);
        }

        // i64 so that summing many full scale readings cannot overflow
        let mut sum: i64 = 0;
        for _ in 0..times {
            sum += i64::from(self.read_raw()?);
            self.delay.delay_ms(self.settle_ms);
        }
        let average = sum / times as i64;
        debug!("average of {} samples = {}", times, average);

        // the mean of i32 samples is itself in i32 range
        Ok(average as i32)
    }

    fn get_units(&mut self, times: usize) -> Result<f32, Self::Error> {
        let value = self.read_average(times)? - self.offset;
        Ok(value as f32 / self.scale)
    }

    fn tare(&mut self, times: usize) -> Result<(), Self::Error> {
        self.offset = self.read_average(times)?;
        info!("Tare complete. Offset: {}", self.offset);
        Ok(())
    }

    fn get_offset(&self) -> i32 {
        self.offset
    }

    fn set_scale(&mut self, scale: f32) -> Result<(), Self::Error> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidScale);
        }
        self.scale = scale;
        Ok(())
    }

    fn get_scale(&self) -> f32 {
        self.scale
    }
}
