#![cfg_attr(not(any(test, feature = "mqtt")), no_std)]

pub mod acquisition;
pub mod command;
pub mod config;
pub mod hx711;
pub mod latch;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod reply;

#[cfg(test)]
pub(crate) mod testing;

pub use acquisition::{Acquisition, Cycle};
pub use command::{CommandChannel, QoS, Transport, TransportEvent};
pub use config::{AcquisitionConfig, ChannelConfig, Config, ConfigError, SensorConfig};
pub use hx711::{Hx711, Mode};
pub use latch::{LinkState, RequestLatch};

pub trait LoadCell {
    type Error;

    /// Read one raw conversion from the load cell
    fn read(&mut self) -> Result<i32, Self::Error>;

    /// Average `times` raw readings, truncating toward zero.
    fn read_average(&mut self, times: usize) -> Result<i32, Self::Error>;

    /// Read the value after applying offset and scaling, averaging `times` readings.
    fn get_units(&mut self, times: usize) -> Result<f32, Self::Error>;

    /// Zero the load cell offset by averaging `times` readings
    fn tare(&mut self, times: usize) -> Result<(), Self::Error>;

    /// Get the load cell offset.
    fn get_offset(&self) -> i32;

    /// Set the scale (AKA calibrate the scale).
    /// Use this to ensure that 1kg ~ 1kg
    fn set_scale(&mut self, scale: f32) -> Result<(), Self::Error>;

    /// Get the scale.
    fn get_scale(&self) -> f32;
}
