//! Startup constants for the scale node.
//!
//! Pin assignment stays with the caller since the pins are handed to the
//! driver as owned `embedded-hal` types. Everything else the node needs to
//! know at boot is collected here and checked once with [`Config::validate`].

use crate::hx711::Mode;

/// Calibration divisor for the reference load cell, counts per gram.
pub const DEFAULT_SCALE: f32 = 384.279_08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("scale divisor must be finite and positive")]
    InvalidScale,
    #[error("{0} sample count must be at least 1")]
    NoSamples(&'static str),
    #[error("ready poll interval must be non-zero")]
    ZeroPollInterval,
    #[error("topic or trigger must not be empty")]
    EmptyName,
    #[error("trigger keyword longer than the inbound command bound")]
    TriggerTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    /// Gain and channel selected for every conversion.
    pub mode: Mode,
    pub scale: f32,
    pub tare_samples: usize,
    /// Interval between checks of the data line while waiting for a conversion.
    pub ready_poll_ms: u32,
    /// `None` waits for the sensor forever.
    pub ready_timeout_ms: Option<u32>,
    /// Pause between consecutive samples of an average.
    pub settle_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::A128,
            scale: DEFAULT_SCALE,
            tare_samples: 10,
            ready_poll_ms: 1,
            ready_timeout_ms: Some(1000),
            settle_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub inbound_topic: &'static str,
    pub outbound_topic: &'static str,
    pub trigger: &'static str,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            inbound_topic: "weight/in",
            outbound_topic: "weight/out",
            trigger: "get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Config {
    pub sensor: SensorConfig,
    pub channel: ChannelConfig,
    pub acquisition: AcquisitionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Samples averaged for each requested reading.
    pub read_samples: usize,
    pub poll_interval_ms: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            read_samples: 10,
            poll_interval_ms: 500,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sensor = &self.sensor;
        if !sensor.scale.is_finite() || sensor.scale <= 0.0 {
            return Err(ConfigError::InvalidScale);
        }
        if sensor.tare_samples == 0 {
            return Err(ConfigError::NoSamples("tare"));
        }
        if self.acquisition.read_samples == 0 {
            return Err(ConfigError::NoSamples("reading"));
        }
        if sensor.ready_poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        let channel = &self.channel;
        if channel.inbound_topic.is_empty()
            || channel.outbound_topic.is_empty()
            || channel.trigger.is_empty()
        {
            return Err(ConfigError::EmptyName);
        }
        if channel.trigger.len() > crate::command::MAX_COMMAND_LEN {
            return Err(ConfigError::TriggerTooLong);
        }
        Ok(())
    }
}
