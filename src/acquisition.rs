//! The steady state of the node: poll the request latch, take a reading when
//! one was asked for, and publish it.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::command::{CommandChannel, Transport};
use crate::config::AcquisitionConfig;
use crate::reply::{format_reading, FAILURE_PAYLOAD};
use crate::LoadCell;

/// Outcome of one [`Acquisition::poll`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// No reading was requested.
    Idle,
    /// The reading was handed to the transport.
    Published(f32),
    /// The sensor failed; the failure payload was sent in its place.
    SensorFault,
}

pub struct Acquisition<'a, L, D> {
    load_cell: L,
    delay: D,
    channel: CommandChannel<'a>,
    read_samples: usize,
    poll_interval_ms: u32,
}

impl<'a, L, D> Acquisition<'a, L, D>
where
    L: LoadCell,
    L::Error: fmt::Debug,
    D: DelayNs,
{
    /// `load_cell` is expected to be tared and scaled already.
    pub fn new(
        load_cell: L,
        delay: D,
        channel: CommandChannel<'a>,
        config: &AcquisitionConfig,
    ) -> Self {
        Self {
            load_cell,
            delay,
            channel,
            read_samples: config.read_samples,
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    pub fn load_cell(&mut self) -> &mut L {
        &mut self.load_cell
    }

    /// Service the pending request, if any.
    ///
    /// The latch is cleared only after the reading went out, so triggers that
    /// arrive while the sensor is being read are absorbed by this cycle.
    pub fn poll<T: Transport>(&mut self, transport: &mut T) -> Cycle {
        if !self.channel.latch().is_set() {
            return Cycle::Idle;
        }

        let cycle = match self.load_cell.get_units(self.read_samples) {
            Ok(weight) => {
                let message = format_reading(weight);
                info!("Weight: {} g", message);
                if let Err(err) = self.channel.publish(transport, &message) {
                    warn!("failed to publish weight: {:?}", err);
                }
                Cycle::Published(weight)
            }
            Err(err) => {
                error!("failed to read the load cell: {:?}", err);
                if let Err(err) = self.channel.publish(transport, FAILURE_PAYLOAD) {
                    warn!("failed to publish sensor fault: {:?}", err);
                }
                Cycle::SensorFault
            }
        };

        self.channel.latch().clear();
        cycle
    }

    /// Poll forever at the configured interval.
    pub fn run<T: Transport>(&mut self, transport: &mut T) -> ! {
        loop {
            self.poll(transport);
            self.delay.delay_ms(self.poll_interval_ms);
        }
    }
}
