//! Simulated hardware and transport shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::command::{QoS, Transport};
use crate::config::SensorConfig;
use crate::hx711::{Hx711, Mode};

/// Sensor timing for tests: fast to time out so a missing sample fails
/// instead of hanging.
pub fn test_sensor_config() -> SensorConfig {
    SensorConfig {
        mode: Mode::A128,
        scale: 100.0,
        tare_samples: 10,
        ready_poll_ms: 1,
        ready_timeout_ms: Some(5),
        settle_ms: 10,
    }
}

pub type SimSensor = Hx711<SimClock, SimData, SimDelay>;

pub fn sim_sensor() -> (SimSensor, SimHx711, SimDelay) {
    let sim = SimHx711::new();
    let delay = SimDelay::default();
    let (sck, dt) = sim.pins();
    let hx711 = Hx711::new(sck, dt, delay.clone(), &test_sensor_config()).unwrap();
    (hx711, sim, delay)
}

#[derive(Default)]
struct Device {
    samples: VecDeque<u32>,
    current: Option<u32>,
    busy_polls: usize,
    clock_high: bool,
    pulses: usize,
    frames: Vec<usize>,
}

impl Device {
    fn rising_edge(&mut self) {
        if self.pulses == 0 {
            self.current = self.samples.pop_front();
        }
        self.pulses += 1;
    }

    fn data_level(&mut self) -> bool {
        if self.pulses == 0 {
            if self.busy_polls > 0 {
                self.busy_polls -= 1;
                return true;
            }
            // DOUT stays high until a conversion is available
            return self.samples.is_empty();
        }

        if self.pulses >= 24 && !self.clock_high {
            // the driver is back to waiting for the next conversion
            self.frames.push(self.pulses);
            self.pulses = 0;
            self.current = None;
            return self.data_level();
        }

        match self.current {
            Some(bits) if self.pulses <= 24 => (bits >> (24 - self.pulses)) & 1 == 1,
            _ => true,
        }
    }
}

/// One simulated HX711. Samples queued here are shifted out through the pins
/// returned by [`SimHx711::pins`].
#[derive(Clone, Default)]
pub struct SimHx711(Rc<RefCell<Device>>);

impl SimHx711 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pins(&self) -> (SimClock, SimData) {
        (SimClock(self.clone()), SimData(self.clone()))
    }

    pub fn push_bits(&self, bits: u32) {
        self.0.borrow_mut().samples.push_back(bits & 0x00FF_FFFF);
    }

    pub fn push_raw(&self, value: i32) {
        self.push_bits(value as u32);
    }

    pub fn push_repeated(&self, value: i32, times: usize) {
        for _ in 0..times {
            self.push_raw(value);
        }
    }

    /// Answer "not ready" to the next `polls` checks of the data line.
    pub fn set_busy_polls(&self, polls: usize) {
        self.0.borrow_mut().busy_polls = polls;
    }

    pub fn force_clock_high(&self) {
        self.0.borrow_mut().clock_high = true;
    }

    pub fn clock_high(&self) -> bool {
        self.0.borrow().clock_high
    }

    /// Clock pulses seen since the current conversion started.
    pub fn pulses_in_frame(&self) -> usize {
        self.0.borrow().pulses
    }

    pub fn completed_frames(&self) -> Vec<usize> {
        self.0.borrow().frames.clone()
    }

    /// Samples not yet clocked out.
    pub fn remaining(&self) -> usize {
        self.0.borrow().samples.len()
    }
}

pub struct SimClock(SimHx711);

impl ErrorType for SimClock {
    type Error = Infallible;
}

impl OutputPin for SimClock {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0 .0.borrow_mut().clock_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut device = self.0 .0.borrow_mut();
        if !device.clock_high {
            device.rising_edge();
        }
        device.clock_high = true;
        Ok(())
    }
}

pub struct SimData(SimHx711);

impl ErrorType for SimData {
    type Error = Infallible;
}

impl InputPin for SimData {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0 .0.borrow_mut().data_level())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0 .0.borrow_mut().data_level())
    }
}

/// Accumulates requested delays instead of sleeping.
#[derive(Clone, Default)]
pub struct SimDelay(Rc<Cell<u64>>);

impl SimDelay {
    pub fn elapsed_ns(&self) -> u64 {
        self.0.get()
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + u64::from(ns));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Default)]
pub struct RecordingTransport {
    pub subscriptions: Vec<(String, QoS)>,
    pub published: Vec<Published>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn payloads(&self) -> Vec<&str> {
        self.published
            .iter()
            .map(|p| std::str::from_utf8(&p.payload).unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    type Error = &'static str;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        if self.fail {
            return Err("subscribe refused");
        }
        self.subscriptions.push((topic.into(), qos));
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        if self.fail {
            return Err("publish refused");
        }
        self.published.push(Published {
            topic: topic.into(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }
}
