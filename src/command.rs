//! Bridge between a callback driven pub/sub transport and the polling
//! acquisition loop.
//!
//! The transport delivers [`TransportEvent`]s to [`CommandChannel::handle_event`]
//! from its own context. A trigger message only sets the shared
//! [`RequestLatch`]; the acquisition loop picks it up on its next poll and
//! sends the reading back out through [`CommandChannel::publish`].

use core::fmt;

use log::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::latch::{LinkState, RequestLatch};

/// Inbound payloads are cut to this many bytes before being compared.
pub const MAX_COMMAND_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

#[derive(Debug, Clone, Copy)]
pub enum TransportEvent<'a> {
    Connected,
    Disconnected,
    Message { topic: &'a str, payload: &'a [u8] },
    Error(&'a dyn fmt::Debug),
}

/// The outbound half of a pub/sub client.
pub trait Transport {
    type Error: fmt::Debug;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy)]
pub struct CommandChannel<'a> {
    latch: &'a RequestLatch,
    link: &'a LinkState,
    config: ChannelConfig,
}

impl<'a> CommandChannel<'a> {
    pub fn new(latch: &'a RequestLatch, link: &'a LinkState, config: ChannelConfig) -> Self {
        Self {
            latch,
            link,
            config,
        }
    }

    pub fn latch(&self) -> &'a RequestLatch {
        self.latch
    }

    pub fn link(&self) -> &'a LinkState {
        self.link
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Transport lifecycle notification handler. Never fails: errors are
    /// logged and otherwise leave the state alone.
    pub fn handle_event<T: Transport>(&self, event: TransportEvent<'_>, transport: &mut T) {
        match event {
            TransportEvent::Connected => {
                self.link.set_connected();
                match transport.subscribe(self.config.inbound_topic, QoS::AtLeastOnce) {
                    Ok(()) => info!("connected, listening on {}", self.config.inbound_topic),
                    Err(err) => warn!(
                        "connected, but subscribing to {} failed: {:?}",
                        self.config.inbound_topic, err
                    ),
                }
            }
            TransportEvent::Disconnected => {
                if self.link.set_disconnected() {
                    info!("disconnected");
                }
            }
            TransportEvent::Message { topic, payload } => {
                self.on_message(topic, payload);
            }
            TransportEvent::Error(err) => warn!("transport error: {:?}", err),
        }
    }

    /// Returns `true` if the message was a trigger.
    pub fn on_message(&self, topic: &str, payload: &[u8]) -> bool {
        if topic != self.config.inbound_topic {
            debug!("ignoring message on {}", topic);
            return false;
        }

        match decode_command(payload) {
            Some(command) if command == self.config.trigger => {
                if !self.latch.set() {
                    debug!("reading already pending, request coalesced");
                }
                true
            }
            _ => {
                debug!("ignoring command {:?}", payload);
                false
            }
        }
    }

    /// Send `payload` on the outbound topic, exactly once and not retained.
    pub fn publish<T: Transport>(&self, transport: &mut T, payload: &str) -> Result<(), T::Error> {
        if !self.link.is_connected() {
            warn!("publishing to {} while disconnected", self.config.outbound_topic);
        }
        transport.publish(
            self.config.outbound_topic,
            payload.as_bytes(),
            QoS::ExactlyOnce,
            false,
        )
    }
}

/// Interpret a payload the way a NUL terminated C buffer of
/// `MAX_COMMAND_LEN + 1` bytes would hold it.
fn decode_command(payload: &[u8]) -> Option<&str> {
    let bounded = &payload[..payload.len().min(MAX_COMMAND_LEN)];
    let text = match bounded.iter().position(|b| *b == 0) {
        Some(end) => &bounded[..end],
        None => bounded,
    };
    core::str::from_utf8(text).ok()
}
