//! MQTT over `rumqttc`, for nodes and clients running on a hosted OS.
//!
//! [`MqttTransport`] and [`drive`] connect a [`CommandChannel`] to a broker.
//! [`WeightRequester`] is the other end of the exchange: it sends the trigger
//! and waits for the reading to come back.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use rumqttc::{Client, ClientError, ConnectReturnCode, Connection, Event, MqttOptions, Packet};

use crate::command::{CommandChannel, QoS, Transport, TransportEvent};
use crate::config::ChannelConfig;
use crate::reply::{self, ReplyError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const REQUEST_CHANNEL_CAPACITY: usize = 10;

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

#[derive(Clone)]
pub struct MqttTransport {
    client: Client,
}

impl MqttTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for MqttTransport {
    type Error = ClientError;

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        self.client.subscribe(topic, qos.into())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error> {
        self.client.publish(topic, qos.into(), retain, payload.to_vec())
    }
}

/// Map the `rumqttc` notifications the command channel cares about.
pub fn translate(event: &Event) -> Option<TransportEvent<'_>> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
            Some(TransportEvent::Connected)
        }
        Event::Incoming(Packet::Disconnect) => Some(TransportEvent::Disconnected),
        Event::Incoming(Packet::Publish(publish)) => Some(TransportEvent::Message {
            topic: &publish.topic,
            payload: publish.payload.as_ref(),
        }),
        _ => None,
    }
}

/// Run the event loop of `connection`, feeding every notification to
/// `channel`. Returns once all clients of the connection are dropped.
pub fn drive<T: Transport>(
    connection: &mut Connection,
    channel: &CommandChannel<'_>,
    transport: &mut T,
) {
    drive_events(connection.iter(), channel, transport, RECONNECT_BACKOFF);
}

fn drive_events<I, E, T>(
    notifications: I,
    channel: &CommandChannel<'_>,
    transport: &mut T,
    backoff: Duration,
) where
    I: IntoIterator<Item = Result<Event, E>>,
    E: fmt::Debug,
    T: Transport,
{
    for notification in notifications {
        match notification {
            Ok(event) => {
                if let Some(event) = translate(&event) {
                    channel.handle_event(event, transport);
                }
            }
            Err(err) => {
                channel.handle_event(TransportEvent::Error(&err), transport);
                channel.handle_event(TransportEvent::Disconnected, transport);
                // the next iteration reconnects
                thread::sleep(backoff);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("mqtt client error: {0}")]
    Client(#[from] ClientError),
    #[error("no reading within {0:?}")]
    Timeout(Duration),
    #[error("mqtt event loop has stopped")]
    Stopped,
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

type Reply = Result<f32, ReplyError>;

/// Asks a scale node for a reading and waits for the answer.
pub struct WeightRequester {
    client: Client,
    replies: Receiver<Reply>,
    channel: ChannelConfig,
}

impl WeightRequester {
    /// Connect in the background. The outbound topic is (re)subscribed on
    /// every connection.
    pub fn start(options: MqttOptions, channel: ChannelConfig) -> Self {
        let (client, connection) = Client::new(options, REQUEST_CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::channel();
        let listener = client.clone();
        let topic = channel.outbound_topic;
        thread::spawn(move || {
            let mut connection = connection;
            listen(
                connection.iter(),
                |filter| listener.subscribe(filter, rumqttc::QoS::AtLeastOnce),
                topic,
                &tx,
                RECONNECT_BACKOFF,
            );
        });
        Self {
            client,
            replies: rx,
            channel,
        }
    }

    /// Send the trigger and wait up to `timeout` for the reading.
    ///
    /// Replies are not correlated with requests. Stale replies queued before
    /// the call are discarded, but an answer to an earlier timed out request
    /// that arrives after the trigger is sent is taken as this one's.
    pub fn request(&self, timeout: Duration) -> Result<f32, RequestError> {
        exchange(&self.replies, timeout, || {
            self.client.publish(
                self.channel.inbound_topic,
                rumqttc::QoS::ExactlyOnce,
                false,
                self.channel.trigger.as_bytes().to_vec(),
            )
        })
    }

    pub fn stop(self) -> Result<(), RequestError> {
        self.client.disconnect()?;
        Ok(())
    }
}

fn exchange<F>(replies: &Receiver<Reply>, timeout: Duration, send: F) -> Result<f32, RequestError>
where
    F: FnOnce() -> Result<(), ClientError>,
{
    // drop replies to earlier requests that timed out
    while replies.try_recv().is_ok() {}

    send()?;

    match replies.recv_timeout(timeout) {
        Ok(reply) => Ok(reply?),
        Err(RecvTimeoutError::Timeout) => {
            warn!("no reading within {:?}", timeout);
            Err(RequestError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(RequestError::Stopped),
    }
}

fn listen<I, E, S, SE>(
    notifications: I,
    mut subscribe: S,
    topic: &str,
    replies: &Sender<Reply>,
    backoff: Duration,
) where
    I: IntoIterator<Item = Result<Event, E>>,
    E: fmt::Display,
    S: FnMut(&str) -> Result<(), SE>,
    SE: fmt::Display,
{
    for notification in notifications {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => match subscribe(topic) {
                Ok(()) => info!("connected to broker, subscribed to {}", topic),
                Err(err) => error!("subscribing to {} failed: {}", topic, err),
            },
            Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic => {
                let reply = reply::parse_payload(&publish.payload);
                match &reply {
                    Ok(weight) => info!("received weight {}", weight),
                    Err(err) => error!("bad reply on {}: {}", topic, err),
                }
                if replies.send(reply).is_err() {
                    // requester dropped
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!("mqtt connection error: {}", err);
                thread::sleep(backoff);
            }
        }
    }
}
