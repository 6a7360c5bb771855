//! MQTT transport built on `rumqttc`.
//!
//! A fresh client and event loop are created on every connect and dropped on
//! any failure. The event loop is only driven inside `connect`, `publish` and
//! `disconnect`, each bounded by the configured operation timeout. Anything
//! the broker sent while the node was idle (including a closed socket) is
//! picked up at the start of the next publish.

use std::time::Duration;

use poolsense_common::MqttConfig;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::broker::{Transport, TransportError};

/// Request channel capacity; at most one publish is ever in flight.
const REQUEST_CAPACITY: usize = 10;

/// How long a drain waits for the next already-pending event.
const PENDING_EVENT_WINDOW: Duration = Duration::from_millis(10);

impl From<rumqttc::ConnectionError> for TransportError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        match err {
            rumqttc::ConnectionError::ConnectionRefused(code) => {
                TransportError::Refused(format!("{:?}", code))
            }
            other => TransportError::Unreachable(other.to_string()),
        }
    }
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        TransportError::Client(err.to_string())
    }
}

struct Connection {
    client: AsyncClient,
    eventloop: EventLoop,
}

/// Transport talking MQTT 3.1.1 over TCP.
pub struct MqttTransport {
    options: MqttOptions,
    timeout: Duration,
    connection: Option<Connection>,
}

impl MqttTransport {
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs))
            .set_clean_session(true);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(user, password);
        }

        Self {
            options,
            timeout: Duration::from_secs(config.operation_timeout_secs),
            connection: None,
        }
    }

    pub fn options(&self) -> &MqttOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }
}

/// Poll the event loop until `done` accepts an event or the deadline passes.
async fn poll_until(
    eventloop: &mut EventLoop,
    timeout: Duration,
    done: impl Fn(&Event) -> bool,
) -> Result<(), TransportError> {
    let deadline = Instant::now() + timeout;
    loop {
        let event = time::timeout_at(deadline, eventloop.poll())
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        trace!(?event, "MQTT event");
        if done(&event) {
            return Ok(());
        }
    }
}

/// Consume events that arrived while the event loop was not being polled.
///
/// Returns once the loop has nothing ready, or with the connection error that
/// ended the session in the meantime.
async fn drain_pending(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match time::timeout(PENDING_EVENT_WINDOW, eventloop.poll()).await {
            Err(_) => return Ok(()),
            Ok(Ok(event)) => trace!(?event, "Pending MQTT event"),
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}

impl Connection {
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        drain_pending(&mut self.eventloop).await?;

        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await?;
        poll_until(&mut self.eventloop, timeout, |event| {
            matches!(event, Event::Outgoing(Outgoing::Publish(_)))
        })
        .await
    }
}

impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connection = None;

        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), REQUEST_CAPACITY);
        poll_until(&mut eventloop, self.timeout, |event| {
            matches!(event, Event::Incoming(Packet::ConnAck(_)))
        })
        .await?;

        let (host, port) = self.options.broker_address();
        debug!(%host, port, "CONNACK received");
        self.connection = Some(Connection { client, eventloop });
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let timeout = self.timeout;
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransportError::NotConnected)?;

        let result = connection.publish(topic, payload, timeout).await;
        if result.is_err() {
            self.connection = None;
        }
        result
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        connection.client.disconnect().await?;
        // The broker closes the socket after DISCONNECT; a poll error here is expected.
        match poll_until(&mut connection.eventloop, self.timeout, |event| {
            matches!(event, Event::Outgoing(Outgoing::Disconnect))
        })
        .await
        {
            Ok(()) | Err(TransportError::Unreachable(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
