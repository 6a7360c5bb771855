//! Broker session lifecycle.
//!
//! [`BrokerSession`] owns the single outbound connection and its state. It
//! never retries on its own: a failed connect is reported to the caller, and a
//! failed publish drops the session back to [`SessionState::Disconnected`] so
//! the caller knows to reconnect before the next publish.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Fault reported by the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Broker unreachable: {0}")]
    Unreachable(String),
    #[error("Broker refused connection: {0}")]
    Refused(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transport not connected")]
    NotConnected,
    #[error("Client error: {0}")]
    Client(String),
}

/// Message broker transport.
pub trait Transport {
    /// Open a session with the broker.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>>;

    /// Send one message.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>>;

    /// Close the session.
    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>>;
}

/// Connection state, owned by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
}

/// The broker rejected or could not be reached by a connect attempt.
#[derive(Debug, Error)]
#[error("Failed to connect to broker: {0}")]
pub struct ConnectionError(#[source] pub TransportError);

/// A publish did not reach the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Not connected to broker")]
    NotConnected,
    #[error("Failed to publish to '{topic}': {source}")]
    Transport {
        topic: String,
        #[source]
        source: TransportError,
    },
}

/// The node's single broker connection.
pub struct BrokerSession<T> {
    transport: T,
    state: SessionState,
    connects: u64,
}

impl<T: Transport> BrokerSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::Disconnected,
            connects: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Successful connects since creation.
    pub fn connect_count(&self) -> u64 {
        self.connects
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Establish the session. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            return Ok(());
        }

        self.transport.connect().await.map_err(ConnectionError)?;
        self.state = SessionState::Connected;
        self.connects += 1;
        info!(connects = self.connects, "Connected to MQTT broker");
        Ok(())
    }

    /// Publish one message. Any transport failure disconnects the session.
    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }

        match self.transport.publish(topic, payload).await {
            Ok(()) => Ok(()),
            Err(source) => {
                self.state = SessionState::Disconnected;
                Err(PublishError::Transport {
                    topic: topic.to_string(),
                    source,
                })
            }
        }
    }

    /// Close the session, ignoring transport errors. Safe in any state.
    pub async fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }

        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "Error while disconnecting from broker");
        }
        self.state = SessionState::Disconnected;
        info!("Disconnected from MQTT broker");
    }
}
