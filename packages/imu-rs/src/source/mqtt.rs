// MQTT streaming source
//
// Subscribes to a broker topic the device publishes to, one JSON sample per
// message. Messages are delivered from the MQTT event loop, which runs on the
// session's transport task concurrently with the capture loop.
//
// When both a username and a password are configured the connection is made
// over TLS with the platform root certificates; credentials are never sent in
// clear text.

use super::{
    SourceCloser, SourceMetadata, TransportSource, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MQTT_PORT,
};
use crate::error::{CaptureError, CaptureResult};
use crate::types::RawPayload;
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    Transport,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

const REQUEST_CAPACITY: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
const MIN_KEEP_ALIVE_SECS: u64 = 5;

fn default_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_keep_alive() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_client_id() -> String {
    format!("imulog-{}", std::process::id())
}

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub topic: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl MqttSettings {
    pub fn new(host: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MQTT_PORT,
            topic: topic.into(),
            client_id: default_client_id(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Username and password, only when both are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// TLS is mandatory whenever credentials are in use.
    pub fn requires_tls(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.host.trim().is_empty() {
            return Err(CaptureError::InvalidConfig("MQTT host must not be empty".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(CaptureError::InvalidConfig("MQTT topic must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(CaptureError::InvalidConfig("MQTT port must not be 0".to_string()));
        }
        if self.client_id.is_empty() || self.client_id.starts_with(char::is_whitespace) {
            return Err(CaptureError::InvalidConfig(
                "MQTT client id must not be empty or start with whitespace".to_string(),
            ));
        }
        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(CaptureError::InvalidConfig(format!(
                "MQTT keep-alive must be at least {} seconds",
                MIN_KEEP_ALIVE_SECS
            )));
        }
        Ok(())
    }

    pub(crate) fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));

        if let Some((user, pass)) = self.credentials() {
            options.set_credentials(user, pass);
            options.set_transport(Transport::tls_with_default_config());
        }

        options
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct MqttSource {
    settings: MqttSettings,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    connect_timeout: Duration,
    closer: SourceCloser,
}

impl MqttSource {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            client: None,
            eventloop: None,
            connect_timeout: CONNECT_TIMEOUT,
            closer: SourceCloser::new(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn refused(&self, code: ConnectReturnCode) -> CaptureError {
        CaptureError::Connection(format!(
            "Broker {} refused connection: {:?}",
            self.settings.address(),
            code
        ))
    }
}

#[async_trait]
impl TransportSource for MqttSource {
    async fn connect(&mut self) -> CaptureResult<()> {
        if self.eventloop.is_some() {
            return Ok(());
        }

        let address = self.settings.address();
        log::info!(
            "Connecting to MQTT broker {} (tls: {})",
            address,
            self.settings.requires_tls()
        );

        let (client, mut eventloop) = AsyncClient::new(self.settings.options(), REQUEST_CAPACITY);

        let handshake = tokio::time::timeout(self.connect_timeout, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => return Ok(ack),
                    Ok(_) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match handshake {
            Err(_) => {
                return Err(CaptureError::Connection(format!(
                    "Timed out connecting to {} after {:?}",
                    address, self.connect_timeout
                )))
            }
            Ok(Err(ConnectionError::ConnectionRefused(code))) => return Err(self.refused(code)),
            Ok(Err(e)) => {
                return Err(CaptureError::Connection(format!(
                    "MQTT connection to {} failed: {}",
                    address, e
                )))
            }
            Ok(Ok(ack)) if ack.code != ConnectReturnCode::Success => {
                return Err(self.refused(ack.code))
            }
            Ok(Ok(_)) => {}
        }

        log::info!("Connected to MQTT broker {}", address);

        client
            .subscribe(self.settings.topic.clone(), QoS::AtMostOnce)
            .await
            .map_err(|e| CaptureError::Mqtt(format!("Subscribe request failed: {}", e)))?;

        self.client = Some(client);
        self.eventloop = Some(eventloop);

        Ok(())
    }

    async fn start(&mut self, sender: mpsc::Sender<RawPayload>) -> CaptureResult<()> {
        if self.eventloop.is_none() {
            self.connect().await?;
        }

        let (Some(mut eventloop), Some(client)) = (self.eventloop.take(), self.client.take())
        else {
            return Err(CaptureError::Mqtt("MQTT source is not connected".to_string()));
        };

        let topic = self.settings.topic.clone();
        let shutdown = self.closer.token();
        let mut message_count = 0u64;

        log::info!("MQTT delivery loop started on {}", topic);

        loop {
            let event = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    log::info!("MQTT source closed");
                    break;
                }

                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    message_count += 1;
                    if message_count % 1000 == 0 {
                        log::debug!("Received {} MQTT messages", message_count);
                    }

                    if sender
                        .send(RawPayload::from(publish.payload.to_vec()))
                        .await
                        .is_err()
                    {
                        log::info!("MQTT stream receiver closed, stopping");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // A fresh clean session has no subscriptions
                    log::info!("Reconnected to MQTT broker, resubscribing to {}", topic);
                    if let Err(e) = client.try_subscribe(topic.clone(), QoS::AtMostOnce) {
                        log::error!("Resubscribe failed: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    log::info!("Subscribed to {}", topic);
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(
                        "MQTT connection error: {}; retrying in {:?}",
                        e,
                        RECONNECT_BACKOFF
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    }
                }
            }
        }

        if let Err(e) = client.try_disconnect() {
            log::debug!("MQTT disconnect request not sent: {}", e);
        }

        log::info!("MQTT stream stopped (received {} messages)", message_count);

        Ok(())
    }

    fn closer(&self) -> SourceCloser {
        self.closer.clone()
    }

    fn is_connected(&self) -> bool {
        self.eventloop.is_some()
    }

    fn metadata(&self) -> SourceMetadata {
        SourceMetadata::new("mqtt")
            .with("address", self.settings.address())
            .with("topic", &self.settings.topic)
            .with("tls", self.settings.requires_tls())
    }
}
