//! MQTT link between the panel and the broker
//!
//! Owns the rumqttc client plus its event loop task and maps transport
//! happenings to `LinkEvent`s dispatched into the shared panel state. One
//! link exists per connect/disconnect cycle; it is replaced wholesale,
//! never reused.

use crate::domain::LinkEvent;
use crate::services::{OutboundCommand, Panel};
use anyhow::{bail, Context};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Panel state shared between the UI loop and the link task.
pub type SharedPanel = Arc<Mutex<Panel>>;

/// Bound on the broker handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(4000);

/// Fixed pause between reconnect attempts after a transport failure.
pub const RECONNECT_PERIOD: Duration = Duration::from_millis(2000);

/// Topic the device listens on for status re-announce requests.
pub const GET_TOPIC: &str = "semaforo/get";

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const EVENT_CAPACITY: usize = 100;

/// Split a free-text broker field into host and port. Accepts "host",
/// "host:port" and tolerates an mqtt:// or tcp:// scheme prefix.
pub fn parse_broker_addr(addr: &str) -> anyhow::Result<(String, u16)> {
    let trimmed = addr.trim();
    let trimmed = trimmed
        .strip_prefix("mqtt://")
        .or_else(|| trimmed.strip_prefix("tcp://"))
        .unwrap_or(trimmed);
    if trimmed.is_empty() {
        bail!("broker address is empty");
    }
    match trimmed.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                bail!("broker address {addr:?} has no host");
            }
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid port in broker address {addr:?}"))?;
            Ok((host.to_string(), port))
        }
        None => Ok((trimmed.to_string(), 1883)),
    }
}

/// Use the configured client id, or generate one per connect.
pub fn effective_client_id(configured: &str) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        let uuid = Uuid::now_v7().simple().to_string();
        // the tail of the uuid carries the random bits
        format!("web-client-{}", &uuid[uuid.len() - 8..])
    } else {
        trimmed.to_string()
    }
}

/// Handle for one broker session.
pub struct MqttLink {
    client: AsyncClient,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MqttLink {
    /// Build the client and spawn its event loop task. Does not wait for
    /// the handshake; the panel hears about it as a `Connected` event.
    pub fn open(broker: &str, client_id: &str, panel: SharedPanel) -> anyhow::Result<Self> {
        let (host, port) = parse_broker_addr(broker)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_link(eventloop, client.clone(), panel, shutdown_rx));

        Ok(Self { client, shutdown: shutdown_tx, task })
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Graceful close. Errors are swallowed; the handle is dropped either
    /// way.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        let _ = self.client.disconnect().await;
        self.task.abort();
    }
}

/// Fire a gated command and log the outcome. Runs as its own task so the
/// UI loop never waits on the network.
pub fn spawn_publish(client: AsyncClient, outbound: OutboundCommand, panel: SharedPanel) {
    tokio::spawn(async move {
        let result = client
            .publish(&outbound.topic, QoS::AtMostOnce, false, outbound.command.token())
            .await
            .map_err(|e| e.to_string());
        panel.lock().note_publish_result(outbound.command, &outbound.topic, result);
    });
}

async fn run_link(
    mut eventloop: rumqttc::EventLoop,
    client: AsyncClient,
    panel: SharedPanel,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let connected = panel.lock().conn().is_connected();
        tokio::select! {
            changed = shutdown.changed() => {
                // a dropped sender means the link handle is gone, stop too
                if changed.is_err() || *shutdown.borrow() {
                    debug!("mqtt_link_shutdown");
                    return;
                }
            }
            polled = poll_bounded(&mut eventloop, connected) => match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    panel.lock().dispatch(LinkEvent::Connected);
                    subscribe_status(&client, &panel).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    panel.lock().dispatch(LinkEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    {
                        let mut p = panel.lock();
                        if p.conn().is_connected() {
                            p.dispatch(LinkEvent::Closed("connection closed".to_string()));
                        } else {
                            p.dispatch(LinkEvent::Error(e));
                        }
                        p.dispatch(LinkEvent::Reconnecting);
                    }
                    tokio::time::sleep(RECONNECT_PERIOD).await;
                }
            }
        }
    }
}

/// Poll the event loop, bounding the handshake while disconnected so a
/// dead broker surfaces within the connect timeout.
async fn poll_bounded(eventloop: &mut rumqttc::EventLoop, connected: bool) -> Result<Event, String> {
    if connected {
        eventloop.poll().await.map_err(|e| e.to_string())
    } else {
        match tokio::time::timeout(CONNECT_TIMEOUT, eventloop.poll()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("connect timeout after {}ms", CONNECT_TIMEOUT.as_millis())),
        }
    }
}

/// Subscribe to the status topic named by the field right now, then ask
/// the device to re-announce itself. Subscribe failure is logged without
/// touching the connection state.
async fn subscribe_status(client: &AsyncClient, panel: &SharedPanel) {
    let topic = panel.lock().fields.status_topic.trim().to_string();
    if topic.is_empty() {
        panel.lock().note("status topic is empty, nothing to subscribe");
        return;
    }
    match client.subscribe(&topic, QoS::AtMostOnce).await {
        Ok(_) => {
            panel.lock().note_subscribed(&topic);
            if let Err(e) = client.publish(GET_TOPIC, QoS::AtMostOnce, false, "GET").await {
                panel.lock().note(format!("status refresh request failed: {e}"));
            }
        }
        Err(e) => panel.lock().note_subscribe_failed(&topic, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_addr() {
        assert_eq!(parse_broker_addr("localhost:1883").unwrap(), ("localhost".to_string(), 1883));
        assert_eq!(parse_broker_addr("broker.lan").unwrap(), ("broker.lan".to_string(), 1883));
        assert_eq!(
            parse_broker_addr("mqtt://10.0.0.5:2883").unwrap(),
            ("10.0.0.5".to_string(), 2883)
        );
        assert_eq!(
            parse_broker_addr("  tcp://broker.lan:1884  ").unwrap(),
            ("broker.lan".to_string(), 1884)
        );
    }

    #[test]
    fn test_parse_broker_addr_rejects_garbage() {
        assert!(parse_broker_addr("").is_err());
        assert!(parse_broker_addr("   ").is_err());
        assert!(parse_broker_addr("host:notaport").is_err());
        assert!(parse_broker_addr(":1883").is_err());
    }

    #[test]
    fn test_effective_client_id_generates_prefixed() {
        let id = effective_client_id("");
        assert!(id.starts_with("web-client-"));
        assert_eq!(id.len(), "web-client-".len() + 8);
        // two connects must not share an identifier
        assert_ne!(effective_client_id(""), effective_client_id(""));
    }

    #[test]
    fn test_effective_client_id_keeps_configured() {
        assert_eq!(effective_client_id(" painel-1 "), "painel-1");
    }
}
