//! Semaforo device simulator
//!
//! Stands in for the traffic-light controller during panel development:
//! honors INICIAR/PARAR on the command topic, answers GET on semaforo/get,
//! and walks the verde -> amarelo -> vermelho cycle while active,
//! publishing retained status JSON after every change.
//!
//! Usage:
//!   cargo run --bin semaforo-sim -- --host localhost --port 1883

use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use semaforo_panel::domain::Phase;
use semaforo_panel::io::GET_TOPIC;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const GREEN_MS: u64 = 5000;
const YELLOW_MS: u64 = 2000;
const RED_MS: u64 = 5000;

/// Semaforo simulator - fake traffic-light controller for local testing
#[derive(Parser, Debug)]
#[command(name = "semaforo-sim", version, about)]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    port: u16,

    /// Command topic to listen on
    #[arg(long, default_value = "semaforo/cmd")]
    command_topic: String,

    /// Status topic to publish on
    #[arg(long, default_value = "semaforo/status")]
    status_topic: String,
}

struct Semaforo {
    active: bool,
    phase: Phase,
}

impl Semaforo {
    fn new() -> Self {
        Self { active: false, phase: Phase::Off }
    }

    fn status_json(&self) -> String {
        json!({ "active": self.active, "state": self.phase.wire_label() }).to_string()
    }

    /// Step to the next phase of the cycle.
    fn advance(&mut self) {
        self.phase = match self.phase {
            Phase::CarGreen => Phase::CarYellow,
            Phase::CarYellow => Phase::CarRed,
            _ => Phase::CarGreen,
        };
    }

    fn dwell(&self) -> Duration {
        Duration::from_millis(match self.phase {
            Phase::CarGreen => GREEN_MS,
            Phase::CarYellow => YELLOW_MS,
            _ => RED_MS,
        })
    }

    fn start(&mut self) {
        self.active = true;
        self.phase = Phase::CarGreen;
    }

    fn stop(&mut self) {
        self.active = false;
        self.phase = Phase::Off;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();

    let client_id = format!("semaforo-sim-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, &args.host, args.port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(options, 100);

    info!(
        host = %args.host,
        port = %args.port,
        command_topic = %args.command_topic,
        status_topic = %args.status_topic,
        "semaforo_sim_starting"
    );

    let mut device = Semaforo::new();
    let mut next_step: Option<Instant> = None;

    loop {
        let step_at = next_step;
        let step = async move {
            match step_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = step => {
                device.advance();
                next_step = Some(Instant::now() + device.dwell());
                info!(state = %device.phase.wire_label(), "phase_changed");
                publish_status(&client, &args.status_topic, &device).await;
            }
            polled = eventloop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt_connected");
                    // clean session drops subscriptions, redo them per connect
                    for topic in [args.command_topic.as_str(), GET_TOPIC] {
                        if let Err(e) = client.subscribe(topic, QoS::AtMostOnce).await {
                            warn!(topic = %topic, error = %e, "subscribe_failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.as_str();
                    let payload = String::from_utf8_lossy(&publish.payload);
                    if topic == args.command_topic {
                        match payload.trim() {
                            "INICIAR" => {
                                device.start();
                                next_step = Some(Instant::now() + device.dwell());
                                info!("command_start");
                                publish_status(&client, &args.status_topic, &device).await;
                            }
                            "PARAR" => {
                                device.stop();
                                next_step = None;
                                info!("command_stop");
                                publish_status(&client, &args.status_topic, &device).await;
                            }
                            other => warn!(command = %other, "unknown_command"),
                        }
                    } else if topic == GET_TOPIC {
                        info!("status_requested");
                        publish_status(&client, &args.status_topic, &device).await;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "mqtt_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

async fn publish_status(client: &AsyncClient, topic: &str, device: &Semaforo) {
    // retained so a late-joining panel sees the current state immediately
    if let Err(e) = client.publish(topic, QoS::AtMostOnce, true, device.status_json()).await {
        warn!(error = %e, "status_publish_failed");
    }
}
