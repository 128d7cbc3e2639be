//! Panel state and event dispatch
//!
//! One owning object holds everything the panel displays: connection
//! status, the five lights, the decoded device state, and the event log.
//! The MQTT link task and the UI loop mutate it through short critical
//! sections; all transport happenings arrive as `LinkEvent`s through a
//! single `dispatch` entry point, so the whole surface is testable without
//! a live broker.

use crate::domain::{Command, ConnStatus, LightSet, LinkEvent, Phase, StatusUpdate};
use crate::infra::log::EventLog;
use std::time::{Duration, Instant};
use time::macros::format_description;
use time::OffsetDateTime;

/// How often the staleness check runs.
pub const STALE_CHECK_PERIOD: Duration = Duration::from_secs(5);

/// Age past which a confirmed status counts as stale.
pub const STALE_AFTER: Duration = Duration::from_secs(10);

/// Operator-editable connection fields. Values are read at the moment of
/// each connect, subscribe, or publish, never cached by the transport.
#[derive(Debug, Clone)]
pub struct Fields {
    pub broker: String,
    pub client_id: String,
    pub command_topic: String,
    pub status_topic: String,
}

/// A command that passed the gate and is ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub topic: String,
    pub command: Command,
}

pub struct Panel {
    pub fields: Fields,
    conn: ConnStatus,
    lights: LightSet,
    state_label: Option<String>,
    active: bool,
    stale: bool,
    last_raw: Option<String>,
    last_at: Option<OffsetDateTime>,
    last_status_at: Option<Instant>,
    log: EventLog,
}

impl Panel {
    pub fn new(fields: Fields) -> Self {
        let mut log = EventLog::new();
        log.push("panel ready, configure the broker and connect");
        Self {
            fields,
            conn: ConnStatus::Disconnected,
            lights: LightSet::off(),
            state_label: None,
            active: false,
            stale: false,
            last_raw: None,
            last_at: None,
            last_status_at: None,
            log,
        }
    }

    /// Single entry point for transport events.
    pub fn dispatch(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                self.conn = ConnStatus::Connected;
                self.log.push("connected to broker");
            }
            LinkEvent::Reconnecting => {
                self.log.push("reconnecting...");
            }
            LinkEvent::Error(e) => {
                self.log.push(format!("mqtt error: {e}"));
            }
            LinkEvent::Closed(reason) => {
                self.conn = ConnStatus::Disconnected;
                self.clear_display();
                self.log.push(reason);
            }
            LinkEvent::Message { topic, payload } => {
                self.handle_message(&topic, &payload);
            }
        }
    }

    fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload).into_owned();
        // compared against the field at receipt time, so an edited status
        // topic stops matching immediately
        if topic == self.fields.status_topic {
            self.handle_status(&text);
        } else {
            self.log.push(format!("message on {topic}: {text}"));
        }
    }

    fn handle_status(&mut self, text: &str) {
        self.last_at = Some(now_local());
        self.last_status_at = Some(Instant::now());
        self.stale = false;

        match StatusUpdate::parse(text) {
            Some((update, pretty)) => {
                self.last_raw = Some(pretty);
                self.active = update.active;
                self.lights = match update.state.as_deref() {
                    Some(label) => LightSet::for_phase(Phase::from_label(label)),
                    None => LightSet::off(),
                };
                self.log.push(format!(
                    "status -> active:{} state:{}",
                    update.active,
                    update.state.as_deref().unwrap_or("-")
                ));
                self.state_label = update.state;
            }
            None => {
                // opaque payload: show it verbatim, leave lights alone
                self.last_raw = Some(text.to_string());
                self.log.push(format!("status received (not JSON): {text}"));
            }
        }
    }

    /// Connection attempt underway; the transport owns retries from here.
    /// The id is passed in because an empty field means one was generated
    /// for this attempt only.
    pub fn note_connecting(&mut self, client_id: &str) {
        self.conn = ConnStatus::Connecting;
        self.log.push(format!("connecting to {} (client id {})", self.fields.broker, client_id));
    }

    /// Client construction failed; connection state is left untouched.
    pub fn note_connect_failed(&mut self, error: &str) {
        self.log.push(format!("failed to create mqtt client: {error}"));
    }

    pub fn note_subscribed(&mut self, topic: &str) {
        self.log.push(format!("subscribed to {topic}"));
    }

    /// Subscribe failure is logged only; the connection stays up.
    pub fn note_subscribe_failed(&mut self, topic: &str, error: &str) {
        self.log.push(format!("subscribe to {topic} failed: {error}"));
    }

    pub fn note_publish_result(&mut self, command: Command, topic: &str, result: Result<(), String>) {
        match result {
            Ok(()) => self.log.push(format!("published on {topic}: {command}")),
            Err(e) => self.log.push(format!("publish of {command} failed: {e}")),
        }
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.log.push(message);
    }

    /// Gate a command on connection and topic state. Returns the publish
    /// to perform, or None with the refusal logged.
    pub fn prepare_command(&mut self, command: Command) -> Option<OutboundCommand> {
        if !self.conn.is_connected() {
            self.log.push("not connected, connect to the broker before sending commands");
            return None;
        }
        let topic = self.fields.command_topic.trim().to_string();
        if topic.is_empty() {
            self.log.push("command topic is empty");
            return None;
        }
        Some(OutboundCommand { topic, command })
    }

    /// Periodic check that flags a quiet status topic. The stale flag is
    /// set, not appended, so repeated ticks leave a single suffix on the
    /// displayed label. Never fires before the first status arrives.
    pub fn staleness_tick(&mut self, now: Instant) {
        if !self.conn.is_connected() {
            return;
        }
        let Some(received) = self.last_status_at else {
            return;
        };
        let elapsed = now.duration_since(received);
        if elapsed > STALE_AFTER {
            self.stale = true;
            self.log.push(format!("no status update for {}s", elapsed.as_secs()));
        }
    }

    fn clear_display(&mut self) {
        self.lights = LightSet::off();
        self.state_label = None;
        self.active = false;
        self.stale = false;
    }

    // Read side for the draw loop

    pub fn conn(&self) -> ConnStatus {
        self.conn
    }

    pub fn lights(&self) -> LightSet {
        self.lights
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn stale(&self) -> bool {
        self.stale
    }

    /// State label for display: dash placeholder when unknown, stale
    /// suffix applied at most once.
    pub fn display_state(&self) -> String {
        let label = self.state_label.as_deref().unwrap_or("-");
        if self.stale {
            format!("{label} (no update)")
        } else {
            label.to_string()
        }
    }

    pub fn last_raw(&self) -> Option<&str> {
        self.last_raw.as_deref()
    }

    pub fn last_at_stamp(&self) -> Option<String> {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        self.last_at.and_then(|at| at.format(&fmt).ok())
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fields() -> Fields {
        Fields {
            broker: "localhost:1883".to_string(),
            client_id: "test-panel".to_string(),
            command_topic: "semaforo/cmd".to_string(),
            status_topic: "semaforo/status".to_string(),
        }
    }

    fn connected_panel() -> Panel {
        let mut panel = Panel::new(test_fields());
        panel.note_connecting("test-panel");
        panel.dispatch(LinkEvent::Connected);
        panel
    }

    fn status_message(json: &str) -> LinkEvent {
        LinkEvent::Message {
            topic: "semaforo/status".to_string(),
            payload: json.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_connect_lifecycle() {
        let mut panel = Panel::new(test_fields());
        assert_eq!(panel.conn(), ConnStatus::Disconnected);
        panel.note_connecting("test-panel");
        assert_eq!(panel.conn(), ConnStatus::Connecting);
        panel.dispatch(LinkEvent::Connected);
        assert!(panel.conn().is_connected());
    }

    #[test]
    fn test_status_round_trip() {
        let mut panel = connected_panel();
        panel.dispatch(status_message(r#"{"active":true,"state":"verde"}"#));

        assert!(panel.active());
        assert_eq!(panel.display_state(), "verde");
        let lights = panel.lights();
        assert!(lights.car_green && lights.ped_red);
        assert!(!lights.car_red && !lights.car_yellow && !lights.ped_green);
        assert!(panel.last_raw().unwrap().contains("verde"));
        assert!(panel.last_at_stamp().is_some());
    }

    #[test]
    fn test_non_json_status_keeps_lights() {
        let mut panel = connected_panel();
        panel.dispatch(status_message(r#"{"active":true,"state":"verde"}"#));
        panel.dispatch(status_message("OFFLINE"));

        // raw display switches to the opaque text, lights stay green
        assert_eq!(panel.last_raw(), Some("OFFLINE"));
        assert!(panel.lights().car_green);
        assert_eq!(panel.display_state(), "verde");
        assert!(panel.log().iter().any(|e| e.message.contains("not JSON")));
    }

    #[test]
    fn test_null_state_clears_lights_but_shows_active() {
        let mut panel = connected_panel();
        panel.dispatch(status_message(r#"{"active":true,"state":"verde"}"#));
        panel.dispatch(status_message(r#"{"active":true}"#));

        assert_eq!(panel.display_state(), "-");
        assert!(panel.active());
        assert_eq!(panel.lights(), LightSet::off());
    }

    #[test]
    fn test_other_topic_is_logged_not_interpreted() {
        let mut panel = connected_panel();
        panel.dispatch(LinkEvent::Message {
            topic: "semaforo/debug".to_string(),
            payload: b"hello".to_vec(),
        });

        assert_eq!(panel.lights(), LightSet::off());
        assert!(panel.log().iter().any(|e| e.message.contains("semaforo/debug")));
    }

    #[test]
    fn test_status_topic_read_at_receipt_time() {
        let mut panel = connected_panel();
        panel.fields.status_topic = "semaforo/estado".to_string();

        // old topic no longer matches
        panel.dispatch(status_message(r#"{"active":true,"state":"verde"}"#));
        assert_eq!(panel.lights(), LightSet::off());

        panel.dispatch(LinkEvent::Message {
            topic: "semaforo/estado".to_string(),
            payload: br#"{"active":true,"state":"verde"}"#.to_vec(),
        });
        assert!(panel.lights().car_green);
    }

    #[test]
    fn test_command_refused_when_disconnected() {
        let mut panel = Panel::new(test_fields());
        assert_eq!(panel.prepare_command(Command::Start), None);
        assert!(panel.log().iter().any(|e| e.message.contains("not connected")));
    }

    #[test]
    fn test_command_refused_on_empty_topic() {
        let mut panel = connected_panel();
        panel.fields.command_topic = "  ".to_string();
        assert_eq!(panel.prepare_command(Command::Stop), None);
        assert!(panel.log().iter().any(|e| e.message.contains("command topic is empty")));
    }

    #[test]
    fn test_command_passes_gate_when_connected() {
        let mut panel = connected_panel();
        let outbound = panel.prepare_command(Command::Start).unwrap();
        assert_eq!(outbound.topic, "semaforo/cmd");
        assert_eq!(outbound.command, Command::Start);
    }

    #[test]
    fn test_publish_result_logged() {
        let mut panel = connected_panel();
        panel.note_publish_result(Command::Start, "semaforo/cmd", Ok(()));
        assert!(panel.log().iter().any(|e| e.message.contains("published on semaforo/cmd: INICIAR")));
        panel.note_publish_result(Command::Stop, "semaforo/cmd", Err("queue full".to_string()));
        assert!(panel.log().iter().any(|e| e.message.contains("publish of PARAR failed")));
    }

    #[test]
    fn test_disconnect_clears_display() {
        let mut panel = connected_panel();
        panel.dispatch(status_message(r#"{"active":true,"state":"vermelho"}"#));
        assert!(panel.lights().car_red && panel.lights().ped_green);

        panel.dispatch(LinkEvent::Closed("disconnected by operator".to_string()));

        assert_eq!(panel.conn(), ConnStatus::Disconnected);
        assert_eq!(panel.lights(), LightSet::off());
        assert!(!panel.active());
        assert_eq!(panel.display_state(), "-");
    }

    #[test]
    fn test_staleness_is_idempotent() {
        let mut panel = connected_panel();
        panel.dispatch(status_message(r#"{"active":true,"state":"verde"}"#));

        let later = Instant::now() + STALE_AFTER + Duration::from_secs(1);
        let warnings_before = warning_count(&panel);

        panel.staleness_tick(later);
        assert!(panel.stale());
        assert_eq!(panel.display_state(), "verde (no update)");

        // a second tick warns again but never stacks the suffix
        panel.staleness_tick(later + STALE_CHECK_PERIOD);
        assert_eq!(panel.display_state(), "verde (no update)");
        assert_eq!(warning_count(&panel), warnings_before + 2);
    }

    #[test]
    fn test_staleness_requires_connection_and_prior_status() {
        let mut panel = Panel::new(test_fields());
        panel.staleness_tick(Instant::now() + Duration::from_secs(60));
        assert!(!panel.stale());

        let mut panel = connected_panel();
        // connected but nothing received yet: no warning
        panel.staleness_tick(Instant::now() + Duration::from_secs(60));
        assert!(!panel.stale());
    }

    #[test]
    fn test_fresh_status_clears_staleness() {
        let mut panel = connected_panel();
        panel.dispatch(status_message(r#"{"active":true,"state":"verde"}"#));
        panel.staleness_tick(Instant::now() + STALE_AFTER + Duration::from_secs(1));
        assert!(panel.stale());

        panel.dispatch(status_message(r#"{"active":true,"state":"amarelo"}"#));
        assert!(!panel.stale());
        assert_eq!(panel.display_state(), "amarelo");
    }

    fn warning_count(panel: &Panel) -> usize {
        panel.log().iter().filter(|e| e.message.contains("no status update")).count()
    }
}
