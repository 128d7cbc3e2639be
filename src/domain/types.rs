//! Shared types for the traffic-light panel

use serde_json::Value;

/// Lifecycle of the single MQTT session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnStatus::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnStatus::Disconnected => "disconnected",
            ConnStatus::Connecting => "connecting",
            ConnStatus::Connected => "connected",
        }
    }
}

/// Traffic-light phase reported by the device.
///
/// `Unknown` absorbs any label the translation table does not recognize,
/// leaving room for firmware additions without breaking the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CarGreen,
    CarYellow,
    CarRed,
    Off,
    Unknown,
}

impl Phase {
    /// Translate a free-text state label into a phase.
    ///
    /// The controller firmware reports Portuguese labels ("verde",
    /// "amarelo", "vermelho", compounds like "carro_verde"); English
    /// equivalents are accepted too. Matching is case-insensitive and the
    /// first rule wins. A bare color token only counts for green; yellow
    /// and red match on substring, which already covers the compound forms.
    pub fn from_label(label: &str) -> Self {
        let s = label.trim().to_lowercase();
        let has = |token: &str| s.contains(token);

        if (has("verde") && has("carro"))
            || (has("green") && has("car"))
            || s == "verde"
            || s == "green"
        {
            Phase::CarGreen
        } else if has("amarelo") || has("yellow") {
            Phase::CarYellow
        } else if has("vermelho") || has("red") {
            Phase::CarRed
        } else if matches!(s.as_str(), "desligado" | "parado" | "off" | "stopped") {
            Phase::Off
        } else {
            Phase::Unknown
        }
    }

    /// Label the device publishes for this phase.
    pub fn wire_label(&self) -> &'static str {
        match self {
            Phase::CarGreen => "verde",
            Phase::CarYellow => "amarelo",
            Phase::CarRed => "vermelho",
            Phase::Off => "desligado",
            Phase::Unknown => "desconhecido",
        }
    }
}

/// The five indicator lights on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightSet {
    pub car_red: bool,
    pub car_yellow: bool,
    pub car_green: bool,
    pub ped_red: bool,
    pub ped_green: bool,
}

impl LightSet {
    /// Everything dark. Baseline while disconnected or when the state is
    /// unknown.
    pub fn off() -> Self {
        Self::default()
    }

    /// Lights for a device phase. A green or yellow car light holds
    /// pedestrians on red; a red car light releases them.
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::CarGreen => Self { car_green: true, ped_red: true, ..Self::default() },
            Phase::CarYellow => Self { car_yellow: true, ped_red: true, ..Self::default() },
            Phase::CarRed => Self { car_red: true, ped_green: true, ..Self::default() },
            Phase::Off | Phase::Unknown => Self::default(),
        }
    }
}

/// Decoded status payload from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub active: bool,
    pub state: Option<String>,
}

impl StatusUpdate {
    /// Parse a status payload. Returns the update plus a pretty-printed
    /// rendition for display, or None when the text is not JSON at all.
    ///
    /// `active` is coerced truthy/falsy; `state` must be a non-empty
    /// string, anything else counts as absent. A JSON scalar like `42` is
    /// still valid JSON and yields an inactive update with no state.
    pub fn parse(text: &str) -> Option<(Self, String)> {
        let value: Value = serde_json::from_str(text).ok()?;
        let active = truthy(value.get("active"));
        let state = value
            .get("state")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string());
        Some((Self { active, state }, pretty))
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Operator command tokens understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Literal token published on the command topic.
    pub fn token(&self) -> &'static str {
        match self {
            Command::Start => "INICIAR",
            Command::Stop => "PARAR",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Events emitted by the MQTT link task and consumed by the panel
/// dispatcher. Keeps panel logic testable without a live transport.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Broker acknowledged the connection.
    Connected,
    /// The transport is about to retry after a failure.
    Reconnecting,
    /// Non-fatal transport error.
    Error(String),
    /// Connection closed, with the reason to log.
    Closed(String),
    /// Inbound publish.
    Message { topic: String, payload: Vec<u8> },
}
