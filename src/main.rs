//! Semaforo Panel - operator console for a remote traffic-light controller
//!
//! Connects to an MQTT broker, publishes START/STOP commands and mirrors
//! the device-reported state: the five indicator lights, the active flag
//! and the raw status payload. The display only ever shows confirmed
//! device status; commands do not touch it.
//!
//! Keyboard shortcuts:
//! - c: Connect to the broker
//! - d: Disconnect
//! - s: Send START (INICIAR)
//! - p: Send STOP (PARAR)
//! - e: Edit connection fields (Tab cycles, Enter/Esc done)
//! - q: Quit
//!
//! Usage:
//!   cargo run --bin semaforo-panel -- --config config/dev.toml

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use semaforo_panel::domain::{Command, ConnStatus, LinkEvent};
use semaforo_panel::infra::Config;
use semaforo_panel::io::{effective_client_id, spawn_publish, MqttLink, SharedPanel};
use semaforo_panel::services::{Fields, Panel, STALE_CHECK_PERIOD};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Semaforo Panel - MQTT control panel for a traffic-light controller
#[derive(Parser, Debug)]
#[command(name = "semaforo-panel", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// Override the broker address from the config
    #[arg(long)]
    broker: Option<String>,

    /// Override the client identifier from the config
    #[arg(long)]
    client_id: Option<String>,
}

/// Which connection field the edit mode is focused on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Broker,
    ClientId,
    CommandTopic,
    StatusTopic,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Broker => Field::ClientId,
            Field::ClientId => Field::CommandTopic,
            Field::CommandTopic => Field::StatusTopic,
            Field::StatusTopic => Field::Broker,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Field::Broker => "broker",
            Field::ClientId => "client id",
            Field::CommandTopic => "cmd topic",
            Field::StatusTopic => "status topic",
        }
    }
}

struct App {
    panel: SharedPanel,
    link: Option<MqttLink>,
    focus: Field,
    editing: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    if config.broker_embedded() {
        semaforo_panel::infra::broker::start_embedded_broker(
            config.broker_bind_address(),
            config.broker_port(),
        );
    }

    let fields = Fields {
        broker: args.broker.unwrap_or_else(|| config.broker_addr().to_string()),
        client_id: args.client_id.unwrap_or_else(|| config.client_id().to_string()),
        command_topic: config.command_topic().to_string(),
        status_topic: config.status_topic().to_string(),
    };
    let panel: SharedPanel = Arc::new(Mutex::new(Panel::new(fields)));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App { panel, link: None, focus: Field::Broker, editing: false };
    let result = run_ui(&mut terminal, &mut app).await;

    if let Some(link) = app.link.take() {
        link.close().await;
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut last_stale_check = Instant::now();

    loop {
        {
            let editing = app.editing;
            let focus = app.focus;
            let p = app.panel.lock();
            terminal.draw(|f| draw_ui(f, &p, editing, focus))?;
        }

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.editing {
                        handle_edit_key(app, key.code);
                    } else {
                        match key.code {
                            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                            KeyCode::Char('c') => do_connect(app),
                            KeyCode::Char('d') => do_disconnect(app).await,
                            KeyCode::Char('s') => do_send(app, Command::Start),
                            KeyCode::Char('p') => do_send(app, Command::Stop),
                            KeyCode::Char('e') => app.editing = true,
                            _ => {}
                        }
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
        if last_stale_check.elapsed() >= STALE_CHECK_PERIOD {
            app.panel.lock().staleness_tick(Instant::now());
            last_stale_check = Instant::now();
        }
    }
}

fn handle_edit_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::Enter | KeyCode::Esc => app.editing = false,
        KeyCode::Backspace => {
            let mut p = app.panel.lock();
            field_value_mut(&mut p, app.focus).pop();
        }
        KeyCode::Char(ch) => {
            let mut p = app.panel.lock();
            field_value_mut(&mut p, app.focus).push(ch);
        }
        _ => {}
    }
}

fn field_value_mut(panel: &mut Panel, field: Field) -> &mut String {
    match field {
        Field::Broker => &mut panel.fields.broker,
        Field::ClientId => &mut panel.fields.client_id,
        Field::CommandTopic => &mut panel.fields.command_topic,
        Field::StatusTopic => &mut panel.fields.status_topic,
    }
}

fn do_connect(app: &mut App) {
    if app.link.is_some() {
        app.panel.lock().note("already connected");
        return;
    }
    let (broker, configured_id) = {
        let p = app.panel.lock();
        (p.fields.broker.clone(), p.fields.client_id.clone())
    };
    let client_id = effective_client_id(&configured_id);
    match MqttLink::open(&broker, &client_id, app.panel.clone()) {
        Ok(link) => {
            app.panel.lock().note_connecting(&client_id);
            app.link = Some(link);
        }
        Err(e) => app.panel.lock().note_connect_failed(&e.to_string()),
    }
}

async fn do_disconnect(app: &mut App) {
    match app.link.take() {
        Some(link) => {
            link.close().await;
            app.panel.lock().dispatch(LinkEvent::Closed("disconnected by operator".to_string()));
        }
        None => app.panel.lock().note("not connected"),
    }
}

fn do_send(app: &App, command: Command) {
    let outbound = app.panel.lock().prepare_command(command);
    if let Some(outbound) = outbound {
        if let Some(link) = &app.link {
            spawn_publish(link.client(), outbound, app.panel.clone());
        }
    }
}

fn draw_ui(f: &mut Frame, panel: &Panel, editing: bool, focus: Field) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
        ])
        .split(f.area());

    draw_header(f, main_chunks[0], panel);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(42), Constraint::Percentage(58)])
        .split(main_chunks[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Connection fields
            Constraint::Length(6), // Lights
            Constraint::Min(0),    // Device status
        ])
        .split(body[0]);

    draw_fields(f, left[0], panel, editing, focus);
    draw_lights(f, left[1], panel);
    draw_status(f, left[2], panel);
    draw_log(f, body[1], panel);
}

fn draw_header(f: &mut Frame, area: Rect, panel: &Panel) {
    let (status_text, status_color) = match panel.conn() {
        ConnStatus::Connected => ("CONNECTED", Color::Green),
        ConnStatus::Connecting => ("CONNECTING", Color::Yellow),
        ConnStatus::Disconnected => ("DISCONNECTED", Color::Red),
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Semaforo Panel ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("v{} ({}) ", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))),
        Span::raw("| "),
        Span::styled("\u{25cf} ", Style::default().fg(status_color)),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(" | c connect  d disconnect  s start  p stop  e edit  q quit"),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_fields(f: &mut Frame, area: Rect, panel: &Panel, editing: bool, focus: Field) {
    let fields = [
        (Field::Broker, panel.fields.broker.as_str()),
        (Field::ClientId, panel.fields.client_id.as_str()),
        (Field::CommandTopic, panel.fields.command_topic.as_str()),
        (Field::StatusTopic, panel.fields.status_topic.as_str()),
    ];

    let lines: Vec<Line> = fields
        .iter()
        .map(|(field, value)| {
            let focused = editing && *field == focus;
            let value_style = if focused {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            let rendered = if focused { format!("{value}_") } else { (*value).to_string() };
            Line::from(vec![
                Span::styled(
                    format!("{:<13}", field.label()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(rendered, value_style),
            ])
        })
        .collect();

    let title = if editing { " Connection (Tab next, Enter done) " } else { " Connection " };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::Blue }));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn light_span(on: bool, color: Color) -> Span<'static> {
    if on {
        Span::styled("\u{25cf}", Style::default().fg(color).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("\u{25cb}", Style::default().fg(Color::DarkGray))
    }
}

fn draw_lights(f: &mut Frame, area: Rect, panel: &Panel) {
    let lights = panel.lights();

    let text = vec![
        Line::from(Span::styled(
            "   CAR    PED",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw("    "),
            light_span(lights.car_red, Color::Red),
            Span::raw("      "),
            light_span(lights.ped_red, Color::Red),
            Span::raw("    red"),
        ]),
        Line::from(vec![
            Span::raw("    "),
            light_span(lights.car_yellow, Color::Yellow),
            Span::raw("           yellow"),
        ]),
        Line::from(vec![
            Span::raw("    "),
            light_span(lights.car_green, Color::Green),
            Span::raw("      "),
            light_span(lights.ped_green, Color::Green),
            Span::raw("    green"),
        ]),
    ];

    let block = Block::default()
        .title(" Lights ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_status(f: &mut Frame, area: Rect, panel: &Panel) {
    let state_style = if panel.stale() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let (active_text, active_color) =
        if panel.active() { ("Yes", Color::Green) } else { ("No", Color::Red) };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("State:  ", Style::default().fg(Color::DarkGray)),
            Span::styled(panel.display_state(), state_style),
        ]),
        Line::from(vec![
            Span::styled("Active: ", Style::default().fg(Color::DarkGray)),
            Span::styled(active_text, Style::default().fg(active_color)),
        ]),
        Line::from(vec![
            Span::styled("Last:   ", Style::default().fg(Color::DarkGray)),
            Span::raw(panel.last_at_stamp().unwrap_or_else(|| "never".to_string())),
        ]),
        Line::from(""),
    ];
    if let Some(raw) = panel.last_raw() {
        for raw_line in raw.lines() {
            lines.push(Line::from(Span::styled(
                raw_line.to_string(),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let block = Block::default()
        .title(" Device Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn draw_log(f: &mut Frame, area: Rect, panel: &Panel) {
    let items: Vec<ListItem> = panel
        .log()
        .iter()
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", entry.stamp()), Style::default().fg(Color::DarkGray)),
                Span::raw(entry.message.clone()),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Log ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(list, area);
}
