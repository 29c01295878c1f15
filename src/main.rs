use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use epl_predictor::auth::Credentials;
use epl_predictor::classifier::ModelRegistry;
use epl_predictor::config::{self, AppConfig};
use epl_predictor::predict::{ClassProbability, MarketProbabilities};
use epl_predictor::prediction_log::PredictionLog;
use epl_predictor::state::{AppState, InputField, InputForm, LoginField, Screen};

struct App {
    state: AppState,
    registry: Arc<ModelRegistry>,
    log: PredictionLog,
    credentials: Credentials,
    should_quit: bool,
}

impl App {
    fn new(registry: Arc<ModelRegistry>, log: PredictionLog, credentials: Credentials) -> Self {
        let mut state = AppState::new();
        state.push_log(format!("[INFO] {} models loaded", registry.len()));
        Self {
            state,
            registry,
            log,
            credentials,
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::F(1) => {
                self.state.help_overlay = !self.state.help_overlay;
                return;
            }
            _ => {}
        }

        match self.state.screen {
            Screen::Login => self.on_login_key(key),
            Screen::Predict | Screen::Probabilities => self.on_form_key(key, ctrl),
        }
    }

    fn on_login_key(&mut self, key: KeyEvent) {
        let login = &mut self.state.login;
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => login.toggle_focus(),
            KeyCode::Backspace => login.backspace(),
            KeyCode::Enter => {
                if login.focus == LoginField::Username {
                    login.toggle_focus();
                } else {
                    self.state.submit_login(&self.credentials);
                }
            }
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(ch) => login.push_char(ch),
            _ => {}
        }
    }

    fn on_form_key(&mut self, key: KeyEvent, ctrl: bool) {
        match key.code {
            KeyCode::Char('l') if ctrl => self.state.logout(),
            KeyCode::Char('o') if ctrl => {
                if self.state.screen == Screen::Predict {
                    self.state.open_probabilities();
                }
            }
            KeyCode::Esc => {
                if self.state.screen == Screen::Probabilities {
                    self.state.back_to_predict();
                }
            }
            KeyCode::Enter => match self.state.screen {
                Screen::Predict => self.state.run_predictions(&self.registry, &self.log),
                Screen::Probabilities => self.state.show_probabilities(&self.registry),
                Screen::Login => {}
            },
            KeyCode::Tab | KeyCode::Down => {
                if let Some(form) = self.state.active_form_mut() {
                    form.focus_next();
                }
            }
            KeyCode::BackTab | KeyCode::Up => {
                if let Some(form) = self.state.active_form_mut() {
                    form.focus_prev();
                }
            }
            KeyCode::Backspace => {
                if let Some(form) = self.state.active_form_mut() {
                    form.backspace();
                }
            }
            KeyCode::Char(ch) if !ctrl => {
                if let Some(form) = self.state.active_form_mut() {
                    form.push_char(ch);
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cfg = AppConfig::from_env();
    init_tracing(&cfg.app_log)?;

    let registry = ModelRegistry::load(&cfg.model_dir)
        .with_context(|| format!("load models from {}", cfg.model_dir.display()))?;
    let credentials = Credentials::load(&cfg.secrets_path)?;
    let log = PredictionLog::new(cfg.predictions_log.clone());
    info!(
        models = registry.len(),
        users = credentials.len(),
        log = %cfg.predictions_log.display(),
        "dashboard starting"
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(Arc::new(registry), log, credentials);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn init_tracing(path: &Path) -> Result<()> {
    // The terminal belongs to the UI, so events go to a file.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open app log {}", path.display()))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("install tracing subscriber")?;
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, &app.state))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match state.screen {
        Screen::Login => render_login(frame, chunks[1], state),
        Screen::Predict => render_predict(frame, chunks[1], state),
        Screen::Probabilities => render_probabilities(frame, chunks[1], state),
    }

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let title = match state.screen {
        Screen::Login => "LOGIN".to_string(),
        Screen::Predict => "EPL FOOTBALL MATCH PREDICTOR | HDA, Over 2.5, BTTS, Double Chance".to_string(),
        Screen::Probabilities => "PREDICTION PROBABILITIES".to_string(),
    };
    let user = state
        .session
        .user()
        .map(|u| format!("signed in as {}", u.name))
        .unwrap_or_else(|| "not signed in".to_string());
    format!("  (o)  {title}\n       {user}")
}

fn footer_text(state: &AppState) -> &'static str {
    match state.screen {
        Screen::Login => "Tab Switch field | Enter Login | Esc Quit | F1 Help",
        Screen::Predict => {
            "Tab/↑/↓ Field | Enter Predict | Ctrl-O Probabilities | Ctrl-L Logout | Ctrl-Q Quit | F1 Help"
        }
        Screen::Probabilities => {
            "Tab/↑/↓ Field | Enter Show Probabilities | Esc Back | Ctrl-L Logout | Ctrl-Q Quit | F1 Help"
        }
    }
}

fn render_login(frame: &mut Frame, area: Rect, state: &AppState) {
    let popup = centered_rect(50, 60, area);
    let login = &state.login;
    let marker = |field: LoginField| if login.focus == field { "> " } else { "  " };

    let mut lines = vec![
        Line::from(format!("{}Username: {}", marker(LoginField::Username), login.username)),
        Line::from(format!(
            "{}Password: {}",
            marker(LoginField::Password),
            "*".repeat(login.password.chars().count())
        )),
        Line::from(""),
    ];
    if let Some(err) = &login.error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }

    let form = Paragraph::new(lines).block(Block::default().title("Login").borders(Borders::ALL));
    frame.render_widget(form, popup);
}

fn render_predict(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(30)])
        .split(area);

    render_input_form(frame, columns[0], &state.predict_form);

    let text = match &state.last_prediction {
        Some(view) => {
            let mut lines = vec![
                Line::styled(
                    format!("Predictions: {} vs {}", view.home_team, view.away_team),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Line::from(""),
            ];
            for row in &view.rows {
                lines.push(Line::from(format!("{:<14} {}", row.market.column(), row.label)));
            }
            lines.push(Line::from(""));
            lines.push(Line::styled(
                "Ctrl-O opens the Probabilities page with these inputs.",
                Style::default().fg(Color::DarkGray),
            ));
            Text::from(lines)
        }
        None => Text::from("Press Enter to predict all markets."),
    };
    let results = Paragraph::new(text).block(Block::default().title("Prediction").borders(Borders::ALL));
    frame.render_widget(results, columns[1]);
}

fn render_probabilities(frame: &mut Frame, area: Rect, state: &AppState) {
    if let Some(err) = &state.access_error {
        let denied = Paragraph::new(err.as_str())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().title("Probabilities").borders(Borders::ALL));
        frame.render_widget(denied, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(30)])
        .split(area);

    render_input_form(frame, columns[0], &state.prob_form);

    let Some(view) = &state.last_probabilities else {
        let hint = Paragraph::new("Press Enter to show probabilities.")
            .block(Block::default().title("Probabilities").borders(Borders::ALL));
        frame.render_widget(hint, columns[1]);
        return;
    };

    let outer = Block::default()
        .title(format!("{} vs {}", view.home_team, view.away_team))
        .borders(Borders::ALL);
    let inner = outer.inner(columns[1]);
    frame.render_widget(outer, columns[1]);
    if view.markets.is_empty() || inner.height == 0 {
        return;
    }

    let share = (100 / view.markets.len()) as u16;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Percentage(share); view.markets.len()])
        .split(inner);

    for (market, row_area) in view.markets.iter().zip(rows.iter()) {
        match market {
            MarketProbabilities::Distribution { market, classes } => {
                frame.render_widget(probability_chart(market.column(), classes), *row_area);
            }
            MarketProbabilities::Unavailable { market } => {
                let warn = Paragraph::new(format!("{market}: model has no probability outputs."))
                    .style(Style::default().fg(Color::Yellow))
                    .block(Block::default().title(market.column()).borders(Borders::ALL));
                frame.render_widget(warn, *row_area);
            }
        }
    }
}

fn render_input_form(frame: &mut Frame, area: Rect, form: &InputForm) {
    let mut lines = Vec::new();
    for (idx, field) in InputField::ALL.iter().enumerate() {
        let selected = idx == form.focus;
        let style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        lines.push(Line::styled(field.label(), Style::default().fg(Color::Gray)));
        lines.push(Line::styled(format!(" {}", form.values[idx]), style));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().title("Match Input Features").borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn probability_chart<'a>(title: &'a str, classes: &[ClassProbability]) -> BarChart<'a> {
    const PALETTE: [Color; 3] = [Color::Green, Color::Yellow, Color::Red];

    let bars: Vec<Bar> = classes
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let pct = (c.probability * 100.0).round().clamp(0.0, 100.0) as u64;
            Bar::default()
                .value(pct)
                .text_value(format!("{pct}%"))
                .label(Line::from(c.label.to_string()))
                .style(Style::default().fg(PALETTE[idx % PALETTE.len()]))
        })
        .collect();

    BarChart::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .data(BarGroup::default().bars(&bars))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .group_gap(0)
        .max(100)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "EPL Predictor - Help",
        "",
        "Global:",
        "  F1           Toggle help",
        "  Ctrl-Q       Quit",
        "",
        "Predict:",
        "  Tab / ↑ / ↓  Move between inputs",
        "  Enter        Predict all markets and log",
        "  Ctrl-O       Probabilities (carries inputs, admin only)",
        "  Ctrl-L       Logout",
        "",
        "Probabilities:",
        "  Enter        Show probability bars",
        "  Esc          Back to Predict",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
