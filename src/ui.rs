use crate::models::ScheduleSettings;
use crate::state::{AppState, ToggleStatus};
use chrono::NaiveDate;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use tui_textarea::TextArea;

pub enum UIMode {
    Authentication,
    Control,
    Settings,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum FocusedPanel {
    #[default]
    Toggle,
    Exceptions,
}

/// What a committed popup input should be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    Reply,
    Exception,
    SettingsField(usize),
}

pub struct InputState<'a> {
    pub target: InputTarget,
    pub textarea: TextArea<'a>,
}

pub const SETTINGS_FIELDS: [&str; 6] = [
    "Filter mode",
    "Start time",
    "End time",
    "Active days",
    "Vacation start",
    "Vacation end",
];

pub const DAY_LABELS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

pub struct UIState<'a> {
    pub mode: UIMode,
    pub focused_panel: FocusedPanel,
    pub selected_exception: usize,
    pub input: Option<InputState<'a>>,
    pub auth_url: Option<String>,
    pub status_message: Option<String>,
    pub settings_field: usize,
    pub settings_draft: ScheduleSettings,
    pub day_cursor: usize,
}

impl<'a> Default for UIState<'a> {
    fn default() -> Self {
        Self {
            mode: UIMode::Authentication,
            focused_panel: FocusedPanel::default(),
            selected_exception: 0,
            input: None,
            auth_url: None,
            status_message: None,
            settings_field: 0,
            settings_draft: ScheduleSettings::default(),
            day_cursor: 0,
        }
    }
}

impl<'a> UIState<'a> {
    pub fn open_input(&mut self, target: InputTarget, initial: &str) {
        let mut textarea = TextArea::from(initial.lines());
        textarea.set_cursor_line_style(Style::default());
        self.input = Some(InputState { target, textarea });
    }

    /// Tears down the popup and returns its target and contents.
    pub fn take_input(&mut self) -> Option<(InputTarget, String)> {
        self.input
            .take()
            .map(|input| (input.target, input.textarea.lines().join("\n")))
    }
}

pub fn render(f: &mut Frame, app: &AppState, state: &mut UIState<'_>) {
    match state.mode {
        UIMode::Authentication => render_authentication(f, state),
        UIMode::Control => render_control(f, app, state),
        UIMode::Settings => render_settings(f, state),
    }

    if state.input.is_some() {
        render_input_popup(f, state);
    }
}

fn render_authentication(f: &mut Frame, state: &UIState<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            "KILL SWITCH",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from("One toggle between you and an empty inbox"),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let body = match &state.auth_url {
        Some(url) => vec![
            Line::from("Authorize this app with your Google account:"),
            Line::from(""),
            Line::from(Span::styled(
                url.clone(),
                Style::default().fg(Color::Cyan),
            )),
        ],
        None => vec![Line::from("Waiting for Google sign-in...")],
    };
    let body = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Sign in"));
    f.render_widget(body, chunks[1]);

    let hint = match &state.status_message {
        Some(message) => Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from("o: open in browser   q: quit"),
    };
    let footer = Paragraph::new(hint)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);
}

fn toggle_appearance(status: ToggleStatus) -> (&'static str, &'static str, Color) {
    match status {
        ToggleStatus::Verifying => (
            "VERIFYING",
            "Checking the mailbox for the kill filter...",
            Color::Yellow,
        ),
        ToggleStatus::Loading { .. } => ("LOADING", "Talking to Gmail...", Color::Blue),
        ToggleStatus::Active => (
            "ACTIVE",
            "The filter is on. Incoming mail goes straight to the trash.",
            Color::Red,
        ),
        ToggleStatus::Inactive => ("INACTIVE", "The filter is not running.", Color::DarkGray),
    }
}

fn panel_border(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn render_control(f: &mut Frame, app: &AppState, state: &UIState<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    let account = match &app.user {
        Some(user) => format!("{} <{}>", user.name, user.email),
        None => "Signed in".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Kill Switch  ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::raw(account),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let (word, sentence, color) = toggle_appearance(app.toggle);
    let mut toggle_lines = vec![
        Line::from(Span::styled(
            word,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(sentence),
    ];
    if matches!(app.toggle, ToggleStatus::Active | ToggleStatus::Inactive) {
        toggle_lines.push(Line::from(Span::styled(
            "press Enter to flip the switch",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let toggle = Paragraph::new(toggle_lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Filter")
                .border_style(panel_border(state.focused_panel == FocusedPanel::Toggle).fg(color)),
        );
    f.render_widget(toggle, chunks[1]);

    let reply = Paragraph::new(app.filter.auto_reply_message.clone())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Auto-reply message (m to edit)"),
        );
    f.render_widget(reply, chunks[2]);

    let items: Vec<ListItem> = if app.filter.exceptions.is_empty() {
        vec![ListItem::new("no allowed senders yet").style(Style::default().fg(Color::DarkGray))]
    } else {
        app.filter
            .exceptions
            .iter()
            .enumerate()
            .map(|(i, email)| {
                let style = if state.focused_panel == FocusedPanel::Exceptions
                    && i == state.selected_exception
                {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(email.clone()).style(style)
            })
            .collect()
    };
    let exceptions = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Allowed senders (a add, d remove)")
            .border_style(panel_border(state.focused_panel == FocusedPanel::Exceptions)),
    );
    f.render_widget(exceptions, chunks[3]);

    let footer_line = if let Some(error) = &app.error {
        Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        ))
    } else if let Some(message) = &state.status_message {
        Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        ))
    } else {
        let checked = app
            .last_verified
            .map(|at| format!("verified {}", at.format("%H:%M:%S")))
            .unwrap_or_else(|| "not verified yet".to_string());
        Line::from(format!(
            "q quit · r re-check · s settings · Tab panels · ctrl-l sign out · {}",
            checked
        ))
    };
    let footer = Paragraph::new(footer_line).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[4]);
}

/// Human-readable vacation range for the settings footer.
fn vacation_summary(settings: &ScheduleSettings) -> String {
    if settings.vacation_start.is_empty() && settings.vacation_end.is_empty() {
        return "no vacation scheduled".to_string();
    }

    let start = NaiveDate::parse_from_str(&settings.vacation_start, "%Y-%m-%d");
    let end = NaiveDate::parse_from_str(&settings.vacation_end, "%Y-%m-%d");
    match (start, end) {
        (Ok(start), Ok(end)) => format!(
            "vacation {} to {}",
            start.format("%b %d %Y"),
            end.format("%b %d %Y")
        ),
        _ => "vacation dates incomplete".to_string(),
    }
}

fn day_row(settings: &ScheduleSettings, editing: bool, cursor: usize) -> Line<'static> {
    let mut spans = Vec::new();
    for (day, label) in DAY_LABELS.iter().enumerate() {
        let mut style = if settings.is_day_active(day as u8) {
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        if editing && day == cursor {
            style = style.add_modifier(Modifier::UNDERLINED | Modifier::BOLD);
        }
        spans.push(Span::styled((*label).to_string(), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn render_settings(f: &mut Frame, state: &UIState<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(9),
            Constraint::Length(3),
        ])
        .split(f.area());

    let title = Paragraph::new("Schedule settings (local only, never sent to Gmail)")
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let draft = &state.settings_draft;
    let mut lines = Vec::new();
    for (i, label) in SETTINGS_FIELDS.iter().enumerate() {
        let selected = i == state.settings_field;
        let label_style = if selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        if *label == "Active days" {
            let mut spans = vec![Span::styled(format!("{:<16}", label), label_style)];
            spans.extend(day_row(draft, selected, state.day_cursor).spans);
            lines.push(Line::from(spans));
        } else {
            let value = settings_field_value(draft, i);
            let shown = if value.is_empty() { "-".to_string() } else { value };
            lines.push(Line::from(vec![
                Span::styled(format!("{:<16}", label), label_style),
                Span::raw(shown),
            ]));
        }
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        vacation_summary(draft),
        Style::default().fg(Color::DarkGray),
    )));

    let body = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Preferences")
            .border_style(Style::default().fg(Color::Gray)),
    );
    f.render_widget(body, chunks[1]);

    let footer = Paragraph::new(
        "j/k move · Enter edit · space toggle day · h/l pick day · ctrl-s save · Esc back",
    )
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);
}

/// Current textual value of an editable settings field.
pub fn settings_field_value(draft: &ScheduleSettings, index: usize) -> String {
    match index {
        0 => draft.filter_mode.label().to_string(),
        1 => draft.filter_start_time.clone(),
        2 => draft.filter_end_time.clone(),
        4 => draft.vacation_start.clone(),
        5 => draft.vacation_end.clone(),
        _ => String::new(),
    }
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(height),
            Constraint::Min(1),
        ])
        .split(r);

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

fn render_input_popup(f: &mut Frame, state: &UIState<'_>) {
    let Some(input) = &state.input else {
        return;
    };

    let (title, height) = match input.target {
        InputTarget::Reply => ("Auto-reply message (Enter save, Esc cancel)", 6),
        InputTarget::Exception => ("Allowed sender email (Enter add, Esc cancel)", 3),
        InputTarget::SettingsField(i) => (SETTINGS_FIELDS[i], 3),
    };

    let area = centered_rect(70, height, f.area());
    f.render_widget(Clear, area);
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(&input.textarea, inner);
}
