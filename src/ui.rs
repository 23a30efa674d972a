use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};
use throbber_widgets_tui::{BRAILLE_SIX, Throbber, WhichUse};

use crate::app::App;
use crate::auth::AuthState;
use crate::csv_import::EXPECTED_HEADER;
use crate::model::{AuthMode, ConfigField, CredentialField, FileFocus, UploadStatus, WizardStep};

const PREVIEW_VALUE_CHARS: usize = 20;

/// Draw router
pub fn draw_ui(f: &mut Frame<'_>, app: &mut App) {
    let area = f.area();
    let outer_block = Block::default().borders(Borders::ALL).title(Span::styled(
        "Vault Secrets Uploader",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ));
    let inner = outer_block.inner(area);
    f.render_widget(outer_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(inner);

    draw_steps(f, app, chunks[0]);
    match app.step {
        WizardStep::Configure => draw_configure(f, app, chunks[1]),
        WizardStep::Authenticate => draw_authenticate(f, app, chunks[1]),
        WizardStep::LoadFile => draw_load_file(f, app, chunks[1]),
        WizardStep::Upload => draw_upload(f, app, chunks[1]),
    }

    let footer = Paragraph::new(app.message.clone().unwrap_or_default())
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title("Message"));
    f.render_widget(footer, chunks[2]);

    if app.loading {
        let label = if app.uploading {
            " Uploading secrets to Vault..."
        } else {
            " Authenticating..."
        };
        let throbber = Throbber::default()
            .label(label)
            .style(Style::default().fg(Color::Yellow))
            .throbber_set(BRAILLE_SIX)
            .use_type(WhichUse::Spin);
        f.render_stateful_widget(throbber, chunks[3], &mut app.throbber_state);
    } else {
        let help = Paragraph::new(help_text(app)).style(Style::default().fg(Color::Gray));
        f.render_widget(help, chunks[3]);
    }
}

fn help_text(app: &App) -> &'static str {
    match app.step {
        WizardStep::Configure => "[Tab/↑↓: field] [←/→: auth method] [Enter: continue] [Esc: quit]",
        WizardStep::Authenticate => "[Enter: authenticate] [Tab: field] [F2: show/hide] [Esc: back]",
        WizardStep::LoadFile => match app.file_focus {
            FileFocus::Path => "[Enter: load file] [Tab: preview] [Esc: back]",
            FileFocus::Preview => {
                "[Enter: upload to Vault] [/: filter] [x: remove] [Tab: path] [Esc: back]"
            }
        },
        WizardStep::Upload => {
            if app.upload.is_complete() {
                "[d: save report] [c: copy report] [r: reset] [Esc: back] [q: quit]"
            } else {
                "[Enter: start upload] [j/k: scroll] [Esc: back] [q: quit]"
            }
        }
    }
}

fn draw_steps(f: &mut Frame<'_>, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (i, step) in WizardStep::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let style = if *step == app.step {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else if step.number() < app.step.number() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{} {}", step.number(), step.title()), style));
    }
    let p = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn field_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    }
}

fn input<'a>(title: &'a str, value: String, focused: bool) -> Paragraph<'a> {
    let text = if focused { format!("{}_", value) } else { value };
    Paragraph::new(text)
        .style(field_style(focused))
        .block(Block::default().borders(Borders::ALL).title(title))
}

fn mask(value: Option<&str>, reveal: bool) -> String {
    let value = value.unwrap_or_default();
    if reveal {
        value.to_string()
    } else {
        "•".repeat(value.chars().count())
    }
}

fn draw_configure(f: &mut Frame<'_>, app: &App, area: Rect) {
    let config = &app.session.config;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let focused = |field: ConfigField| app.config_field == field;
    f.render_widget(
        input("Vault URL", config.server_url.clone(), focused(ConfigField::ServerUrl)),
        chunks[0],
    );
    f.render_widget(
        input(
            "Namespace (optional)",
            config.namespace.clone().unwrap_or_default(),
            focused(ConfigField::Namespace),
        ),
        chunks[1],
    );
    f.render_widget(
        input(
            "Secrets Path (e.g. kv/data/path/to/secrets)",
            config.secrets_path.clone(),
            focused(ConfigField::SecretsPath),
        ),
        chunks[2],
    );

    let modes: Vec<Span> = [AuthMode::Token, AuthMode::AppRole]
        .iter()
        .map(|mode| {
            let marker = if *mode == config.auth_mode { "(•)" } else { "( )" };
            Span::raw(format!("{} {}    ", marker, mode.label()))
        })
        .collect();
    let p = Paragraph::new(Line::from(modes))
        .style(field_style(focused(ConfigField::AuthMode)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Authentication Method"),
        );
    f.render_widget(p, chunks[3]);
}

fn draw_authenticate(f: &mut Frame<'_>, app: &App, area: Rect) {
    let config = &app.session.config;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let target = match config.namespace() {
        Some(ns) => format!("{} (namespace {})", config.server_url, ns),
        None => config.server_url.clone(),
    };
    let p = Paragraph::new(format!("{} authentication against {}", config.auth_mode.label(), target))
        .style(Style::default().fg(Color::Gray));
    f.render_widget(p, chunks[0]);

    let focused = |field: CredentialField| app.credential_field == field;
    let mut status_chunk = chunks[2];
    match config.auth_mode {
        AuthMode::Token => {
            f.render_widget(
                input(
                    "Vault Token",
                    mask(config.token.as_deref(), app.reveal_secrets),
                    focused(CredentialField::Token),
                ),
                chunks[1],
            );
        }
        AuthMode::AppRole => {
            f.render_widget(
                input(
                    "Role ID",
                    config.role_id.clone().unwrap_or_default(),
                    focused(CredentialField::RoleId),
                ),
                chunks[1],
            );
            f.render_widget(
                input(
                    "Secret ID",
                    mask(config.secret_id.as_deref(), app.reveal_secrets),
                    focused(CredentialField::SecretId),
                ),
                chunks[2],
            );
            status_chunk = chunks[3];
        }
    }

    let status = match app.auth.state() {
        AuthState::Idle => None,
        AuthState::Authenticating => Some(("Authenticating...".to_string(), Color::Yellow)),
        AuthState::Success => Some((
            "Authentication successful! Press Enter to re-run or continue from the next step.".to_string(),
            Color::Green,
        )),
        AuthState::Error(reason) => Some((format!("Authentication failed: {}", reason), Color::Red)),
    };
    if let Some((text, color)) = status {
        let p = Paragraph::new(text)
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: true });
        f.render_widget(p, status_chunk);
    }
}

fn truncate(value: &str) -> String {
    if value.chars().count() > PREVIEW_VALUE_CHARS {
        let head: String = value.chars().take(PREVIEW_VALUE_CHARS).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

fn draw_load_file(f: &mut Frame<'_>, app: &mut App, area: Rect) {
    let parsed = &app.session.parsed;
    let error_height = if parsed.errors.is_empty() {
        0
    } else {
        parsed.errors.len().min(6) as u16 + 2
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(error_height),
            Constraint::Min(3),
        ])
        .split(area);

    f.render_widget(
        input(
            "CSV File Path",
            app.csv_path.clone(),
            app.file_focus == FileFocus::Path,
        ),
        chunks[0],
    );

    if !parsed.errors.is_empty() {
        let items: Vec<ListItem> = parsed
            .error_messages()
            .into_iter()
            .map(|e| ListItem::new(format!("• {}", e)))
            .collect();
        let list = List::new(items).style(Style::default().fg(Color::Red)).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Validation Errors"),
        );
        f.render_widget(list, chunks[1]);
    }

    let title = if app.search_mode {
        format!("Preview (Search: {}_ )", app.search_query)
    } else if !app.search_query.is_empty() {
        format!("Preview ({} secrets, Filter: {})", parsed.records.len(), app.search_query)
    } else if parsed.records.is_empty() {
        format!("Expected format: {}", EXPECTED_HEADER)
    } else {
        format!("Preview ({} secrets)", parsed.records.len())
    };

    let items: Vec<ListItem> = app
        .displayed_records
        .iter()
        .filter_map(|i| parsed.records.get(*i))
        .map(|r| {
            ListItem::new(Line::from(vec![
                Span::styled(r.name.clone(), Style::default().fg(Color::Blue)),
                Span::styled(" → ", Style::default().fg(Color::DarkGray)),
                Span::styled(r.key.clone(), Style::default().fg(Color::Green)),
                Span::styled(" : ", Style::default().fg(Color::DarkGray)),
                Span::raw(truncate(&r.value)),
            ]))
        })
        .collect();
    let border_style = if app.file_focus == FileFocus::Preview {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, chunks[2], &mut app.preview_state);
}

fn draw_upload(f: &mut Frame<'_>, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    let summary = app.upload.summary();
    let counts = Line::from(vec![
        Span::styled(
            format!("Total Secrets: {}", summary.total),
            Style::default().fg(Color::Blue),
        ),
        Span::raw("    "),
        Span::styled(
            format!("Successful: {}", summary.succeeded),
            Style::default().fg(Color::Green),
        ),
        Span::raw("    "),
        Span::styled(
            format!("Failed: {}", summary.failed),
            Style::default().fg(Color::Red),
        ),
    ]);
    let p = Paragraph::new(counts)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Summary"));
    f.render_widget(p, chunks[0]);

    let progress = app.upload.progress();
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Upload Progress"))
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!("{}%", progress.round()))
        .ratio((progress / 100.0).clamp(0.0, 1.0));
    f.render_widget(gauge, chunks[1]);

    let items: Vec<ListItem> = app
        .upload
        .results()
        .iter()
        .map(|r| {
            let (icon, label, color) = match r.status {
                UploadStatus::Pending => ("○", "Waiting...", Color::DarkGray),
                UploadStatus::Success => ("✔", "Success", Color::Green),
                UploadStatus::Error => ("✘", "Failed", Color::Red),
            };
            let mut spans = vec![
                Span::styled(format!("{} ", icon), Style::default().fg(color)),
                Span::styled(r.secret_name.clone(), Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(label, Style::default().fg(color)),
            ];
            if let Some(message) = &r.message {
                spans.push(Span::styled(
                    format!("  {}", message),
                    Style::default().fg(Color::Gray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Upload Results ({} unique secrets)", summary.total)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_stateful_widget(list, chunks[2], &mut app.results_state);
}
