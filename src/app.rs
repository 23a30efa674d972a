use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipboard::{ClipboardContext, ClipboardProvider};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use ratatui::widgets::ListState;
use throbber_widgets_tui::ThrobberState;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::auth::{AuthController, AuthState, authenticate};
use crate::csv_import::{ParsedCsv, load_secrets_file};
use crate::model::{
    AppEvent, AuthMode, ConfigField, CredentialField, FileFocus, SessionConfig, WizardStep,
};
use crate::upload::UploadOrchestrator;
use crate::vault::VaultApi;
use crate::wizard::{Session, invalidate_if_changed, next_step, prev_step};

pub struct App {
    pub step: WizardStep,
    pub session: Session,
    pub client: Arc<dyn VaultApi>,
    pub auth: AuthController,
    pub upload: UploadOrchestrator,
    pub uploading: bool,

    pub config_field: ConfigField,
    pub credential_field: CredentialField,
    pub reveal_secrets: bool,

    pub file_focus: FileFocus,
    pub csv_path: String,
    pub displayed_records: Vec<usize>, // indices into session.parsed.records
    pub preview_state: ListState,
    pub search_mode: bool,
    pub search_query: String,

    pub results_state: ListState,
    pub message: Option<String>,
    pub throbber_state: ThrobberState,
    pub loading: bool,
    authenticated_config: Option<SessionConfig>, // config at the last successful login
}

impl App {
    pub fn new(config: SessionConfig, client: Arc<dyn VaultApi>) -> Self {
        Self {
            step: WizardStep::Configure,
            session: Session::new(config),
            client,
            auth: AuthController::new(),
            upload: UploadOrchestrator::default(),
            uploading: false,

            config_field: ConfigField::ServerUrl,
            credential_field: CredentialField::Token,
            reveal_secrets: false,

            file_focus: FileFocus::Path,
            csv_path: String::new(),
            displayed_records: Vec::new(),
            preview_state: ListState::default(),
            search_mode: false,
            search_query: String::new(),

            results_state: ListState::default(),
            message: None,
            throbber_state: ThrobberState::default(),
            loading: false,
            authenticated_config: None,
        }
    }

    pub fn busy(&self) -> bool {
        self.uploading || self.auth.is_busy()
    }

    fn first_credential_field(&self) -> CredentialField {
        match self.session.config.auth_mode {
            AuthMode::Token => CredentialField::Token,
            AuthMode::AppRole => CredentialField::RoleId,
        }
    }

    /// Move forward if the current step's guard holds, else show why not.
    fn advance(&mut self) {
        match next_step(self.step, &self.session) {
            Ok(next) => self.enter_step(next),
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    fn go_back(&mut self) {
        if self.busy() {
            return;
        }
        self.search_mode = false;
        self.enter_step(prev_step(self.step));
    }

    fn enter_step(&mut self, step: WizardStep) {
        debug!("Entering step {:?}", step);
        match step {
            WizardStep::Authenticate => {
                if let Some(previous) = &self.authenticated_config {
                    invalidate_if_changed(&mut self.session, previous);
                }
                if !self.session.authenticated {
                    self.auth.reset();
                }
                self.credential_field = self.first_credential_field();
            }
            WizardStep::LoadFile => {
                self.file_focus = if self.session.parsed.records.is_empty() {
                    FileFocus::Path
                } else {
                    FileFocus::Preview
                };
            }
            WizardStep::Upload => {
                self.upload.load(&self.session.parsed.records);
                self.results_state.select(Some(0));
            }
            WizardStep::Configure => {}
        }
        self.step = step;
    }

    /// Load the CSV at `csv_path`, replacing any previous records.
    pub fn load_csv(&mut self) {
        let path = PathBuf::from(self.csv_path.trim());
        match load_secrets_file(&path) {
            Ok(parsed) => {
                self.message = Some(if parsed.is_valid() {
                    format!("Successfully parsed {} secrets", parsed.records.len())
                } else {
                    format!("Found {} validation errors", parsed.errors.len())
                });
                info!(
                    "Loaded {} ({} records, {} errors)",
                    path.display(),
                    parsed.records.len(),
                    parsed.errors.len()
                );
                self.session.parsed = parsed;
                self.search_query.clear();
                apply_search(self);
                if !self.session.parsed.records.is_empty() {
                    self.file_focus = FileFocus::Preview;
                }
            }
            Err(e) => self.message = Some(format!("Failed to load {}: {}", path.display(), e)),
        }
    }

    pub fn clear_csv(&mut self) {
        self.session.parsed = ParsedCsv::default();
        self.search_query.clear();
        apply_search(self);
        self.file_focus = FileFocus::Path;
        self.message = Some("Secrets cleared".into());
    }

    fn credentials_edited(&mut self) {
        if self.session.authenticated || *self.auth.state() != AuthState::Idle {
            self.session.authenticated = false;
            self.authenticated_config = None;
            self.auth.reset();
        }
    }

    fn start_authentication(&mut self, tx: &UnboundedSender<AppEvent>) {
        if self.auth.is_busy() {
            return;
        }
        self.auth.begin();
        self.session.authenticated = false;
        self.loading = true;
        self.message = Some("Authenticating...".into());
        let client = self.client.clone();
        let config = self.session.config.clone();
        let tx2 = tx.clone();
        tokio::spawn(async move {
            let result = authenticate(client.as_ref(), &config).await;
            let _ = tx2.send(AppEvent::AuthFinished(result));
        });
    }

    fn start_upload(&mut self, tx: &UnboundedSender<AppEvent>) {
        if self.uploading || self.upload.is_complete() {
            return;
        }
        let records = self.session.parsed.records.clone();
        self.upload.load(&records);
        self.uploading = true;
        self.loading = true;
        self.message = Some("Uploading secrets to Vault...".into());
        let client = self.client.clone();
        let config = self.session.config.clone();
        let tx2 = tx.clone();
        tokio::spawn(async move {
            let mut orchestrator = UploadOrchestrator::new(&records);
            orchestrator
                .run(client.as_ref(), &config, &records, |p| {
                    let _ = tx2.send(AppEvent::UploadProgress(p.clone()));
                })
                .await;
            let _ = tx2.send(AppEvent::UploadFinished(orchestrator));
        });
    }

    fn save_report(&mut self) {
        self.message = Some(match self.upload.save_report(Path::new(".")) {
            Ok(path) => format!("Report saved to {}", path.display()),
            Err(e) => format!("Failed to save report: {}", e),
        });
    }

    fn copy_report(&mut self) {
        let report = match self.upload.report() {
            Ok(r) => r,
            Err(e) => {
                self.message = Some(e.to_string());
                return;
            }
        };
        let ctx: Result<ClipboardContext, _> = ClipboardProvider::new();
        self.message = Some(match ctx {
            Ok(mut ctx) => {
                if ctx.set_contents(report).is_ok() {
                    "Report copied to clipboard".into()
                } else {
                    "Clipboard error".into()
                }
            }
            Err(e) => format!("Clipboard init error: {}", e),
        });
    }
}

/// Apply a background task result to the UI state.
pub fn apply_event(app: &mut App, ev: AppEvent) {
    match ev {
        AppEvent::AuthFinished(result) => {
            app.loading = false;
            app.auth.finish(result, &mut app.session.config);
            if app.auth.is_authenticated() {
                app.session.authenticated = true;
                app.authenticated_config = Some(app.session.config.clone());
                app.message = Some("Authentication successful!".into());
                if app.step == WizardStep::Authenticate {
                    app.advance();
                }
            } else if let AuthState::Error(reason) = app.auth.state() {
                app.message = Some(reason.clone());
            }
        }
        AppEvent::UploadProgress(progress) => {
            debug!(
                "Upload progress {}/{} {:.0}% ({})",
                progress.completed,
                progress.total,
                progress.percent(),
                progress.result.secret_name
            );
            app.upload.apply_progress(&progress);
        }
        AppEvent::UploadFinished(orchestrator) => {
            app.upload = orchestrator;
            app.uploading = false;
            app.loading = false;
            app.message = Some(app.upload.summary().message());
        }
    }
}

/// Apply fuzzy search over name and key to produce displayed_records
pub fn apply_search(app: &mut App) {
    let records = &app.session.parsed.records;
    if app.search_query.is_empty() {
        app.displayed_records = (0..records.len()).collect();
    } else {
        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, usize)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                matcher
                    .fuzzy_match(&format!("{} {}", r.name, r.key), &app.search_query)
                    .map(|score| (score, i))
            })
            .collect();
        results.sort_by(|a, b| b.0.cmp(&a.0));
        app.displayed_records = results.into_iter().map(|(_, i)| i).collect();
    }
    if app.displayed_records.is_empty() {
        app.preview_state.select(None);
    } else {
        app.preview_state.select(Some(0));
    }
}

fn edit_text(buf: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) => buf.push(c),
        KeyCode::Backspace => {
            buf.pop();
        }
        _ => return false,
    }
    true
}

fn edit_optional(buf: &mut Option<String>, code: KeyCode) -> bool {
    let text = buf.get_or_insert_with(String::new);
    let edited = edit_text(text, code);
    if text.is_empty() {
        *buf = None;
    }
    edited
}

fn select_step(state: &mut ListState, len: usize, down: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0);
    let next = if down {
        (current + 1).min(len - 1)
    } else {
        current.saturating_sub(1)
    };
    state.select(Some(next));
}

/// Handle a key press. Returns true when the app should exit.
pub fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    match app.step {
        WizardStep::Configure => handle_configure_key(app, key.code),
        WizardStep::Authenticate => {
            handle_authenticate_key(app, key.code, tx);
            false
        }
        WizardStep::LoadFile => {
            handle_load_key(app, key.code);
            false
        }
        WizardStep::Upload => handle_upload_key(app, key.code, tx),
    }
}

fn handle_configure_key(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Esc => return true,
        KeyCode::Tab | KeyCode::Down => app.config_field = app.config_field.next(),
        KeyCode::BackTab | KeyCode::Up => app.config_field = app.config_field.prev(),
        KeyCode::Enter => app.advance(),
        _ => {
            let config = &mut app.session.config;
            match app.config_field {
                ConfigField::ServerUrl => {
                    edit_text(&mut config.server_url, code);
                }
                ConfigField::Namespace => {
                    edit_optional(&mut config.namespace, code);
                }
                ConfigField::SecretsPath => {
                    edit_text(&mut config.secrets_path, code);
                }
                ConfigField::AuthMode => {
                    if matches!(code, KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')) {
                        config.auth_mode = config.auth_mode.toggle();
                    }
                }
            }
        }
    }
    false
}

fn handle_authenticate_key(app: &mut App, code: KeyCode, tx: &UnboundedSender<AppEvent>) {
    if app.auth.is_busy() {
        return;
    }
    match code {
        KeyCode::Esc => app.go_back(),
        KeyCode::Enter => app.start_authentication(tx),
        KeyCode::F(2) => app.reveal_secrets = !app.reveal_secrets,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.credential_field = match app.credential_field {
                CredentialField::RoleId => CredentialField::SecretId,
                CredentialField::SecretId => CredentialField::RoleId,
                CredentialField::Token => CredentialField::Token,
            };
        }
        _ => {
            let config = &mut app.session.config;
            let edited = match app.credential_field {
                CredentialField::Token => edit_optional(&mut config.token, code),
                CredentialField::RoleId => edit_optional(&mut config.role_id, code),
                CredentialField::SecretId => edit_optional(&mut config.secret_id, code),
            };
            if edited {
                app.credentials_edited();
            }
        }
    }
}

fn handle_load_key(app: &mut App, code: KeyCode) {
    if app.search_mode {
        match code {
            KeyCode::Esc => {
                app.search_mode = false;
                app.search_query.clear();
                apply_search(app);
            }
            KeyCode::Enter => app.search_mode = false,
            KeyCode::Backspace => {
                app.search_query.pop();
                apply_search(app);
            }
            KeyCode::Char(c) => {
                app.search_query.push(c);
                apply_search(app);
            }
            _ => {}
        }
        return;
    }

    match app.file_focus {
        FileFocus::Path => match code {
            KeyCode::Esc => app.go_back(),
            KeyCode::Enter => app.load_csv(),
            KeyCode::Tab => {
                if !app.session.parsed.records.is_empty() {
                    app.file_focus = FileFocus::Preview;
                }
            }
            _ => {
                edit_text(&mut app.csv_path, code);
            }
        },
        FileFocus::Preview => match code {
            KeyCode::Esc => app.go_back(),
            KeyCode::Tab => app.file_focus = FileFocus::Path,
            KeyCode::Enter => app.advance(),
            KeyCode::Char('/') => {
                app.search_mode = true;
                app.search_query.clear();
            }
            KeyCode::Char('x') => app.clear_csv(),
            KeyCode::Char('j') | KeyCode::Down => {
                select_step(&mut app.preview_state, app.displayed_records.len(), true)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                select_step(&mut app.preview_state, app.displayed_records.len(), false)
            }
            _ => {}
        },
    }
}

fn handle_upload_key(app: &mut App, code: KeyCode, tx: &UnboundedSender<AppEvent>) -> bool {
    let len = app.upload.results().len();
    match code {
        KeyCode::Char('j') | KeyCode::Down => select_step(&mut app.results_state, len, true),
        KeyCode::Char('k') | KeyCode::Up => select_step(&mut app.results_state, len, false),
        _ if app.uploading => {}
        KeyCode::Char('q') => return true,
        KeyCode::Esc => app.go_back(),
        KeyCode::Enter | KeyCode::Char('s') => app.start_upload(tx),
        KeyCode::Char('r') if app.upload.is_complete() => {
            app.upload.reset();
            app.message = Some("Results reset; press Enter to upload again".into());
        }
        KeyCode::Char('d') if app.upload.is_complete() => app.save_report(),
        KeyCode::Char('c') if app.upload.is_complete() => app.copy_report(),
        _ => {}
    }
    false
}
