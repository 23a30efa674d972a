// src/main.rs
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CEvent, KeyEventKind};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

mod app;
mod auth;
mod bundle;
mod config;
mod csv_import;
mod error;
mod model;
mod ui;
mod upload;
mod vault;
mod wizard;

use app::{App, apply_event, handle_key};
use config::{CliOptions, LOG_FILE, USAGE, session_from_env};
use model::AppEvent;
use ui::draw_ui;
use vault::HttpVaultClient;

fn init_tracing() -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let fmt_layer = fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(false);
    Registry::default().with(filter).with(fmt_layer).init();
    info!("Tracing initialized to {} (debug)", LOG_FILE);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let opts = match CliOptions::from_env() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if opts.help {
        println!("{}", USAGE);
        return Ok(());
    }

    // log to file only when --debug is passed; the TUI owns the terminal
    if opts.debug {
        init_tracing()?;
    }

    info!("Starting Vault secrets uploader");

    let config = session_from_env();
    let mut app = App::new(config, Arc::new(HttpVaultClient::new()));
    if let Some(path) = &opts.csv_path {
        app.csv_path = path.display().to_string();
    }

    // Terminal setup
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    crossterm::terminal::enable_raw_mode()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Channel for background tasks -> UI
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    let result = run_loop(&mut terminal, &mut app, &tx, &mut rx).await;

    // Cleanup runs even when the loop failed
    crossterm::terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        warn!("Exiting after error: {}", e);
    }
    info!("Exiting Vault secrets uploader");
    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    tx: &mpsc::UnboundedSender<AppEvent>,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<(), Box<dyn Error>> {
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    loop {
        // Advance spinner + redraw periodically
        if last_tick.elapsed() >= tick_rate {
            if app.loading {
                app.throbber_state.calc_next();
            }
            terminal.draw(|f| draw_ui(f, app))?;
            last_tick = Instant::now();
        }

        // Drain background events
        while let Ok(ev) = rx.try_recv() {
            apply_event(app, ev);
        }

        // Input handling
        if event::poll(Duration::from_millis(20))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(app, key, tx) {
                    break;
                }
            }
        }

        // let spawned tasks make progress between polls
        tokio::task::yield_now().await;
    }
    Ok(())
}
