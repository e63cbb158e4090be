mod app;
mod cache;
mod clipboard;
mod config;
mod error;
mod sitemap;
mod tree;
mod ui;
mod view;

use std::{
    env,
    fs::File,
    io,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter};

use crate::{
    app::{App, KeyAction},
    clipboard::{SystemBrowser, build_clipboard},
    config::Config,
    sitemap::{LoadedTree, Source},
    ui::ResizeDebounce,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Convert,
    Browse,
}

fn main() -> Result<()> {
    let mode = parse_mode(env::args().nth(1).as_deref())?;
    let config = Config::from_env()?;
    init_tracing(mode, &config);

    match mode {
        Mode::Convert => {
            let report = sitemap::convert(&config)?;
            println!(
                "wrote {} ({} URLs, {} skipped)",
                config.output.display(),
                report.accepted,
                report.skipped.len()
            );
            Ok(())
        }
        Mode::Browse => {
            let mut terminal = setup_terminal()?;
            let result = run_app(&mut terminal, config);
            restore_terminal(&mut terminal)?;
            result
        }
    }
}

fn parse_mode(arg: Option<&str>) -> Result<Mode> {
    match arg {
        None | Some("browse") => Ok(Mode::Browse),
        Some("convert") => Ok(Mode::Convert),
        Some(other) => anyhow::bail!("unknown command: {other} (expected convert or browse)"),
    }
}

/// Convert logs to stderr. Browse logs to a file since the TUI owns the
/// terminal; if that file cannot be opened, browse runs without logs.
fn init_tracing(mode: Mode, config: &Config) {
    let writer = match mode {
        Mode::Convert => BoxMakeWriter::new(io::stderr),
        Mode::Browse => {
            if let Some(parent) = config.log_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match File::options().create(true).append(true).open(&config.log_path) {
                Ok(file) => BoxMakeWriter::new(std::sync::Mutex::new(file)),
                Err(_) => return,
            }
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(mode == Mode::Convert)
        .with_writer(writer)
        .try_init();
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

struct LoadHandle {
    receiver: mpsc::Receiver<Result<LoadedTree>>,
    tick: usize,
}

fn start_loader(config: Config) -> LoadHandle {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(sitemap::load_tree(&config));
    });
    LoadHandle { receiver, tick: 0 }
}

const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, config: Config) -> Result<()> {
    let source_label = Source::classify(&config.source).describe();
    let mut loader = Some(start_loader(config.clone()));
    let mut app: Option<App> = None;
    let mut failure: Option<String> = None;
    let mut clipboard = build_clipboard();
    let mut browser = SystemBrowser;
    let mut debounce = ResizeDebounce::new(config.resize_debounce);
    let mut dirty = true;

    loop {
        if let Some(handle) = loader.as_mut() {
            match handle.receiver.try_recv() {
                Ok(Ok(loaded)) => {
                    info!(summary = %loaded.summary(), "sitemap loaded");
                    app = Some(App::from_loaded(loaded, config.view));
                    loader = None;
                    dirty = true;
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "sitemap load failed");
                    failure = Some(format!("{err:#}"));
                    loader = None;
                    dirty = true;
                }
                Err(mpsc::TryRecvError::Disconnected) => {
                    failure = Some("loader channel closed".to_string());
                    loader = None;
                    dirty = true;
                }
                Err(mpsc::TryRecvError::Empty) => {}
            }
        }

        let now = Instant::now();
        if debounce.fire(now) {
            if let Some(app) = app.as_mut() {
                app.view.apply_default_collapse(&app.tree);
            }
            terminal.autoresize()?;
            dirty = true;
        }

        let mut visible = Vec::new();
        if let Some(app_ref) = app.as_mut() {
            visible = app_ref.visible_nodes();
            app_ref.ensure_cursor(visible.len());
            if app_ref.toast.is_some() {
                app_ref.tick_toast();
                dirty = true;
            }
        }

        if dirty || loader.is_some() {
            if let Some(app_ref) = app.as_ref() {
                terminal.draw(|frame| ui::ui(frame, app_ref, &visible))?;
            } else if let Some(handle) = loader.as_mut() {
                terminal.draw(|frame| ui::ui_loading(frame, handle.tick, &source_label))?;
                handle.tick = handle.tick.wrapping_add(1);
            } else if let Some(message) = failure.as_deref() {
                terminal.draw(|frame| ui::ui_failed(frame, message))?;
            }
            dirty = false;
        }

        let timeout = debounce
            .time_left(Instant::now())
            .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
        if !event::poll(timeout)? {
            continue;
        }

        let key = match event::read()? {
            Event::Resize(_, _) => {
                debounce.request(Instant::now());
                continue;
            }
            Event::Key(key) if key.kind != KeyEventKind::Release => key.code,
            _ => continue,
        };
        dirty = true;

        let action = match app.as_mut() {
            Some(app_ref) => match clipboard.as_mut() {
                Some(cb) => app_ref.handle_key(key, &visible, Some(&mut **cb), &mut browser)?,
                None => app_ref.handle_key(key, &visible, None, &mut browser)?,
            },
            None => match key {
                KeyCode::Char('q') => KeyAction::Quit,
                KeyCode::Char('r') if loader.is_none() => KeyAction::Reload,
                _ => KeyAction::None,
            },
        };

        match action {
            KeyAction::Quit => return Ok(()),
            KeyAction::Reload => {
                info!(source = %source_label, "reloading");
                loader = Some(start_loader(config.clone()));
                app = None;
                failure = None;
            }
            KeyAction::None => {}
        }
    }
}
