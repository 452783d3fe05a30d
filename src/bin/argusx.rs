// Native binary for ArgusX - terminal dashboard

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use argusx::{
    api::{self, ApiRequest, Backend, HttpBackend},
    app::{App, InputMode},
    config::{load, Config},
    stats,
    transport::{TransportConfig, TransportConnector, WsDialer},
    types::{Action, AppEvent},
    ui,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    let cfg = load().context("Failed to load configuration")?;
    init_logging()?;
    log::info!("argusx {} starting: {}", env!("CARGO_PKG_VERSION"), cfg.summary());

    // channels
    let (tx, rx) = unbounded_channel::<AppEvent>();
    let (api_tx, api_rx) = unbounded_channel::<ApiRequest>();

    // backend collaborators
    let backend: Arc<dyn Backend> = Arc::new(
        HttpBackend::new(&cfg.api_url, cfg.http_timeout_ms, cfg.http_retries)
            .context("Failed to build HTTP client")?,
    );
    let api_task = tokio::spawn(api::run_api_worker(backend.clone(), api_rx, tx.clone()));
    let stats_task = tokio::spawn(stats::run_stats_poller(backend, cfg.stats_poll_ms, tx.clone()));

    // event stream
    let mut connector = TransportConnector::new(
        TransportConfig {
            url: cfg.ws_url.clone(),
            keepalive: Duration::from_millis(cfg.keepalive_ms),
            reconnect_delay: Duration::from_millis(cfg.reconnect_ms),
        },
        Arc::new(WsDialer),
        tx,
    );
    connector.connect();

    let mut app = App::new(
        cfg.theme,
        cfg.default_filter.clone(),
        cfg.lookup_limit,
        cfg.stream_interval,
        Some(api_tx),
    );

    // Deep link from CLI: ./argusx argusx://item/TXN123
    if cfg.start_route.item_id().is_some() {
        log::info!("Applying start route {}", cfg.start_route);
        app.navigate_to(cfg.start_route.clone());
    }

    // terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // main loop
    let result = run_loop(&mut app, &mut terminal, rx, &cfg).await;

    // cleanup
    connector.shutdown().await;
    stats_task.abort();
    api_task.abort();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    log::info!("argusx stopped");
    result
}

/// The terminal owns stdout, so logs go to a file (ARGUSX_LOG_FILE, default ./argusx.log)
fn init_logging() -> Result<()> {
    let path = std::env::var("ARGUSX_LOG_FILE").unwrap_or_else(|_| "./argusx.log".into());
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {path}"))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

async fn run_loop(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut rx: UnboundedReceiver<AppEvent>,
    cfg: &Config,
) -> Result<()> {
    let mut last_frame = Instant::now();
    let frame_ms = 1000u32.saturating_div(cfg.render_fps) as u64;
    let budget = Duration::from_millis(frame_ms.max(1));

    loop {
        // frame budget (coalesced renders)
        let wait = budget.saturating_sub(last_frame.elapsed());

        if event::poll(wait)? {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                    handle_key(app, k);
                }
            }
        }
        while let Ok(ev) = rx.try_recv() {
            app.on_event(ev);
        }

        if last_frame.elapsed() >= budget {
            terminal.draw(|f| ui::draw(f, app))?;
            last_frame = Instant::now();
        }
        if app.quit_flag() {
            break;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, k: KeyEvent) {
    // Ctrl+C always quits
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (k.code, k.modifiers) {
        app.on_event(AppEvent::Quit);
        return;
    }

    match app.input_mode() {
        InputMode::Filter => {
            match k.code {
                KeyCode::Char(c) => app.filter_add_char(c),
                KeyCode::Backspace => app.filter_backspace(),
                KeyCode::Enter => app.apply_filter(),
                KeyCode::Esc => app.clear_filter(),
                _ => {}
            }
            return;
        }
        InputMode::Otp => {
            match k.code {
                KeyCode::Char(c) => app.otp_input(&c.to_string()),
                KeyCode::Backspace => app.otp_backspace(),
                KeyCode::Enter => app.submit_otp(),
                KeyCode::Esc => app.cancel_input(),
                _ => {}
            }
            return;
        }
        InputMode::Goto => {
            match k.code {
                KeyCode::Char(c) => app.goto_add_char(c),
                KeyCode::Backspace => app.goto_backspace(),
                KeyCode::Enter => app.submit_goto(),
                KeyCode::Esc => app.cancel_input(),
                _ => {}
            }
            return;
        }
        InputMode::NewTxn => {
            match k.code {
                KeyCode::Esc => app.close_new_txn(),
                KeyCode::Enter => app.submit_new_txn(),
                code => {
                    if let Some(form) = app.new_txn_mut() {
                        match code {
                            KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
                            KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
                            KeyCode::Left => form.cycle(false),
                            KeyCode::Right => form.cycle(true),
                            KeyCode::Backspace => form.backspace(),
                            KeyCode::Char(c) => form.type_char(c),
                            _ => {}
                        }
                    }
                }
            }
            return;
        }
        InputMode::Normal => {}
    }

    match (k.code, k.modifiers) {
        (KeyCode::Char('q'), _) => app.on_event(AppEvent::Quit),

        (KeyCode::Char('d'), KeyModifiers::CONTROL) => app.toggle_debug_panel(),
        (KeyCode::Char('t'), KeyModifiers::CONTROL) => app.cycle_theme(),

        // Feed
        (KeyCode::Up, _) | (KeyCode::Char('k'), _) => app.up(),
        (KeyCode::Down, _) | (KeyCode::Char('j'), _) => app.down(),
        (KeyCode::Home, _) => app.home(),
        (KeyCode::Enter, _) => app.open_selected(),
        (KeyCode::Esc, _) => app.close_detail(),

        // Filter
        (KeyCode::Char('/'), _) | (KeyCode::Char('f'), _) => app.start_filter(),
        (KeyCode::Char('c'), _) => app.clear_filter(),

        // Routing
        (KeyCode::Char(':'), _) => app.start_goto(),
        (KeyCode::Char('['), _) => app.back(),
        (KeyCode::Char(']'), _) => app.forward(),

        // Alert
        (KeyCode::Char('v'), _) => app.start_otp_entry(),
        (KeyCode::Char('b'), _) => app.force_block(),
        (KeyCode::Char('d'), _) => app.dismiss_alert(),

        // Manual override from the detail view
        (KeyCode::Char('A'), _) => app.set_action(Action::Allow),
        (KeyCode::Char('X'), _) => app.set_action(Action::Block),
        (KeyCode::Char('R'), _) => app.set_action(Action::Otp),

        // Backend stream & demo helpers
        (KeyCode::Char('s'), _) => app.toggle_stream(),
        (KeyCode::Char('m'), _) => app.simulate(),
        (KeyCode::Char('i'), _) => app.inject_fraud(),
        (KeyCode::Char('n'), _) => app.open_new_txn(),
        _ => {}
    }
}
