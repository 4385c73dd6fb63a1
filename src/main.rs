use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::fs::File;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tui_choropleth::app::{App, Command, MapKind};
use tui_choropleth::cli::Cli;
use tui_choropleth::config::AppConfig;
use tui_choropleth::data;
use tui_choropleth::query::{QueryDispatcher, WorldBankClient};
use tui_choropleth::ui;

type Queries = QueryDispatcher<WorldBankClient>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = cli.apply(AppConfig::load_or_default(&cli.config)?);
    info!(map = ?cli.map, data_dir = ?config.data_dir, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to start the query runtime")?;
    let client = WorldBankClient::new(&config.api).context("Failed to build the HTTP client")?;
    let mut queries = QueryDispatcher::new(Arc::new(client), runtime.handle().clone(), config.api.timeout());

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, cli.map, &config, &mut queries);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

/// Log to a file; stdout belongs to the terminal UI
fn init_logging(cli: &Cli) -> Result<()> {
    let file = File::create(&cli.log_file)
        .with_context(|| format!("Failed to create log file: {:?}", cli.log_file))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.default_log_level()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn load_app(kind: MapKind, config: &AppConfig, width: u16, height: u16) -> App {
    let loaded = match kind {
        MapKind::Us => {
            data::load_us(&config.us, &config.data_dir).map(|d| App::us(d, &config.us, width, height))
        }
        MapKind::World => data::load_world(&config.world, &config.data_dir)
            .map(|d| App::world(d, &config.world, width, height)),
    };
    loaded.unwrap_or_else(|e| {
        error!(error = %e, "failed to load map resources");
        App::failed(kind, &e, width, height)
    })
}

fn handle_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        // Reset view
        KeyCode::Char('r') | KeyCode::Char('0') => app.reset_zoom(),

        KeyCode::Char('p') | KeyCode::Char('P') => app.cycle_projection(),

        KeyCode::Char('[') => return app.step_indicator(-1),
        KeyCode::Char(']') => return app.step_indicator(1),
        KeyCode::Char(',') => return app.step_year(-1),
        KeyCode::Char('.') => return app.step_year(1),

        KeyCode::Tab => app.step_station(1),
        KeyCode::BackTab => app.step_station(-1),

        _ => {}
    }
    Vec::new()
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) -> Vec<Command> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.click(mouse.column, mouse.row),
        MouseEventKind::Moved | MouseEventKind::Drag(_) => {
            app.hover(mouse.column, mouse.row);
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn run(terminal: &mut DefaultTerminal, kind: MapKind, config: &AppConfig, queries: &mut Queries) -> Result<()> {
    let size = terminal.size()?;
    let mut app = load_app(kind, config, size.width, size.height);

    let startup = app.startup_commands();
    app.execute(queries, startup);

    // Main loop
    loop {
        for update in queries.poll() {
            app.apply_update(update);
        }
        app.tick(Instant::now());

        terminal.draw(|frame| ui::render(frame, &app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            let commands = match event::read()? {
                // Only handle key press events (not release)
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(&mut app, key),
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => {
                    app.resize(width, height);
                    Vec::new()
                }
                _ => Vec::new(),
            };
            app.execute(queries, commands);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
