use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    Terminal,
};
use std::io;

mod app;
mod cli;
mod events;
mod ui;

use app::{App, AppMode};
use events::{AppEvent, EventHandler};
use sqlpilot::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = Config::load()?;
    let log_path = sqlpilot::logging::init_logging(&config.log)?;

    if let Some(command) = args.command {
        return cli::run(command, config).await;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender());

    // Run app
    let res = run_app(&mut terminal, &mut app, &mut events).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("{:?}", err);
        eprintln!("Error: {:?}", err);
        eprintln!("See {} for details", log_path.display());
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &mut EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let Some(event) = events.next()? else {
            continue;
        };

        match event {
            AppEvent::Chunk(chunk) => app.on_chunk(&chunk),
            AppEvent::Answer(result) => app.on_answer(result),
            AppEvent::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                let quit = match app.mode {
                    AppMode::ConnectionSelector => handle_selector_input(app, key.code),
                    AppMode::ConnectionEdit => handle_connection_input(app, key.code).await,
                    AppMode::Chat => handle_chat_input(app, key).await,
                };
                if quit {
                    if let Some(token) = &app.in_flight {
                        token.cancel();
                    }
                    return Ok(());
                }
            }
            AppEvent::Input(_) => {}
        }
    }
}

fn handle_selector_input(app: &mut App, key: KeyCode) -> bool {
    match key {
        KeyCode::Char('q') => return true,
        KeyCode::Esc => return true,
        KeyCode::Up => app.selector_up(),
        KeyCode::Down => app.selector_down(),
        KeyCode::Enter => {
            if !app.config.connections.is_empty() {
                app.load_selected_profile();
            }
        }
        KeyCode::Char('n') => app.create_new_connection(),
        KeyCode::Char('d') => {
            if let Err(e) = app.delete_selected_profile() {
                app.set_error(format!("Failed to delete profile: {}", e));
            }
        }
        _ => {}
    }
    false
}

async fn handle_connection_input(app: &mut App, key: KeyCode) -> bool {
    match key {
        KeyCode::Esc => {
            app.clear_error();
            app.mode = AppMode::ConnectionSelector;
            return false;
        }
        KeyCode::Tab => app.next_connection_field(),
        KeyCode::BackTab => app.prev_connection_field(),
        KeyCode::Enter => {
            if let Err(e) = app.connect().await {
                app.set_error(format!("Connection failed: {}", e));
            }
        }
        KeyCode::Char(c) => app.input_char(c),
        KeyCode::Backspace => app.delete_char(),
        _ => {}
    }
    false
}

async fn handle_chat_input(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') if ctrl => return true,
        KeyCode::Char('r') if ctrl => app.refresh_schema(),
        KeyCode::Esc => {
            if !app.cancel_request() {
                app.disconnect();
            }
        }
        KeyCode::F(5) => app.run_sql().await,
        KeyCode::Enter if !key.modifiers.contains(KeyModifiers::ALT) => app.ask(),
        _ => {
            app.question.input(key);
        }
    }
    false
}
