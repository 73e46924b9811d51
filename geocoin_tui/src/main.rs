use anyhow::Result;
use clap::Parser;
use geocoin_core::{
    Coin,
    cache::CacheError,
    game::{Direction as Step, GameConfig, GameError, GameState},
    storage::{FileStore, KeyValueStore, MemoryStore},
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use simplelog::{LevelFilter, WriteLogger};
use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Save file for cache state; omit for an in-memory session
    #[arg(short, long, value_name = "SAVE_FILE")]
    save: Option<PathBuf>,

    /// World seed for cache placement
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log file path
    #[arg(long, default_value = "geocoin.log")]
    log: PathBuf,
}

struct App {
    /// The core game session.
    game: GameState,
    /// Message line shown beneath the map.
    status: String,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let store: Box<dyn KeyValueStore> = match &args.save {
            Some(path) => Box::new(FileStore::open(path)?),
            None => Box::new(MemoryStore::new()),
        };
        let config = GameConfig {
            world_seed: args.seed,
            ..GameConfig::default()
        };
        let mut game = GameState::new(config, store)?;
        game.scan_caches()?;
        let status = format!("{} cache(s) in range. Good hunting!", game.caches().len());
        Ok(App {
            game,
            status,
            should_quit: false,
        })
    }

    /// Collects the lowest-serial coin from the cache the player is
    /// standing at. Benign failures become status messages.
    fn collect(&mut self) -> Result<(), GameError> {
        let Some(placed) = self.game.nearest_cache() else {
            self.status = "No cache in reach.".to_string();
            return Ok(());
        };
        let id = placed.id.clone();
        let Some(serial) = placed.cache.coins().iter().map(|c| c.serial).min() else {
            self.status = format!("{id} is empty.");
            return Ok(());
        };
        match self.game.collect_coin(&id, serial) {
            Ok(()) => {
                let token = self
                    .game
                    .player_coins()
                    .last()
                    .map(|coin| coin.to_string())
                    .unwrap_or_default();
                self.status = format!("Collected {token} from {id}.");
                Ok(())
            }
            Err(err) => self.surface(err),
        }
    }

    /// Deposits up to the session cap into the cache the player is
    /// standing at.
    fn deposit(&mut self) -> Result<(), GameError> {
        let Some(placed) = self.game.nearest_cache() else {
            self.status = "No cache in reach.".to_string();
            return Ok(());
        };
        let id = placed.id.clone();
        match self.game.deposit_coins(&id) {
            Ok(count) => {
                self.status = format!("Deposited {count} coin(s) into {id}.");
                Ok(())
            }
            Err(err) => self.surface(err),
        }
    }

    /// Benign conditions turn into the status line; anything else is a
    /// real failure and propagates.
    fn surface(&mut self, err: GameError) -> Result<(), GameError> {
        match err {
            GameError::Cache(
                benign @ (CacheError::CoinNotFound { .. } | CacheError::NothingToDeposit),
            ) => {
                self.status = benign.to_string();
                Ok(())
            }
            fatal => Err(fatal),
        }
    }

    fn step(&mut self, direction: Step) {
        self.game.move_player(direction);
    }

    fn recenter(&mut self) -> Result<(), GameError> {
        let origin = self.game.config().origin;
        self.game.move_player_to(origin)?;
        self.status = "Returned to the starting point.".to_string();
        Ok(())
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    WriteLogger::init(
        LevelFilter::Info,
        simplelog::Config::default(),
        File::create(&args.log)?,
    )?;

    log::info!("starting session, seed {}", args.seed);

    let mut terminal = setup_terminal()?;
    let mut app = App::new(&args)?;
    let run_result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    run_result
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Up | KeyCode::Char('k') => app.step(Step::Up),
                    KeyCode::Down | KeyCode::Char('j') => app.step(Step::Down),
                    KeyCode::Left | KeyCode::Char('h') => app.step(Step::Left),
                    KeyCode::Right | KeyCode::Char('l') => app.step(Step::Right),
                    KeyCode::Char('c') => app.collect()?,
                    KeyCode::Char('d') => app.deposit()?,
                    KeyCode::Char('r') => app.recenter()?,
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Area for the map
            Constraint::Percentage(20), // Area for the player inventory
            Constraint::Percentage(10), // Area for status/help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app);
    render_inventory(frame, main_layout[1], app.game.player_coins());

    let status = Paragraph::new(format!(
        "{}  |  arrows/hjkl move, c collect, d deposit, r recenter, q quit",
        app.status
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, main_layout[2]);
}

/// Renders the player's coin inventory.
fn render_inventory(frame: &mut Frame, area: Rect, coins: &[Coin]) {
    let items: Vec<ListItem> = if coins.is_empty() {
        vec![ListItem::new("(no coins held)")]
    } else {
        coins
            .iter()
            .map(|coin| {
                ListItem::new(Line::from(Span::styled(
                    coin.to_string(),
                    Style::default().fg(Color::Yellow),
                )))
            })
            .collect()
    };
    let title = format!("Player Coins ({})", coins.len());
    let widget = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(widget, area);
}

/// Renders the scanned grid: caches with their coin counts and the
/// player marker, one character per tile.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let config = app.game.config();
    let radius = config.grid_radius as i64;
    let tile = config.tile_width;
    let origin = config.origin;
    let here = app.game.player_location();

    let tile_offset = |lat: f64, lng: f64| -> (i64, i64) {
        (
            ((lat - origin.lat) / tile).round() as i64,
            ((lng - origin.lng) / tile).round() as i64,
        )
    };
    let player_tile = tile_offset(here.lat, here.lng);

    let mut lines: Vec<Line> = Vec::with_capacity((2 * radius + 1) as usize);
    // North (positive lat offset) at the top.
    for dx in (-radius..=radius).rev() {
        let mut spans: Vec<Span> = Vec::with_capacity((2 * radius + 1) as usize);
        for dy in -radius..=radius {
            if player_tile == (dx, dy) {
                spans.push(Span::styled("@", Style::default().fg(Color::Red).bold()));
                continue;
            }
            let cache_here = app.game.caches().iter().find(|placed| {
                tile_offset(placed.location.lat, placed.location.lng) == (dx, dy)
            });
            match cache_here {
                Some(placed) => {
                    let count = placed.cache.coins().len().min(9);
                    spans.push(Span::styled(
                        count.to_string(),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                None => spans.push(Span::styled("·", Style::default().fg(Color::DarkGray))),
            }
        }
        lines.push(Line::from(spans));
    }

    let map = Paragraph::new(lines)
        .block(Block::default().title("Geocoin Carrier").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map, area);
}
