mod drill;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use memotui::accel::AcceleratorMap;
use memotui::config::Config;
use memotui::context::Context;
use memotui::program::Outcome;
use memotui::screens::quit_action;
use memotui::surface::TerminalSurface;
use memotui::{as_ctrl_key, logging};

use drill::deck::Deck;
use drill::{DrillData, ROUND_CHOICES};

#[derive(Parser)]
#[command(name = "memotui", version, about = "Terminal vocabulary drill")]
struct Cli {
    #[arg(short, long, help = "Practice a deck from a JSON file instead of the bundled ones")]
    deck: Option<PathBuf>,

    #[arg(short, long, help = "Preselected number of rounds (5, 10, 20 or 50)")]
    rounds: Option<u32>,

    #[arg(short, long, help = "Path to the config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Log level or filter, e.g. debug or memotui=trace")]
    log_level: Option<String>,

    #[arg(long, hide = true)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(rounds) = cli.rounds {
        if !ROUND_CHOICES.contains(&rounds) {
            bail!("--rounds must be one of {ROUND_CHOICES:?}");
        }
        config.default_rounds = rounds;
    }
    logging::init(&config.log_level, Path::new(&config.log_file))?;

    let decks = match &cli.deck {
        Some(path) => vec![Deck::from_file(path)?],
        None => Deck::embedded()?,
    };
    tracing::info!(decks = decks.len(), "decks loaded");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;

    let mut data = DrillData::new(decks, config.default_rounds);
    if let Some(seed) = cli.seed {
        data = data.with_seed(seed);
    }
    let result = run(terminal, &config, data);

    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    match result {
        Ok(Outcome::Finished) => tracing::info!("session finished"),
        Ok(Outcome::Quit) => tracing::info!("user quit"),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "session failed");
            eprintln!("Error: {err:?}");
        }
    }

    Ok(())
}

fn run(
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    data: DrillData,
) -> Result<Outcome> {
    let surface = TerminalSurface::new(terminal)?;
    let mut ctx = Context::new(Box::new(surface)).with_poll_interval(config.poll_interval());
    config.publish(&mut ctx);

    let global = AcceleratorMap::new();
    global.map_key(as_ctrl_key("c")?, quit_action());
    global.add_to(&mut ctx);

    let mut program = drill::build_program(data)?;
    let outcome = program.run(&mut ctx);

    global.remove_from(&mut ctx);
    Ok(outcome?)
}
