use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::warn;
use merge_2048::best_score::BestScoreStore;
use merge_2048::config::Config;
use merge_2048::engine::{BoardEngine, GameStatus, Move, Tile};
use merge_2048::session::Session;
use rand::{rngs::StdRng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "merge-2048", version, about = "Play 2048 in the terminal")]
struct Args {
    /// TOML settings file ([board] size / win_threshold, [storage] best_score_file)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Grid size (overrides the config file)
    #[arg(long)]
    size: Option<usize>,
    /// Tile value that wins the game (overrides the config file)
    #[arg(long)]
    win: Option<Tile>,
    /// Seed the tile spawner for a reproducible game
    #[arg(long)]
    seed: Option<u64>,
    /// Best-score file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    best_file: Option<PathBuf>,
    /// Do not read or write the best score
    #[arg(long)]
    no_best: bool,
}

const HELP: &str = "w/a/s/d or up/down/left/right to move, n = new game, c = continue after win, q = quit";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Config::from_toml(path)?,
        None => Config::default(),
    };
    if let Some(size) = args.size { cfg.board.size = size; }
    if let Some(win) = args.win { cfg.board.win_threshold = win; }
    if let Some(path) = args.best_file { cfg.storage.best_score_file = path; }

    let store = (!args.no_best).then(|| BestScoreStore::new(&cfg.storage.best_score_file));
    let best = match &store {
        Some(store) => store.load().unwrap_or_else(|e| {
            warn!("ignoring unreadable best score at {}: {e}", store.path().display());
            0
        }),
        None => 0,
    };

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let engine = BoardEngine::with_rng(&cfg.board, rng)?;
    let mut session = Session::new(engine, best);
    let mut saved_best = best;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{HELP}")?;
    render(&mut out, &session)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let cmd = line.trim();
        match cmd {
            "" => continue,
            "q" | "quit" => break,
            "n" | "new" => session.new_game(),
            "c" | "continue" => session.continue_after_win(),
            "?" | "help" => writeln!(out, "{HELP}")?,
            other => match other.parse::<Move>() {
                Ok(dir) => {
                    let turn = session.play(dir);
                    if turn.just_won {
                        writeln!(out, "*** You reached {}! Press c to keep going or n for a new game. ***", session.engine().win_threshold())?;
                    }
                }
                Err(e) => {
                    writeln!(out, "{e}; {HELP}")?;
                    continue;
                }
            },
        }
        if let Some(store) = &store {
            if session.best() > saved_best {
                saved_best = store.record(session.best())?;
            }
        }
        render(&mut out, &session)?;
        if session.status() == GameStatus::Over {
            writeln!(out, "Game over! Final score: {}. Press n to play again or q to quit.", session.score())?;
        }
    }

    if let Some(store) = &store {
        if session.best() > saved_best {
            store.record(session.best())?;
        }
    }
    Ok(())
}

fn render<W: Write>(out: &mut W, session: &Session) -> io::Result<()> {
    writeln!(out)?;
    write!(out, "{}", session.engine().grid())?;
    writeln!(out, "Score: {} | Best: {}", session.score(), session.best())?;
    if session.keep_playing() {
        writeln!(out, "Continuing past {}", session.engine().win_threshold())?;
    }
    out.flush()
}
