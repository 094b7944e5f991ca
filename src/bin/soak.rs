use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use merge_2048::config::EngineConfig;
use merge_2048::engine::{BoardEngine, Grid, Move, Score, Tile};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "soak", about = "Play random 2048 games in parallel and check engine invariants")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 1_000)]
    games: u64,
    /// Base seed; game i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Grid size
    #[arg(long, default_value_t = 4)]
    size: usize,
    /// Win threshold
    #[arg(long, default_value_t = 2048)]
    win: Tile,
    /// Per-game move cap
    #[arg(long, default_value_t = 100_000)]
    max_moves: u64,
    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct GameReport {
    moves: u64,
    score: Score,
    highest_tile: Tile,
    won: bool,
}

fn play_one(config: &EngineConfig, seed: u64, max_moves: u64) -> Result<GameReport, String> {
    let mut engine = BoardEngine::with_rng(config, StdRng::seed_from_u64(seed))
        .map_err(|e| e.to_string())?;
    let mut policy = StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
    let mut report = GameReport::default();

    if engine.grid().count_empty() != config.size * config.size - 2 {
        return Err(format!("seed {seed}: reset did not deal exactly two tiles"));
    }
    while !engine.is_over() && report.moves < max_moves {
        let dir = Move::ALL[policy.gen_range(0..4)];
        let before = engine.grid().clone();
        let score_before = engine.score();
        let changed = engine.apply_move(dir);

        let gained = engine.score() - score_before;
        if gained != engine.last_gain() {
            return Err(format!("seed {seed}: score moved by {gained}, last_gain is {}", engine.last_gain()));
        }
        if engine.grid().tile_sum() != before.tile_sum() {
            return Err(format!("seed {seed}: tile sum not conserved on {dir} from {before:?}"));
        }
        if gained != merged_tile_sum(&before, engine.grid()) {
            return Err(format!("seed {seed}: gained {gained} does not match merged tiles on {dir} from {before:?}"));
        }
        if changed != (engine.grid() != &before) {
            return Err(format!("seed {seed}: changed flag wrong on {dir} from {before:?}"));
        }
        if !changed {
            continue;
        }
        let empty_before = engine.grid().count_empty();
        match engine.spawn_tile() {
            Some(spawn) if spawn.value == 2 || spawn.value == 4 => {}
            other => return Err(format!("seed {seed}: bad spawn {other:?}")),
        }
        if engine.grid().count_empty() + 1 != empty_before {
            return Err(format!("seed {seed}: spawn did not fill exactly one cell"));
        }
        report.moves += 1;
        report.won |= engine.is_won();
    }
    report.score = engine.score();
    report.highest_tile = engine.grid().highest_tile();
    Ok(report)
}

/// Sum of the tiles a move produced by merging, recovered from tile counts alone.
///
/// For each value 2^e, `after - before = merges(e - 1) - 2 * merges(e)`, and
/// nothing merges into a 2, so the merge counts follow from the smallest value up.
fn merged_tile_sum(before: &Grid, after: &Grid) -> Score {
    let mut delta = [0i64; Tile::BITS as usize + 1];
    for &v in after.cells().iter().filter(|&&v| v != 0) {
        delta[v.trailing_zeros() as usize] += 1;
    }
    for &v in before.cells().iter().filter(|&&v| v != 0) {
        delta[v.trailing_zeros() as usize] -= 1;
    }
    let mut total: Score = 0;
    let mut merges_below: i64 = 0;
    for (e, &d) in delta.iter().enumerate().skip(1) {
        total = total.wrapping_add((merges_below as Score).wrapping_mul(1 << e));
        merges_below = (merges_below - d) / 2;
    }
    total
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Summary {
    games: usize,
    mean_score: f64,
    max_score: Score,
    highest_tile: Tile,
    wins: usize,
}

fn summarize(reports: &[GameReport]) -> Summary {
    if reports.is_empty() {
        return Summary::default();
    }
    Summary {
        games: reports.len(),
        mean_score: reports.iter().map(|r| r.score as f64).sum::<f64>() / reports.len() as f64,
        max_score: reports.iter().map(|r| r.score).max().unwrap_or(0),
        highest_tile: reports.iter().map(|r| r.highest_tile).max().unwrap_or(0),
        wins: reports.iter().filter(|r| r.won).count(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = EngineConfig { size: args.size, win_threshold: args.win };
    config.validate()?;

    let start = Instant::now();
    let total_moves = AtomicU64::new(0);
    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} games | {msg}")?
                .progress_chars("=>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let results: Vec<Result<GameReport, String>> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let r = play_one(&config, args.seed.wrapping_add(i), args.max_moves);
            if let Ok(rep) = &r {
                let m = total_moves.fetch_add(rep.moves, Ordering::Relaxed) + rep.moves;
                let rate = m as f64 / start.elapsed().as_secs_f64().max(1e-6);
                pb.set_message(format!("moves/sec: {rate:.0}"));
            }
            pb.inc(1);
            r
        })
        .collect();
    pb.finish_and_clear();

    let mut reports = Vec::with_capacity(results.len());
    let mut failures = 0usize;
    for r in results {
        match r {
            Ok(rep) => reports.push(rep),
            Err(msg) => {
                error!("{msg}");
                failures += 1;
            }
        }
    }

    let summary = summarize(&reports);
    info!("finished in {:.2}s", start.elapsed().as_secs_f64());
    println!(
        "Games: {} | Moves: {} | Mean score: {:.1} | Max score: {} | Highest tile: {} | Wins: {} | Violations: {}",
        summary.games,
        total_moves.load(Ordering::Relaxed),
        summary.mean_score,
        summary.max_score,
        summary.highest_tile,
        summary.wins,
        failures
    );

    if failures > 0 {
        return Err(format!("{failures} game(s) violated engine invariants").into());
    }
    Ok(())
}
