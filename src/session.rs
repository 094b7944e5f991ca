use log::{debug, info};
use rand::rngs::StdRng;
use rand::Rng;

use crate::engine::{BoardEngine, GameStatus, Move, Score, Spawn};

/// Outcome of one player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    /// The move changed the grid (and a tile was spawned).
    pub changed: bool,
    /// Merge score gained by this move.
    pub gained: Score,
    pub spawned: Option<Spawn>,
    /// The win threshold was reached for the first time this game.
    pub just_won: bool,
    /// The current score is a new best.
    pub new_best: bool,
    pub status: GameStatus,
}

/// One player's game: move, spawn, then status, with a sticky win flag and
/// the best score carried as a plain value.
///
/// ```
/// use merge_2048::engine::{BoardEngine, Move};
/// use merge_2048::session::Session;
/// let mut session = Session::new(BoardEngine::new(4, 2048).unwrap(), 0);
/// let turn = session.play(Move::Left);
/// assert!(session.best() >= session.score());
/// assert_eq!(turn.changed, turn.spawned.is_some());
/// ```
pub struct Session<R: Rng = StdRng> {
    engine: BoardEngine<R>,
    best: Score,
    won: bool,
    keep_playing: bool,
}

impl<R: Rng> Session<R> {
    pub fn new(engine: BoardEngine<R>, best: Score) -> Self {
        let won = engine.is_won();
        let best = best.max(engine.score());
        Self { engine, best, won, keep_playing: false }
    }

    #[inline]
    pub fn engine(&self) -> &BoardEngine<R> { &self.engine }

    #[inline]
    pub fn score(&self) -> Score { self.engine.score() }

    #[inline]
    pub fn best(&self) -> Score { self.best }

    /// Whether the win threshold has been reached this game.
    #[inline]
    pub fn won(&self) -> bool { self.won }

    /// Whether the player dismissed the win banner.
    #[inline]
    pub fn keep_playing(&self) -> bool { self.keep_playing }

    pub fn status(&self) -> GameStatus {
        if self.engine.is_over() {
            GameStatus::Over
        } else if self.won {
            GameStatus::Won
        } else {
            GameStatus::Ongoing
        }
    }

    /// Apply one input.
    ///
    /// Once the game is over without a win, input is ignored until `new_game`.
    pub fn play(&mut self, dir: Move) -> Turn {
        if self.engine.is_over() && !self.won {
            return self.idle_turn();
        }
        let changed = self.engine.apply_move(dir);
        if !changed {
            debug!("{dir}: no change");
            return self.idle_turn();
        }
        let gained = self.engine.last_gain();
        let spawned = self.engine.spawn_tile();
        debug!("{dir}: +{gained}, spawned {spawned:?}, score {}", self.engine.score());

        let new_best = self.engine.score() > self.best;
        if new_best {
            self.best = self.engine.score();
        }
        let just_won = !self.won && self.engine.is_won();
        if just_won {
            self.won = true;
            info!("reached {} with score {}", self.engine.win_threshold(), self.engine.score());
        }
        let status = self.status();
        if status == GameStatus::Over {
            info!("game over with score {}", self.engine.score());
        }
        Turn { changed, gained, spawned, just_won, new_best, status }
    }

    /// Dismiss the win banner and continue the same game.
    pub fn continue_after_win(&mut self) {
        if self.won {
            self.keep_playing = true;
        }
    }

    /// Start over; the best score carries across games.
    pub fn new_game(&mut self) {
        self.engine.reset();
        self.won = false;
        self.keep_playing = false;
        info!("new game (best {})", self.best);
    }

    fn idle_turn(&self) -> Turn {
        Turn {
            changed: false,
            gained: 0,
            spawned: None,
            just_won: false,
            new_best: false,
            status: self.status(),
        }
    }
}
