//! merge-2048: a sliding-tile 2048 board engine
//!
//! This crate provides:
//! - A `BoardEngine` owning an N x N grid and score (`apply_move`, `spawn_tile`, `is_won`, `is_over`, `reset`)
//! - A `Session` wrapper that runs the move/spawn/status loop and tracks the best score
//! - A checksummed on-disk best-score record (`best_score` module)
//! - TOML configuration for board size and win threshold (`config` module)
//!
//! Quick start:
//! ```
//! use merge_2048::config::EngineConfig;
//! use merge_2048::engine::{BoardEngine, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic engine with a seeded RNG
//! let rng = StdRng::seed_from_u64(42);
//! let mut engine = BoardEngine::with_rng(&EngineConfig::default(), rng).unwrap();
//! assert_eq!(engine.grid().count_empty(), 14);
//!
//! // Spawn only when the move changed the grid
//! for dir in Move::ALL {
//!     if engine.apply_move(dir) {
//!         engine.spawn_tile();
//!     }
//! }
//! assert!(!engine.is_over());
//! ```
//!
pub mod best_score;
pub mod config;
pub mod engine;
pub mod session;
