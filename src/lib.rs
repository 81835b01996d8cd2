//! neon-2048: a 2048 grid-merge engine + game session layer
//!
//! This crate provides:
//! - A value `Board` with the game operations (`shift`, `with_random_tile`,
//!   `has_any_move_available`, ...) and free functions mirroring them
//!   (`engine::make_move`, `engine::initialize`, ...)
//! - A `Session` driving one game: score, best score, games played and the
//!   `Playing`/`GameOver` state machine (`session` module)
//! - Progress storage per player identity (`progress` module)
//! - Settings for the terminal front end (`config` module)
//!
//! Quick start:
//! ```
//! use neon_2048::engine::{self as GameEngine, Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::initialize(4, &mut rng).unwrap();
//! let res = GameEngine::make_move(&b0, 0, Move::Left);
//! let b1 = if res.changed { res.board.with_random_tile(&mut rng) } else { res.board };
//! assert!(b1.tile_count() >= 2);
//! ```
//!
//! Full loop (random policy)
//! ```
//! use neon_2048::engine::Move;
//! use neon_2048::session::Session;
//! use rand::{rngs::StdRng, Rng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut game = Session::new(4, &mut rng).unwrap();
//! let mut turns = 0u32;
//! while !game.is_game_over() && turns < 16 {
//!     let dir = Move::ALL[rng.gen_range(0..4)];
//!     let snap = game.step(dir, &mut rng).unwrap();
//!     if snap.changed {
//!         turns += 1;
//!     }
//! }
//! assert!(game.state().best_score >= game.state().score);
//! ```
//!
pub mod config;
pub mod engine;
pub mod progress;
pub mod session;
