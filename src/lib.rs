//! ntuple-2048: a 2048 simulator + n-tuple reinforcement learners
//!
//! This crate provides:
//! - A compact `State` type with the slide/merge rules, legality and the
//!   random tile model (`engine` module)
//! - A `Game` controller tracking score and owning its RNG (`game` module)
//! - An n-tuple network value function with a plain-text weight format
//!   (`ntuple` module)
//! - TD(0) on afterstates, TD(0) on states, Q-learning and an epsilon-greedy
//!   baseline behind one episode loop (`learning` module)
//! - Multi-game and parallel training runs plus result files (`experiment`
//!   and `results` modules)
//!
//! Quick start:
//! ```
//! use ntuple_2048::engine::{Action, State};
//! use ntuple_2048::game::Game;
//!
//! let s = State::from_tiles([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! let (after, reward) = s.shift(Action::Left);
//! assert_eq!(reward, 4);
//! assert_eq!(after.tile(0, 0), 4);
//!
//! // Deterministic games with a seeded RNG
//! let game = Game::seeded(42);
//! assert_eq!(game.state(), Game::seeded(42).state());
//! ```
//!
pub mod engine;
pub mod experiment;
pub mod game;
pub mod learning;
pub mod ntuple;
pub mod results;
