//! # parlor-engine: Wagering Round Core
//!
//! Sans-IO core shared by a family of wagering mini-games: reveal grids
//! (mines, chicken), progressive multipliers (crash, pump), single-shot odds
//! games (plinko, dice, limbo, roulette) and blackjack. Every outcome is
//! decided by a remote authority; this crate tracks the round lifecycle,
//! estimates odds for display and replays settled outcomes as animation
//! frames.
//!
//! ## Core Modules
//!
//! - [`games`] - Game catalog, families and per-game parameter types
//! - [`money`] - Cent-precise currency amounts
//! - [`round`] - Round configuration, phases and state
//! - [`machine`] - Round state machine driven by authority replies
//! - [`outcome`] - Typed authority replies, paths and settlements
//! - [`ledger`] - Transaction records
//! - [`formulas`] - Display-side odds and payout estimators
//! - [`cards`] - Card parsing for blackjack hands
//! - [`replay`] - Path replay renderer
//! - [`curves`] - Seeded cosmetic curves and scramble values
//! - [`errors`] - Error types for round operations
//!
//! ## Quick Start
//!
//! ```rust
//! use parlor_engine::formulas::{dice_multiplier, limbo_win_chance};
//! use parlor_engine::games::Direction;
//!
//! // Estimates shown before a round is placed
//! assert_eq!(dice_multiplier(50.0, Direction::Under), 1.96);
//! assert_eq!(limbo_win_chance(2.0).unwrap(), 49.0);
//! ```
//!
//! ## Driving a Round
//!
//! The caller owns the I/O. The machine hands out a pending action, the
//! caller sends it, and feeds the reply back:
//!
//! ```rust
//! use parlor_engine::games::GameKind;
//! use parlor_engine::machine::RoundMachine;
//! use parlor_engine::money::Amount;
//! use parlor_engine::outcome::AuthorityReply;
//! use parlor_engine::round::{GameParams, Move, RoundConfig, RoundPhase};
//!
//! let mut machine = RoundMachine::new(GameKind::Mines);
//! let config = RoundConfig::new(Amount::from_cents(1_000), GameParams::Mines { mines: 3 }).unwrap();
//!
//! let pending = machine
//!     .begin_start("req-1".into(), config, Amount::from_cents(5_000))
//!     .unwrap();
//! machine
//!     .apply(
//!         &pending.request_id,
//!         AuthorityReply::Started { balance: Amount::from_cents(4_000), cap: None, table: None },
//!     )
//!     .unwrap();
//! assert_eq!(machine.phase(), RoundPhase::Active);
//!
//! let reveal = machine.begin_advance("req-2".into(), Move::Reveal(7)).unwrap();
//! assert!(reveal.is_some());
//! ```
//!
//! ## Replay
//!
//! ```rust
//! use std::time::Duration;
//! use parlor_engine::replay::{PathRenderer, ReplayPlan};
//!
//! let mut renderer = PathRenderer::new();
//! renderer.start(ReplayPlan::wheel(17));
//! while renderer.is_running() {
//!     let _frame = renderer.tick(Duration::from_millis(16));
//! }
//! ```

pub mod cards;
pub mod curves;
pub mod errors;
pub mod formulas;
pub mod games;
pub mod ledger;
pub mod machine;
pub mod money;
pub mod outcome;
pub mod replay;
pub mod round;
