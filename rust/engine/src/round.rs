use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::cards::CardTable;
use crate::errors::EngineError;
use crate::formulas::{validate_dice_target, validate_limbo_target};
use crate::games::{BetType, Direction, GameKind, RiskTier, FOX_COUNTS, GRID_CELLS, MINE_COUNTS};
use crate::money::Amount;
use crate::outcome::Settlement;

/// Identifier of one remote action, minted by whoever performs the I/O.
pub type RequestId = String;

pub const DEFAULT_AUTO_CASHOUT: f64 = 2.0;
pub const MIN_AUTO_CASHOUT: f64 = 1.01;

/// Variant-specific parameters chosen before a round starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameParams {
    Plinko { risk: RiskTier },
    Crash { auto_cashout: f64 },
    Dice { target: f64, direction: Direction },
    Mines { mines: u8 },
    Chicken { foxes: u8 },
    Pump,
    Limbo { target: f64 },
    Roulette { bet_type: BetType },
    Blackjack,
}

impl GameParams {
    pub fn game(&self) -> GameKind {
        match self {
            GameParams::Plinko { .. } => GameKind::Plinko,
            GameParams::Crash { .. } => GameKind::Crash,
            GameParams::Dice { .. } => GameKind::Dice,
            GameParams::Mines { .. } => GameKind::Mines,
            GameParams::Chicken { .. } => GameKind::Chicken,
            GameParams::Pump => GameKind::Pump,
            GameParams::Limbo { .. } => GameKind::Limbo,
            GameParams::Roulette { .. } => GameKind::Roulette,
            GameParams::Blackjack => GameKind::Blackjack,
        }
    }

    /// Mines or foxes hidden on the grid, for reveal-grid games.
    pub fn hazard_count(&self) -> Option<u8> {
        match self {
            GameParams::Mines { mines } => Some(*mines),
            GameParams::Chicken { foxes } => Some(*foxes),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        match *self {
            GameParams::Crash { auto_cashout } => {
                if !auto_cashout.is_finite() || auto_cashout < MIN_AUTO_CASHOUT {
                    return Err(EngineError::InvalidParameter(format!(
                        "auto cash-out must be at least {MIN_AUTO_CASHOUT}"
                    )));
                }
            }
            GameParams::Dice { target, .. } => validate_dice_target(target)?,
            GameParams::Limbo { target } => validate_limbo_target(target)?,
            GameParams::Mines { mines } => {
                if !MINE_COUNTS.contains(&mines) {
                    return Err(EngineError::InvalidParameter(format!(
                        "mine count must be one of {MINE_COUNTS:?}"
                    )));
                }
            }
            GameParams::Chicken { foxes } => {
                if !FOX_COUNTS.contains(&foxes) {
                    return Err(EngineError::InvalidParameter(format!(
                        "fox count must be one of {FOX_COUNTS:?}"
                    )));
                }
            }
            GameParams::Plinko { .. }
            | GameParams::Pump
            | GameParams::Roulette { .. }
            | GameParams::Blackjack => {}
        }
        Ok(())
    }
}

/// Immutable description of one round: game, stake and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    bet: Amount,
    params: GameParams,
}

impl RoundConfig {
    /// Validates the stake and the game parameters.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidParameter`] for a non-positive bet or an
    ///   unsupported mine/fox count or auto cash-out.
    /// - [`EngineError::InvalidTarget`] for dice or limbo targets outside
    ///   their domain.
    ///
    /// The balance check happens when the round starts, against the balance
    /// displayed at that moment.
    pub fn new(bet: Amount, params: GameParams) -> Result<Self, EngineError> {
        if !bet.is_positive() {
            return Err(EngineError::InvalidParameter(format!(
                "bet must be positive, got {bet}"
            )));
        }
        params.validate()?;
        Ok(Self { bet, params })
    }

    pub fn game(&self) -> GameKind {
        self.params.game()
    }

    pub fn bet(&self) -> Amount {
        self.bet
    }

    pub fn params(&self) -> &GameParams {
        &self.params
    }

    /// Safe cells on the grid, for reveal-grid games.
    pub fn total_safe(&self) -> Option<u8> {
        self.params
            .hazard_count()
            .map(|hazards| GRID_CELLS - hazards)
    }
}

/// Remote action kinds a round can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Start,
    Advance,
    Cashout,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Start => f.write_str("start"),
            ActionKind::Advance => f.write_str("advance"),
            ActionKind::Cashout => f.write_str("cashout"),
        }
    }
}

/// Lifecycle position of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "action", rename_all = "snake_case")]
pub enum RoundPhase {
    Idle,
    /// A remote action is in flight.
    Awaiting(ActionKind),
    Active,
    Resolving,
    Settled,
}

impl RoundPhase {
    /// Edges of the round lifecycle. `Awaiting(Start)` hangs off `Idle` and
    /// the other awaiting phases hang off `Active`; each returns to its base
    /// when the action fails.
    pub fn can_transition_to(self, next: RoundPhase) -> bool {
        use ActionKind::{Advance, Cashout, Start};
        use RoundPhase::*;
        matches!(
            (self, next),
            (Idle, Awaiting(Start))
                | (Awaiting(Start), Idle)
                | (Awaiting(Start), Active)
                | (Active, Awaiting(Advance | Cashout))
                | (Awaiting(Advance | Cashout), Active)
                | (Active, Resolving)
                | (Resolving, Settled)
                | (Settled, Idle)
        )
    }

    /// Last confirmed phase underneath an awaiting phase.
    pub fn base(self) -> RoundPhase {
        match self {
            RoundPhase::Awaiting(ActionKind::Start) => RoundPhase::Idle,
            RoundPhase::Awaiting(_) => RoundPhase::Active,
            other => other,
        }
    }

    pub fn is_awaiting(self) -> bool {
        matches!(self, RoundPhase::Awaiting(_))
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Idle => f.write_str("idle"),
            RoundPhase::Awaiting(action) => write!(f, "awaiting {action}"),
            RoundPhase::Active => f.write_str("active"),
            RoundPhase::Resolving => f.write_str("resolving"),
            RoundPhase::Settled => f.write_str("settled"),
        }
    }
}

/// Player input that moves an active round forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "move", content = "position", rename_all = "snake_case")]
pub enum Move {
    /// Open a grid cell (reveal-grid games).
    Reveal(u8),
    /// Draw a card (blackjack).
    Hit,
    /// Stop drawing and let the dealer play (blackjack).
    Stand,
    /// Report that the balloon reached its cap (pump).
    Pop,
}

impl Move {
    pub fn is_allowed_for(self, game: GameKind) -> bool {
        match self {
            Move::Reveal(_) => matches!(game, GameKind::Mines | GameKind::Chicken),
            Move::Hit | Move::Stand => game == GameKind::Blackjack,
            Move::Pop => game == GameKind::Pump,
        }
    }
}

/// Everything a round machine knows about its current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    /// Sequence number of the round, bumped when a start is accepted
    pub round: u64,
    pub phase: RoundPhase,
    /// Present from the authority's start confirmation until the round resets
    pub config: Option<RoundConfig>,
    /// Cells confirmed safe, only ever grows within a round
    pub revealed: BTreeSet<u8>,
    /// Hazard cells disclosed by the authority at settlement
    pub hazards: Vec<u8>,
    /// Latest multiplier confirmed by the authority or observed on the curve
    pub current_multiplier: f64,
    pub pending_request_id: Option<RequestId>,
    /// Pop point issued by the authority (pump)
    pub cap: Option<f64>,
    /// Hands on the table (blackjack)
    pub table: Option<CardTable>,
    pub settlement: Option<Settlement>,
}

impl RoundState {
    pub fn idle(round: u64) -> Self {
        Self {
            round,
            phase: RoundPhase::Idle,
            config: None,
            revealed: BTreeSet::new(),
            hazards: Vec::new(),
            current_multiplier: 1.0,
            pending_request_id: None,
            cap: None,
            table: None,
            settlement: None,
        }
    }

    pub fn total_safe(&self) -> Option<u8> {
        self.config.as_ref().and_then(RoundConfig::total_safe)
    }

    /// Safe cells still hidden. Together with `revealed` this always adds up
    /// to the grid's safe cell count.
    pub fn remaining_safe(&self) -> Option<u8> {
        self.total_safe()
            .map(|total| total.saturating_sub(self.revealed.len() as u8))
    }
}
