use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

/// Cells on a reveal-grid board (5x5).
pub const GRID_CELLS: u8 = 25;
/// Mine counts offered by the mines table.
pub const MINE_COUNTS: [u8; 5] = [1, 3, 5, 10, 15];
/// Fox counts offered by the chicken table.
pub const FOX_COUNTS: [u8; 4] = [2, 4, 6, 8];
pub const PLINKO_ROWS: usize = 16;
pub const PLINKO_BUCKETS: usize = 13;

/// Every game the session engine can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Plinko,
    Crash,
    Dice,
    Mines,
    Chicken,
    Pump,
    Limbo,
    Roulette,
    Blackjack,
}

/// How a game's rounds unfold between start and settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameFamily {
    /// Player reveals cells until a hazard or a cash-out.
    RevealGrid,
    /// Multiplier climbs until bust or cash-out.
    Progressive,
    /// One request, one outcome.
    SingleShot,
    Cards,
}

/// Animation shape used to replay a settled outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayShape {
    SteppedDescent,
    ContinuousCurve,
    SingleTransform,
}

impl GameKind {
    pub fn all() -> [GameKind; 9] {
        [
            GameKind::Plinko,
            GameKind::Crash,
            GameKind::Dice,
            GameKind::Mines,
            GameKind::Chicken,
            GameKind::Pump,
            GameKind::Limbo,
            GameKind::Roulette,
            GameKind::Blackjack,
        ]
    }

    /// Path segment of the game's action endpoint.
    pub fn slug(self) -> &'static str {
        match self {
            GameKind::Plinko => "plinko",
            GameKind::Crash => "crash",
            GameKind::Dice => "dice",
            GameKind::Mines => "mines",
            GameKind::Chicken => "chicken",
            GameKind::Pump => "pump",
            GameKind::Limbo => "limbo",
            GameKind::Roulette => "roulette",
            GameKind::Blackjack => "blackjack",
        }
    }

    pub fn family(self) -> GameFamily {
        match self {
            GameKind::Mines | GameKind::Chicken => GameFamily::RevealGrid,
            GameKind::Crash | GameKind::Pump => GameFamily::Progressive,
            GameKind::Plinko | GameKind::Dice | GameKind::Limbo | GameKind::Roulette => {
                GameFamily::SingleShot
            }
            GameKind::Blackjack => GameFamily::Cards,
        }
    }

    pub fn replay_shape(self) -> ReplayShape {
        match self {
            GameKind::Plinko | GameKind::Mines | GameKind::Chicken => ReplayShape::SteppedDescent,
            GameKind::Crash | GameKind::Pump => ReplayShape::ContinuousCurve,
            GameKind::Dice | GameKind::Limbo | GameKind::Roulette | GameKind::Blackjack => {
                ReplayShape::SingleTransform
            }
        }
    }

    /// Whether the round stays `Active` waiting for further player actions
    /// after the start reply. Crash settles in a single request even though
    /// its multiplier is progressive.
    pub fn is_multi_step(self) -> bool {
        matches!(
            self,
            GameKind::Mines | GameKind::Chicken | GameKind::Pump | GameKind::Blackjack
        )
    }

    pub fn supports_cashout(self) -> bool {
        matches!(self, GameKind::Mines | GameKind::Chicken | GameKind::Pump)
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for GameKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameKind::all()
            .into_iter()
            .find(|kind| kind.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::InvalidParameter(format!("unknown game: {s}")))
    }
}

/// Plinko payout table selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Dice prediction: roll under or over the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Under,
    Over,
}

/// Even-money roulette bets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Red,
    Black,
    Even,
    Odd,
    /// 1 through 18
    Low,
    /// 19 through 36
    High,
}

impl BetType {
    pub fn as_str(self) -> &'static str {
        match self {
            BetType::Red => "red",
            BetType::Black => "black",
            BetType::Even => "even",
            BetType::Odd => "odd",
            BetType::Low => "low",
            BetType::High => "high",
        }
    }
}
