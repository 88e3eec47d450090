use serde::{Deserialize, Serialize};

use crate::cards::CardTable;
use crate::ledger::Transaction;
use crate::money::Amount;

/// One authority-issued step of a replay path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PathStep {
    /// Plinko column after a peg row (0..=12)
    Peg(u8),
    /// Multiplier sample on a progressive curve
    Sample(f64),
    /// Roulette pocket number
    Pocket(u8),
    /// Grid cell index
    Cell(u8),
    /// Single rolled value (dice roll, limbo result)
    Value(f64),
}

/// Ordered steps used purely for replay. Win or loss is never read from here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomePath {
    steps: Vec<PathStep>,
}

impl OutcomePath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }
}

impl FromIterator<PathStep> for OutcomePath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The authority's verdict for a settled round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Win,
    Loss,
    /// Stake returned (blackjack tie)
    Push,
}

/// Game-specific values that came with a settlement, kept for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_chance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<CardTable>,
}

/// Final word from the authority on a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub verdict: Verdict,
    pub multiplier: f64,
    pub win: Amount,
    pub balance: Amount,
    pub path: OutcomePath,
    pub hazards: Vec<u8>,
    pub detail: OutcomeDetail,
}

/// Authority response, already decoded into what the round machine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum AuthorityReply {
    /// Stake accepted for a multi-step round.
    Started {
        balance: Amount,
        cap: Option<f64>,
        table: Option<CardTable>,
    },
    /// A reveal hit a safe cell.
    Revealed { multiplier: f64 },
    /// A card was drawn and the hand is still live.
    Dealt { table: CardTable },
    Resolved(Resolution),
}

impl AuthorityReply {
    pub fn balance(&self) -> Option<Amount> {
        match self {
            AuthorityReply::Started { balance, .. } => Some(*balance),
            AuthorityReply::Resolved(resolution) => Some(resolution.balance),
            AuthorityReply::Revealed { .. } | AuthorityReply::Dealt { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthorityReply::Started { .. } => "started",
            AuthorityReply::Revealed { .. } => "revealed",
            AuthorityReply::Dealt { .. } => "dealt",
            AuthorityReply::Resolved(_) => "resolved",
        }
    }
}

/// Produced exactly once per round, when it reaches `Settled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub round: u64,
    pub verdict: Verdict,
    pub transaction: Transaction,
    /// Authoritative balance after the round
    pub balance: Amount,
    pub path: OutcomePath,
    pub hazards: Vec<u8>,
    pub detail: OutcomeDetail,
}
