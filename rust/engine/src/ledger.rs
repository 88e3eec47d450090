use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::games::GameKind;
use crate::money::Amount;
use crate::outcome::Verdict;

/// Append-only record of one settled round.
///
/// Deserializes from the authority's history items as well, which carry an
/// extra `profit` field and a `time` stamp without a UTC offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Game the round was played on
    pub game: GameKind,
    /// Stake placed at round start
    pub bet: Amount,
    /// Multiplier the authority paid
    pub multiplier: f64,
    /// Amount the authority credited, zero on a loss
    pub win: Amount,
    /// Settlement time
    #[serde(rename = "time", alias = "timestamp", with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(game: GameKind, bet: Amount, multiplier: f64, win: Amount) -> Self {
        Self {
            game,
            bet,
            multiplier,
            win,
            timestamp: Utc::now(),
        }
    }

    pub fn profit(&self) -> Amount {
        self.win - self.bet
    }

    pub fn is_profitable(&self) -> bool {
        self.profit().is_positive()
    }

    /// Outcome as seen from the ledger: stake returned is a push.
    pub fn verdict(&self) -> Verdict {
        match self.win.cmp(&self.bet) {
            std::cmp::Ordering::Greater => Verdict::Win,
            std::cmp::Ordering::Equal => Verdict::Push,
            std::cmp::Ordering::Less => Verdict::Loss,
        }
    }

    /// Whether `win` equals `bet × multiplier` at cent precision.
    pub fn is_consistent(&self) -> bool {
        self.bet.times(self.multiplier) == self.win
    }
}

mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    // Offset-less stamps are taken as UTC.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
