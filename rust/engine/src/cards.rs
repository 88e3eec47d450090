use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

/// One of the four suits, written by the authority as a symbol.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Suit {
    /// ♣
    Clubs,
    /// ♦
    Diamonds,
    /// ♥
    Hearts,
    /// ♠
    Spades,
}

impl Suit {
    pub fn symbol(self) -> char {
        match self {
            Suit::Clubs => '♣',
            Suit::Diamonds => '♦',
            Suit::Hearts => '♥',
            Suit::Spades => '♠',
        }
    }

    pub fn from_symbol(c: char) -> Option<Suit> {
        match c {
            '♣' => Some(Suit::Clubs),
            '♦' => Some(Suit::Diamonds),
            '♥' => Some(Suit::Hearts),
            '♠' => Some(Suit::Spades),
            _ => None,
        }
    }

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Diamonds | Suit::Hearts)
    }
}

/// Card rank from Two through Ace.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub fn symbol(self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Rank> {
        let rank = match s {
            "2" => Rank::Two,
            "3" => Rank::Three,
            "4" => Rank::Four,
            "5" => Rank::Five,
            "6" => Rank::Six,
            "7" => Rank::Seven,
            "8" => Rank::Eight,
            "9" => Rank::Nine,
            "10" => Rank::Ten,
            "J" => Rank::Jack,
            "Q" => Rank::Queen,
            "K" => Rank::King,
            "A" => Rank::Ace,
            _ => return None,
        };
        Some(rank)
    }

    /// Blackjack point value with aces counted high.
    pub fn points(self) -> u32 {
        match self {
            Rank::Ace => 11,
            Rank::Jack | Rank::Queen | Rank::King => 10,
            other => other as u32,
        }
    }
}

/// A single playing card as dealt by the authority.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.symbol(), self.suit.symbol())
    }
}

impl FromStr for Card {
    type Err = EngineError;

    /// Parses the authority's `"<rank><suit>"` form, e.g. `"10♥"` or `"A♠"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidParameter(format!("unrecognised card: {s:?}"));
        let mut chars = s.trim().chars();
        let suit = chars.next_back().and_then(Suit::from_symbol).ok_or_else(invalid)?;
        let rank = Rank::from_symbol(chars.as_str()).ok_or_else(invalid)?;
        Ok(Card { suit, rank })
    }
}

/// Both blackjack hands with the scores the authority reported for them.
/// The dealer score only counts visible cards until the round settles.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardTable {
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    pub player_score: u32,
    pub dealer_score: u32,
}
