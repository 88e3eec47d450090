//! Display-side odds and payout estimators.
//!
//! Nothing here decides a round. The authority's multiplier and win amount
//! are what get paid; these functions only drive the numbers shown next to
//! the controls before a round is placed.

use crate::cards::{Card, Rank};
use crate::errors::EngineError;
use crate::games::{BetType, Direction, RiskTier, PLINKO_BUCKETS};
use crate::money::Amount;

/// Return-to-player numerator shared by dice and limbo.
pub const HOUSE_EDGE_FACTOR: f64 = 98.0;

pub const DICE_TARGET_MIN: f64 = 1.0;
pub const DICE_TARGET_MAX: f64 = 99.0;

pub const LIMBO_TARGET_MIN: f64 = 1.01;
pub const LIMBO_TARGET_MAX: f64 = 1000.0;

/// Multiplier paid by every even-money roulette bet.
pub const EVEN_MONEY_PAYOUT: f64 = 2.0;

pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Pocket order around a single-zero wheel, starting at zero.
pub const WHEEL_ORDER: [u8; 37] = [
    0, 32, 15, 19, 4, 21, 2, 25, 17, 34, 6, 27, 13, 36, 11, 30, 8, 23, 10, 5, 24, 16, 33, 1, 20,
    14, 31, 9, 22, 18, 29, 7, 28, 12, 35, 3, 26,
];

const PLINKO_LOW: [f64; PLINKO_BUCKETS] = [
    0.5, 0.7, 0.9, 1.0, 1.1, 1.3, 1.5, 1.3, 1.1, 1.0, 0.9, 0.7, 0.5,
];
const PLINKO_MEDIUM: [f64; PLINKO_BUCKETS] = [
    0.3, 0.5, 0.7, 1.0, 1.5, 2.0, 3.0, 2.0, 1.5, 1.0, 0.7, 0.5, 0.3,
];
const PLINKO_HIGH: [f64; PLINKO_BUCKETS] = [
    0.2, 0.3, 0.5, 1.0, 2.0, 5.0, 10.0, 5.0, 2.0, 1.0, 0.5, 0.3, 0.2,
];

/// Win chance in percent for a dice prediction.
///
/// Rolling under wins with probability `target`; rolling over wins with
/// `100 - target`.
///
/// # Examples
///
/// ```
/// use parlor_engine::formulas::dice_win_chance;
/// use parlor_engine::games::Direction;
///
/// assert_eq!(dice_win_chance(50.0, Direction::Under), 50.0);
/// assert_eq!(dice_win_chance(30.0, Direction::Over), 70.0);
/// ```
pub fn dice_win_chance(target: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Under => target,
        Direction::Over => 100.0 - target,
    }
}

/// Estimated dice multiplier: `98 / winChance`, or zero when the chance is zero.
///
/// # Examples
///
/// ```
/// use parlor_engine::formulas::dice_multiplier;
/// use parlor_engine::games::Direction;
///
/// assert_eq!(dice_multiplier(50.0, Direction::Under), 1.96);
/// assert_eq!(dice_multiplier(100.0, Direction::Over), 0.0);
/// ```
pub fn dice_multiplier(target: f64, direction: Direction) -> f64 {
    let chance = dice_win_chance(target, direction);
    if chance <= 0.0 {
        0.0
    } else {
        HOUSE_EDGE_FACTOR / chance
    }
}

pub fn validate_dice_target(target: f64) -> Result<(), EngineError> {
    if !(DICE_TARGET_MIN..=DICE_TARGET_MAX).contains(&target) {
        return Err(EngineError::InvalidTarget {
            target,
            min: DICE_TARGET_MIN,
            max: DICE_TARGET_MAX,
        });
    }
    Ok(())
}

/// Rejects limbo targets outside `[1.01, 1000]`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTarget`] for out-of-range or non-finite
/// targets. This runs before any request is built.
pub fn validate_limbo_target(target: f64) -> Result<(), EngineError> {
    if !(LIMBO_TARGET_MIN..=LIMBO_TARGET_MAX).contains(&target) {
        return Err(EngineError::InvalidTarget {
            target,
            min: LIMBO_TARGET_MIN,
            max: LIMBO_TARGET_MAX,
        });
    }
    Ok(())
}

/// Win chance in percent for a limbo target: `min(98 / target, 98)`.
///
/// # Examples
///
/// ```
/// use parlor_engine::formulas::limbo_win_chance;
///
/// assert_eq!(limbo_win_chance(2.0).unwrap(), 49.0);
/// assert!(limbo_win_chance(1000.5).is_err());
/// ```
pub fn limbo_win_chance(target: f64) -> Result<f64, EngineError> {
    validate_limbo_target(target)?;
    Ok((HOUSE_EDGE_FACTOR / target).min(HOUSE_EDGE_FACTOR))
}

/// Payout multiplier for an even-money roulette bet.
pub fn roulette_payout(_bet_type: BetType) -> f64 {
    EVEN_MONEY_PAYOUT
}

pub fn is_red(number: u8) -> bool {
    RED_NUMBERS.contains(&number)
}

/// Colour of a pocket for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PocketColor {
    Green,
    Red,
    Black,
}

pub fn pocket_color(number: u8) -> PocketColor {
    match number {
        0 => PocketColor::Green,
        n if is_red(n) => PocketColor::Red,
        _ => PocketColor::Black,
    }
}

/// Whether an even-money bet covers `number`. Zero loses every bet.
///
/// Used to label the settled pocket; the authority's `won` flag decides the
/// round.
pub fn roulette_bet_wins(bet_type: BetType, number: u8) -> bool {
    if number == 0 || number > 36 {
        return false;
    }
    match bet_type {
        BetType::Red => is_red(number),
        BetType::Black => !is_red(number),
        BetType::Even => number % 2 == 0,
        BetType::Odd => number % 2 == 1,
        BetType::Low => number <= 18,
        BetType::High => number >= 19,
    }
}

/// Index of `number` in [`WHEEL_ORDER`].
pub fn wheel_index(number: u8) -> Option<usize> {
    WHEEL_ORDER.iter().position(|&pocket| pocket == number)
}

/// Bucket multipliers shown under the plinko board, left to right.
pub fn plinko_multipliers(risk: RiskTier) -> &'static [f64; PLINKO_BUCKETS] {
    match risk {
        RiskTier::Low => &PLINKO_LOW,
        RiskTier::Medium => &PLINKO_MEDIUM,
        RiskTier::High => &PLINKO_HIGH,
    }
}

/// What a bet would return at `multiplier`. Display only.
pub fn potential_win(bet: Amount, multiplier: f64) -> Amount {
    bet.times(multiplier)
}

/// Blackjack hand value, counting aces as 11 and dropping them to 1 while
/// the hand is over 21.
pub fn blackjack_score(cards: &[Card]) -> u32 {
    let mut score: u32 = cards.iter().map(|card| card.rank.points()).sum();
    let mut soft_aces = cards
        .iter()
        .filter(|card| card.rank == Rank::Ace)
        .count();
    while score > 21 && soft_aces > 0 {
        score -= 10;
        soft_aces -= 1;
    }
    score
}

/// Balloon scale for a pump multiplier.
pub fn pump_scale(multiplier: f64) -> f64 {
    1.0 + (multiplier - 1.0) * 0.5
}
