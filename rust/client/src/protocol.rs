//! Wire format of the authority's `/api/play/{game}` endpoints.
//!
//! Requests are built from a [`ActionPayload`]; responses arrive as one
//! flat JSON object per game and are folded into a typed [`AuthorityReply`]
//! by [`interpret`].

use parlor_engine::cards::{Card, CardTable};
use parlor_engine::games::{Direction, GameFamily, GameKind};
use parlor_engine::machine::ActionPayload;
use parlor_engine::money::Amount;
use parlor_engine::outcome::{
    AuthorityReply, OutcomeDetail, OutcomePath, PathStep, Resolution, Verdict,
};
use parlor_engine::round::{GameParams, Move};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::remote::RemoteError;

/// Flat response body shared by every game endpoint. Each game fills in
/// the fields it knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub balance: Option<Amount>,
    #[serde(default)]
    pub win: Option<Amount>,
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub won: Option<bool>,
    #[serde(default)]
    pub path: Option<Vec<f64>>,
    #[serde(default)]
    pub crash_point: Option<f64>,
    #[serde(default)]
    pub roll: Option<f64>,
    #[serde(default)]
    pub win_chance: Option<f64>,
    /// Limbo sends the rolled value, blackjack a `win`/`lose`/`push` label.
    #[serde(default)]
    pub result: Option<ResultField>,
    #[serde(default)]
    pub number: Option<u8>,
    #[serde(default)]
    pub hit: Option<bool>,
    #[serde(default)]
    pub game_over: Option<bool>,
    #[serde(default)]
    pub mines: Option<Vec<u8>>,
    #[serde(default)]
    pub foxes: Option<Vec<u8>>,
    #[serde(default)]
    pub gems_found: Option<u32>,
    #[serde(default)]
    pub max_multiplier: Option<f64>,
    #[serde(default)]
    pub player_hand: Option<Vec<String>>,
    #[serde(default)]
    pub dealer_hand: Option<Vec<String>>,
    #[serde(default)]
    pub player_score: Option<u32>,
    #[serde(default)]
    pub dealer_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultField {
    Value(f64),
    Label(String),
}

impl AuthorityResponse {
    /// Hazard cells named in the response, under either grid's key.
    pub fn hazards(&self) -> Vec<u8> {
        self.mines
            .clone()
            .or_else(|| self.foxes.clone())
            .unwrap_or_default()
    }
}

/// JSON body for a pending action.
pub fn request_body(payload: &ActionPayload) -> Value {
    match payload {
        ActionPayload::Start(config) => {
            let mut body = Map::new();
            let action = if config.game() == GameKind::Blackjack {
                "deal"
            } else {
                "start"
            };
            body.insert("action".into(), json!(action));
            body.insert("bet".into(), json!(config.bet().as_f64()));
            match *config.params() {
                GameParams::Plinko { risk } => {
                    body.insert("risk".into(), json!(risk.as_str()));
                }
                GameParams::Crash { auto_cashout } => {
                    body.insert("autoCashout".into(), json!(auto_cashout));
                }
                GameParams::Dice { target, direction } => {
                    body.insert("target".into(), json!(target));
                    body.insert("over".into(), json!(direction == Direction::Over));
                }
                GameParams::Mines { mines } => {
                    body.insert("mines".into(), json!(mines));
                }
                GameParams::Chicken { foxes } => {
                    body.insert("foxes".into(), json!(foxes));
                }
                GameParams::Limbo { target } => {
                    body.insert("target".into(), json!(target));
                }
                GameParams::Roulette { bet_type } => {
                    body.insert("betType".into(), json!(bet_type.as_str()));
                }
                GameParams::Pump | GameParams::Blackjack => {}
            }
            Value::Object(body)
        }
        ActionPayload::Advance(Move::Reveal(position)) => {
            json!({ "action": "reveal", "position": position })
        }
        ActionPayload::Advance(Move::Hit) => json!({ "action": "hit" }),
        ActionPayload::Advance(Move::Stand) => json!({ "action": "stand" }),
        ActionPayload::Advance(Move::Pop) => json!({ "action": "pop" }),
        ActionPayload::Cashout { multiplier: Some(m) } => {
            json!({ "action": "cashout", "multiplier": m })
        }
        ActionPayload::Cashout { multiplier: None } => json!({ "action": "cashout" }),
    }
}

/// Folds a response into the reply the round machine expects for
/// `payload`.
///
/// # Errors
///
/// [`RemoteError::Authority`] when the body carries an `error`, and
/// [`RemoteError::Decode`] when a field the reply needs is missing or
/// malformed.
pub fn interpret(
    game: GameKind,
    payload: &ActionPayload,
    mut response: AuthorityResponse,
) -> Result<AuthorityReply, RemoteError> {
    if let Some(message) = response.error.take() {
        return Err(RemoteError::Authority(message));
    }

    match payload {
        ActionPayload::Start(config) => match game.family() {
            GameFamily::SingleShot | GameFamily::Progressive if game != GameKind::Pump => {
                single_shot(game, config.bet(), response).map(AuthorityReply::Resolved)
            }
            GameFamily::Cards => Ok(AuthorityReply::Started {
                balance: required(response.balance, "balance")?,
                cap: None,
                table: Some(card_table(&response)?),
            }),
            _ => Ok(AuthorityReply::Started {
                balance: required(response.balance, "balance")?,
                cap: if game == GameKind::Pump {
                    Some(required(response.max_multiplier, "maxMultiplier")?)
                } else {
                    None
                },
                table: None,
            }),
        },
        ActionPayload::Advance(Move::Reveal(_)) => {
            if response.hit == Some(true) {
                let hazards = response.hazards();
                Ok(AuthorityReply::Resolved(Resolution {
                    verdict: Verdict::Loss,
                    multiplier: 0.0,
                    win: Amount::ZERO,
                    balance: required(response.balance, "balance")?,
                    path: hazards.iter().map(|cell| PathStep::Cell(*cell)).collect(),
                    hazards,
                    detail: OutcomeDetail::default(),
                }))
            } else {
                Ok(AuthorityReply::Revealed {
                    multiplier: required(response.multiplier, "multiplier")?,
                })
            }
        }
        ActionPayload::Advance(Move::Hit) if response.game_over != Some(true) => {
            Ok(AuthorityReply::Dealt {
                table: card_table(&response)?,
            })
        }
        ActionPayload::Advance(Move::Hit) | ActionPayload::Advance(Move::Stand) => {
            let table = card_table(&response)?;
            let verdict = match &response.result {
                Some(ResultField::Label(label)) => blackjack_verdict(label)?,
                _ => return Err(RemoteError::Decode("missing blackjack result".into())),
            };
            Ok(AuthorityReply::Resolved(Resolution {
                verdict,
                multiplier: response.multiplier.unwrap_or(0.0),
                win: response.win.unwrap_or(Amount::ZERO),
                balance: required(response.balance, "balance")?,
                path: OutcomePath::default(),
                hazards: Vec::new(),
                detail: OutcomeDetail {
                    table: Some(table),
                    ..OutcomeDetail::default()
                },
            }))
        }
        ActionPayload::Advance(Move::Pop) => Ok(AuthorityReply::Resolved(Resolution {
            verdict: Verdict::Loss,
            multiplier: 0.0,
            win: Amount::ZERO,
            balance: required(response.balance, "balance")?,
            path: OutcomePath::default(),
            hazards: Vec::new(),
            detail: OutcomeDetail::default(),
        })),
        ActionPayload::Cashout { .. } => {
            let hazards = response.hazards();
            Ok(AuthorityReply::Resolved(Resolution {
                verdict: Verdict::Win,
                multiplier: required(response.multiplier, "multiplier")?,
                win: required(response.win, "win")?,
                balance: required(response.balance, "balance")?,
                path: hazards.iter().map(|cell| PathStep::Cell(*cell)).collect(),
                hazards,
                detail: OutcomeDetail::default(),
            }))
        }
    }
}

fn single_shot(
    game: GameKind,
    bet: Amount,
    response: AuthorityResponse,
) -> Result<Resolution, RemoteError> {
    let balance = required(response.balance, "balance")?;
    let win = response.win.unwrap_or(Amount::ZERO);
    let multiplier = response.multiplier.unwrap_or(0.0);
    let by_flag = |won: Option<bool>| -> Result<Verdict, RemoteError> {
        match required(won, "won")? {
            true => Ok(Verdict::Win),
            false => Ok(Verdict::Loss),
        }
    };

    let mut detail = OutcomeDetail::default();
    let (verdict, path) = match game {
        GameKind::Plinko => {
            let columns = required(response.path, "path")?;
            let path = columns
                .iter()
                .map(|column| to_index(*column, "path").map(PathStep::Peg))
                .collect::<Result<OutcomePath, _>>()?;
            // Plinko pays something on every drop; only a profit counts as a win.
            let verdict = match win.cmp(&bet) {
                std::cmp::Ordering::Greater => Verdict::Win,
                std::cmp::Ordering::Equal => Verdict::Push,
                std::cmp::Ordering::Less => Verdict::Loss,
            };
            (verdict, path)
        }
        GameKind::Crash => {
            let samples = required(response.path, "path")?;
            detail.crash_point = Some(required(response.crash_point, "crashPoint")?);
            (
                by_flag(response.won)?,
                samples.into_iter().map(PathStep::Sample).collect(),
            )
        }
        GameKind::Dice => {
            let roll = required(response.roll, "roll")?;
            detail.roll = Some(roll);
            detail.win_chance = response.win_chance;
            (
                by_flag(response.won)?,
                OutcomePath::new(vec![PathStep::Value(roll)]),
            )
        }
        GameKind::Limbo => {
            let result = match response.result {
                Some(ResultField::Value(value)) => value,
                _ => return Err(RemoteError::Decode("missing limbo result".into())),
            };
            detail.result = Some(result);
            (
                by_flag(response.won)?,
                OutcomePath::new(vec![PathStep::Value(result)]),
            )
        }
        GameKind::Roulette => {
            let number = required(response.number, "number")?;
            detail.number = Some(number);
            (
                by_flag(response.won)?,
                OutcomePath::new(vec![PathStep::Pocket(number)]),
            )
        }
        other => {
            return Err(RemoteError::Decode(format!(
                "{other} does not settle on start"
            )))
        }
    };

    Ok(Resolution {
        verdict,
        multiplier,
        win,
        balance,
        path,
        hazards: Vec::new(),
        detail,
    })
}

fn card_table(response: &AuthorityResponse) -> Result<CardTable, RemoteError> {
    Ok(CardTable {
        player: parse_hand(response.player_hand.as_deref(), "playerHand")?,
        dealer: parse_hand(response.dealer_hand.as_deref(), "dealerHand")?,
        player_score: required(response.player_score, "playerScore")?,
        dealer_score: required(response.dealer_score, "dealerScore")?,
    })
}

fn parse_hand(hand: Option<&[String]>, field: &str) -> Result<Vec<Card>, RemoteError> {
    required(hand, field)?
        .iter()
        .map(|card| {
            card.parse::<Card>()
                .map_err(|e| RemoteError::Decode(format!("{field}: {e}")))
        })
        .collect()
}

fn blackjack_verdict(label: &str) -> Result<Verdict, RemoteError> {
    match label {
        "win" => Ok(Verdict::Win),
        "lose" => Ok(Verdict::Loss),
        "push" => Ok(Verdict::Push),
        other => Err(RemoteError::Decode(format!(
            "unknown blackjack result: {other}"
        ))),
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, RemoteError> {
    value.ok_or_else(|| RemoteError::Decode(format!("response is missing `{field}`")))
}

fn to_index(value: f64, field: &str) -> Result<u8, RemoteError> {
    if value.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&value) {
        Ok(value as u8)
    } else {
        Err(RemoteError::Decode(format!("{field} holds {value}")))
    }
}
