use thiserror::Error;

use crate::games::GameKind;
use crate::money::Amount;
use crate::round::{RequestId, RoundPhase};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Insufficient balance: bet {bet}, balance {balance}")]
    InsufficientBalance { bet: Amount, balance: Amount },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Invalid target: {target} (allowed {min} to {max})")]
    InvalidTarget { target: f64, min: f64, max: f64 },
    #[error("A {0} round is already active")]
    RoundAlreadyActive(GameKind),
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: RoundPhase, to: RoundPhase },
    #[error("Request {0} is still pending")]
    ActionPending(RequestId),
    #[error("Reply for request {0} does not match the pending action")]
    StaleReply(RequestId),
    #[error("Unexpected authority reply: {0}")]
    UnexpectedReply(String),
}

impl EngineError {
    /// True for failures detected before anything is sent to the authority.
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientBalance { .. }
                | EngineError::InvalidParameter(_)
                | EngineError::InvalidTarget { .. }
                | EngineError::RoundAlreadyActive(_)
                | EngineError::ActionPending(_)
        )
    }
}
