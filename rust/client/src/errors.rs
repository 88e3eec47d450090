//! Player-facing error notices.
//!
//! Every error the client can surface maps to a [`UserNotice`]: a stable
//! code, one short sentence, and a severity that decides how loudly it is
//! logged.

use parlor_engine::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;
use crate::remote::RemoteError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserNotice {
    /// Machine-readable code, e.g. `insufficient_balance`
    pub code: String,
    pub message: String,
    pub severity: ErrorSeverity,
}

impl UserNotice {
    pub fn new(code: impl Into<String>, message: impl Into<String>, severity: ErrorSeverity) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// The player can fix it (bet too large, wrong target)
    User,
    /// The authority refused or could not be reached; the round is intact
    Remote,
    /// The round can no longer be trusted. The process keeps running.
    Fatal,
}

pub trait IntoUserNotice {
    fn notice_code(&self) -> &'static str;

    fn notice_message(&self) -> String;

    fn severity(&self) -> ErrorSeverity;

    fn to_notice(&self) -> UserNotice {
        UserNotice::new(self.notice_code(), self.notice_message(), self.severity())
    }

    /// Builds the notice and logs it at a level matching its severity.
    fn report(&self) -> UserNotice {
        let notice = self.to_notice();
        match notice.severity {
            ErrorSeverity::User => {
                tracing::info!(code = %notice.code, message = %notice.message, "user error")
            }
            ErrorSeverity::Remote => {
                tracing::warn!(code = %notice.code, message = %notice.message, "remote error")
            }
            ErrorSeverity::Fatal => {
                tracing::error!(code = %notice.code, message = %notice.message, "round error")
            }
        }
        notice
    }
}

impl IntoUserNotice for EngineError {
    fn notice_code(&self) -> &'static str {
        match self {
            EngineError::InsufficientBalance { .. } => "insufficient_balance",
            EngineError::InvalidParameter(_) => "invalid_parameter",
            EngineError::InvalidTarget { .. } => "invalid_target",
            EngineError::RoundAlreadyActive(_) => "round_active",
            EngineError::IllegalTransition { .. } => "illegal_transition",
            EngineError::ActionPending(_) => "action_pending",
            EngineError::StaleReply(_) => "stale_reply",
            EngineError::UnexpectedReply(_) => "unexpected_reply",
        }
    }

    fn notice_message(&self) -> String {
        match self {
            EngineError::InsufficientBalance { .. } => "Insufficient balance".into(),
            EngineError::InvalidTarget { min, max, .. } => {
                format!("Target must be between {min} and {max}")
            }
            EngineError::RoundAlreadyActive(game) => format!("A {game} round is already running"),
            EngineError::ActionPending(_) => "Please wait for the current action".into(),
            EngineError::IllegalTransition { from, .. } => {
                format!("That action is not available while the round is {from}")
            }
            other => other.to_string(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::StaleReply(_)
            | EngineError::UnexpectedReply(_)
            | EngineError::IllegalTransition { .. } => ErrorSeverity::Fatal,
            _ if self.is_local_validation() => ErrorSeverity::User,
            _ => ErrorSeverity::Fatal,
        }
    }
}

impl IntoUserNotice for RemoteError {
    fn notice_code(&self) -> &'static str {
        match self {
            RemoteError::Transport(err) if err.is_timeout() => "authority_timeout",
            RemoteError::Transport(_) => "authority_unreachable",
            RemoteError::Status { .. } => "authority_status",
            RemoteError::Authority(_) => "authority_rejected",
            RemoteError::Decode(_) => "authority_response_invalid",
            RemoteError::Url(_) | RemoteError::InvalidScheme(_) => "authority_url_invalid",
        }
    }

    fn notice_message(&self) -> String {
        match self {
            RemoteError::Authority(message) => message.clone(),
            RemoteError::Transport(err) if err.is_timeout() => {
                "The game server took too long to answer".into()
            }
            RemoteError::Transport(_) => "Could not reach the game server".into(),
            RemoteError::Status { status, .. } => {
                format!("The game server answered with {status}")
            }
            other => other.to_string(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            RemoteError::Decode(_) => ErrorSeverity::Fatal,
            _ => ErrorSeverity::Remote,
        }
    }
}

impl IntoUserNotice for ConfigError {
    fn notice_code(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "config_io",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid(_) => "config_invalid",
        }
    }

    fn notice_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_engine::games::GameKind;
    use parlor_engine::money::Amount;
    use parlor_engine::round::RoundPhase;

    #[test]
    fn insufficient_balance_reads_like_the_authority() {
        let err = EngineError::InsufficientBalance {
            bet: Amount::from_cents(500),
            balance: Amount::from_cents(100),
        };
        let notice = err.to_notice();
        assert_eq!(notice.code, "insufficient_balance");
        assert_eq!(notice.message, "Insufficient balance");
        assert_eq!(notice.severity, ErrorSeverity::User);
    }

    #[test]
    fn authority_message_passes_through() {
        let notice = RemoteError::Authority("Already revealed".into()).to_notice();
        assert_eq!(notice.message, "Already revealed");
        assert_eq!(notice.severity, ErrorSeverity::Remote);
    }

    #[test]
    fn broken_replies_are_fatal() {
        assert_eq!(
            EngineError::UnexpectedReply("x".into()).severity(),
            ErrorSeverity::Fatal
        );
        assert_eq!(
            RemoteError::Decode("x".into()).severity(),
            ErrorSeverity::Fatal
        );
        assert_eq!(
            EngineError::RoundAlreadyActive(GameKind::Mines).severity(),
            ErrorSeverity::User
        );
    }

    #[test]
    fn out_of_phase_actions_break_the_round() {
        let err = EngineError::IllegalTransition {
            from: RoundPhase::Settled,
            to: RoundPhase::Active,
        };
        let notice = err.to_notice();
        assert_eq!(notice.code, "illegal_transition");
        assert_eq!(notice.severity, ErrorSeverity::Fatal);
    }

    #[test]
    fn notice_serializes_snake_case_severity() {
        let notice = UserNotice::new("stale_reply", "late", ErrorSeverity::Fatal);
        let json = serde_json::to_value(&notice).expect("serialize");
        assert_eq!(json["severity"], "fatal");
        assert_eq!(notice.to_string(), "stale_reply: late");
    }
}
