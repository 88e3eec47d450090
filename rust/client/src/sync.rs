use parlor_engine::games::GameKind;
use parlor_engine::ledger::Transaction;
use parlor_engine::money::Amount;
use parlor_engine::outcome::{Settlement, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

use crate::errors::{ErrorSeverity, IntoUserNotice};
use crate::events::{EventBus, RoundEvent};
use crate::remote::{RemoteActionClient, RemoteError};

/// Balance a fresh account starts from.
pub const DEFAULT_STARTING_BALANCE: Amount = Amount::from_cents(100_000);

/// Single writer of the displayed balance and the transaction log.
///
/// The balance only ever comes from the authority: settlement replies,
/// start replies and `/api/balance`. Nothing here derives it.
#[derive(Debug)]
pub struct BalanceSync {
    balance: RwLock<Option<Amount>>,
    /// Oldest first
    log: RwLock<Vec<Transaction>>,
    bus: EventBus,
    history_limit: usize,
}

impl BalanceSync {
    pub fn new(bus: EventBus, history_limit: usize) -> Self {
        Self {
            balance: RwLock::new(None),
            log: RwLock::new(Vec::new()),
            bus,
            history_limit,
        }
    }

    /// `None` until the first authoritative balance arrives.
    pub fn balance(&self) -> Result<Option<Amount>, SyncError> {
        let guard = self
            .balance
            .read()
            .map_err(|_| SyncError::StoragePoisoned)?;
        Ok(*guard)
    }

    pub fn apply_balance(&self, balance: Amount) -> Result<(), SyncError> {
        let changed = {
            let mut guard = self
                .balance
                .write()
                .map_err(|_| SyncError::StoragePoisoned)?;
            let changed = *guard != Some(balance);
            *guard = Some(balance);
            changed
        };
        if changed {
            tracing::debug!(balance = %balance, "balance updated");
            self.bus.broadcast_all(RoundEvent::BalanceChanged { balance });
        }
        Ok(())
    }

    /// Appends the settled round's transaction and takes its balance.
    pub fn record_settlement(&self, game: GameKind, settlement: &Settlement) -> Result<(), SyncError> {
        let transaction = &settlement.transaction;
        if !transaction.is_consistent() {
            tracing::warn!(
                game = %game,
                round_id = settlement.round,
                bet = %transaction.bet,
                multiplier = transaction.multiplier,
                win = %transaction.win,
                "authority win differs from bet times multiplier"
            );
        }
        {
            let mut log = self.log.write().map_err(|_| SyncError::StoragePoisoned)?;
            log.push(transaction.clone());
            let overflow = log.len().saturating_sub(self.history_limit);
            if overflow > 0 {
                log.drain(..overflow);
            }
        }
        tracing::info!(
            game = %game,
            round_id = settlement.round,
            verdict = ?settlement.verdict,
            win = %transaction.win,
            "transaction recorded"
        );
        self.apply_balance(settlement.balance)
    }

    /// Replaces the local view with the authority's balance and history.
    pub async fn refresh(&self, remote: &RemoteActionClient) -> Result<Amount, SyncError> {
        let balance = remote.balance().await?;
        let mut history = remote.history().await?;
        history.truncate(self.history_limit);
        history.reverse();
        let count = history.len();
        {
            let mut log = self.log.write().map_err(|_| SyncError::StoragePoisoned)?;
            *log = history;
        }
        tracing::info!(balance = %balance, transactions = count, "synced with authority");
        self.apply_balance(balance)?;
        Ok(balance)
    }

    /// Most recent first. `None` uses the configured history limit.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<Transaction>, SyncError> {
        let log = self.log.read().map_err(|_| SyncError::StoragePoisoned)?;
        let limit = limit.unwrap_or(self.history_limit);
        Ok(log.iter().rev().take(limit).cloned().collect())
    }

    pub fn filter(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, SyncError> {
        let log = self.log.read().map_err(|_| SyncError::StoragePoisoned)?;
        Ok(log
            .iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    pub fn stats(&self) -> Result<TransactionStats, SyncError> {
        let log = self.log.read().map_err(|_| SyncError::StoragePoisoned)?;
        if log.is_empty() {
            return Ok(TransactionStats::default());
        }

        let total_rounds = log.len();
        let wins = log.iter().filter(|tx| tx.verdict() == Verdict::Win).count();
        let total_wagered = log.iter().fold(Amount::ZERO, |sum, tx| sum + tx.bet);
        let net_profit = log.iter().fold(Amount::ZERO, |sum, tx| sum + tx.profit());

        Ok(TransactionStats {
            total_rounds,
            wins,
            win_rate: (wins as f64 / total_rounds as f64) * 100.0,
            total_wagered,
            net_profit,
        })
    }

    /// Balance after each logged transaction, oldest first, replayed from
    /// `starting`. Only for charts; the real balance comes from the authority.
    pub fn balance_series(&self, starting: Amount) -> Result<Vec<Amount>, SyncError> {
        let log = self.log.read().map_err(|_| SyncError::StoragePoisoned)?;
        Ok(log
            .iter()
            .scan(starting, |running, tx| {
                *running = *running + tx.profit();
                Some(*running)
            })
            .collect())
    }

    pub fn len(&self) -> Result<usize, SyncError> {
        let log = self.log.read().map_err(|_| SyncError::StoragePoisoned)?;
        Ok(log.len())
    }

    pub fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub game: Option<GameKind>,
    pub outcome: Option<Verdict>,
}

impl TransactionFilter {
    fn matches(&self, tx: &Transaction) -> bool {
        if self.game.is_some_and(|game| game != tx.game) {
            return false;
        }
        self.outcome.map_or(true, |outcome| outcome == tx.verdict())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total_rounds: usize,
    pub wins: usize,
    /// Percentage of rounds that paid more than the stake
    pub win_rate: f64,
    pub total_wagered: Amount,
    pub net_profit: Amount,
}

impl Default for TransactionStats {
    fn default() -> Self {
        Self {
            total_rounds: 0,
            wins: 0,
            win_rate: 0.0,
            total_wagered: Amount::ZERO,
            net_profit: Amount::ZERO,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transaction storage lock poisoned")]
    StoragePoisoned,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl IntoUserNotice for SyncError {
    fn notice_code(&self) -> &'static str {
        match self {
            SyncError::StoragePoisoned => "storage_poisoned",
            SyncError::Remote(err) => err.notice_code(),
        }
    }

    fn notice_message(&self) -> String {
        match self {
            SyncError::StoragePoisoned => "Balance history is unavailable".into(),
            SyncError::Remote(err) => err.notice_message(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::StoragePoisoned => ErrorSeverity::Fatal,
            SyncError::Remote(err) => err.severity(),
        }
    }
}
