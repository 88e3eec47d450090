use crate::errors::EngineError;
use crate::games::{GameFamily, GameKind, GRID_CELLS};
use crate::ledger::Transaction;
use crate::money::Amount;
use crate::outcome::{AuthorityReply, Resolution, Settlement};
use crate::round::{ActionKind, Move, RequestId, RoundConfig, RoundPhase, RoundState};

/// What has to be sent to the authority for a pending action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Start(RoundConfig),
    Advance(Move),
    /// Pump reports the multiplier it is cashing out at; grid games do not.
    Cashout { multiplier: Option<f64> },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Start(_) => ActionKind::Start,
            ActionPayload::Advance(_) => ActionKind::Advance,
            ActionPayload::Cashout { .. } => ActionKind::Cashout,
        }
    }
}

/// A remote action the machine has committed to and is waiting on.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub request_id: RequestId,
    pub game: GameKind,
    pub payload: ActionPayload,
}

/// Effects of one authority reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    /// Phases entered, in order
    pub phases: Vec<RoundPhase>,
    /// Cell newly confirmed safe
    pub revealed: Option<u8>,
    /// Multiplier confirmed by this reply
    pub multiplier: Option<f64>,
    /// Authoritative balance carried by the reply
    pub balance: Option<Amount>,
    pub settlement: Option<Settlement>,
}

/// Round lifecycle for a single game table.
///
/// The machine performs no I/O. Every remote action is split in two: a
/// `begin_*` call that validates local preconditions and records the pending
/// request, and [`RoundMachine::apply`] or [`RoundMachine::fail`] once the
/// authority has answered. At most one request is pending at a time, and a
/// reply is only accepted for the request it answers.
#[derive(Debug)]
pub struct RoundMachine {
    game: GameKind,
    state: RoundState,
    pending: Option<PendingAction>,
}

impl RoundMachine {
    pub fn new(game: GameKind) -> Self {
        Self {
            game,
            state: RoundState::idle(0),
            pending: None,
        }
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Places a stake.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ActionPending`] while another request is in flight.
    /// - [`EngineError::RoundAlreadyActive`] outside `Idle`.
    /// - [`EngineError::InsufficientBalance`] when the bet exceeds `balance`.
    ///
    /// None of these touch the current round.
    pub fn begin_start(
        &mut self,
        request_id: RequestId,
        config: RoundConfig,
        balance: Amount,
    ) -> Result<PendingAction, EngineError> {
        if config.game() != self.game {
            return Err(EngineError::InvalidParameter(format!(
                "{} round sent to the {} table",
                config.game(),
                self.game
            )));
        }
        self.ensure_idle_slot()?;
        if self.state.phase != RoundPhase::Idle {
            return Err(EngineError::RoundAlreadyActive(self.game));
        }
        if config.bet() > balance {
            return Err(EngineError::InsufficientBalance {
                bet: config.bet(),
                balance,
            });
        }
        let next = RoundPhase::Awaiting(ActionKind::Start);
        self.guard(next)?;
        Ok(self.issue(request_id, next, ActionPayload::Start(config)))
    }

    /// Moves an active round forward.
    ///
    /// Returns `Ok(None)` without recording anything when the move reveals a
    /// cell that is already open.
    pub fn begin_advance(
        &mut self,
        request_id: RequestId,
        mv: Move,
    ) -> Result<Option<PendingAction>, EngineError> {
        self.ensure_idle_slot()?;
        let next = RoundPhase::Awaiting(ActionKind::Advance);
        self.guard(next)?;
        if !mv.is_allowed_for(self.game) {
            return Err(EngineError::InvalidParameter(format!(
                "{mv:?} is not a {} move",
                self.game
            )));
        }
        if let Move::Reveal(position) = mv {
            if position >= GRID_CELLS {
                return Err(EngineError::InvalidParameter(format!(
                    "cell {position} is off the grid"
                )));
            }
            if self.state.revealed.contains(&position) {
                return Ok(None);
            }
        }
        Ok(Some(self.issue(request_id, next, ActionPayload::Advance(mv))))
    }

    pub fn begin_cashout(&mut self, request_id: RequestId) -> Result<PendingAction, EngineError> {
        self.ensure_idle_slot()?;
        let next = RoundPhase::Awaiting(ActionKind::Cashout);
        self.guard(next)?;
        if !self.game.supports_cashout() {
            return Err(EngineError::InvalidParameter(format!(
                "{} has no cash-out",
                self.game
            )));
        }
        let multiplier =
            (self.game == GameKind::Pump).then_some(self.state.current_multiplier);
        Ok(self.issue(request_id, next, ActionPayload::Cashout { multiplier }))
    }

    /// Applies the authority's answer to the pending request.
    ///
    /// A reply that does not fit the pending action counts as a failed
    /// action: the round falls back to its last confirmed phase and keeps
    /// its state.
    pub fn apply(
        &mut self,
        request_id: &str,
        reply: AuthorityReply,
    ) -> Result<Applied, EngineError> {
        let pending = self.take_pending(request_id)?;
        let mut next = self.state.clone();
        next.pending_request_id = None;

        match fold_reply(self.game, &mut next, &pending.payload, reply) {
            Ok(applied) => {
                self.state = next;
                Ok(applied)
            }
            Err(err) => {
                self.state.phase = self.state.phase.base();
                self.state.pending_request_id = None;
                Err(err)
            }
        }
    }

    /// Records that the pending request failed. The round returns to the
    /// phase it was in before the request so the player can retry.
    pub fn fail(&mut self, request_id: &str) -> Result<RoundPhase, EngineError> {
        self.take_pending(request_id)?;
        let base = self.state.phase.base();
        self.state.phase = base;
        self.state.pending_request_id = None;
        Ok(base)
    }

    /// Raises the live multiplier of a progressive round from a curve
    /// sample. Never lowers it. A sample at or past the authority's cap is
    /// the pop point and is never recorded, so it can't be cashed out.
    pub fn observe_multiplier(&mut self, sample: f64) -> Option<f64> {
        if self.game.family() != GameFamily::Progressive
            || self.state.phase.base() != RoundPhase::Active
            || !sample.is_finite()
        {
            return None;
        }
        if self.state.cap.is_some_and(|cap| sample >= cap) {
            return None;
        }
        if sample > self.state.current_multiplier {
            self.state.current_multiplier = sample;
            Some(sample)
        } else {
            None
        }
    }

    /// Returns a settled round to `Idle`.
    pub fn finish(&mut self) -> Result<(), EngineError> {
        if self.state.phase != RoundPhase::Settled {
            return Err(EngineError::IllegalTransition {
                from: self.state.phase,
                to: RoundPhase::Idle,
            });
        }
        self.state = RoundState::idle(self.state.round);
        Ok(())
    }

    /// Drops the current round locally, whatever its phase. A reply still in
    /// flight will be rejected as stale. Returns whether anything was dropped.
    pub fn abandon(&mut self) -> bool {
        if self.state.phase == RoundPhase::Idle && self.pending.is_none() {
            return false;
        }
        self.pending = None;
        self.state = RoundState::idle(self.state.round);
        true
    }

    fn ensure_idle_slot(&self) -> Result<(), EngineError> {
        match &self.state.pending_request_id {
            Some(id) => Err(EngineError::ActionPending(id.clone())),
            None => Ok(()),
        }
    }

    fn guard(&self, next: RoundPhase) -> Result<(), EngineError> {
        if self.state.phase.can_transition_to(next) {
            Ok(())
        } else {
            Err(EngineError::IllegalTransition {
                from: self.state.phase,
                to: next,
            })
        }
    }

    fn issue(
        &mut self,
        request_id: RequestId,
        next: RoundPhase,
        payload: ActionPayload,
    ) -> PendingAction {
        let pending = PendingAction {
            request_id: request_id.clone(),
            game: self.game,
            payload,
        };
        self.state.phase = next;
        self.state.pending_request_id = Some(request_id);
        self.pending = Some(pending.clone());
        pending
    }

    fn take_pending(&mut self, request_id: &str) -> Result<PendingAction, EngineError> {
        match &self.pending {
            Some(pending) if pending.request_id == request_id => {}
            _ => return Err(EngineError::StaleReply(request_id.to_string())),
        }
        self.pending
            .take()
            .ok_or_else(|| EngineError::StaleReply(request_id.to_string()))
    }
}

fn fold_reply(
    game: GameKind,
    state: &mut RoundState,
    payload: &ActionPayload,
    reply: AuthorityReply,
) -> Result<Applied, EngineError> {
    let mut applied = Applied {
        balance: reply.balance(),
        ..Applied::default()
    };

    match (payload, reply) {
        (ActionPayload::Start(config), AuthorityReply::Started { cap, table, .. })
            if game.is_multi_step() =>
        {
            step(state, RoundPhase::Active, &mut applied)?;
            open_round(state, config.clone());
            state.cap = cap;
            state.table = table;
        }
        (ActionPayload::Start(config), AuthorityReply::Resolved(resolution))
            if !game.is_multi_step() =>
        {
            step(state, RoundPhase::Active, &mut applied)?;
            open_round(state, config.clone());
            settle(state, resolution, &mut applied)?;
        }
        (ActionPayload::Advance(Move::Reveal(position)), AuthorityReply::Revealed { multiplier }) => {
            step(state, RoundPhase::Active, &mut applied)?;
            state.revealed.insert(*position);
            state.current_multiplier = multiplier;
            applied.revealed = Some(*position);
            applied.multiplier = Some(multiplier);
        }
        (ActionPayload::Advance(Move::Hit), AuthorityReply::Dealt { table }) => {
            step(state, RoundPhase::Active, &mut applied)?;
            state.table = Some(table);
        }
        (ActionPayload::Advance(_), AuthorityReply::Resolved(resolution))
        | (ActionPayload::Cashout { .. }, AuthorityReply::Resolved(resolution)) => {
            step(state, RoundPhase::Active, &mut applied)?;
            settle(state, resolution, &mut applied)?;
        }
        (payload, reply) => {
            return Err(EngineError::UnexpectedReply(format!(
                "{} reply to a {} {} action",
                reply.label(),
                game,
                payload.kind()
            )));
        }
    }

    Ok(applied)
}

fn step(
    state: &mut RoundState,
    next: RoundPhase,
    applied: &mut Applied,
) -> Result<(), EngineError> {
    if !state.phase.can_transition_to(next) {
        return Err(EngineError::IllegalTransition {
            from: state.phase,
            to: next,
        });
    }
    state.phase = next;
    applied.phases.push(next);
    Ok(())
}

fn open_round(state: &mut RoundState, config: RoundConfig) {
    let round = state.round + 1;
    *state = RoundState {
        phase: state.phase,
        config: Some(config),
        ..RoundState::idle(round)
    };
}

fn settle(
    state: &mut RoundState,
    resolution: Resolution,
    applied: &mut Applied,
) -> Result<(), EngineError> {
    let config = state
        .config
        .clone()
        .ok_or_else(|| EngineError::UnexpectedReply("settlement without a round".into()))?;
    step(state, RoundPhase::Resolving, applied)?;
    step(state, RoundPhase::Settled, applied)?;

    let Resolution {
        verdict,
        multiplier,
        win,
        balance,
        path,
        hazards,
        detail,
    } = resolution;

    state.current_multiplier = multiplier;
    if !hazards.is_empty() {
        state.hazards = hazards.clone();
    }
    if let Some(table) = &detail.table {
        state.table = Some(table.clone());
    }

    let settlement = Settlement {
        round: state.round,
        verdict,
        transaction: Transaction::new(config.game(), config.bet(), multiplier, win),
        balance,
        path,
        hazards,
        detail,
    };
    state.settlement = Some(settlement.clone());
    applied.multiplier = Some(multiplier);
    applied.settlement = Some(settlement);
    Ok(())
}
