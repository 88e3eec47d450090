use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use parlor_engine::errors::EngineError;
use parlor_engine::games::GameKind;
use parlor_engine::machine::{Applied, PendingAction, RoundMachine};
use parlor_engine::money::Amount;
use parlor_engine::replay::{Frame, ReplayPlan};
use parlor_engine::round::{Move, RoundConfig, RoundPhase, RoundState};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::errors::{ErrorSeverity, IntoUserNotice};
use crate::events::{EventBus, RoundEvent};
use crate::protocol;
use crate::remote::{RemoteActionClient, RemoteError};
use crate::scheduler::{CompleteHook, FrameHook, ReplayHandle, ReplayHooks, ReplayScheduler};
use crate::sync::{BalanceSync, SyncError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("session storage lock poisoned")]
    StoragePoisoned,
}

impl IntoUserNotice for SessionError {
    fn notice_code(&self) -> &'static str {
        match self {
            SessionError::Engine(err) => err.notice_code(),
            SessionError::Remote(err) => err.notice_code(),
            SessionError::Sync(err) => err.notice_code(),
            SessionError::StoragePoisoned => "storage_poisoned",
        }
    }

    fn notice_message(&self) -> String {
        match self {
            SessionError::Engine(err) => err.notice_message(),
            SessionError::Remote(err) => err.notice_message(),
            SessionError::Sync(err) => err.notice_message(),
            SessionError::StoragePoisoned => "The game table is unavailable".into(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            SessionError::Engine(err) => err.severity(),
            SessionError::Remote(err) => err.severity(),
            SessionError::Sync(err) => err.severity(),
            SessionError::StoragePoisoned => ErrorSeverity::Fatal,
        }
    }
}

fn new_request_id() -> (String, u64) {
    let id = Uuid::new_v4();
    (id.to_string(), id.as_u128() as u64)
}

/// One game table: its round machine plus the tasks animating it.
#[derive(Debug)]
struct GameSession {
    game: GameKind,
    machine: Mutex<RoundMachine>,
    replay: Mutex<Option<ReplayHandle>>,
    hold: Mutex<Option<JoinHandle<()>>>,
}

impl GameSession {
    fn new(game: GameKind) -> Self {
        Self {
            game,
            machine: Mutex::new(RoundMachine::new(game)),
            replay: Mutex::new(None),
            hold: Mutex::new(None),
        }
    }

    fn machine(&self) -> Result<MutexGuard<'_, RoundMachine>, SessionError> {
        self.machine
            .lock()
            .map_err(|_| SessionError::StoragePoisoned)
    }

    fn snapshot(&self) -> Result<RoundState, SessionError> {
        Ok(self.machine()?.state().clone())
    }

    /// Replaces the running animation. The old one is cancelled on drop.
    fn set_replay(&self, handle: Option<ReplayHandle>) -> Result<(), SessionError> {
        let mut guard = self
            .replay
            .lock()
            .map_err(|_| SessionError::StoragePoisoned)?;
        *guard = handle;
        Ok(())
    }

    fn take_replay(&self) -> Result<Option<ReplayHandle>, SessionError> {
        let mut guard = self
            .replay
            .lock()
            .map_err(|_| SessionError::StoragePoisoned)?;
        Ok(guard.take())
    }

    fn set_hold(&self, task: Option<JoinHandle<()>>) -> Result<(), SessionError> {
        let mut guard = self
            .hold
            .lock()
            .map_err(|_| SessionError::StoragePoisoned)?;
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = task;
        Ok(())
    }
}

#[derive(Debug)]
struct RegistryInner {
    sessions: RwLock<HashMap<GameKind, Arc<GameSession>>>,
    bus: EventBus,
    sync: Arc<BalanceSync>,
    remote: RemoteActionClient,
    scheduler: ReplayScheduler,
    settle_hold: Duration,
    limbo_hold: Duration,
}

/// Owns one round machine per game kind and drives it against the
/// authority.
///
/// Every operation locks a machine only long enough to begin or apply an
/// action; no lock is held while a request is in flight. The registry is
/// cheap to clone and every clone shares the same tables.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(remote: RemoteActionClient, config: &ClientConfig) -> Self {
        let bus = EventBus::new();
        let sync = Arc::new(BalanceSync::new(bus.clone(), config.history_limit));
        Self::with_parts(remote, bus, sync, config)
    }

    pub fn with_parts(
        remote: RemoteActionClient,
        bus: EventBus,
        sync: Arc<BalanceSync>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                scheduler: ReplayScheduler::new(bus.clone(), config.frame_interval()),
                bus,
                sync,
                remote,
                settle_hold: config.settle_hold(),
                limbo_hold: config.limbo_hold(),
            }),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn sync(&self) -> &Arc<BalanceSync> {
        &self.inner.sync
    }

    pub fn remote(&self) -> &RemoteActionClient {
        &self.inner.remote
    }

    /// Places a stake and opens a round.
    ///
    /// Fetches the balance first when none is known yet. Single-shot games
    /// settle within this call.
    pub async fn start(&self, config: RoundConfig) -> Result<RoundState, SessionError> {
        let game = config.game();
        let result = self.start_round(config).await;
        self.surface(game, result)
    }

    /// Reveals a cell, hits, stands or pops. Re-revealing an open cell
    /// returns the current state without contacting the authority.
    pub async fn advance(&self, game: GameKind, mv: Move) -> Result<RoundState, SessionError> {
        let result = self.advance_round(game, mv).await;
        self.surface(game, result)
    }

    /// Takes the winnings of an active reveal-grid or pump round.
    pub async fn cashout(&self, game: GameKind) -> Result<RoundState, SessionError> {
        let result = self.cashout_round(game).await;
        self.surface(game, result)
    }

    /// Drops the game's round locally and stops its animation. A reply
    /// still in flight is discarded when it lands.
    pub fn abandon(&self, game: GameKind) -> Result<bool, SessionError> {
        let Some(session) = self.existing(game)? else {
            return Ok(false);
        };
        session.set_replay(None)?;
        session.set_hold(None)?;
        let (dropped, round) = {
            let mut machine = session.machine()?;
            let dropped = machine.abandon();
            (dropped, machine.state().round)
        };
        if dropped {
            tracing::info!(game = %game, round_id = round, "round abandoned");
            self.publish_phase(game, round, RoundPhase::Idle);
        }
        Ok(dropped)
    }

    /// Returns a settled round to `Idle` ahead of the display hold.
    pub fn finish(&self, game: GameKind) -> Result<RoundState, SessionError> {
        let session = self.session(game)?;
        let state = {
            let mut machine = session.machine()?;
            machine.finish()?;
            machine.state().clone()
        };
        session.set_hold(None)?;
        self.publish_phase(game, state.round, RoundPhase::Idle);
        Ok(state)
    }

    pub fn state(&self, game: GameKind) -> Result<RoundState, SessionError> {
        self.session(game)?.snapshot()
    }

    /// Games whose round is anywhere but `Idle`.
    pub fn active_games(&self) -> Result<Vec<GameKind>, SessionError> {
        let sessions: Vec<Arc<GameSession>> = {
            let guard = self
                .inner
                .sessions
                .read()
                .map_err(|_| SessionError::StoragePoisoned)?;
            guard.values().cloned().collect()
        };
        let mut games = Vec::new();
        for session in sessions {
            if session.machine()?.phase() != RoundPhase::Idle {
                games.push(session.game);
            }
        }
        games.sort();
        Ok(games)
    }

    async fn start_round(&self, config: RoundConfig) -> Result<RoundState, SessionError> {
        let game = config.game();
        let session = self.session(game)?;
        let balance = self.known_balance().await?;

        let (request_id, seed) = new_request_id();
        let (pending, round) = {
            let mut machine = session.machine()?;
            let pending = machine.begin_start(request_id, config, balance)?;
            (pending, machine.state().round)
        };
        self.publish_phase(game, round, RoundPhase::Awaiting(pending.payload.kind()));

        if let Some(plan) = ReplayPlan::scramble(game, seed) {
            session.set_replay(Some(self.inner.scheduler.spawn(game, round, plan)))?;
        }
        self.dispatch(&session, pending).await
    }

    async fn advance_round(&self, game: GameKind, mv: Move) -> Result<RoundState, SessionError> {
        let session = self.session(game)?;
        let (request_id, _) = new_request_id();
        let (pending, round) = {
            let mut machine = session.machine()?;
            let pending = machine.begin_advance(request_id, mv)?;
            (pending, machine.state().round)
        };
        let Some(pending) = pending else {
            tracing::debug!(game = %game, round_id = round, "cell already revealed");
            return session.snapshot();
        };
        self.publish_phase(game, round, RoundPhase::Awaiting(pending.payload.kind()));
        self.dispatch(&session, pending).await
    }

    async fn cashout_round(&self, game: GameKind) -> Result<RoundState, SessionError> {
        let session = self.session(game)?;

        let snapshot = session.snapshot()?;
        if game == GameKind::Pump && snapshot.phase == RoundPhase::Active {
            // Freeze the balloon first so the request carries what was shown.
            if let Some(handle) = session.take_replay()? {
                let end = handle.cash_out().await;
                if end.completed {
                    // The curve already reached the cap: the balloon popped.
                    tracing::debug!(game = %game, round_id = snapshot.round, "cashout after pop");
                    return self.pop(game, snapshot.round).await;
                }
                if let Some(shown) = end.cashed_out {
                    session.machine()?.observe_multiplier(shown);
                }
            }
        }

        let (request_id, _) = new_request_id();
        let (pending, round) = {
            let mut machine = session.machine()?;
            let pending = machine.begin_cashout(request_id)?;
            (pending, machine.state().round)
        };
        self.publish_phase(game, round, RoundPhase::Awaiting(pending.payload.kind()));
        self.dispatch(&session, pending).await
    }

    /// Sends the pop for a pump round whose balloon reached the cap.
    async fn pop(&self, game: GameKind, round: u64) -> Result<RoundState, SessionError> {
        let session = self.session(game)?;
        let (request_id, _) = new_request_id();
        let pending = {
            let mut machine = session.machine()?;
            let current = machine.state().round == round
                && machine.phase() == RoundPhase::Active
                && machine.pending().is_none();
            if current {
                machine.begin_advance(request_id, Move::Pop)?
            } else {
                None
            }
        };
        let Some(pending) = pending else {
            return session.snapshot();
        };
        tracing::info!(game = %game, round_id = round, "balloon popped");
        self.publish_phase(game, round, RoundPhase::Awaiting(pending.payload.kind()));
        self.dispatch(&session, pending).await
    }

    async fn dispatch(
        &self,
        session: &Arc<GameSession>,
        pending: PendingAction,
    ) -> Result<RoundState, SessionError> {
        let game = session.game;
        let action = pending.payload.kind();
        tracing::info!(
            game = %game,
            request_id = %pending.request_id,
            action = %action,
            "sending action"
        );

        let reply = match self.inner.remote.send(game, &pending.payload).await {
            Ok(response) => protocol::interpret(game, &pending.payload, response),
            Err(err) => Err(err),
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(
                    game = %game,
                    request_id = %pending.request_id,
                    action = %action,
                    error = %err,
                    "action failed"
                );
                let failed = {
                    let mut machine = session.machine()?;
                    machine
                        .fail(&pending.request_id)
                        .map(|phase| (phase, machine.state().round))
                };
                match failed {
                    Ok((phase, round)) => {
                        if phase == RoundPhase::Idle {
                            session.set_replay(None)?;
                        }
                        self.publish_phase(game, round, phase);
                    }
                    Err(EngineError::StaleReply(_)) => {
                        tracing::debug!(game = %game, "failure for an abandoned round dropped");
                    }
                    Err(other) => return Err(other.into()),
                }
                return Err(err.into());
            }
        };

        let outcome = {
            let mut machine = session.machine()?;
            machine
                .apply(&pending.request_id, reply)
                .map(|applied| (applied, machine.state().clone()))
        };
        match outcome {
            Ok((applied, state)) => {
                self.after_apply(session, &state, applied)?;
                Ok(state)
            }
            Err(err @ EngineError::StaleReply(_)) => {
                tracing::debug!(
                    game = %game,
                    request_id = %pending.request_id,
                    "reply for an abandoned round dropped"
                );
                // A late reply may predate a newer round's balance.
                match self.inner.remote.balance().await {
                    Ok(balance) => self.inner.sync.apply_balance(balance)?,
                    Err(fetch) => tracing::warn!(
                        game = %game,
                        error = %fetch,
                        "balance refresh after a dropped reply failed"
                    ),
                }
                Err(err.into())
            }
            Err(err) => {
                let state = session.snapshot()?;
                if state.phase == RoundPhase::Idle {
                    session.set_replay(None)?;
                }
                self.publish_phase(game, state.round, state.phase);
                Err(err.into())
            }
        }
    }

    fn after_apply(
        &self,
        session: &Arc<GameSession>,
        state: &RoundState,
        applied: Applied,
    ) -> Result<(), SessionError> {
        let game = session.game;
        let round = state.round;
        for phase in &applied.phases {
            self.publish_phase(game, round, *phase);
        }
        if let Some(position) = applied.revealed {
            self.inner.bus.broadcast(
                game,
                RoundEvent::Revealed {
                    game,
                    round,
                    position,
                    multiplier: state.current_multiplier,
                },
            );
        }

        let Some(settlement) = applied.settlement else {
            if let Some(balance) = applied.balance {
                self.inner.sync.apply_balance(balance)?;
            }
            if state.phase == RoundPhase::Active {
                self.animate_active(session, state)?;
            }
            return Ok(());
        };

        tracing::info!(
            game = %game,
            round_id = round,
            verdict = ?settlement.verdict,
            multiplier = settlement.transaction.multiplier,
            win = %settlement.transaction.win,
            "round settled"
        );
        self.inner.sync.record_settlement(game, &settlement)?;
        let replay = ReplayPlan::for_settlement(game, &settlement)
            .map(|plan| self.inner.scheduler.spawn(game, round, plan));
        session.set_replay(replay)?;
        self.inner
            .bus
            .broadcast(game, RoundEvent::Settled { game, settlement });
        self.schedule_hold(session, round)
    }

    /// Animations that run while a multi-step round is live.
    fn animate_active(
        &self,
        session: &Arc<GameSession>,
        state: &RoundState,
    ) -> Result<(), SessionError> {
        match session.game {
            GameKind::Pump => match state.cap {
                Some(cap) => self.start_pump_curve(session, state.round, cap),
                None => Ok(()),
            },
            GameKind::Blackjack => {
                let handle = self.inner.scheduler.spawn(
                    GameKind::Blackjack,
                    state.round,
                    ReplayPlan::card_flip(),
                );
                session.set_replay(Some(handle))
            }
            _ => Ok(()),
        }
    }

    fn start_pump_curve(
        &self,
        session: &Arc<GameSession>,
        round: u64,
        cap: f64,
    ) -> Result<(), SessionError> {
        let game = session.game;
        let (_, seed) = new_request_id();

        let observer = Arc::clone(session);
        let bus = self.inner.bus.clone();
        let on_frame: FrameHook = Box::new(move |frame: &Frame| {
            let Frame::Curve { multiplier, .. } = *frame else {
                return;
            };
            let raised = match observer.machine.lock() {
                Ok(mut machine) if machine.state().round == round => {
                    machine.observe_multiplier(multiplier)
                }
                _ => None,
            };
            if let Some(multiplier) = raised {
                bus.broadcast(
                    game,
                    RoundEvent::MultiplierUpdated {
                        game,
                        round,
                        multiplier,
                    },
                );
            }
        });

        let registry = self.clone();
        let on_complete: CompleteHook = Box::new(move || {
            tokio::spawn(async move {
                // Errors were already published by `surface`.
                let _ = registry.pop_surfaced(game, round).await;
            });
        });

        tracing::debug!(game = %game, round_id = round, cap, "pump curve started");
        let handle = self.inner.scheduler.spawn_with_hooks(
            game,
            round,
            ReplayPlan::pump(cap, seed),
            ReplayHooks {
                on_frame: Some(on_frame),
                on_complete: Some(on_complete),
            },
        );
        session.set_replay(Some(handle))
    }

    async fn pop_surfaced(&self, game: GameKind, round: u64) -> Result<RoundState, SessionError> {
        let result = self.pop(game, round).await;
        self.surface(game, result)
    }

    /// Keeps a settled round on screen, then returns it to `Idle` unless
    /// something else already moved it on.
    fn schedule_hold(&self, session: &Arc<GameSession>, round: u64) -> Result<(), SessionError> {
        let game = session.game;
        let hold = if game == GameKind::Limbo {
            self.inner.limbo_hold
        } else {
            self.inner.settle_hold
        };
        let registry = self.clone();
        let target = Arc::clone(session);
        let task = tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            registry.finish_if_settled(&target, round);
        });
        session.set_hold(Some(task))
    }

    fn finish_if_settled(&self, session: &GameSession, round: u64) {
        let finished = match session.machine() {
            Ok(mut machine)
                if machine.state().round == round && machine.phase() == RoundPhase::Settled =>
            {
                machine.finish().is_ok()
            }
            _ => false,
        };
        if finished {
            tracing::debug!(game = %session.game, round_id = round, "display hold elapsed");
            self.publish_phase(session.game, round, RoundPhase::Idle);
        }
    }

    async fn known_balance(&self) -> Result<Amount, SessionError> {
        if let Some(balance) = self.inner.sync.balance()? {
            return Ok(balance);
        }
        let balance = self.inner.remote.balance().await?;
        self.inner.sync.apply_balance(balance)?;
        Ok(balance)
    }

    fn publish_phase(&self, game: GameKind, round: u64, phase: RoundPhase) {
        tracing::debug!(game = %game, round_id = round, phase = %phase, "phase changed");
        self.inner
            .bus
            .broadcast(game, RoundEvent::PhaseChanged { game, round, phase });
    }

    /// Reports a failed operation as a notice on the game's channel.
    fn surface<T>(
        &self,
        game: GameKind,
        result: Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        if let Err(err) = &result {
            if !matches!(err, SessionError::Engine(EngineError::StaleReply(_))) {
                let notice = err.report();
                self.inner.bus.broadcast(
                    game,
                    RoundEvent::Error {
                        game: Some(game),
                        notice,
                    },
                );
            }
        }
        result
    }

    fn existing(&self, game: GameKind) -> Result<Option<Arc<GameSession>>, SessionError> {
        let guard = self
            .inner
            .sessions
            .read()
            .map_err(|_| SessionError::StoragePoisoned)?;
        Ok(guard.get(&game).cloned())
    }

    fn session(&self, game: GameKind) -> Result<Arc<GameSession>, SessionError> {
        if let Some(session) = self.existing(game)? {
            return Ok(session);
        }
        let mut guard = self
            .inner
            .sessions
            .write()
            .map_err(|_| SessionError::StoragePoisoned)?;
        let session = guard
            .entry(game)
            .or_insert_with(|| Arc::new(GameSession::new(game)));
        Ok(Arc::clone(session))
    }
}
