//! Drives a [`PathRenderer`] from a tokio timer.
//!
//! One task per animation. The task ticks the renderer at a fixed frame
//! interval with the real time elapsed since the previous tick, publishes
//! every frame on the [`EventBus`] and stops when the plan completes or the
//! [`ReplayHandle`] tells it to.

use std::time::Duration;

use parlor_engine::games::GameKind;
use parlor_engine::replay::{Frame, PathRenderer, RenderStatus, ReplayPlan};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::events::{EventBus, RoundEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Cancel,
    CashOut,
}

/// How an animation ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayEnd {
    pub status: RenderStatus,
    /// Multiplier the curve was frozen at, when stopped by a cash-out
    pub cashed_out: Option<f64>,
    /// The plan played through to its last frame.
    pub completed: bool,
}

impl ReplayEnd {
    fn cancelled() -> Self {
        Self {
            status: RenderStatus::Cancelled,
            cashed_out: None,
            completed: false,
        }
    }
}

pub type FrameHook = Box<dyn FnMut(&Frame) + Send>;
pub type CompleteHook = Box<dyn FnOnce() + Send>;

/// Callbacks run on the animation task.
#[derive(Default)]
pub struct ReplayHooks {
    /// Runs before each frame is published
    pub on_frame: Option<FrameHook>,
    /// Runs only when the plan played to its end on its own
    pub on_complete: Option<CompleteHook>,
}

#[derive(Debug, Clone)]
pub struct ReplayScheduler {
    bus: EventBus,
    frame_interval: Duration,
}

impl ReplayScheduler {
    pub fn new(bus: EventBus, frame_interval: Duration) -> Self {
        Self {
            bus,
            frame_interval,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn spawn(&self, game: GameKind, round: u64, plan: ReplayPlan) -> ReplayHandle {
        self.spawn_with_hooks(game, round, plan, ReplayHooks::default())
    }

    pub fn spawn_with_hooks(
        &self,
        game: GameKind,
        round: u64,
        plan: ReplayPlan,
        hooks: ReplayHooks,
    ) -> ReplayHandle {
        let (control, signal) = oneshot::channel();
        let task = tokio::spawn(run(
            self.bus.clone(),
            game,
            round,
            plan,
            self.frame_interval,
            signal,
            hooks,
        ));
        tracing::debug!(game = %game, round_id = round, "replay started");
        ReplayHandle {
            control: Some(control),
            task: Some(task),
        }
    }
}

async fn run(
    bus: EventBus,
    game: GameKind,
    round: u64,
    plan: ReplayPlan,
    frame_interval: Duration,
    mut signal: oneshot::Receiver<Control>,
    mut hooks: ReplayHooks,
) -> ReplayEnd {
    let mut renderer = PathRenderer::new();
    renderer.start(plan);

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    let mut last = ticker.tick().await;

    let mut cashed_out = None;
    let mut completed = false;
    loop {
        tokio::select! {
            control = &mut signal => {
                match control {
                    Ok(Control::CashOut) => cashed_out = renderer.cash_out(),
                    // A dropped handle cancels too.
                    Ok(Control::Cancel) | Err(_) => renderer.cancel(),
                }
                if renderer.is_running() {
                    renderer.cancel();
                }
                break;
            }
            now = ticker.tick() => {
                let dt = now.saturating_duration_since(last);
                last = now;
                if let Some(frame) = renderer.tick(dt) {
                    if let Some(hook) = hooks.on_frame.as_mut() {
                        hook(&frame);
                    }
                    bus.broadcast(game, RoundEvent::Frame { game, round, frame });
                }
                if !renderer.is_running() {
                    completed = true;
                    if let Some(hook) = hooks.on_complete.take() {
                        hook();
                    }
                    break;
                }
            }
        }
    }

    let status = renderer.status();
    tracing::debug!(game = %game, round_id = round, status = ?status, "replay ended");
    bus.broadcast(
        game,
        RoundEvent::ReplayFinished {
            game,
            round,
            status,
        },
    );
    ReplayEnd {
        status,
        cashed_out,
        completed,
    }
}

/// Owner of a running animation. Dropping it cancels the animation.
#[derive(Debug)]
pub struct ReplayHandle {
    control: Option<oneshot::Sender<Control>>,
    task: Option<JoinHandle<ReplayEnd>>,
}

impl ReplayHandle {
    /// Stops frame scheduling. The task exits at its next wake-up.
    pub fn cancel(&mut self) {
        self.signal(Control::Cancel);
    }

    /// Freezes a running curve. `cashed_out` holds the multiplier last
    /// drawn; it is `None` when the animation had already ended or is not
    /// a curve.
    pub async fn cash_out(mut self) -> ReplayEnd {
        self.signal(Control::CashOut);
        self.wait().await
    }

    /// Waits for the animation to end without interrupting it.
    pub async fn join(mut self) -> ReplayEnd {
        self.wait().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn signal(&mut self, control: Control) {
        if let Some(sender) = self.control.take() {
            // The task may already have ended; nothing left to stop.
            let _ = sender.send(control);
        }
    }

    async fn wait(&mut self) -> ReplayEnd {
        let Some(task) = self.task.take() else {
            return ReplayEnd::cancelled();
        };
        match task.await {
            Ok(end) => end,
            Err(err) => {
                tracing::warn!(error = %err, "replay task did not complete");
                ReplayEnd::cancelled()
            }
        }
    }
}

impl Drop for ReplayHandle {
    fn drop(&mut self) {
        self.signal(Control::Cancel);
    }
}
