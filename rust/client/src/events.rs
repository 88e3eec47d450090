use parlor_engine::games::GameKind;
use parlor_engine::money::Amount;
use parlor_engine::outcome::Settlement;
use parlor_engine::replay::{Frame, RenderStatus};
use parlor_engine::round::RoundPhase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

use crate::errors::UserNotice;

// Bounded so a stalled subscriber cannot grow memory; it is pruned instead.
const EVENT_CHANNEL_BUFFER: usize = 1000;

pub type EventSender = mpsc::Sender<RoundEvent>;
pub type EventReceiver = mpsc::Receiver<RoundEvent>;

/// Everything a display needs to follow a game table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    PhaseChanged {
        game: GameKind,
        round: u64,
        phase: RoundPhase,
    },
    Revealed {
        game: GameKind,
        round: u64,
        position: u8,
        multiplier: f64,
    },
    MultiplierUpdated {
        game: GameKind,
        round: u64,
        multiplier: f64,
    },
    Frame {
        game: GameKind,
        round: u64,
        frame: Frame,
    },
    ReplayFinished {
        game: GameKind,
        round: u64,
        status: RenderStatus,
    },
    Settled {
        game: GameKind,
        settlement: Settlement,
    },
    BalanceChanged {
        balance: Amount,
    },
    Error {
        game: Option<GameKind>,
        notice: UserNotice,
    },
}

pub struct EventSubscription {
    bus: EventBus,
    game: GameKind,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }

    pub fn game(&self) -> GameKind {
        self.game
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.game, self.subscriber_id);
    }
}

/// Fan-out of round events, keyed by game table.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<HashMap<GameKind, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, game: GameKind) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(game);
        EventSubscription {
            bus: self.clone(),
            game,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, game: GameKind) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(game)
            .or_default()
            .push((id, tx));

        tracing::debug!(game = %game, subscriber_id = id, "subscribed to round events");
        (id, rx)
    }

    pub fn broadcast(&self, game: GameKind, event: RoundEvent) {
        if !matches!(event, RoundEvent::Frame { .. }) {
            tracing::debug!(game = %game, event = ?event, "broadcasting round event");
        }

        let subscribers = {
            let guard = self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            guard.get(&game).cloned()
        };

        let Some(list) = subscribers else {
            tracing::trace!(game = %game, "no subscribers for game");
            return;
        };

        let mut failed = Vec::new();
        for (id, sender) in list {
            // try_send never blocks the round; a full channel drops the subscriber.
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    game = %game,
                    subscriber_id = id,
                    error = ?e,
                    "failed to deliver round event"
                );
                failed.push(id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(game, &failed);
        }
    }

    /// Delivers `event` to every table, e.g. a balance change.
    pub fn broadcast_all(&self, event: RoundEvent) {
        for game in GameKind::all() {
            self.broadcast(game, event.clone());
        }
    }

    pub fn unsubscribe(&self, game: GameKind, subscriber_id: usize) {
        self.remove_subscribers(game, &[subscriber_id]);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|list| list.len())
            .sum()
    }

    fn remove_subscribers(&self, game: GameKind, ids: &[usize]) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = guard.get_mut(&game) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(&game);
            }
        }
    }
}
