//! Turn State Machine
//!
//! The local belief about whose turn it is, the outstanding deadline and the
//! running hit counts.
//!
//! The machine never advances on local intent. It moves only when given a
//! confirmed ledger observation: a decoded event, a game record read, or a
//! ledger block height. It is pure and synchronous; the sync controller owns
//! it and handles the I/O.
//!
//! # Idempotency
//!
//! Events carry an [`EventId`]. The machine keeps a high-water mark and
//! treats anything at or below it as a duplicate, so at-least-once delivery
//! applies each event exactly once. A record read at block `b` already
//! reflects every event of blocks up to `b`, so accepting it raises the mark
//! to the end of `b`.

use std::time::Duration;

use crate::game::deadline::{is_expired, remaining_time};
use crate::game::events::{EventId, LedgerEvent, LedgerEventData};
use crate::game::state::{ActorId, GameRecord, TurnPhase, TurnSnapshot};

/// Why an event was ignored. Not an error: the event simply does not move
/// the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StaleEvent {
    /// Already applied (at or below the high-water mark).
    #[error("event {id:?} already applied (last {last:?})")]
    Duplicate {
        /// Offending event.
        id: EventId,
        /// High-water mark.
        last: EventId,
    },

    /// The event does not fit the current phase.
    #[error("event {id:?} does not fit phase {phase:?}")]
    OutOfTurn {
        /// Offending event.
        id: EventId,
        /// Phase at the time.
        phase: TurnPhase,
    },

    /// The event names an actor outside this game.
    #[error("event {id:?} names {actor:?}, not a player in this game")]
    ForeignGame {
        /// Offending event.
        id: EventId,
        /// Actor named by the event.
        actor: ActorId,
    },

    /// The game is already finished.
    #[error("event {id:?} arrived after the game finished")]
    Terminal {
        /// Offending event.
        id: EventId,
    },
}

/// Result of feeding an observation to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Transition {
    /// A new snapshot was built.
    Advanced,
    /// Observation accepted, nothing changed.
    Unchanged,
    /// Event ignored.
    Stale(StaleEvent),
}

impl Transition {
    /// Whether a new snapshot was built.
    pub fn advanced(&self) -> bool {
        matches!(self, Transition::Advanced)
    }
}

/// Client-side turn state machine for one actor.
#[derive(Debug, Clone)]
pub struct TurnMachine {
    me: ActorId,
    block_period: Duration,
    snapshot: TurnSnapshot,
    last_event: Option<EventId>,
}

impl TurnMachine {
    /// Start in `AwaitingOwnCommit`.
    pub fn new(me: ActorId, block_period: Duration) -> Self {
        Self {
            me,
            block_period,
            snapshot: TurnSnapshot::initial(),
            last_event: None,
        }
    }

    /// Local actor.
    pub fn me(&self) -> ActorId {
        self.me
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &TurnSnapshot {
        &self.snapshot
    }

    /// High-water mark: the last applied event, or the end of the block of
    /// the last accepted record read, whichever is later.
    pub fn last_event(&self) -> Option<EventId> {
        self.last_event
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Apply a decoded ledger event.
    pub fn apply_event(&mut self, event: &LedgerEvent) -> Transition {
        let id = event.id;
        let current = &self.snapshot;

        if current.phase.is_finished() {
            return Transition::Stale(StaleEvent::Terminal { id });
        }
        if let Some(last) = self.last_event {
            if id <= last {
                return Transition::Stale(StaleEvent::Duplicate { id, last });
            }
        }

        let actor = event.actor();
        let from_me = actor == self.me;
        if !from_me && Some(actor) != current.opponent {
            return Transition::Stale(StaleEvent::ForeignGame { id, actor });
        }

        let mut next = current.clone();
        match (event.data, current.phase) {
            // The opponent answered the local guess.
            (LedgerEventData::ResponseSubmitted { hit, .. }, TurnPhase::ActiveSelfTurn) if !from_me => {
                next.phase = TurnPhase::ActiveOpponentTurn;
                next.hits_self = current.hits_self.saturating_add(u8::from(hit));
                next.pending_guess = None;
                next.turn_deadline = None;
            }
            // The local actor answered the opponent's guess.
            (LedgerEventData::ResponseSubmitted { hit, .. }, TurnPhase::ActiveOpponentTurn) if from_me => {
                next.phase = TurnPhase::ActiveSelfTurn;
                next.hits_opponent = current.hits_opponent.saturating_add(u8::from(hit));
                next.pending_guess = None;
                next.turn_deadline = None;
            }
            (LedgerEventData::GameWon { winner }, phase) if phase.is_active() => {
                next.phase = TurnPhase::Finished { winner };
                next.pending_guess = None;
                next.turn_deadline = None;
            }
            (_, phase) => return Transition::Stale(StaleEvent::OutOfTurn { id, phase }),
        }

        self.last_event = Some(id);
        self.observe_at(&mut next, id.block);
        self.replace(next)
    }

    // =========================================================================
    // RECORDS
    // =========================================================================

    /// Reconcile against a game record read at `block`.
    ///
    /// A record read at `block` reflects every event emitted up to that
    /// height. Reads below the high-water mark's block are ignored, as are
    /// records that do not involve the local actor and anything after the
    /// game finished.
    pub fn apply_record(&mut self, record: &GameRecord, block: u64) -> Transition {
        let current = &self.snapshot;
        if current.phase.is_finished() {
            return Transition::Unchanged;
        }
        if matches!(self.last_event, Some(last) if block < last.block) {
            return Transition::Unchanged;
        }
        let Some(opponent) = record.opponent_of(&self.me) else {
            return Transition::Unchanged;
        };

        let mut next = current.clone();
        next.opponent = Some(opponent);
        next.hits_self = current.hits_self.max(record.hits_of(&self.me));
        next.hits_opponent = current.hits_opponent.max(record.hits_of(&opponent));
        next.observed_block = current.observed_block.max(block);

        let at = next.observed_block;
        next.pending_guess = record.effective_pending(at);
        next.phase = if let Some(winner) = record.winner {
            TurnPhase::Finished { winner }
        } else if record.root_of(&self.me).is_none() {
            TurnPhase::AwaitingOwnCommit
        } else if !record.both_committed() {
            TurnPhase::AwaitingOpponentCommit
        } else if record.effective_turn(at).unwrap_or(record.player1) == self.me {
            TurnPhase::ActiveSelfTurn
        } else {
            TurnPhase::ActiveOpponentTurn
        };

        next.turn_deadline = if !next.phase.is_active() || record.turn_lapsed(at) {
            None
        } else {
            record.turn_deadline
        };

        let mark = EventId::end_of_block(block);
        self.last_event = Some(self.last_event.map_or(mark, |last| last.max(mark)));

        self.observe_at(&mut next, at);
        self.replace(next)
    }

    // =========================================================================
    // BLOCKS
    // =========================================================================

    /// Observe the ledger height.
    ///
    /// A turn whose deadline has passed with no guess outstanding passes to
    /// the other player. A guess left unanswered past the deadline is void
    /// and the guesser keeps the turn. Expiry is judged from the ledger
    /// height only.
    pub fn observe_block(&mut self, block: u64) -> Transition {
        if block <= self.snapshot.observed_block || self.snapshot.phase.is_finished() {
            return Transition::Unchanged;
        }

        let mut next = self.snapshot.clone();
        self.observe_at(&mut next, block);
        self.replace(next)
    }

    fn observe_at(&self, next: &mut TurnSnapshot, block: u64) {
        next.observed_block = next.observed_block.max(block);

        if next.phase.is_active() && is_expired(next.turn_deadline, next.observed_block) {
            next.phase = match next.pending_guess.take() {
                // The defender forfeits; the guesser moves again.
                Some(guess) if guess.guesser == self.me => TurnPhase::ActiveSelfTurn,
                Some(_) => TurnPhase::ActiveOpponentTurn,
                None if next.phase == TurnPhase::ActiveOpponentTurn => TurnPhase::ActiveSelfTurn,
                None => TurnPhase::ActiveOpponentTurn,
            };
            next.turn_deadline = None;
        }

        next.remaining = if next.phase.is_active() {
            remaining_time(next.turn_deadline, next.observed_block, self.block_period)
        } else {
            None
        };
    }

    fn replace(&mut self, next: TurnSnapshot) -> Transition {
        if next == self.snapshot {
            Transition::Unchanged
        } else {
            self.snapshot = next;
            Transition::Advanced
        }
    }
}
