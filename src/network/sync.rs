//! Game Sync Controller
//!
//! One tokio task per session owns the [`TurnMachine`]. It waits on:
//! - the ledger event subscription
//! - a periodic reconcile tick
//! - refresh requests from the session
//! - the shutdown signal
//!
//! Every accepted observation replaces the published snapshot as a whole
//! through a `watch` channel, so readers never see a partial update.
//!
//! ```text
//!   Ledger::subscribe ──► decode ──► apply_event ─┐
//!   interval / refresh ──► read_game_record ──────┼──► TurnMachine ──► watch<TurnSnapshot>
//!   block_number ──────────► observe_block ───────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::game::state::{ActorId, TurnPhase, TurnSnapshot};
use crate::game::turn::{TurnMachine, Transition};
use crate::network::ledger::{Ledger, LedgerError};
use crate::network::protocol::RawLedgerEvent;
use crate::BLOCK_PERIOD;

/// Sync controller configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between full reconciles against the ledger.
    pub poll_interval: Duration,
    /// Assumed block period, for the remaining-time display.
    pub block_period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            block_period: BLOCK_PERIOD,
        }
    }
}

impl SyncConfig {
    /// Load from `FLEET_POLL_MS` and `FLEET_BLOCK_SECS`, falling back to
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: std::env::var("FLEET_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            block_period: std::env::var("FLEET_BLOCK_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.block_period),
        }
    }
}

/// Sync errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The controller has shut down.
    #[error("Sync controller closed")]
    Closed,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a running sync controller.
///
/// Closing is idempotent and also happens on drop. After close, the
/// controller applies no further observations.
pub struct SyncHandle {
    actor: ActorId,
    snapshots: watch::Receiver<TurnSnapshot>,
    refresh_tx: mpsc::Sender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Start syncing `actor`'s game against `ledger`.
    pub fn start(ledger: Arc<dyn Ledger>, actor: ActorId, config: SyncConfig) -> Self {
        let machine = TurnMachine::new(actor, config.block_period);
        let (publish, snapshots) = watch::channel(machine.snapshot().clone());
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let closed = Arc::new(AtomicBool::new(false));

        let task = SyncTask {
            events: ledger.subscribe(),
            ledger,
            machine,
            publish,
            refresh_rx,
            shutdown_rx,
            closed: closed.clone(),
            poll_interval: config.poll_interval,
        };
        let span = info_span!("game_sync", actor = %actor.short());
        let task = tokio::spawn(task.run().instrument(span));

        Self {
            actor,
            snapshots,
            refresh_tx,
            shutdown_tx: Some(shutdown_tx),
            closed,
            task: Some(task),
        }
    }

    /// Actor being synced.
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TurnSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Another receiver for the snapshot stream.
    pub fn watch(&self) -> watch::Receiver<TurnSnapshot> {
        self.snapshots.clone()
    }

    /// Ask for an immediate reconcile. Coalesces with a pending request.
    pub fn refresh(&self) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::Closed);
        }
        match self.refresh_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Closed(())) => Err(SyncError::Closed),
        }
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Result<TurnSnapshot, SyncError> {
        self.snapshots.changed().await.map_err(|_| SyncError::Closed)?;
        Ok(self.snapshots.borrow_and_update().clone())
    }

    /// Wait until a snapshot satisfies `predicate`, including the current one.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&TurnSnapshot) -> bool,
    ) -> Result<TurnSnapshot, SyncError> {
        loop {
            {
                let snapshot = self.snapshots.borrow_and_update();
                if predicate(&snapshot) {
                    return Ok(snapshot.clone());
                }
            }
            self.snapshots.changed().await.map_err(|_| SyncError::Closed)?;
        }
    }

    /// Whether [`SyncHandle::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop the controller. Safe to call any number of times.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(());
            debug!(actor = %self.actor.short(), "Sync controller closing");
        }
    }

    /// Close and wait for the controller task to exit.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Sync task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// TASK
// =============================================================================

struct SyncTask {
    ledger: Arc<dyn Ledger>,
    machine: TurnMachine,
    events: broadcast::Receiver<RawLedgerEvent>,
    publish: watch::Sender<TurnSnapshot>,
    refresh_rx: mpsc::Receiver<()>,
    shutdown_rx: oneshot::Receiver<()>,
    closed: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl SyncTask {
    async fn run(mut self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        info!("Sync controller started");

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    debug!("Shutdown signal received");
                    break;
                }
                event = self.events.recv(), if events_open => {
                    match event {
                        Ok(raw) => self.on_event(raw).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event subscription lagged, reconciling");
                            self.reconcile().await;
                        }
                        Err(RecvError::Closed) => {
                            warn!("Ledger event stream closed, polling only");
                            events_open = false;
                        }
                    }
                }
                Some(()) = self.refresh_rx.recv() => {
                    self.reconcile().await;
                }
                _ = ticker.tick() => {
                    self.reconcile().await;
                }
            }

            if let Some(winner) = finished_winner(self.machine.snapshot()) {
                info!(winner = %winner.short(), "Game finished");
                break;
            }
        }

        info!("Sync controller stopped");
    }

    async fn on_event(&mut self, raw: RawLedgerEvent) {
        let event = match raw.decode() {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed ledger event: {}", e);
                return;
            }
        };

        match self.machine.apply_event(&event) {
            Transition::Advanced => {
                debug!(id = ?event.id, phase = ?self.machine.snapshot().phase, "Event applied");
                self.publish();
                // Pick up the new deadline and pending guess.
                self.reconcile().await;
            }
            Transition::Unchanged => {}
            Transition::Stale(reason) => debug!("Ignoring stale event: {}", reason),
        }
    }

    /// Read the game record and ledger height and fold both into the machine.
    ///
    /// The record is read first, so it never reflects events above the
    /// height it is folded in at.
    async fn reconcile(&mut self) {
        if self.is_closed() {
            return;
        }

        let record = match self.ledger.read_game_record(self.machine.me()).await {
            Ok(record) => Some(record),
            Err(LedgerError::NoActiveGame(_)) => None,
            Err(e) => {
                warn!("Failed to read game record: {}", e);
                None
            }
        };

        let block = match self.ledger.block_number().await {
            Ok(block) => block,
            Err(e) => {
                warn!("Failed to read block number: {}", e);
                return;
            }
        };

        let mut advanced = false;
        if let Some(record) = record {
            advanced |= self.machine.apply_record(&record, block).advanced();
        }
        advanced |= self.machine.observe_block(block).advanced();

        if advanced {
            debug!(block, phase = ?self.machine.snapshot().phase, "Reconciled");
            self.publish();
        }
    }

    fn publish(&self) {
        if self.is_closed() {
            return;
        }
        self.publish.send_replace(self.machine.snapshot().clone());
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn finished_winner(snapshot: &TurnSnapshot) -> Option<ActorId> {
    match snapshot.phase {
        TurnPhase::Finished { winner } => Some(winner),
        _ => None,
    }
}
