//! Game Session
//!
//! One actor's game from board commitment to the end-of-game audit. The
//! session owns the sealed board, the sync controller and the log of its own
//! shots. Everything is torn down by [`Session::close`] or on drop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::game::board::{BoardError, Coordinate, Fleet};
use crate::game::state::{ActorId, Amount, GameRecord, TurnPhase, TurnSnapshot};
use crate::network::ledger::{Ledger, LedgerError, TxHandle};
use crate::network::sync::{SyncConfig, SyncError, SyncHandle};
use crate::proof::commitment::{BoardCommitment, BoardReveal, CommitmentError, CommitmentRoot};
use crate::proof::verify::{verify_reveal, VerificationRejected};
use crate::DEPOSIT;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stake committed with the board.
    pub stake: Amount,
    /// How long [`Session::guess`] waits for the defender's answer.
    pub response_timeout: Duration,
    /// Sync controller settings.
    pub sync: SyncConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stake: DEPOSIT,
            response_timeout: Duration::from_secs(300),
            sync: SyncConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load from environment variables (`FLEET_STAKE_WEI` plus the sync
    /// settings), falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stake: std::env::var("FLEET_STAKE_WEI")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stake),
            response_timeout: defaults.response_timeout,
            sync: SyncConfig::from_env(),
        }
    }
}

/// One of the local actor's guesses and its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    /// Guessed cell on the opponent's board.
    pub coord: Coordinate,
    /// Whether the opponent answered with a hit.
    pub hit: bool,
}

/// A player's game session.
pub struct Session {
    /// Unique session identifier.
    id: SessionId,
    actor: ActorId,
    ledger: Arc<dyn Ledger>,
    config: SessionConfig,
    board: Option<BoardCommitment>,
    opponent: Option<ActorId>,
    sync: Option<SyncHandle>,
    shots: Vec<Shot>,
    closed: bool,
}

impl Session {
    /// Create a session for `actor`. Nothing is submitted yet.
    pub fn new(ledger: Arc<dyn Ledger>, actor: ActorId, config: SessionConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, actor = %actor.short(), "Session created");

        Self {
            id,
            actor,
            ledger,
            config,
            board: None,
            opponent: None,
            sync: None,
            shots: Vec::new(),
            closed: false,
        }
    }

    /// Resume a game after a restart from a board saved with
    /// [`Session::export_board`].
    pub fn resume(
        ledger: Arc<dyn Ledger>,
        actor: ActorId,
        config: SessionConfig,
        saved_board: &[u8],
        opponent: ActorId,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(ledger, actor, config);
        session.board = Some(BoardCommitment::from_bytes(saved_board)?);
        session.opponent = Some(opponent);
        session.start_sync();
        Ok(session)
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Local actor.
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Opponent, once committed.
    pub fn opponent(&self) -> Option<ActorId> {
        self.opponent
    }

    /// Root of the local board, once sealed.
    pub fn root(&self) -> Option<CommitmentRoot> {
        self.board.as_ref().map(BoardCommitment::root)
    }

    /// Local shots so far.
    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> TurnSnapshot {
        self.sync
            .as_ref()
            .map(SyncHandle::snapshot)
            .unwrap_or_default()
    }

    /// Sync handle, once the board is committed.
    pub fn sync(&mut self) -> Option<&mut SyncHandle> {
        self.sync.as_mut()
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn start_sync(&mut self) {
        if self.sync.is_none() {
            let handle = SyncHandle::start(self.ledger.clone(), self.actor, self.config.sync.clone());
            self.sync = Some(handle);
        }
    }

    fn request_refresh(&self) {
        if let Some(sync) = &self.sync {
            if let Err(e) = sync.refresh() {
                debug!("Refresh skipped: {}", e);
            }
        }
    }

    fn sync_mut(&mut self) -> Result<&mut SyncHandle, SessionError> {
        self.sync.as_mut().ok_or(SessionError::NotCommitted)
    }

    // =========================================================================
    // SETUP
    // =========================================================================

    /// Seal `fleet` and commit it with the configured stake against
    /// `opponent`. Starts syncing on success.
    #[instrument(skip(self, fleet), fields(session = %self.id))]
    pub async fn commit_board(&mut self, fleet: Fleet, opponent: ActorId) -> Result<TxHandle, SessionError> {
        self.ensure_open()?;
        if self.board.is_some() {
            return Err(SessionError::AlreadyCommitted);
        }

        let board = BoardCommitment::seal(fleet)?;
        let root = board.root();
        let tx = self
            .ledger
            .submit_commitment(self.actor, root, opponent, self.config.stake)
            .await?;

        info!(%root, opponent = %opponent.short(), block = tx.block, "Board committed");
        self.board = Some(board);
        self.opponent = Some(opponent);
        self.start_sync();
        self.request_refresh();
        Ok(tx)
    }

    /// Wait until both boards are on the ledger.
    pub async fn wait_until_active(&mut self) -> Result<TurnSnapshot, SessionError> {
        self.ensure_open()?;
        let sync = self.sync_mut()?;
        Ok(sync.wait_for(|s| s.phase.is_active() || s.phase.is_finished()).await?)
    }

    // =========================================================================
    // PLAY
    // =========================================================================

    /// Re-read the game record each time the snapshot moves until `check`
    /// yields a value.
    ///
    /// The snapshot is only a wake-up signal; decisions are taken on the
    /// ledger record. `check` also gets a height read before the record, so
    /// a deadline it sees as passed has really passed.
    async fn wait_on_ledger<T>(
        &mut self,
        mut check: impl FnMut(&GameRecord, u64) -> Option<T>,
    ) -> Result<T, SessionError> {
        loop {
            let block = self.ledger.block_number().await?;
            let record = self.ledger.read_game_record(self.actor).await?;
            if let Some(value) = check(&record, block) {
                return Ok(value);
            }
            if let Err(e) = self.sync_mut()?.changed().await {
                // The controller stops once the game is decided.
                let block = self.ledger.block_number().await?;
                let record = self.ledger.read_game_record(self.actor).await?;
                return check(&record, block).ok_or(SessionError::Sync(e));
            }
        }
    }

    /// Guess `coord` and wait for the opponent's answer. Returns whether it hit.
    ///
    /// The local turn view is advisory; the ledger decides whether the guess
    /// is accepted. A guess left unanswered past its deadline is void and
    /// fails with [`SessionError::ResponseTimeout`]; the turn stays with the
    /// local actor.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn guess(&mut self, coord: Coordinate) -> Result<bool, SessionError> {
        self.ensure_open()?;
        let me = self.actor;
        let opponent = self.opponent.ok_or(SessionError::NotCommitted)?;

        let view = self.snapshot();
        if !view.can_guess() {
            debug!(phase = ?view.phase, "Guessing outside the local turn view");
        }

        let before = self.ledger.read_game_record(me).await?.hits_of(&me);
        let tx = match self.ledger.submit_guess(me, coord, opponent).await {
            Ok(tx) => tx,
            Err(e) if e.is_rejection() => {
                debug!("Guess rejected: {}", e);
                return Err(e.into());
            }
            Err(e) => {
                warn!("Guess submission failed: {}", e);
                return Err(e.into());
            }
        };
        debug!(block = tx.block, "Guess submitted");
        self.request_refresh();

        let timeout = self.config.response_timeout;
        let answered = tokio::time::timeout(
            timeout,
            self.wait_on_ledger(|record, block| {
                let mine_pending = matches!(record.pending_guess, Some(g) if g.guesser == me);
                if record.winner.is_some() || !mine_pending {
                    Some(Some(record.hits_of(&me)))
                } else if record.effective_pending(block).is_none() {
                    Some(None)
                } else {
                    None
                }
            }),
        )
        .await
        .map_err(|_| SessionError::ResponseTimeout(coord))??;

        let Some(after) = answered else {
            warn!(%coord, "Guess went unanswered past its deadline");
            return Err(SessionError::ResponseTimeout(coord));
        };

        let hit = after > before;
        self.shots.push(Shot { coord, hit });
        info!(%coord, hit, hits = after, "Shot resolved");
        Ok(hit)
    }

    /// Wait for the opponent's guess, answer it, and return the cell with
    /// whether it hit.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn respond(&mut self) -> Result<(Coordinate, bool), SessionError> {
        self.ensure_open()?;
        let me = self.actor;

        let incoming = self
            .wait_on_ledger(|record, block| {
                if record.winner.is_some() {
                    return Some(None);
                }
                record
                    .effective_pending(block)
                    .filter(|guess| guess.guesser != me)
                    .map(|guess| Some(guess.coord))
            })
            .await?;
        let coord = incoming.ok_or(SessionError::Ledger(LedgerError::GameOver))?;

        let board = self.board.as_ref().ok_or(SessionError::NotCommitted)?;
        let response = board.answer(coord)?;
        let hit = response.is_hit();
        let tx = self.ledger.submit_response(me, response).await?;

        info!(%coord, hit, block = tx.block, "Answered guess");
        self.request_refresh();
        Ok((coord, hit))
    }

    /// Wait for the game to finish and return the winner.
    pub async fn wait_for_winner(&mut self) -> Result<ActorId, SessionError> {
        self.ensure_open()?;
        let sync = self.sync_mut()?;
        let snapshot = sync.wait_for(|s| s.phase.is_finished()).await?;
        match snapshot.phase {
            TurnPhase::Finished { winner } => Ok(winner),
            _ => Err(SessionError::Sync(SyncError::Closed)),
        }
    }

    // =========================================================================
    // AUDIT
    // =========================================================================

    /// Publish the local board for the end-of-game audit.
    pub fn reveal_board(&self) -> Result<BoardReveal, SessionError> {
        self.board
            .as_ref()
            .map(BoardCommitment::reveal)
            .ok_or(SessionError::NotCommitted)
    }

    /// Audit the opponent's revealed board against their committed root and
    /// every miss they answered.
    #[instrument(skip(self, reveal), fields(session = %self.id))]
    pub async fn audit_opponent(&self, reveal: &BoardReveal) -> Result<(), SessionError> {
        let opponent = self.opponent.ok_or(SessionError::NotCommitted)?;
        let record = self.ledger.read_game_record(self.actor).await?;
        let root = record.root_of(&opponent).ok_or(SessionError::NotCommitted)?;

        let misses: Vec<Coordinate> = self
            .shots
            .iter()
            .filter(|shot| !shot.hit)
            .map(|shot| shot.coord)
            .collect();

        match verify_reveal(&root, reveal, &misses) {
            Ok(()) => {
                info!(misses = misses.len(), "Opponent board verified");
                Ok(())
            }
            Err(e) => {
                warn!("Opponent board rejected: {}", e);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Serialize the sealed board so the game can be resumed.
    pub fn export_board(&self) -> Result<Vec<u8>, SessionError> {
        let board = self.board.as_ref().ok_or(SessionError::NotCommitted)?;
        Ok(board.to_bytes()?)
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Stop syncing. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!(session = %self.id, "Session closed");
        }
        if let Some(sync) = self.sync.as_mut() {
            sync.close();
        }
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Fleet failed validation.
    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    /// Commitment could not be built.
    #[error("Commitment error: {0}")]
    Commitment(#[from] CommitmentError),

    /// The ledger rejected a request.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Disclosed data failed verification.
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationRejected),

    /// Sync controller stopped.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// A board is already committed in this session.
    #[error("Board already committed")]
    AlreadyCommitted,

    /// No board committed yet.
    #[error("No board committed")]
    NotCommitted,

    /// The opponent did not answer in time.
    #[error("No answer to guess at {0}")]
    ResponseTimeout(Coordinate),

    /// Session is closed.
    #[error("Session closed")]
    Closed,
}
