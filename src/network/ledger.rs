//! Ledger Interface
//!
//! The settlement layer the game runs against. Each actor has at most one
//! active game. The ledger enforces turn order, stakes and hit proofs; the
//! client treats every call as a request the ledger may refuse.

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;

use crate::core::hash::{Digest, short_hex};
use crate::game::board::Coordinate;
use crate::game::state::{ActorId, Amount, GameRecord};
use crate::network::protocol::RawLedgerEvent;
use crate::proof::commitment::{CommitmentRoot, ShotResponse};
use crate::proof::verify::VerificationRejected;

/// Receipt for an accepted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    /// Transaction hash.
    pub hash: Digest,
    /// Block the transaction was included in.
    pub block: u64,
}

impl std::fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxHandle({}@{})", short_hex(&self.hash), self.block)
    }
}

/// Ledger operations used by a game session.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Commit a board root and stake into a game against `opponent`.
    ///
    /// The first caller creates the game; the opponent joins by committing
    /// with the creator as its opponent.
    async fn submit_commitment(
        &self,
        caller: ActorId,
        root: CommitmentRoot,
        opponent: ActorId,
        stake: Amount,
    ) -> Result<TxHandle, LedgerError>;

    /// Guess a cell on the opponent's board.
    async fn submit_guess(
        &self,
        caller: ActorId,
        coord: Coordinate,
        opponent: ActorId,
    ) -> Result<TxHandle, LedgerError>;

    /// Answer the guess pending against the caller's board.
    async fn submit_response(
        &self,
        caller: ActorId,
        response: ShotResponse,
    ) -> Result<TxHandle, LedgerError>;

    /// Read the caller's active game.
    async fn read_game_record(&self, actor: ActorId) -> Result<GameRecord, LedgerError>;

    /// Current ledger height.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Subscribe to raw event payloads. Delivery is at-least-once.
    fn subscribe(&self) -> broadcast::Receiver<RawLedgerEvent>;
}

/// Ledger rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Stake does not match the required deposit.
    #[error("Stake mismatch: expected {expected}, got {got}")]
    StakeMismatch {
        /// Required deposit.
        expected: Amount,
        /// Offered stake.
        got: Amount,
    },

    /// Caller already has an active game.
    #[error("{0:?} already has an active game")]
    AlreadyInGame(ActorId),

    /// Caller has no active game.
    #[error("{0:?} has no active game")]
    NoActiveGame(ActorId),

    /// Opponent does not match the game record.
    #[error("Opponent mismatch: game is against {expected:?}")]
    OpponentMismatch {
        /// Opponent on record.
        expected: ActorId,
    },

    /// Boards are not both committed yet.
    #[error("Game has not started")]
    NotStarted,

    /// Another player holds the turn.
    #[error("Not your turn")]
    NotYourTurn,

    /// A guess is already waiting for an answer.
    #[error("A guess is already pending")]
    GuessPending,

    /// No guess is waiting for the caller's answer.
    #[error("No guess pending against {0:?}")]
    NoPendingGuess(ActorId),

    /// Cell was guessed before.
    #[error("Cell {0} already guessed")]
    AlreadyGuessed(Coordinate),

    /// Cell is off the board.
    #[error("Cell {0} is off the board")]
    OutOfBounds(Coordinate),

    /// Hit disclosure failed verification.
    #[error("Response rejected: {0}")]
    InvalidResponse(#[from] VerificationRejected),

    /// Game already decided.
    #[error("Game is over")]
    GameOver,

    /// Transport or node failure.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),
}

impl LedgerError {
    /// Rejections caused by the caller's request rather than the ledger.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::SubmissionFailed(_))
    }
}
