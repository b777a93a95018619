//! In-Memory Ledger
//!
//! A single-process ledger that enforces the game contract rules. Every
//! accepted transaction mines exactly one block. Empty blocks can be mined
//! with [`InMemoryLedger::advance_blocks`] to let deadlines pass.
//!
//! Rules:
//! - committing requires the exact deposit and no undecided game
//! - the opponent joins by committing with the creator as its opponent
//! - the creator guesses first
//! - a guess must be answered before the next guess
//! - a hit must carry a disclosure that verifies against the defender's root
//! - a turn left idle past its deadline passes to the other player
//! - a guess left unanswered past its deadline is void and the guesser
//!   moves again
//! - the first player to score every fleet cell wins

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::core::hash::DigestHasher;
use crate::game::board::Coordinate;
use crate::game::events::{EventId, LedgerEvent};
use crate::game::state::{ActorId, Amount, GameRecord, PendingGuess};
use crate::network::ledger::{Ledger, LedgerError, TxHandle};
use crate::network::protocol::RawLedgerEvent;
use crate::proof::commitment::{CommitmentRoot, ShotResponse};
use crate::proof::verify::verify_response;
use crate::{DEPOSIT, FLEET_CELLS, TURN_TIMEOUT_BLOCKS};

/// Contract parameters.
#[derive(Debug, Clone)]
pub struct LedgerRules {
    /// Stake each player must commit.
    pub deposit: Amount,
    /// Blocks a player has to act once the turn is theirs.
    pub turn_timeout_blocks: u64,
    /// Hits needed to win.
    pub winning_hits: u8,
    /// Event channel capacity.
    pub event_capacity: usize,
}

impl Default for LedgerRules {
    fn default() -> Self {
        Self {
            deposit: DEPOSIT,
            turn_timeout_blocks: TURN_TIMEOUT_BLOCKS,
            winning_hits: FLEET_CELLS,
            event_capacity: 256,
        }
    }
}

/// One game plus the cells each player has guessed.
#[derive(Debug)]
struct GameEntry {
    record: GameRecord,
    guessed: BTreeMap<ActorId, BTreeSet<Coordinate>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    block: u64,
    tx_count: u64,
    games: Vec<GameEntry>,
    /// Actor to index into `games`.
    active: BTreeMap<ActorId, usize>,
}

impl LedgerState {
    fn game(&self, actor: &ActorId) -> Option<&GameEntry> {
        self.active.get(actor).map(|&i| &self.games[i])
    }

    fn game_mut(&mut self, actor: &ActorId) -> Result<&mut GameEntry, LedgerError> {
        match self.active.get(actor) {
            Some(&i) => Ok(&mut self.games[i]),
            None => Err(LedgerError::NoActiveGame(*actor)),
        }
    }

    fn undecided(&self, actor: &ActorId) -> bool {
        self.game(actor).is_some_and(|entry| entry.record.winner.is_none())
    }

    /// Include a transaction in the next block.
    fn mine(&mut self, caller: &ActorId) -> TxHandle {
        self.block += 1;
        self.tx_count += 1;

        let mut hasher = DigestHasher::new();
        hasher.update_bytes(&self.block.to_le_bytes());
        hasher.update_bytes(&self.tx_count.to_le_bytes());
        hasher.update_bytes(caller.as_bytes());

        TxHandle { hash: hasher.finalize(), block: self.block }
    }
}

/// In-process ledger implementing the game contract.
pub struct InMemoryLedger {
    rules: LedgerRules,
    state: RwLock<LedgerState>,
    events: broadcast::Sender<RawLedgerEvent>,
}

impl InMemoryLedger {
    /// Create a ledger with the default rules.
    pub fn new() -> Self {
        Self::with_rules(LedgerRules::default())
    }

    /// Create a ledger with custom rules.
    pub fn with_rules(rules: LedgerRules) -> Self {
        let (events, _) = broadcast::channel(rules.event_capacity.max(1));
        Self {
            rules,
            state: RwLock::new(LedgerState::default()),
            events,
        }
    }

    /// Contract parameters.
    pub fn rules(&self) -> &LedgerRules {
        &self.rules
    }

    /// Mine `count` empty blocks. Returns the new height.
    pub async fn advance_blocks(&self, count: u64) -> u64 {
        let mut state = self.state.write().await;
        state.block += count;
        state.block
    }

    /// Inject a raw payload into the event stream.
    ///
    /// Used to simulate re-delivery and foreign traffic.
    pub fn emit_raw(&self, event: RawLedgerEvent) {
        let _ = self.events.send(event);
    }

    fn emit(&self, event: LedgerEvent) {
        debug!(id = ?event.id, data = ?event.data, "Emitting ledger event");
        // No subscribers is fine.
        let _ = self.events.send(RawLedgerEvent::encode(&event));
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn submit_commitment(
        &self,
        caller: ActorId,
        root: CommitmentRoot,
        opponent: ActorId,
        stake: Amount,
    ) -> Result<TxHandle, LedgerError> {
        if stake != self.rules.deposit {
            return Err(LedgerError::StakeMismatch { expected: self.rules.deposit, got: stake });
        }
        if caller == opponent {
            return Err(LedgerError::OpponentMismatch { expected: opponent });
        }

        let mut state = self.state.write().await;
        if state.undecided(&caller) {
            return Err(LedgerError::AlreadyInGame(caller));
        }

        // Join the opponent's game if it is waiting for us.
        let joinable = state.active.get(&opponent).copied().filter(|&i| {
            let record = &state.games[i].record;
            record.winner.is_none() && record.player2 == caller && record.commitment_root2.is_none()
        });

        if let Some(index) = joinable {
            let tx = state.mine(&caller);
            let timeout = self.rules.turn_timeout_blocks;
            let record = &mut state.games[index].record;
            record.commitment_root2 = Some(root);
            record.deposit += stake;
            record.turn = Some(record.player1);
            record.turn_deadline = Some(tx.block + timeout);
            state.active.insert(caller, index);

            info!(player = ?caller, creator = ?opponent, block = tx.block, "Game joined");
            return Ok(tx);
        }

        if state.undecided(&opponent) {
            return Err(LedgerError::AlreadyInGame(opponent));
        }

        let tx = state.mine(&caller);
        state.games.push(GameEntry {
            record: GameRecord {
                player1: caller,
                player2: opponent,
                commitment_root1: Some(root),
                commitment_root2: None,
                hits1: 0,
                hits2: 0,
                turn: None,
                turn_deadline: None,
                deposit: stake,
                pending_guess: None,
                winner: None,
            },
            guessed: BTreeMap::new(),
        });
        let index = state.games.len() - 1;
        state.active.insert(caller, index);

        info!(player = ?caller, opponent = ?opponent, block = tx.block, "Game created");
        Ok(tx)
    }

    async fn submit_guess(
        &self,
        caller: ActorId,
        coord: Coordinate,
        opponent: ActorId,
    ) -> Result<TxHandle, LedgerError> {
        if !coord.in_bounds() {
            return Err(LedgerError::OutOfBounds(coord));
        }

        let mut state = self.state.write().await;
        let at = state.block + 1;
        let entry = state.game_mut(&caller)?;
        let record = &entry.record;

        if record.winner.is_some() {
            return Err(LedgerError::GameOver);
        }
        if let Some(expected) = record.opponent_of(&caller).filter(|o| *o != opponent) {
            return Err(LedgerError::OpponentMismatch { expected });
        }
        if !record.both_committed() {
            return Err(LedgerError::NotStarted);
        }
        if record.effective_pending(at).is_some() {
            return Err(LedgerError::GuessPending);
        }
        if record.effective_turn(at) != Some(caller) {
            return Err(LedgerError::NotYourTurn);
        }

        // A void guess was never answered, so its cell stays open.
        let void = record.pending_guess;
        let guessed = entry.guessed.entry(caller).or_default();
        if let Some(void) = void {
            guessed.remove(&void.coord);
            debug!(player = ?caller, coord = %void.coord, "Unanswered guess voided");
        }
        if !guessed.insert(coord) {
            return Err(LedgerError::AlreadyGuessed(coord));
        }

        let record = &mut entry.record;
        record.turn = Some(caller);
        record.pending_guess = Some(PendingGuess { guesser: caller, coord });
        record.turn_deadline = Some(at + self.rules.turn_timeout_blocks);

        let tx = state.mine(&caller);
        debug!(player = ?caller, %coord, block = tx.block, "Guess accepted");
        Ok(tx)
    }

    async fn submit_response(
        &self,
        caller: ActorId,
        response: ShotResponse,
    ) -> Result<TxHandle, LedgerError> {
        let mut state = self.state.write().await;
        let at = state.block + 1;
        let entry = state.game_mut(&caller)?;
        let record = &mut entry.record;

        if record.winner.is_some() {
            return Err(LedgerError::GameOver);
        }
        let guess = match record.effective_pending(at) {
            Some(guess) if guess.guesser != caller => guess,
            _ => return Err(LedgerError::NoPendingGuess(caller)),
        };
        let root = record.root_of(&caller).ok_or(LedgerError::NotStarted)?;

        let hit = verify_response(&root, guess.coord, &response)?;

        if hit {
            if record.player1 == guess.guesser {
                record.hits1 += 1;
            } else {
                record.hits2 += 1;
            }
        }
        record.pending_guess = None;

        let won = record.hits_of(&guess.guesser) >= self.rules.winning_hits;
        if won {
            record.winner = Some(guess.guesser);
            record.turn = None;
            record.turn_deadline = None;
        } else {
            record.turn = Some(caller);
            record.turn_deadline = Some(at + self.rules.turn_timeout_blocks);
        }

        let tx = state.mine(&caller);
        debug!(player = ?caller, coord = %guess.coord, hit, block = tx.block, "Response accepted");

        self.emit(LedgerEvent::response(EventId::new(tx.block, 0), caller, hit));
        if won {
            info!(winner = ?guess.guesser, block = tx.block, "Game won");
            self.emit(LedgerEvent::won(EventId::new(tx.block, 1), guess.guesser));
        }

        Ok(tx)
    }

    async fn read_game_record(&self, actor: ActorId) -> Result<GameRecord, LedgerError> {
        let state = self.state.read().await;
        state
            .game(&actor)
            .map(|entry| entry.record.clone())
            .ok_or(LedgerError::NoActiveGame(actor))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.state.read().await.block)
    }

    fn subscribe(&self) -> broadcast::Receiver<RawLedgerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::tests::sample_fleet;
    use crate::game::board::ShipKind;
    use crate::game::state::tests::actor;
    use crate::proof::commitment::BoardCommitment;
    use crate::proof::verify::VerificationRejected;

    fn alice() -> ActorId {
        actor(0xA1)
    }

    fn bob() -> ActorId {
        actor(0xB0)
    }

    fn board() -> BoardCommitment {
        BoardCommitment::seal(sample_fleet()).unwrap()
    }

    async fn started(ledger: &InMemoryLedger) -> (BoardCommitment, BoardCommitment) {
        let (a, b) = (board(), board());
        ledger.submit_commitment(alice(), a.root(), bob(), DEPOSIT).await.unwrap();
        ledger.submit_commitment(bob(), b.root(), alice(), DEPOSIT).await.unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_stake_must_match_deposit() {
        let ledger = InMemoryLedger::new();
        let result = ledger.submit_commitment(alice(), board().root(), bob(), DEPOSIT - 1).await;
        assert!(matches!(result, Err(LedgerError::StakeMismatch { .. })));
        assert_eq!(ledger.block_number().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_join_by_mirror_commit() {
        let ledger = InMemoryLedger::new();
        let (a, b) = started(&ledger).await;

        let record = ledger.read_game_record(bob()).await.unwrap();
        assert_eq!(record, ledger.read_game_record(alice()).await.unwrap());
        assert_eq!(record.player1, alice());
        assert_eq!(record.commitment_root1, Some(a.root()));
        assert_eq!(record.commitment_root2, Some(b.root()));
        assert_eq!(record.deposit, 2 * DEPOSIT);
        assert_eq!(record.turn, Some(alice()));
        assert_eq!(record.turn_deadline, Some(2 + TURN_TIMEOUT_BLOCKS));
        assert_eq!(ledger.block_number().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_second_game_rejected() {
        let ledger = InMemoryLedger::new();
        started(&ledger).await;

        let result = ledger.submit_commitment(alice(), board().root(), actor(3), DEPOSIT).await;
        assert_eq!(result, Err(LedgerError::AlreadyInGame(alice())));
    }

    #[tokio::test]
    async fn test_turn_order_and_alternation() {
        let ledger = InMemoryLedger::new();
        let (_, b) = started(&ledger).await;

        let result = ledger.submit_guess(bob(), Coordinate::new(0, 0), alice()).await;
        assert_eq!(result, Err(LedgerError::NotYourTurn));

        ledger.submit_guess(alice(), Coordinate::new(5, 5), bob()).await.unwrap();
        let result = ledger.submit_guess(alice(), Coordinate::new(5, 6), bob()).await;
        assert_eq!(result, Err(LedgerError::GuessPending));

        let result = ledger.submit_response(alice(), ShotResponse::Miss).await;
        assert_eq!(result, Err(LedgerError::NoPendingGuess(alice())));

        ledger.submit_response(bob(), b.answer(Coordinate::new(5, 5)).unwrap()).await.unwrap();
        let record = ledger.read_game_record(alice()).await.unwrap();
        assert_eq!(record.turn, Some(bob()));
        assert_eq!(record.pending_guess, None);
    }

    #[tokio::test]
    async fn test_repeat_guess_rejected() {
        let ledger = InMemoryLedger::new();
        let (a, b) = started(&ledger).await;
        let cell = Coordinate::new(9, 9);

        ledger.submit_guess(alice(), cell, bob()).await.unwrap();
        ledger.submit_response(bob(), b.answer(cell).unwrap()).await.unwrap();
        ledger.submit_guess(bob(), cell, alice()).await.unwrap();
        ledger.submit_response(alice(), a.answer(cell).unwrap()).await.unwrap();

        let result = ledger.submit_guess(alice(), cell, bob()).await;
        assert_eq!(result, Err(LedgerError::AlreadyGuessed(cell)));
    }

    #[tokio::test]
    async fn test_forged_hit_rejected() {
        let ledger = InMemoryLedger::new();
        let (_, b) = started(&ledger).await;

        // Claim a hit at an empty cell using the Carrier's disclosure.
        ledger.submit_guess(alice(), Coordinate::new(5, 5), bob()).await.unwrap();
        let forged = ShotResponse::Hit(b.disclose(ShipKind::Carrier).unwrap());
        let result = ledger.submit_response(bob(), forged).await;

        assert!(matches!(
            result,
            Err(LedgerError::InvalidResponse(VerificationRejected::CellNotCovered { .. }))
        ));
        let record = ledger.read_game_record(bob()).await.unwrap();
        assert!(record.pending_guess.is_some());
    }

    #[tokio::test]
    async fn test_idle_turn_passes_to_opponent() {
        let ledger = InMemoryLedger::new();
        started(&ledger).await;

        ledger.advance_blocks(TURN_TIMEOUT_BLOCKS + 1).await;
        ledger.submit_guess(bob(), Coordinate::new(1, 1), alice()).await.unwrap();

        let record = ledger.read_game_record(alice()).await.unwrap();
        assert_eq!(record.turn, Some(bob()));
    }

    #[tokio::test]
    async fn test_unanswered_guess_voided_after_deadline() {
        let ledger = InMemoryLedger::new();
        let (_, b) = started(&ledger).await;
        let cell = Coordinate::new(5, 5);

        let tx = ledger.submit_guess(alice(), cell, bob()).await.unwrap();
        let record = ledger.read_game_record(alice()).await.unwrap();
        assert_eq!(record.turn_deadline, Some(tx.block + TURN_TIMEOUT_BLOCKS));

        ledger.advance_blocks(TURN_TIMEOUT_BLOCKS + 1).await;
        let record = ledger.read_game_record(alice()).await.unwrap();
        let height = ledger.block_number().await.unwrap();
        assert!(record.turn_lapsed(height + 1));
        assert_eq!(record.effective_turn(height + 1), Some(alice()));

        // Bob answers too late; the turn is back with Alice.
        let result = ledger.submit_response(bob(), b.answer(cell).unwrap()).await;
        assert_eq!(result, Err(LedgerError::NoPendingGuess(bob())));
        let result = ledger.submit_guess(bob(), Coordinate::new(1, 1), alice()).await;
        assert_eq!(result, Err(LedgerError::NotYourTurn));

        // The void cell can be guessed again.
        ledger.submit_guess(alice(), cell, bob()).await.unwrap();
        ledger.submit_response(bob(), b.answer(cell).unwrap()).await.unwrap();
        let record = ledger.read_game_record(alice()).await.unwrap();
        assert_eq!(record.pending_guess, None);
        assert_eq!(record.turn, Some(bob()));
    }

    #[tokio::test]
    async fn test_response_events_emitted() {
        let ledger = InMemoryLedger::new();
        let mut rx = ledger.subscribe();
        let (_, b) = started(&ledger).await;

        ledger.submit_guess(alice(), Coordinate::new(0, 0), bob()).await.unwrap();
        let tx = ledger.submit_response(bob(), b.answer(Coordinate::new(0, 0)).unwrap()).await.unwrap();

        let event = rx.recv().await.unwrap().decode().unwrap();
        assert_eq!(event, LedgerEvent::response(EventId::new(tx.block, 0), bob(), true));
    }

    #[tokio::test]
    async fn test_win_after_every_cell() {
        let rules = LedgerRules { winning_hits: 2, ..LedgerRules::default() };
        let ledger = InMemoryLedger::with_rules(rules);
        let mut rx = ledger.subscribe();
        let (a, b) = started(&ledger).await;

        // Destroyer at (9,0)-(9,1); Alice sinks it while Bob misses.
        for (target, miss) in [(Coordinate::new(9, 0), Coordinate::new(5, 5)), (Coordinate::new(9, 1), Coordinate::new(5, 6))] {
            ledger.submit_guess(alice(), target, bob()).await.unwrap();
            ledger.submit_response(bob(), b.answer(target).unwrap()).await.unwrap();
            if ledger.read_game_record(alice()).await.unwrap().winner.is_some() {
                break;
            }
            ledger.submit_guess(bob(), miss, alice()).await.unwrap();
            ledger.submit_response(alice(), a.answer(miss).unwrap()).await.unwrap();
        }

        let record = ledger.read_game_record(bob()).await.unwrap();
        assert_eq!(record.winner, Some(alice()));
        assert_eq!(record.hits1, 2);

        let mut last = None;
        while let Ok(raw) = rx.try_recv() {
            last = Some(raw.decode().unwrap());
        }
        assert_eq!(last.map(|e| e.actor()), Some(alice()));

        let result = ledger.submit_guess(bob(), Coordinate::new(0, 0), alice()).await;
        assert_eq!(result, Err(LedgerError::GameOver));

        // A decided game does not block a new one.
        ledger.submit_commitment(alice(), a.root(), actor(3), DEPOSIT).await.unwrap();
    }
}
