//! Hidden Fleet Demo
//!
//! Plays a full game between two sessions over the in-process ledger, then
//! audits both boards and prints the final snapshots.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hidden_fleet::{
    ActorId, Coordinate, Fleet, InMemoryLedger, Ledger, Orientation, Placement, Session,
    SessionConfig, ShipKind, BOARD_SIZE, BLOCK_PERIOD, DEPOSIT, TURN_TIMEOUT_BLOCKS, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Hidden Fleet v{}", VERSION);
    info!("Board: {}x{}, deposit: {}", BOARD_SIZE, BOARD_SIZE, DEPOSIT);
    info!("Turn timeout: {} blocks (~{}s)", TURN_TIMEOUT_BLOCKS, TURN_TIMEOUT_BLOCKS * BLOCK_PERIOD.as_secs());

    demo_game().await
}

fn fleet(ships: [(ShipKind, u8, u8, Orientation); 5]) -> anyhow::Result<Fleet> {
    let placements = ships
        .into_iter()
        .map(|(kind, row, col, orientation)| Placement::new(kind, Coordinate::new(row, col), orientation));
    Ok(Fleet::new(placements)?)
}

fn all_cells() -> Vec<Coordinate> {
    (0..BOARD_SIZE)
        .flat_map(|row| (0..BOARD_SIZE).map(move |col| Coordinate::new(row, col)))
        .collect()
}

/// Demo function to play one game end to end.
async fn demo_game() -> anyhow::Result<()> {
    info!("=== Starting Demo Game ===");

    let ledger = Arc::new(InMemoryLedger::new());
    let alice_id = ActorId::new([0xA1; 20]);
    let bob_id = ActorId::new([0xB0; 20]);

    let mut config = SessionConfig::from_env();
    if std::env::var("FLEET_POLL_MS").is_err() {
        config.sync.poll_interval = Duration::from_millis(20);
    }

    let mut alice = Session::new(ledger.clone(), alice_id, config.clone());
    let mut bob = Session::new(ledger.clone(), bob_id, config);

    let alice_fleet = fleet([
        (ShipKind::Carrier, 0, 0, Orientation::Horizontal),
        (ShipKind::Battleship, 2, 0, Orientation::Vertical),
        (ShipKind::Cruiser, 4, 4, Orientation::Horizontal),
        (ShipKind::Submarine, 7, 9, Orientation::Vertical),
        (ShipKind::Destroyer, 9, 0, Orientation::Horizontal),
    ])?;
    let bob_fleet = fleet([
        (ShipKind::Carrier, 9, 5, Orientation::Horizontal),
        (ShipKind::Battleship, 1, 8, Orientation::Vertical),
        (ShipKind::Cruiser, 6, 2, Orientation::Vertical),
        (ShipKind::Submarine, 3, 3, Orientation::Horizontal),
        (ShipKind::Destroyer, 0, 6, Orientation::Horizontal),
    ])?;

    let tx = alice.commit_board(alice_fleet, bob_id).await?;
    info!("Alice committed {} in block {}", alice.root().map(|r| r.to_hex()).unwrap_or_default(), tx.block);
    let tx = bob.commit_board(bob_fleet, alice_id).await?;
    info!("Bob committed {} in block {}", bob.root().map(|r| r.to_hex()).unwrap_or_default(), tx.block);

    alice.wait_until_active().await?;
    bob.wait_until_active().await?;

    // Alice sweeps row by row; Bob sweeps from the far corner.
    let mut alice_targets = all_cells().into_iter();
    let mut bob_targets = all_cells().into_iter().rev();

    let winner = loop {
        let target = alice_targets.next().context("Alice ran out of targets")?;
        let (shot, answer) = tokio::join!(alice.guess(target), bob.respond());
        shot?;
        answer?;
        if let Some(winner) = ledger.read_game_record(alice_id).await?.winner {
            break winner;
        }

        let target = bob_targets.next().context("Bob ran out of targets")?;
        let (shot, answer) = tokio::join!(bob.guess(target), alice.respond());
        shot?;
        answer?;
        if let Some(winner) = ledger.read_game_record(bob_id).await?.winner {
            break winner;
        }
    };

    let name = if winner == alice_id { "Alice" } else { "Bob" };
    info!("=== Game Won by {} ({}) ===", name, winner.short());

    alice.wait_for_winner().await?;
    bob.wait_for_winner().await?;

    // End-of-game audit
    info!("=== Auditing Boards ===");
    alice.audit_opponent(&bob.reveal_board()?).await?;
    bob.audit_opponent(&alice.reveal_board()?).await?;
    info!("Both boards verified against their roots");

    let record = ledger.read_game_record(alice_id).await?;
    info!("Hits: Alice {} / Bob {}", record.hits1, record.hits2);
    info!("Alice shots: {}, Bob shots: {}", alice.shots().len(), bob.shots().len());

    println!("{}", serde_json::to_string_pretty(&alice.snapshot())?);
    println!("{}", serde_json::to_string_pretty(&bob.snapshot())?);

    alice.close();
    bob.close();
    Ok(())
}
