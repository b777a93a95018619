//! Network Layer
//!
//! Everything that talks to the ledger: the ledger interface, its raw event
//! payloads, the sync controller and the game session.
//! This layer is **asynchronous** - turn logic itself lives in `game/`.

pub mod ledger;
pub mod memory;
pub mod protocol;
pub mod sync;
pub mod session;

pub use ledger::{Ledger, LedgerError, TxHandle};
pub use memory::{InMemoryLedger, LedgerRules};
pub use protocol::{RawLedgerEvent, ProtocolError, parse_event};
pub use sync::{SyncConfig, SyncError, SyncHandle};
pub use session::{Session, SessionConfig, SessionError, SessionId, Shot};
