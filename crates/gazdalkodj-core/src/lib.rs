//! Gazdálkodj game engine.
//!
//! The board, the turn state machine and the client-side synchronization layer.
//! Both the authoritative server and the clients run the same transitions.

pub mod fields;
pub mod gateway;
pub mod saves;
pub mod sequencer;
pub mod store;
pub mod sync;

pub use fields::{Field, FieldKind, FieldOutcome, PopupKind, FIELDS};
pub use gateway::{AlertGateway, AlertLevel, AlertOptions, LogGateway, Notice, PopupGateway, PopupRequest};
pub use saves::{DirSaveStore, SaveError, SaveStore};
pub use sequencer::{Effect, SequencerConfig, SequencerError, Stage, Step, TurnSequencer};
pub use store::{GameStore, SubscriptionId};
pub use sync::{SyncClient, SyncError};
