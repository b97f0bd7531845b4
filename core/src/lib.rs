pub mod bus;
pub mod codec;
pub mod connect;
pub mod cut;
pub mod error;
pub mod fit;
pub mod game;
pub mod graph;
pub mod hold;
pub mod players;
pub mod protocol;
pub mod session;
pub mod snapshot;

pub use bus::{Delivery, LoopbackBus};
pub use codec::{decode, decode_frame, encode, encode_frame, peek_kind, FRAME_VERSION};
pub use connect::{find_connection, try_connect, MergeCandidate};
pub use cut::CutSpec;
pub use error::{BusError, CodecError, CutError, SyncError};
pub use fit::{apply_fit, clear_check, find_fit, try_fit, FitOutcome};
pub use game::{move_sample_interval, GameRules};
pub use graph::{MergeOutcome, Piece, PuzzleGraph};
pub use hold::{AcquireOutcome, ExpiryScheduler, HoldRecord, HoldTable, ReleaseOutcome};
pub use players::{Participant, ParticipantId, Roster};
pub use protocol::{ClearEntry, Envelope, EventKind, GameEvent};
pub use session::{Progress, Session, SessionConfig, SessionNotice};
pub use snapshot::{ParticipantView, PieceView, PuzzleStateSnapshot, PuzzleStatus};
