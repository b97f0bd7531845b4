use crate::players::ParticipantId;

/// Protocol faults raised while applying events to a replica.
///
/// These indicate that participants disagree about the puzzle they are
/// playing (version mismatch, stale client) and are surfaced to the host
/// rather than recovered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("unknown piece id {piece_id} (puzzle has {count} pieces)")]
    UnknownPiece { piece_id: usize, count: usize },

    #[error("event for puzzle {found} delivered to puzzle {expected}")]
    PuzzleMismatch { expected: u32, found: u32 },

    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error(transparent)]
    Cut(#[from] CutError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CutError {
    #[error("cut has no pieces")]
    Empty,

    #[error("cut lists {offsets} answer offsets but {neighbors} neighbor lists")]
    LengthMismatch { offsets: usize, neighbors: usize },

    #[error("piece {piece_id} lists out-of-range neighbor {neighbor}")]
    NeighborOutOfRange { piece_id: usize, neighbor: usize },

    #[error("piece {piece_id} lists itself as a neighbor")]
    SelfNeighbor { piece_id: usize },

    #[error("piece size must be positive and finite, got {width}x{height}")]
    PieceSize { width: f32, height: f32 },

    #[error("permission must be positive and finite, got {0}")]
    Permission(f32),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame too short ({0} bytes)")]
    Truncated(usize),

    #[error("unsupported frame version {found} (expected {expected})")]
    Version { expected: u8, found: u8 },

    #[error("unknown event kind {0}")]
    UnknownKind(u8),

    #[error("frame header says kind {header} but body decodes as kind {body}")]
    KindMismatch { header: u8, body: u8 },

    #[error("rkyv: {0}")]
    Rkyv(#[from] rkyv::rancor::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
