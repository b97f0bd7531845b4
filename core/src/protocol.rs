use rkyv::{Archive, Deserialize, Serialize};

use crate::players::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    PieceDown = 0,
    PieceMove = 1,
    PieceUp = 2,
    ConnectPiece = 3,
    FitPiece = 4,
    Clear = 5,
    Join = 6,
}

impl EventKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EventKind::PieceDown),
            1 => Some(EventKind::PieceMove),
            2 => Some(EventKind::PieceUp),
            3 => Some(EventKind::ConnectPiece),
            4 => Some(EventKind::FitPiece),
            5 => Some(EventKind::Clear),
            6 => Some(EventKind::Join),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ClearEntry {
    pub participant_id: ParticipantId,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum GameEvent {
    PieceDown {
        piece_id: u32,
        participant_id: ParticipantId,
    },
    PieceMove {
        piece_id: u32,
        participant_id: ParticipantId,
        pos: (f32, f32),
    },
    PieceUp {
        piece_id: u32,
        participant_id: ParticipantId,
        pos: (f32, f32),
    },
    ConnectPiece {
        owner_piece_id: u32,
        child_piece_id: u32,
        participant_id: ParticipantId,
    },
    FitPiece {
        piece_id: u32,
        participant_id: ParticipantId,
    },
    Clear {
        participants: Vec<ClearEntry>,
        last_participant_id: ParticipantId,
    },
    Join {
        participant_id: ParticipantId,
        name: String,
    },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::PieceDown { .. } => EventKind::PieceDown,
            GameEvent::PieceMove { .. } => EventKind::PieceMove,
            GameEvent::PieceUp { .. } => EventKind::PieceUp,
            GameEvent::ConnectPiece { .. } => EventKind::ConnectPiece,
            GameEvent::FitPiece { .. } => EventKind::FitPiece,
            GameEvent::Clear { .. } => EventKind::Clear,
            GameEvent::Join { .. } => EventKind::Join,
        }
    }

    /// The participant who raised the event.
    pub fn sender(&self) -> ParticipantId {
        match self {
            GameEvent::PieceDown { participant_id, .. }
            | GameEvent::PieceMove { participant_id, .. }
            | GameEvent::PieceUp { participant_id, .. }
            | GameEvent::ConnectPiece { participant_id, .. }
            | GameEvent::FitPiece { participant_id, .. }
            | GameEvent::Join { participant_id, .. } => *participant_id,
            GameEvent::Clear {
                last_participant_id,
                ..
            } => *last_participant_id,
        }
    }
}

/// One event addressed to one puzzle instance.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Envelope {
    pub puzzle_id: u32,
    pub event: GameEvent,
}
