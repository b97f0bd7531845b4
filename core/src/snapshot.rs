use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rkyv::{Archive, Deserialize, Serialize};

use crate::graph::PuzzleGraph;
use crate::hold::HoldTable;
use crate::players::{ParticipantId, Roster};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[repr(u8)]
pub enum PuzzleStatus {
    Playing,
    Clear,
}

/// What the renderer needs for one piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceView {
    pub id: usize,
    pub position: (f32, f32),
    pub fitted: bool,
    pub held_by_other: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    pub score: u32,
    pub rank: u32,
    pub holding: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct ParticipantState {
    pub id: ParticipantId,
    pub score: u32,
    pub rank: u32,
}

/// Replicated state of one puzzle, comparable across replicas.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct PuzzleStateSnapshot {
    pub version: u32,
    pub puzzle_id: u32,
    pub status: PuzzleStatus,
    pub positions: Vec<(f32, f32)>,
    pub owners: Vec<Option<u32>>,
    pub children: Vec<Vec<u32>>,
    pub fitted: Vec<bool>,
    pub fitted_count: u32,
    pub holds: Vec<(u32, ParticipantId)>,
    pub participants: Vec<ParticipantState>,
    pub last_setter: Option<ParticipantId>,
}

impl PuzzleStateSnapshot {
    pub fn capture(
        puzzle_id: u32,
        status: PuzzleStatus,
        graph: &PuzzleGraph,
        holds: &HoldTable,
        roster: &Roster,
        last_setter: Option<ParticipantId>,
    ) -> Self {
        let pieces = graph.pieces();
        Self {
            version: SNAPSHOT_VERSION,
            puzzle_id,
            status,
            positions: pieces.iter().map(|piece| piece.position).collect(),
            owners: pieces
                .iter()
                .map(|piece| piece.owner.map(|owner| owner as u32))
                .collect(),
            children: pieces
                .iter()
                .map(|piece| piece.children.iter().map(|&c| c as u32).collect())
                .collect(),
            fitted: pieces.iter().map(|piece| piece.fitted).collect(),
            fitted_count: graph.fitted_count() as u32,
            holds: holds
                .records()
                .map(|record| (record.piece as u32, record.participant))
                .collect(),
            participants: roster
                .iter()
                .map(|p| ParticipantState {
                    id: p.id,
                    score: p.score,
                    rank: p.rank,
                })
                .collect(),
            last_setter,
        }
    }

    /// Hash over the exact bit patterns of every field.
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.version.hash(&mut hasher);
        self.puzzle_id.hash(&mut hasher);
        self.status.hash(&mut hasher);
        for (x, y) in &self.positions {
            x.to_bits().hash(&mut hasher);
            y.to_bits().hash(&mut hasher);
        }
        self.owners.hash(&mut hasher);
        self.children.hash(&mut hasher);
        self.fitted.hash(&mut hasher);
        self.fitted_count.hash(&mut hasher);
        self.holds.hash(&mut hasher);
        for p in &self.participants {
            (p.id, p.score, p.rank).hash(&mut hasher);
        }
        self.last_setter.hash(&mut hasher);
        hasher.finish()
    }
}
