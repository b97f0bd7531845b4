use crate::error::CutError;
use crate::game::GameRules;

/// Static per-puzzle input produced by the cut generator.
///
/// Every replica of a puzzle must be built from an identical `CutSpec`.
#[derive(Debug, Clone, PartialEq)]
pub struct CutSpec {
    pub piece_size: (f32, f32),
    pub image_size: (f32, f32),
    pub answer_offsets: Vec<(f32, f32)>,
    pub neighbor_ids: Vec<Vec<usize>>,
    pub permission: f32,
    pub board_margin: (f32, f32),
}

impl CutSpec {
    /// Rectangular cut, row-major ids. Neighbors are listed up, left, right, down.
    pub fn grid(cols: usize, rows: usize, piece_width: f32, piece_height: f32, rules: &GameRules) -> Self {
        let total = cols * rows;
        let mut answer_offsets = Vec::with_capacity(total);
        let mut neighbor_ids = Vec::with_capacity(total);
        for row in 0..rows {
            for col in 0..cols {
                let id = row * cols + col;
                answer_offsets.push((col as f32 * piece_width, row as f32 * piece_height));
                let mut neighbors = Vec::with_capacity(4);
                if row > 0 {
                    neighbors.push(id - cols);
                }
                if col > 0 {
                    neighbors.push(id - 1);
                }
                if col + 1 < cols {
                    neighbors.push(id + 1);
                }
                if row + 1 < rows {
                    neighbors.push(id + cols);
                }
                neighbor_ids.push(neighbors);
            }
        }
        let image_size = (cols as f32 * piece_width, rows as f32 * piece_height);
        Self {
            piece_size: (piece_width, piece_height),
            image_size,
            answer_offsets,
            neighbor_ids,
            permission: rules.permission_for(piece_width),
            board_margin: image_size,
        }
    }

    pub fn len(&self) -> usize {
        self.answer_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answer_offsets.is_empty()
    }

    /// Board plus a margin on every side.
    pub fn play_area(&self) -> (f32, f32) {
        (
            self.image_size.0 + self.board_margin.0 * 2.0,
            self.image_size.1 + self.board_margin.1 * 2.0,
        )
    }

    pub fn validate(&self) -> Result<(), CutError> {
        if self.answer_offsets.is_empty() {
            return Err(CutError::Empty);
        }
        if self.answer_offsets.len() != self.neighbor_ids.len() {
            return Err(CutError::LengthMismatch {
                offsets: self.answer_offsets.len(),
                neighbors: self.neighbor_ids.len(),
            });
        }
        let (width, height) = self.piece_size;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(CutError::PieceSize { width, height });
        }
        if !(self.permission.is_finite() && self.permission > 0.0) {
            return Err(CutError::Permission(self.permission));
        }
        let count = self.len();
        for (piece_id, neighbors) in self.neighbor_ids.iter().enumerate() {
            for &neighbor in neighbors {
                if neighbor >= count {
                    return Err(CutError::NeighborOutOfRange { piece_id, neighbor });
                }
                if neighbor == piece_id {
                    return Err(CutError::SelfNeighbor { piece_id });
                }
            }
        }
        Ok(())
    }
}
