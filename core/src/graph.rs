use crate::cut::CutSpec;
use crate::error::SyncError;
use crate::game::{add, clamp_axis, scatter_layout, sub};

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub id: usize,
    pub answer_offset: (f32, f32),
    pub neighbor_ids: Vec<usize>,
    /// Authoritative on roots; kept in sync for members.
    pub position: (f32, f32),
    /// Root of this piece's group, if it is a member.
    pub owner: Option<usize>,
    /// Direct members, only non-empty on roots.
    pub children: Vec<usize>,
    pub fitted: bool,
}

impl Piece {
    pub fn is_root(&self) -> bool {
        self.owner.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { root: usize, absorbed: usize },
    AlreadyMerged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleGraph {
    pieces: Vec<Piece>,
    piece_size: (f32, f32),
    image_size: (f32, f32),
    board_margin: (f32, f32),
    permission: f32,
    fitted_count: usize,
}

impl PuzzleGraph {
    /// Builds the graph with every piece scattered around the board.
    pub fn from_cut(cut: &CutSpec, seed: u32, spacing: (f32, f32)) -> Result<Self, SyncError> {
        let positions = scatter_layout(
            seed,
            cut.len(),
            cut.piece_size,
            cut.image_size,
            cut.board_margin,
            spacing,
        );
        Self::with_positions(cut, &positions)
    }

    pub fn with_positions(cut: &CutSpec, positions: &[(f32, f32)]) -> Result<Self, SyncError> {
        cut.validate()?;
        let pieces = cut
            .answer_offsets
            .iter()
            .zip(&cut.neighbor_ids)
            .enumerate()
            .map(|(id, (&answer_offset, neighbors))| Piece {
                id,
                answer_offset,
                neighbor_ids: neighbors.clone(),
                position: positions.get(id).copied().unwrap_or(answer_offset),
                owner: None,
                children: Vec::new(),
                fitted: false,
            })
            .collect();
        let mut graph = Self {
            pieces,
            piece_size: cut.piece_size,
            image_size: cut.image_size,
            board_margin: cut.board_margin,
            permission: cut.permission,
            fitted_count: 0,
        };
        for id in 0..graph.pieces.len() {
            graph.clamp_to_area(id)?;
        }
        Ok(graph)
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn fitted_count(&self) -> usize {
        self.fitted_count
    }

    pub fn permission(&self) -> f32 {
        self.permission
    }

    pub fn board_margin(&self) -> (f32, f32) {
        self.board_margin
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn play_area(&self) -> (f32, f32) {
        (
            self.image_size.0 + self.board_margin.0 * 2.0,
            self.image_size.1 + self.board_margin.1 * 2.0,
        )
    }

    pub fn piece(&self, piece_id: usize) -> Result<&Piece, SyncError> {
        self.pieces.get(piece_id).ok_or(SyncError::UnknownPiece {
            piece_id,
            count: self.pieces.len(),
        })
    }

    pub fn root(&self, piece_id: usize) -> Result<usize, SyncError> {
        let piece = self.piece(piece_id)?;
        Ok(piece.owner.unwrap_or(piece_id))
    }

    pub fn absolute_position(&self, piece_id: usize) -> Result<(f32, f32), SyncError> {
        let piece = self.piece(piece_id)?;
        match piece.owner {
            None => Ok(piece.position),
            Some(owner) => {
                let root = self.piece(owner)?;
                Ok(add(root.position, sub(piece.answer_offset, root.answer_offset)))
            }
        }
    }

    /// Moves the group containing `piece_id` so its root sits at `position`.
    pub fn translate(&mut self, piece_id: usize, position: (f32, f32)) -> Result<usize, SyncError> {
        let root = self.root(piece_id)?;
        self.pieces[root].position = position;
        self.sync_members(root);
        Ok(root)
    }

    /// Forces the group's root into `[0, area - piece size]` on both axes.
    pub fn clamp_to_area(&mut self, piece_id: usize) -> Result<usize, SyncError> {
        let root = self.root(piece_id)?;
        let clamped = self.clamp_position(self.pieces[root].position);
        self.pieces[root].position = clamped;
        self.sync_members(root);
        Ok(root)
    }

    pub fn clamp_position(&self, position: (f32, f32)) -> (f32, f32) {
        let area = self.play_area();
        (
            clamp_axis(position.0, area.0 - self.piece_size.0),
            clamp_axis(position.1, area.1 - self.piece_size.1),
        )
    }

    pub fn place(&mut self, piece_id: usize, position: (f32, f32)) -> Result<usize, SyncError> {
        self.translate(piece_id, position)?;
        self.clamp_to_area(piece_id)
    }

    /// Folds the group of `child` into the group of `owner`.
    ///
    /// Both ids are escalated to their roots first, so the depth of every
    /// group stays at one.
    pub fn merge(&mut self, owner: usize, child: usize) -> Result<MergeOutcome, SyncError> {
        let root = self.root(owner)?;
        let absorbed = self.root(child)?;
        if root == absorbed {
            return Ok(MergeOutcome::AlreadyMerged);
        }
        let mut moved = vec![absorbed];
        moved.append(&mut self.pieces[absorbed].children);
        for &member in &moved {
            self.pieces[member].owner = Some(root);
        }
        self.pieces[root].children.extend_from_slice(&moved);
        self.sync_members(root);
        Ok(MergeOutcome::Merged { root, absorbed })
    }

    /// Board location the group's root snaps to when fitted.
    pub fn target_position(&self, piece_id: usize) -> Result<(f32, f32), SyncError> {
        let root = self.root(piece_id)?;
        Ok(add(self.pieces[root].answer_offset, self.board_margin))
    }

    /// Snaps the group onto the board and returns how many pieces became fitted.
    pub fn fit_group(&mut self, piece_id: usize) -> Result<usize, SyncError> {
        let root = self.root(piece_id)?;
        if self.pieces[root].fitted {
            return Ok(0);
        }
        self.pieces[root].position = self.target_position(root)?;
        self.sync_members(root);
        let mut newly = 0;
        for id in self.group_members(root) {
            if !self.pieces[id].fitted {
                self.pieces[id].fitted = true;
                newly += 1;
            }
        }
        self.fitted_count += newly;
        Ok(newly)
    }

    /// Marks every unfitted group as fitted at its board location.
    pub fn freeze_all(&mut self) -> usize {
        let roots: Vec<usize> = self
            .pieces
            .iter()
            .filter(|piece| piece.is_root() && !piece.fitted)
            .map(|piece| piece.id)
            .collect();
        let mut newly = 0;
        for root in roots {
            let target = add(self.pieces[root].answer_offset, self.board_margin);
            self.pieces[root].position = target;
            self.sync_members(root);
            for id in self.group_members(root) {
                if !self.pieces[id].fitted {
                    self.pieces[id].fitted = true;
                    newly += 1;
                }
            }
        }
        self.fitted_count += newly;
        newly
    }

    pub fn is_complete(&self) -> bool {
        self.pieces.iter().all(|piece| piece.fitted)
    }

    pub fn group_members(&self, root: usize) -> Vec<usize> {
        let mut members = Vec::with_capacity(1 + self.pieces[root].children.len());
        members.push(root);
        members.extend_from_slice(&self.pieces[root].children);
        members
    }

    /// True when no member points at another member.
    pub fn depth_invariant_holds(&self) -> bool {
        self.pieces.iter().all(|piece| match piece.owner {
            None => true,
            Some(owner) => self
                .pieces
                .get(owner)
                .map(|root| root.owner.is_none() && root.children.contains(&piece.id))
                .unwrap_or(false),
        })
    }

    fn sync_members(&mut self, root: usize) {
        let origin = self.pieces[root].position;
        let anchor = self.pieces[root].answer_offset;
        let children = self.pieces[root].children.clone();
        for child in children {
            let offset = sub(self.pieces[child].answer_offset, anchor);
            self.pieces[child].position = add(origin, offset);
        }
    }
}
