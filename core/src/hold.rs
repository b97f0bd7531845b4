use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::SyncError;
use crate::graph::PuzzleGraph;
use crate::players::ParticipantId;

/// Exclusive control of one group, keyed by the group's root piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldRecord {
    pub participant: ParticipantId,
    pub piece: usize,
    pub expires_at_ms: u64,
    /// Root position as of the last applied down or move.
    pub last_synced: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted {
        piece: usize,
        /// The participant's previous hold, released to make room.
        dropped: Option<usize>,
    },
    Refreshed {
        piece: usize,
    },
    Displaced {
        piece: usize,
        previous: ParticipantId,
        dropped: Option<usize>,
    },
    Rejected {
        piece: usize,
        holder: ParticipantId,
    },
    Fitted {
        piece: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { root: usize },
    NotHolder { root: usize, holder: Option<ParticipantId> },
}

/// Pending hold deadlines, ordered by deadline then piece id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryScheduler {
    queue: BTreeSet<(u64, usize)>,
}

impl ExpiryScheduler {
    pub fn schedule(&mut self, piece: usize, deadline: u64) {
        self.queue.insert((deadline, piece));
    }

    pub fn cancel(&mut self, piece: usize, deadline: u64) {
        self.queue.remove(&(deadline, piece));
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.first().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns every piece whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Vec<usize> {
        let mut due = Vec::new();
        while let Some(&(deadline, piece)) = self.queue.first() {
            if deadline > now {
                break;
            }
            self.queue.pop_first();
            due.push(piece);
        }
        due
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldTable {
    timeout_ms: u64,
    by_piece: BTreeMap<usize, HoldRecord>,
    by_participant: BTreeMap<ParticipantId, usize>,
    scheduler: ExpiryScheduler,
}

impl HoldTable {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            by_piece: BTreeMap::new(),
            by_participant: BTreeMap::new(),
            scheduler: ExpiryScheduler::default(),
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn holder_of(&self, root: usize) -> Option<ParticipantId> {
        self.by_piece.get(&root).map(|record| record.participant)
    }

    pub fn record(&self, root: usize) -> Option<&HoldRecord> {
        self.by_piece.get(&root)
    }

    pub fn held_by(&self, participant: ParticipantId) -> Option<usize> {
        self.by_participant.get(&participant).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &HoldRecord> {
        self.by_piece.values()
    }

    pub fn len(&self) -> usize {
        self.by_piece.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_piece.is_empty()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    /// Held by someone other than `participant`.
    pub fn held_by_other(&self, root: usize, participant: ParticipantId) -> bool {
        self.holder_of(root)
            .is_some_and(|holder| holder != participant)
    }

    /// Whether `participant` would end up holding `piece` if it asked now.
    pub fn would_grant(
        &self,
        graph: &PuzzleGraph,
        participant: ParticipantId,
        piece: usize,
    ) -> Result<bool, SyncError> {
        let root = graph.root(piece)?;
        if graph.piece(root)?.fitted {
            return Ok(false);
        }
        Ok(match self.holder_of(root) {
            None => true,
            Some(holder) => holder == participant || participant < holder,
        })
    }

    pub fn acquire(
        &mut self,
        graph: &PuzzleGraph,
        participant: ParticipantId,
        piece: usize,
        now: u64,
    ) -> Result<AcquireOutcome, SyncError> {
        let root = graph.root(piece)?;
        let root_piece = graph.piece(root)?;
        if root_piece.fitted {
            return Ok(AcquireOutcome::Fitted { piece: root });
        }
        let position = root_piece.position;
        match self.holder_of(root) {
            Some(holder) if holder == participant => {
                self.arm(root, now, None);
                Ok(AcquireOutcome::Refreshed { piece: root })
            }
            Some(holder) if participant < holder => {
                self.remove(root);
                let dropped = self.drop_participant(participant);
                self.insert(participant, root, position, now);
                debug!(
                    "hold displaced (piece={} previous={} holder={})",
                    root, holder, participant
                );
                Ok(AcquireOutcome::Displaced {
                    piece: root,
                    previous: holder,
                    dropped,
                })
            }
            Some(holder) => {
                debug!(
                    "hold rejected: held by lower id (piece={} holder={} requester={})",
                    root, holder, participant
                );
                Ok(AcquireOutcome::Rejected {
                    piece: root,
                    holder,
                })
            }
            None => {
                let dropped = self.drop_participant(participant);
                self.insert(participant, root, position, now);
                Ok(AcquireOutcome::Granted {
                    piece: root,
                    dropped,
                })
            }
        }
    }

    /// Records a holder's drag sample. Returns false when `participant` does
    /// not hold the group.
    pub fn touch(
        &mut self,
        participant: ParticipantId,
        root: usize,
        position: (f32, f32),
        now: u64,
    ) -> bool {
        if self.holder_of(root) != Some(participant) {
            return false;
        }
        self.arm(root, now, Some(position));
        true
    }

    /// Ends the hold and moves the group to `position`, clamped.
    pub fn release(
        &mut self,
        graph: &mut PuzzleGraph,
        participant: ParticipantId,
        piece: usize,
        position: (f32, f32),
    ) -> Result<ReleaseOutcome, SyncError> {
        let root = graph.root(piece)?;
        let holder = self.holder_of(root);
        if holder != Some(participant) {
            return Ok(ReleaseOutcome::NotHolder { root, holder });
        }
        self.remove(root);
        graph.place(root, position)?;
        Ok(ReleaseOutcome::Released { root })
    }

    /// Removes and returns holds whose deadline is at or before `now`.
    pub fn expired(&mut self, now: u64) -> Vec<HoldRecord> {
        let due = self.scheduler.pop_due(now);
        let mut records = Vec::with_capacity(due.len());
        for piece in due {
            if let Some(record) = self.by_piece.remove(&piece) {
                self.by_participant.remove(&record.participant);
                records.push(record);
            }
        }
        records
    }

    /// Drops any hold on `root` without moving it.
    pub fn drop_piece(&mut self, root: usize) -> Option<HoldRecord> {
        self.remove(root)
    }

    pub fn clear(&mut self) {
        self.by_piece.clear();
        self.by_participant.clear();
        self.scheduler.clear();
    }

    fn insert(&mut self, participant: ParticipantId, root: usize, position: (f32, f32), now: u64) {
        let deadline = now.saturating_add(self.timeout_ms);
        self.by_piece.insert(
            root,
            HoldRecord {
                participant,
                piece: root,
                expires_at_ms: deadline,
                last_synced: position,
            },
        );
        self.by_participant.insert(participant, root);
        self.scheduler.schedule(root, deadline);
    }

    fn arm(&mut self, root: usize, now: u64, position: Option<(f32, f32)>) {
        let deadline = now.saturating_add(self.timeout_ms);
        if let Some(record) = self.by_piece.get_mut(&root) {
            self.scheduler.cancel(root, record.expires_at_ms);
            record.expires_at_ms = deadline;
            if let Some(position) = position {
                record.last_synced = position;
            }
            self.scheduler.schedule(root, deadline);
        }
    }

    fn remove(&mut self, root: usize) -> Option<HoldRecord> {
        let record = self.by_piece.remove(&root)?;
        self.scheduler.cancel(root, record.expires_at_ms);
        if self.by_participant.get(&record.participant) == Some(&root) {
            self.by_participant.remove(&record.participant);
        }
        Some(record)
    }

    fn drop_participant(&mut self, participant: ParticipantId) -> Option<usize> {
        let previous = self.held_by(participant)?;
        self.remove(previous);
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::CutSpec;
    use crate::game::GameRules;

    const A: ParticipantId = ParticipantId(7);
    const B: ParticipantId = ParticipantId(3);
    const C: ParticipantId = ParticipantId(9);

    fn graph() -> PuzzleGraph {
        let cut = CutSpec::grid(3, 1, 40.0, 40.0, &GameRules::default());
        PuzzleGraph::with_positions(&cut, &[(0.0, 0.0), (100.0, 0.0), (200.0, 0.0)]).unwrap()
    }

    #[test]
    fn lower_id_displaces_higher_id_rejects() {
        let graph = graph();
        let mut holds = HoldTable::new(10_000);
        assert_eq!(
            holds.acquire(&graph, A, 0, 0).unwrap(),
            AcquireOutcome::Granted { piece: 0, dropped: None }
        );
        assert_eq!(
            holds.acquire(&graph, C, 0, 5).unwrap(),
            AcquireOutcome::Rejected { piece: 0, holder: A }
        );
        assert_eq!(
            holds.acquire(&graph, B, 0, 10).unwrap(),
            AcquireOutcome::Displaced { piece: 0, previous: A, dropped: None }
        );
        assert_eq!(holds.holder_of(0), Some(B));
        assert_eq!(holds.held_by(A), None);
        assert_eq!(holds.next_deadline(), Some(10_010));
    }

    #[test]
    fn acquire_escalates_and_refreshes() {
        let mut graph = graph();
        graph.merge(0, 1).unwrap();
        let mut holds = HoldTable::new(1_000);
        holds.acquire(&graph, A, 1, 0).unwrap();
        assert_eq!(holds.holder_of(0), Some(A));
        assert_eq!(
            holds.acquire(&graph, A, 0, 500).unwrap(),
            AcquireOutcome::Refreshed { piece: 0 }
        );
        assert!(holds.expired(1_000).is_empty());
        assert_eq!(holds.expired(1_500).len(), 1);
        assert!(holds.is_empty());
    }

    #[test]
    fn new_pick_up_drops_previous_hold() {
        let graph = graph();
        let mut holds = HoldTable::new(1_000);
        holds.acquire(&graph, A, 0, 0).unwrap();
        assert_eq!(
            holds.acquire(&graph, A, 2, 0).unwrap(),
            AcquireOutcome::Granted { piece: 2, dropped: Some(0) }
        );
        assert_eq!(holds.holder_of(0), None);
        assert_eq!(holds.len(), 1);
    }

    #[test]
    fn only_holder_releases() {
        let mut graph = graph();
        let mut holds = HoldTable::new(1_000);
        holds.acquire(&graph, A, 2, 0).unwrap();
        assert_eq!(
            holds.release(&mut graph, C, 2, (0.0, 0.0)).unwrap(),
            ReleaseOutcome::NotHolder { root: 2, holder: Some(A) }
        );
        assert_eq!(
            holds.release(&mut graph, A, 2, (50.0, 60.0)).unwrap(),
            ReleaseOutcome::Released { root: 2 }
        );
        assert_eq!(graph.piece(2).unwrap().position, (50.0, 60.0));
        assert!(holds.expired(u64::MAX).is_empty());
    }

    #[test]
    fn fitted_groups_cannot_be_held() {
        let mut graph = graph();
        graph.fit_group(1).unwrap();
        let mut holds = HoldTable::new(1_000);
        assert_eq!(
            holds.acquire(&graph, A, 1, 0).unwrap(),
            AcquireOutcome::Fitted { piece: 1 }
        );
        assert!(!holds.would_grant(&graph, A, 1).unwrap());
    }

    #[test]
    fn touch_refreshes_deadline_and_position() {
        let graph = graph();
        let mut holds = HoldTable::new(1_000);
        holds.acquire(&graph, A, 0, 0).unwrap();
        assert!(!holds.touch(B, 0, (9.0, 9.0), 800));
        assert!(holds.touch(A, 0, (12.0, 4.0), 800));
        assert!(holds.expired(1_000).is_empty());
        let expired = holds.expired(1_800);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].last_synced, (12.0, 4.0));
    }
}
