use tracing::{debug, info, warn};

use crate::connect::find_connection;
use crate::cut::CutSpec;
use crate::error::SyncError;
use crate::fit::{apply_fit, find_fit};
use crate::game::{add, move_sample_interval, sub, GameRules};
use crate::graph::{MergeOutcome, PuzzleGraph};
use crate::hold::{AcquireOutcome, HoldTable, ReleaseOutcome};
use crate::players::{ParticipantId, Roster};
use crate::protocol::{ClearEntry, Envelope, GameEvent};
use crate::snapshot::{ParticipantView, PieceView, PuzzleStateSnapshot, PuzzleStatus};

/// Everything a replica needs besides the cut. All replicas of one puzzle
/// share `puzzle_id`, `seed` and `rules`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub puzzle_id: u32,
    pub local: ParticipantId,
    pub seed: u32,
    pub rules: GameRules,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Joined {
        participant: ParticipantId,
    },
    HoldChanged {
        piece: usize,
        holder: Option<ParticipantId>,
    },
    /// The local drag was cancelled by someone else's action.
    HoldLost {
        piece: usize,
    },
    HoldExpired {
        piece: usize,
        participant: ParticipantId,
    },
    Merged {
        root: usize,
        absorbed: usize,
        by: ParticipantId,
        local: bool,
    },
    Fitted {
        root: usize,
        pieces: usize,
        by: ParticipantId,
        local: bool,
    },
    Completed {
        last_setter: ParticipantId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub fitted: usize,
    pub count: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LocalDrag {
    root: usize,
    start: (f32, f32),
    position: (f32, f32),
    releasing: bool,
}

/// One participant's replica of a puzzle.
///
/// The graph, holds and roster only change when an envelope is ingested
/// (or a hold expires on `tick`), so replicas fed the same delivery stream
/// stay identical. The local drag is an overlay on top of that state.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    graph: PuzzleGraph,
    holds: HoldTable,
    roster: Roster,
    status: PuzzleStatus,
    finalized: bool,
    last_setter: Option<ParticipantId>,
    clear_raised: bool,
    drag: Option<LocalDrag>,
    move_counter: u32,
    outbox: Vec<Envelope>,
    notices: Vec<SessionNotice>,
    started_at_ms: Option<u64>,
    finished_at_ms: Option<u64>,
}

impl Session {
    pub fn new(config: SessionConfig, cut: &CutSpec) -> Result<Self, SyncError> {
        let rules = config.rules.sanitized();
        let graph = PuzzleGraph::from_cut(cut, config.seed, rules.scatter_spacing)?;
        Ok(Self {
            config: SessionConfig { rules, ..config },
            graph,
            holds: HoldTable::new(rules.hold_timeout_ms),
            roster: Roster::new(),
            status: PuzzleStatus::Playing,
            finalized: false,
            last_setter: None,
            clear_raised: false,
            drag: None,
            move_counter: 0,
            outbox: Vec::new(),
            notices: Vec::new(),
            started_at_ms: None,
            finished_at_ms: None,
        })
    }

    pub fn local(&self) -> ParticipantId {
        self.config.local
    }

    pub fn puzzle_id(&self) -> u32 {
        self.config.puzzle_id
    }

    pub fn rules(&self) -> &GameRules {
        &self.config.rules
    }

    pub fn graph(&self) -> &PuzzleGraph {
        &self.graph
    }

    pub fn holds(&self) -> &HoldTable {
        &self.holds
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn status(&self) -> PuzzleStatus {
        self.status
    }

    pub fn last_setter(&self) -> Option<ParticipantId> {
        self.last_setter
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some_and(|drag| !drag.releasing)
    }

    pub fn dragged_piece(&self) -> Option<usize> {
        self.drag.map(|drag| drag.root)
    }

    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    pub fn drain_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn join_local(&mut self, name: &str) {
        self.raise(GameEvent::Join {
            participant_id: self.config.local,
            name: name.to_string(),
        });
    }

    /// Starts a local drag when the pick-up could be granted. The hold itself
    /// is taken when the PieceDown comes back through the channel.
    pub fn pointer_down(&mut self, piece_id: usize) -> Result<bool, SyncError> {
        let local = self.config.local;
        self.roster.require(local)?;
        if self.status == PuzzleStatus::Clear {
            return Ok(false);
        }
        if !self.holds.would_grant(&self.graph, local, piece_id)? {
            debug!("pick-up refused locally (participant={} piece={})", local, piece_id);
            return Ok(false);
        }
        let root = self.graph.root(piece_id)?;
        let start = self.graph.absolute_position(root)?;
        self.drag = Some(LocalDrag {
            root,
            start,
            position: start,
            releasing: false,
        });
        self.move_counter = 0;
        self.raise(GameEvent::PieceDown {
            piece_id: root as u32,
            participant_id: local,
        });
        Ok(true)
    }

    /// Moves the local drag to its pick-up position plus `delta`, the
    /// pointer offset since it went down. Returns true when the sample was
    /// broadcast.
    pub fn pointer_move(&mut self, delta: (f32, f32)) -> bool {
        let Some(drag) = self.drag.filter(|drag| !drag.releasing) else {
            return false;
        };
        self.pointer_move_to(add(drag.start, delta))
    }

    /// Same as `pointer_move` for hosts that report absolute root positions.
    pub fn pointer_move_to(&mut self, position: (f32, f32)) -> bool {
        let Some(mut drag) = self.drag.filter(|drag| !drag.releasing) else {
            return false;
        };
        drag.position = self.graph.clamp_position(position);
        self.drag = Some(drag);
        self.move_counter = self.move_counter.wrapping_add(1);
        let every = move_sample_interval(self.roster.active_count());
        if self.move_counter % every != 0 {
            return false;
        }
        self.raise(GameEvent::PieceMove {
            piece_id: drag.root as u32,
            participant_id: self.config.local,
            pos: drag.position,
        });
        true
    }

    pub fn pointer_up(&mut self) -> bool {
        let Some(mut drag) = self.drag.filter(|drag| !drag.releasing) else {
            return false;
        };
        drag.releasing = true;
        self.drag = Some(drag);
        self.raise(GameEvent::PieceUp {
            piece_id: drag.root as u32,
            participant_id: self.config.local,
            pos: drag.position,
        });
        true
    }

    /// Applies one delivered envelope. `now_ms` is the delivery timestamp,
    /// which must be the same on every replica.
    pub fn ingest(&mut self, envelope: &Envelope, now_ms: u64) -> Result<(), SyncError> {
        if envelope.puzzle_id != self.config.puzzle_id {
            return Err(SyncError::PuzzleMismatch {
                expected: self.config.puzzle_id,
                found: envelope.puzzle_id,
            });
        }
        self.started_at_ms.get_or_insert(now_ms);
        let event = &envelope.event;
        if let GameEvent::Join {
            participant_id,
            name,
        } = event
        {
            if self.roster.join(*participant_id, name) {
                info!("participant joined (participant={} name={})", participant_id, name);
                self.notices.push(SessionNotice::Joined {
                    participant: *participant_id,
                });
            }
            return Ok(());
        }
        self.roster.require(event.sender())?;
        if self.finalized && !matches!(event, GameEvent::Clear { .. }) {
            debug!("event ignored: puzzle finished (kind={:?})", event.kind());
            return Ok(());
        }
        match event {
            GameEvent::PieceDown {
                piece_id,
                participant_id,
            } => self.on_down(*piece_id as usize, *participant_id, now_ms),
            GameEvent::PieceMove {
                piece_id,
                participant_id,
                pos,
            } => self.on_move(*piece_id as usize, *participant_id, *pos, now_ms),
            GameEvent::PieceUp {
                piece_id,
                participant_id,
                pos,
            } => self.on_up(*piece_id as usize, *participant_id, *pos),
            GameEvent::ConnectPiece {
                owner_piece_id,
                child_piece_id,
                participant_id,
            } => self.on_connect(
                *owner_piece_id as usize,
                *child_piece_id as usize,
                *participant_id,
            ),
            GameEvent::FitPiece {
                piece_id,
                participant_id,
            } => self.on_fit(*piece_id as usize, *participant_id, now_ms),
            GameEvent::Clear {
                participants,
                last_participant_id,
            } => {
                self.on_clear(participants, *last_participant_id, now_ms);
                Ok(())
            }
            GameEvent::Join { .. } => Ok(()),
        }
    }

    /// Releases every hold whose deadline has passed, at its last synced
    /// position. Returns how many holds expired.
    pub fn tick(&mut self, now_ms: u64) -> Result<usize, SyncError> {
        if self.finalized {
            return Ok(0);
        }
        let expired = self.holds.expired(now_ms);
        for record in &expired {
            let root = self.graph.place(record.piece, record.last_synced)?;
            info!(
                "hold expired (participant={} piece={} pos=({:.1}, {:.1}))",
                record.participant, root, record.last_synced.0, record.last_synced.1
            );
            self.notices.push(SessionNotice::HoldExpired {
                piece: root,
                participant: record.participant,
            });
            if record.participant == self.config.local {
                self.cancel_drag(root, false);
                self.decide_after_release(root)?;
            }
        }
        Ok(expired.len())
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.holds.next_deadline()
    }

    pub fn progress(&self) -> Progress {
        let fitted = self.graph.fitted_count();
        let count = self.graph.piece_count();
        let percent = if count == 0 {
            0
        } else {
            ((fitted * 100) / count) as u32
        };
        Progress {
            fitted,
            count,
            percent,
        }
    }

    /// Play time since the first delivery; stops once the puzzle is done.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let Some(started) = self.started_at_ms else {
            return 0;
        };
        self.finished_at_ms.unwrap_or(now_ms).saturating_sub(started)
    }

    pub fn piece_views(&self) -> Vec<PieceView> {
        let local = self.config.local;
        self.graph
            .pieces()
            .iter()
            .map(|piece| {
                let root = piece.owner.unwrap_or(piece.id);
                let position = match self.drag {
                    Some(drag) if drag.root == root => {
                        let anchor = self.graph.pieces()[root].answer_offset;
                        add(drag.position, sub(piece.answer_offset, anchor))
                    }
                    _ => self
                        .graph
                        .absolute_position(piece.id)
                        .unwrap_or(piece.position),
                };
                PieceView {
                    id: piece.id,
                    position,
                    fitted: piece.fitted,
                    held_by_other: self.holds.held_by_other(root, local),
                }
            })
            .collect()
    }

    pub fn participant_views(&self) -> Vec<ParticipantView> {
        self.roster
            .standings()
            .into_iter()
            .map(|p| ParticipantView {
                id: p.id,
                name: p.name.clone(),
                score: p.score,
                rank: p.rank,
                holding: self.holds.held_by(p.id),
            })
            .collect()
    }

    pub fn snapshot(&self) -> PuzzleStateSnapshot {
        PuzzleStateSnapshot::capture(
            self.config.puzzle_id,
            self.status,
            &self.graph,
            &self.holds,
            &self.roster,
            self.last_setter,
        )
    }

    fn on_down(&mut self, piece_id: usize, participant: ParticipantId, now: u64) -> Result<(), SyncError> {
        let local = self.config.local;
        let outcome = self.holds.acquire(&self.graph, participant, piece_id, now)?;
        match outcome {
            AcquireOutcome::Granted { piece, dropped } => {
                if let Some(dropped) = dropped {
                    self.released_for_new_hold(dropped, participant);
                }
                self.notices.push(SessionNotice::HoldChanged { piece, holder: Some(participant) });
            }
            AcquireOutcome::Displaced { piece, previous, dropped } => {
                if let Some(dropped) = dropped {
                    self.released_for_new_hold(dropped, participant);
                }
                if previous == local {
                    self.cancel_drag(piece, true);
                }
                self.notices.push(SessionNotice::HoldChanged { piece, holder: Some(participant) });
            }
            AcquireOutcome::Refreshed { .. } => {}
            AcquireOutcome::Rejected { piece, .. } | AcquireOutcome::Fitted { piece } => {
                if participant == local {
                    self.cancel_drag(piece, true);
                }
                return Ok(());
            }
        }
        if participant == local {
            let root = self.graph.root(piece_id)?;
            match self.drag {
                Some(drag) if drag.root == root => {}
                _ => {
                    // The drag that asked for this group is gone; hand it back.
                    let pos = self.graph.absolute_position(root)?;
                    self.raise(GameEvent::PieceUp {
                        piece_id: root as u32,
                        participant_id: local,
                        pos,
                    });
                }
            }
        }
        Ok(())
    }

    fn on_move(
        &mut self,
        piece_id: usize,
        participant: ParticipantId,
        pos: (f32, f32),
        now: u64,
    ) -> Result<(), SyncError> {
        let root = self.graph.root(piece_id)?;
        if self.holds.holder_of(root) != Some(participant) {
            debug!("move ignored: not holder (participant={} piece={})", participant, root);
            return Ok(());
        }
        self.graph.place(root, pos)?;
        let synced = self.graph.absolute_position(root)?;
        self.holds.touch(participant, root, synced, now);
        Ok(())
    }

    fn on_up(&mut self, piece_id: usize, participant: ParticipantId, pos: (f32, f32)) -> Result<(), SyncError> {
        let local = self.config.local;
        let root = self.graph.root(piece_id)?;
        // A drag that is not releasing is a re-grab made before this arrived.
        if participant == local && self.drag.is_some_and(|drag| drag.root == root && drag.releasing) {
            self.drag = None;
        }
        match self.holds.release(&mut self.graph, participant, root, pos)? {
            ReleaseOutcome::Released { root } => {
                self.notices.push(SessionNotice::HoldChanged { piece: root, holder: None });
                if participant == local {
                    self.decide_after_release(root)?;
                }
            }
            ReleaseOutcome::NotHolder { root, holder } => {
                debug!(
                    "release ignored: not holder (participant={} piece={} holder={:?})",
                    participant, root, holder
                );
            }
        }
        Ok(())
    }

    fn on_connect(&mut self, owner: usize, child: usize, participant: ParticipantId) -> Result<(), SyncError> {
        let owner_root = self.graph.root(owner)?;
        let child_root = self.graph.root(child)?;
        if self.graph.piece(owner_root)?.fitted || self.graph.piece(child_root)?.fitted {
            debug!(
                "connect ignored: group already fitted (owner={} child={})",
                owner, child
            );
            return Ok(());
        }
        let MergeOutcome::Merged { root, absorbed } = self.graph.merge(owner_root, child_root)? else {
            return Ok(());
        };
        info!("pieces merged (root={} absorbed={} by={})", root, absorbed, participant);
        self.drop_hold(absorbed);
        self.roster.score_up(participant, 1)?;
        self.notices.push(SessionNotice::Merged {
            root,
            absorbed,
            by: participant,
            local: participant == self.config.local,
        });
        Ok(())
    }

    fn on_fit(&mut self, piece_id: usize, participant: ParticipantId, now: u64) -> Result<(), SyncError> {
        let outcome = apply_fit(&mut self.graph, piece_id)?;
        if outcome.newly_fitted == 0 {
            return Ok(());
        }
        self.drop_hold(outcome.root);
        self.roster.score_up(participant, outcome.newly_fitted as u32)?;
        self.notices.push(SessionNotice::Fitted {
            root: outcome.root,
            pieces: outcome.newly_fitted,
            by: participant,
            local: participant == self.config.local,
        });
        if outcome.completed && self.status == PuzzleStatus::Playing {
            self.status = PuzzleStatus::Clear;
            self.last_setter = Some(participant);
            self.finished_at_ms = Some(now);
            info!("puzzle complete (last={} pieces={})", participant, self.graph.piece_count());
            self.notices.push(SessionNotice::Completed { last_setter: participant });
            if participant == self.config.local && !self.clear_raised {
                self.clear_raised = true;
                let participants = self
                    .roster
                    .iter()
                    .map(|p| ClearEntry {
                        participant_id: p.id,
                        score: p.score,
                    })
                    .collect();
                self.raise(GameEvent::Clear {
                    participants,
                    last_participant_id: participant,
                });
            }
        }
        Ok(())
    }

    fn on_clear(&mut self, participants: &[ClearEntry], last: ParticipantId, now: u64) {
        if self.finalized {
            return;
        }
        for entry in participants {
            match self.roster.get(entry.participant_id).map(|p| p.score) {
                Some(score) if score != entry.score => {
                    warn!(
                        "clear score differs (participant={} local={} clear={})",
                        entry.participant_id, score, entry.score
                    );
                }
                None => {
                    warn!("clear names unknown participant (participant={})", entry.participant_id);
                }
                _ => {}
            }
            self.roster.set_score(entry.participant_id, entry.score);
        }
        self.roster.recompute_ranks();
        let frozen = self.graph.freeze_all();
        if frozen > 0 {
            info!("clear froze unfitted pieces (count={})", frozen);
        }
        self.holds.clear();
        self.drag = None;
        self.finalized = true;
        if self.status == PuzzleStatus::Playing {
            self.status = PuzzleStatus::Clear;
            self.finished_at_ms = Some(now);
            self.notices.push(SessionNotice::Completed { last_setter: last });
        }
        self.last_setter = Some(last);
    }

    /// Runs both resolvers for a group the local participant just let go of.
    fn decide_after_release(&mut self, root: usize) -> Result<(), SyncError> {
        let local = self.config.local;
        if let Some(candidate) = find_connection(&self.graph, &self.holds, root, local)? {
            self.raise(GameEvent::ConnectPiece {
                owner_piece_id: candidate.owner as u32,
                child_piece_id: candidate.child as u32,
                participant_id: local,
            });
        }
        if let Some(fit_root) = find_fit(&self.graph, root)? {
            self.raise(GameEvent::FitPiece {
                piece_id: fit_root as u32,
                participant_id: local,
            });
        }
        Ok(())
    }

    fn drop_hold(&mut self, root: usize) {
        if let Some(record) = self.holds.drop_piece(root) {
            self.notices.push(SessionNotice::HoldChanged { piece: root, holder: None });
            if record.participant == self.config.local {
                self.cancel_drag(root, true);
            }
        }
        if self.drag.is_some_and(|drag| drag.root == root) {
            self.cancel_drag(root, true);
        }
    }

    fn released_for_new_hold(&mut self, dropped: usize, participant: ParticipantId) {
        self.notices.push(SessionNotice::HoldChanged { piece: dropped, holder: None });
        if participant == self.config.local {
            self.cancel_drag(dropped, false);
        }
    }

    fn cancel_drag(&mut self, root: usize, notify: bool) {
        if self.drag.is_some_and(|drag| drag.root == root) {
            self.drag = None;
            if notify {
                self.notices.push(SessionNotice::HoldLost { piece: root });
            }
        }
    }

    fn raise(&mut self, event: GameEvent) {
        self.outbox.push(Envelope {
            puzzle_id: self.config.puzzle_id,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: ParticipantId = ParticipantId(5);
    const OTHER: ParticipantId = ParticipantId(2);

    fn session(local: ParticipantId) -> Session {
        let cut = CutSpec::grid(2, 1, 40.0, 40.0, &GameRules::default());
        Session::new(
            SessionConfig {
                puzzle_id: 1,
                local,
                seed: 9,
                rules: GameRules::default(),
            },
            &cut,
        )
        .unwrap()
    }

    fn feed_own(session: &mut Session, now: u64) {
        for envelope in session.drain_outbox() {
            session.ingest(&envelope, now).unwrap();
        }
    }

    fn joined(local: ParticipantId) -> Session {
        let mut session = session(local);
        session.join_local("me");
        feed_own(&mut session, 0);
        session
    }

    #[test]
    fn wrong_puzzle_is_rejected() {
        let mut session = session(ME);
        let envelope = Envelope {
            puzzle_id: 2,
            event: GameEvent::Join { participant_id: ME, name: "x".into() },
        };
        assert_eq!(
            session.ingest(&envelope, 0),
            Err(SyncError::PuzzleMismatch { expected: 1, found: 2 })
        );
    }

    #[test]
    fn events_from_strangers_are_faults() {
        let mut session = joined(ME);
        let envelope = Envelope {
            puzzle_id: 1,
            event: GameEvent::PieceDown { piece_id: 0, participant_id: OTHER },
        };
        assert_eq!(
            session.ingest(&envelope, 0),
            Err(SyncError::UnknownParticipant(OTHER))
        );
    }

    #[test]
    fn unknown_piece_is_a_fault() {
        let mut session = joined(ME);
        let envelope = Envelope {
            puzzle_id: 1,
            event: GameEvent::FitPiece { piece_id: 40, participant_id: ME },
        };
        assert_eq!(
            session.ingest(&envelope, 0),
            Err(SyncError::UnknownPiece { piece_id: 40, count: 2 })
        );
    }

    #[test]
    fn pick_up_is_confirmed_on_delivery() {
        let mut session = joined(ME);
        assert!(session.pointer_down(1).unwrap());
        assert_eq!(session.holds().holder_of(1), None);
        feed_own(&mut session, 10);
        assert_eq!(session.holds().holder_of(1), Some(ME));
        assert!(session.is_dragging());
    }

    #[test]
    fn move_sampling_broadcasts_every_second_sample_when_alone() {
        let mut session = joined(ME);
        session.pointer_down(0).unwrap();
        feed_own(&mut session, 0);
        let sent: Vec<bool> = (0..4).map(|_| session.pointer_move((1.0, 0.0))).collect();
        assert_eq!(sent, vec![false, true, false, true]);
        assert_eq!(session.drain_outbox().len(), 2);
    }

    #[test]
    fn drag_overlay_moves_the_local_view_only() {
        let mut session = joined(ME);
        session.pointer_down(0).unwrap();
        feed_own(&mut session, 0);
        let before = session.graph().absolute_position(0).unwrap();
        session.pointer_move((3.0, 0.0));
        let view = session.piece_views()[0];
        assert_eq!(view.position, session.graph().clamp_position((before.0 + 3.0, before.1)));
        assert_eq!(session.graph().absolute_position(0).unwrap(), before);
        assert!(!view.held_by_other);
    }

    #[test]
    fn release_lands_at_the_dragged_position() {
        let mut session = joined(ME);
        session.pointer_down(0).unwrap();
        feed_own(&mut session, 0);
        let start = session.graph().absolute_position(0).unwrap();
        session.pointer_move((-2.0, -2.0));
        assert!(session.pointer_up());
        feed_own(&mut session, 20);
        let expected = session.graph().clamp_position((start.0 - 2.0, start.1 - 2.0));
        assert_eq!(session.graph().absolute_position(0).unwrap(), expected);
        assert_eq!(session.holds().holder_of(0), None);
        assert_eq!(session.dragged_piece(), None);
    }

    #[test]
    fn pointer_offsets_are_measured_from_the_pick_up_point() {
        let mut session = joined(ME);
        session.pointer_down(0).unwrap();
        feed_own(&mut session, 0);
        let start = session.graph().absolute_position(0).unwrap();
        for _ in 0..3 {
            session.pointer_move((0.0, 7.0));
        }
        assert!(session.pointer_up());
        feed_own(&mut session, 10);
        let expected = session.graph().clamp_position((start.0, start.1 + 7.0));
        assert_eq!(session.graph().absolute_position(0).unwrap(), expected);
    }

    #[test]
    fn regrab_before_release_arrives_keeps_the_new_drag() {
        let mut session = joined(ME);
        session.pointer_down(0).unwrap();
        feed_own(&mut session, 0);
        assert!(session.pointer_up());
        assert!(session.pointer_down(0).unwrap());
        feed_own(&mut session, 10);

        assert!(session.is_dragging());
        assert_eq!(session.dragged_piece(), Some(0));
        assert_eq!(session.holds().holder_of(0), Some(ME));
        let handed_back = session
            .drain_outbox()
            .into_iter()
            .any(|envelope| matches!(envelope.event, GameEvent::PieceUp { .. }));
        assert!(!handed_back);
        assert!(!session
            .drain_notices()
            .iter()
            .any(|notice| matches!(notice, SessionNotice::HoldLost { .. })));
    }

    #[test]
    fn progress_and_stopwatch() {
        let mut session = joined(ME);
        assert_eq!(session.progress(), Progress { fitted: 0, count: 2, percent: 0 });
        let fit = Envelope {
            puzzle_id: 1,
            event: GameEvent::FitPiece { piece_id: 0, participant_id: ME },
        };
        session.ingest(&fit, 500).unwrap();
        assert_eq!(session.progress().percent, 50);
        assert_eq!(session.elapsed_ms(800), 800);
        let fit_last = Envelope {
            puzzle_id: 1,
            event: GameEvent::FitPiece { piece_id: 1, participant_id: ME },
        };
        session.ingest(&fit_last, 1_000).unwrap();
        assert_eq!(session.status(), PuzzleStatus::Clear);
        assert_eq!(session.elapsed_ms(5_000), 1_000);
        assert_eq!(session.progress().percent, 100);
    }
}
