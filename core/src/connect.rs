use tracing::info;

use crate::error::SyncError;
use crate::game::{sub, within_tolerance};
use crate::graph::{MergeOutcome, PuzzleGraph};
use crate::hold::HoldTable;
use crate::players::ParticipantId;

/// A pair of groups the releaser decided should merge. Both ids are roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCandidate {
    pub owner: usize,
    pub child: usize,
}

/// Looks for the first neighboring group the released group lines up with.
///
/// The released group's root is scanned first, then its children in order;
/// for each scanned piece its neighbors are tried in list order.
pub fn find_connection(
    graph: &PuzzleGraph,
    holds: &HoldTable,
    released: usize,
    releaser: ParticipantId,
) -> Result<Option<MergeCandidate>, SyncError> {
    let root = graph.root(released)?;
    let permission = graph.permission();
    for scanned in graph.group_members(root) {
        let scanned_piece = graph.piece(scanned)?;
        let scanned_pos = graph.absolute_position(scanned)?;
        for &candidate in &scanned_piece.neighbor_ids {
            let owner = root;
            let child = graph.root(candidate)?;
            if owner == child {
                continue;
            }
            if holds.held_by_other(owner, releaser) || holds.held_by_other(child, releaser) {
                continue;
            }
            if graph.piece(owner)?.fitted || graph.piece(child)?.fitted {
                continue;
            }
            let candidate_piece = graph.piece(candidate)?;
            let expected = sub(candidate_piece.answer_offset, scanned_piece.answer_offset);
            let actual = sub(graph.absolute_position(candidate)?, scanned_pos);
            if within_tolerance(sub(actual, expected), permission) {
                return Ok(Some(MergeCandidate { owner, child }));
            }
        }
    }
    Ok(None)
}

/// Finds and performs at most one merge for a release.
pub fn try_connect(
    graph: &mut PuzzleGraph,
    holds: &HoldTable,
    released: usize,
    releaser: ParticipantId,
) -> Result<Option<MergeCandidate>, SyncError> {
    let Some(candidate) = find_connection(graph, holds, released, releaser)? else {
        return Ok(None);
    };
    match graph.merge(candidate.owner, candidate.child)? {
        MergeOutcome::Merged { root, absorbed } => {
            info!("pieces merged (root={} absorbed={} by={})", root, absorbed, releaser);
            Ok(Some(candidate))
        }
        MergeOutcome::AlreadyMerged => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::CutSpec;

    const P: ParticipantId = ParticipantId(1);
    const Q: ParticipantId = ParticipantId(2);

    fn pair(p1: (f32, f32)) -> PuzzleGraph {
        let cut = CutSpec {
            piece_size: (40.0, 40.0),
            image_size: (80.0, 40.0),
            answer_offsets: vec![(0.0, 0.0), (40.0, 0.0)],
            neighbor_ids: vec![vec![1], vec![0]],
            permission: 5.0,
            board_margin: (80.0, 40.0),
        };
        PuzzleGraph::with_positions(&cut, &[(0.0, 0.0), p1]).unwrap()
    }

    #[test]
    fn release_within_tolerance_merges() {
        let mut graph = pair((39.0, 1.0));
        let holds = HoldTable::new(10_000);
        let merged = try_connect(&mut graph, &holds, 1, P).unwrap();
        assert_eq!(merged, Some(MergeCandidate { owner: 1, child: 0 }));
        assert_eq!(graph.root(0).unwrap(), 1);
        assert_eq!(graph.absolute_position(0).unwrap(), (-1.0, 1.0));
    }

    #[test]
    fn scanning_from_the_anchor_keeps_it_as_root() {
        let mut graph = pair((39.0, 1.0));
        let holds = HoldTable::new(10_000);
        let merged = try_connect(&mut graph, &holds, 0, P).unwrap();
        assert_eq!(merged, Some(MergeCandidate { owner: 0, child: 1 }));
        assert_eq!(graph.piece(0).unwrap().children, vec![1]);
        assert_eq!(graph.absolute_position(1).unwrap(), (40.0, 0.0));
    }

    #[test]
    fn just_outside_tolerance_does_not_merge() {
        let mut graph = pair((46.0, 0.0));
        let holds = HoldTable::new(10_000);
        assert_eq!(try_connect(&mut graph, &holds, 1, P).unwrap(), None);
        assert!(graph.piece(1).unwrap().is_root());
    }

    #[test]
    fn neighbor_held_by_someone_else_is_skipped() {
        let graph = pair((40.0, 0.0));
        let mut holds = HoldTable::new(10_000);
        holds.acquire(&graph, Q, 0, 0).unwrap();
        assert_eq!(find_connection(&graph, &holds, 1, P).unwrap(), None);
        assert!(find_connection(&graph, &holds, 1, Q).unwrap().is_some());
    }

    #[test]
    fn fitted_neighbor_is_skipped() {
        let mut graph = pair((40.0, 0.0));
        graph.fit_group(0).unwrap();
        let margin = graph.board_margin();
        graph.translate(1, (margin.0 + 40.0, margin.1)).unwrap();
        let holds = HoldTable::new(10_000);
        assert_eq!(find_connection(&graph, &holds, 1, P).unwrap(), None);
    }

    #[test]
    fn children_are_scanned_after_the_root() {
        let cut = CutSpec::grid(3, 1, 40.0, 40.0, &crate::game::GameRules::default());
        let mut graph =
            PuzzleGraph::with_positions(&cut, &[(10.0, 10.0), (50.0, 10.0), (91.0, 12.0)]).unwrap();
        graph.merge(0, 1).unwrap();
        let holds = HoldTable::new(10_000);
        let found = find_connection(&graph, &holds, 0, P).unwrap();
        assert_eq!(found, Some(MergeCandidate { owner: 0, child: 2 }));
    }
}
