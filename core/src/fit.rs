use tracing::info;

use crate::error::SyncError;
use crate::game::{sub, within_tolerance};
use crate::graph::PuzzleGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOutcome {
    pub root: usize,
    pub newly_fitted: usize,
    pub completed: bool,
}

/// Returns the group's root when it sits within tolerance of its board slot.
pub fn find_fit(graph: &PuzzleGraph, piece_id: usize) -> Result<Option<usize>, SyncError> {
    let root = graph.root(piece_id)?;
    if graph.piece(root)?.fitted {
        return Ok(None);
    }
    let current = graph.absolute_position(root)?;
    let target = graph.target_position(root)?;
    if within_tolerance(sub(current, target), graph.permission()) {
        Ok(Some(root))
    } else {
        Ok(None)
    }
}

pub fn try_fit(graph: &mut PuzzleGraph, piece_id: usize) -> Result<Option<FitOutcome>, SyncError> {
    let Some(root) = find_fit(graph, piece_id)? else {
        return Ok(None);
    };
    Ok(Some(apply_fit(graph, root)?))
}

/// Snaps the group onto the board unconditionally. Already fitted groups
/// report zero newly fitted pieces.
pub fn apply_fit(graph: &mut PuzzleGraph, piece_id: usize) -> Result<FitOutcome, SyncError> {
    let root = graph.root(piece_id)?;
    let newly_fitted = graph.fit_group(root)?;
    if newly_fitted > 0 {
        info!(
            "group fitted (root={} pieces={} progress={}/{})",
            root,
            newly_fitted,
            graph.fitted_count(),
            graph.piece_count()
        );
    }
    Ok(FitOutcome {
        root,
        newly_fitted,
        completed: clear_check(graph),
    })
}

pub fn clear_check(graph: &PuzzleGraph) -> bool {
    graph.fitted_count() >= graph.piece_count() && graph.is_complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::CutSpec;
    use crate::game::GameRules;

    fn graph(positions: &[(f32, f32)]) -> PuzzleGraph {
        let mut cut = CutSpec::grid(3, 1, 40.0, 40.0, &GameRules::default());
        cut.permission = 5.0;
        PuzzleGraph::with_positions(&cut, positions).unwrap()
    }

    #[test]
    fn group_six_pixels_off_does_not_fit() {
        let margin = (120.0, 40.0);
        let mut graph = graph(&[(margin.0 + 6.0, margin.1), (300.0, 0.0), (300.0, 80.0)]);
        graph.merge(0, 1).unwrap();
        graph.merge(0, 2).unwrap();
        assert_eq!(try_fit(&mut graph, 2).unwrap(), None);
        assert_eq!(graph.piece(0).unwrap().position, (margin.0 + 6.0, margin.1));
        assert_eq!(graph.fitted_count(), 0);
    }

    #[test]
    fn group_within_tolerance_snaps_exactly() {
        let margin = (120.0, 40.0);
        let mut graph = graph(&[(margin.0 + 4.0, margin.1 - 5.0), (300.0, 0.0), (0.0, 0.0)]);
        graph.merge(0, 1).unwrap();
        let outcome = try_fit(&mut graph, 1).unwrap();
        assert_eq!(
            outcome,
            Some(FitOutcome { root: 0, newly_fitted: 2, completed: false })
        );
        assert_eq!(graph.piece(0).unwrap().position, margin);
        assert_eq!(graph.absolute_position(1).unwrap(), (margin.0 + 40.0, margin.1));
        assert!(graph.piece(1).unwrap().fitted);
    }

    #[test]
    fn last_group_completes_the_puzzle() {
        let margin = (120.0, 40.0);
        let mut graph = graph(&[margin, (margin.0 + 40.0, margin.1), (margin.0 + 81.0, margin.1)]);
        try_fit(&mut graph, 0).unwrap();
        try_fit(&mut graph, 1).unwrap();
        assert!(!clear_check(&graph));
        let last = try_fit(&mut graph, 2).unwrap().unwrap();
        assert!(last.completed);
        assert_eq!(graph.fitted_count(), 3);
        assert_eq!(apply_fit(&mut graph, 2).unwrap().newly_fitted, 0);
    }
}
