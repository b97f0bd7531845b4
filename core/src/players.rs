use std::collections::BTreeMap;
use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::SyncError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub score: u32,
    pub rank: u32,
}

/// Everyone who has joined this puzzle, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    participants: BTreeMap<ParticipantId, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the participant is new.
    pub fn join(&mut self, id: ParticipantId, name: &str) -> bool {
        if let Some(existing) = self.participants.get_mut(&id) {
            existing.name = name.to_string();
            return false;
        }
        self.participants.insert(
            id,
            Participant {
                id,
                name: name.to_string(),
                score: 0,
                rank: 1,
            },
        );
        self.recompute_ranks();
        true
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn require(&self, id: ParticipantId) -> Result<&Participant, SyncError> {
        self.participants
            .get(&id)
            .ok_or(SyncError::UnknownParticipant(id))
    }

    pub fn active_count(&self) -> usize {
        self.participants.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn score_up(&mut self, id: ParticipantId, points: u32) -> Result<u32, SyncError> {
        let participant = self
            .participants
            .get_mut(&id)
            .ok_or(SyncError::UnknownParticipant(id))?;
        participant.score = participant.score.saturating_add(points);
        let score = participant.score;
        self.recompute_ranks();
        Ok(score)
    }

    /// Overwrites a score without re-ranking; callers rank once afterwards.
    pub fn set_score(&mut self, id: ParticipantId, score: u32) -> bool {
        match self.participants.get_mut(&id) {
            Some(participant) => {
                participant.score = score;
                true
            }
            None => false,
        }
    }

    /// Competition ranking: rank is one more than the number of
    /// participants with a strictly higher score.
    pub fn recompute_ranks(&mut self) {
        let mut scores: Vec<u32> = self.participants.values().map(|p| p.score).collect();
        scores.sort_unstable_by(|a, b| b.cmp(a));
        for participant in self.participants.values_mut() {
            let higher = scores.partition_point(|&score| score > participant.score);
            participant.rank = higher as u32 + 1;
        }
    }

    /// Participants ordered by rank, then id.
    pub fn standings(&self) -> Vec<&Participant> {
        let mut list: Vec<&Participant> = self.participants.values().collect();
        list.sort_by(|a, b| a.rank.cmp(&b.rank).then(a.id.cmp(&b.id)));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(ids: &[u64]) -> Roster {
        let mut roster = Roster::new();
        for &id in ids {
            roster.join(ParticipantId(id), &format!("player{id}"));
        }
        roster
    }

    fn ranks(roster: &Roster) -> Vec<(u64, u32)> {
        roster.iter().map(|p| (p.id.0, p.rank)).collect()
    }

    #[test]
    fn ties_share_rank_and_next_score_skips() {
        let mut roster = roster(&[1, 2, 3, 4]);
        roster.score_up(ParticipantId(1), 5).unwrap();
        roster.score_up(ParticipantId(2), 5).unwrap();
        roster.score_up(ParticipantId(3), 2).unwrap();
        assert_eq!(ranks(&roster), vec![(1, 1), (2, 1), (3, 3), (4, 4)]);
    }

    #[test]
    fn newcomer_ranks_with_the_zero_scores() {
        let mut roster = roster(&[1, 2]);
        roster.score_up(ParticipantId(1), 1).unwrap();
        roster.join(ParticipantId(9), "late");
        assert_eq!(roster.get(ParticipantId(9)).unwrap().rank, 2);
        assert_eq!(roster.get(ParticipantId(2)).unwrap().rank, 2);
    }

    #[test]
    fn join_is_idempotent_and_refreshes_name() {
        let mut roster = roster(&[4]);
        roster.score_up(ParticipantId(4), 3).unwrap();
        assert!(!roster.join(ParticipantId(4), "renamed"));
        let p = roster.get(ParticipantId(4)).unwrap();
        assert_eq!(p.name, "renamed");
        assert_eq!(p.score, 3);
        assert_eq!(roster.active_count(), 1);
    }

    #[test]
    fn unknown_participant_cannot_score() {
        let mut roster = roster(&[1]);
        assert_eq!(
            roster.score_up(ParticipantId(2), 1),
            Err(SyncError::UnknownParticipant(ParticipantId(2)))
        );
    }

    #[test]
    fn standings_order_by_rank_then_id() {
        let mut roster = roster(&[5, 3, 8]);
        roster.score_up(ParticipantId(8), 2).unwrap();
        let order: Vec<u64> = roster.standings().iter().map(|p| p.id.0).collect();
        assert_eq!(order, vec![8, 3, 5]);
    }
}
