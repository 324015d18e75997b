use sift_protocol::Turn;
use sift_protocol::TurnId;
use tracing::debug;

use crate::error::Result;
use crate::error::SessionErr;

/// Ordered record of the turns of one session.
///
/// Holds any number of sealed turns plus at most one in-flight turn. Indices
/// are stable: nothing is ever removed except the in-flight placeholder of a
/// cancelled submission.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    /// The oldest turns are at the beginning of the vector.
    turns: Vec<Turn>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Upserts `turn` and returns the index it occupies.
    ///
    /// An entry with the same id is always replaced in place. Failing that,
    /// an in-flight entry with the same query is. Sealed entries of other
    /// turns are never overwritten, so asking the same question twice yields
    /// two turns.
    pub fn append(&mut self, turn: Turn) -> usize {
        if let Some(idx) = self.find_existing(&turn) {
            debug!(turn_id = %turn.id(), index = idx, status = %turn.status, "replacing turn in history");
            self.turns[idx] = turn;
            return idx;
        }
        self.turns.push(turn);
        let idx = self.turns.len() - 1;
        debug!(turn_id = %self.turns[idx].id(), index = idx, "appended turn to history");
        idx
    }

    fn find_existing(&self, turn: &Turn) -> Option<usize> {
        self.index_of(turn.id()).or_else(|| {
            self.turns
                .iter()
                .position(|existing| existing.is_in_flight() && existing.query() == turn.query())
        })
    }

    /// Index of the turn with `id`.
    pub fn index_of(&self, id: TurnId) -> Option<usize> {
        self.turns.iter().position(|turn| turn.id() == id)
    }

    pub fn get(&self, index: usize) -> Result<&Turn> {
        self.turns.get(index).ok_or(SessionErr::IndexOutOfRange {
            index,
            len: self.turns.len(),
        })
    }

    /// Index of the newest turn; `None` while the history is empty.
    pub fn latest_index(&self) -> Option<usize> {
        self.turns.len().checked_sub(1)
    }

    /// Drops the in-flight entry with `id`. Sealed turns are left alone.
    pub fn remove_in_flight(&mut self, id: TurnId) -> Option<Turn> {
        let idx = self
            .turns
            .iter()
            .position(|turn| turn.id() == id && turn.is_in_flight())?;
        Some(self.turns.remove(idx))
    }

    /// The in-flight turn, if any.
    pub fn in_flight(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| turn.is_in_flight())
    }

    /// Returns a clone of every turn, oldest first.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl<'a> IntoIterator for &'a SessionHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
