use sift_protocol::Turn;

use crate::error::Result;
use crate::error::SessionErr;
use crate::history::SessionHistory;

/// Cursor over a [`SessionHistory`].
///
/// The cursor is `None` only while the history is empty; otherwise it stays
/// within `0..=latest_index`. The navigator never owns the history, callers
/// pass it in so both can live side by side in the controller.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    cursor: Option<usize>,
    pinned: bool,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current<'a>(&self, history: &'a SessionHistory) -> Result<&'a Turn> {
        match self.cursor {
            Some(idx) => history.get(idx),
            None => Err(SessionErr::EmptyHistory),
        }
    }

    /// Steps back one turn. No-op at the oldest turn.
    pub fn previous(&mut self) -> Option<usize> {
        if let Some(idx) = self.cursor {
            self.cursor = Some(idx.saturating_sub(1));
        }
        self.cursor
    }

    /// Steps forward one turn. No-op at the newest turn.
    pub fn next(&mut self, history: &SessionHistory) -> Option<usize> {
        if let (Some(idx), Some(latest)) = (self.cursor, history.latest_index()) {
            self.cursor = Some((idx + 1).min(latest));
        }
        self.cursor
    }

    /// Out-of-range indices are rejected and leave the cursor where it was.
    pub fn jump_to(&mut self, index: usize, history: &SessionHistory) -> Result<()> {
        history.get(index)?;
        self.cursor = Some(index);
        Ok(())
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Called after every history append.
    pub fn on_append(&mut self, history: &SessionHistory) -> Option<usize> {
        if !self.pinned || self.cursor.is_none() {
            self.cursor = history.latest_index();
        }
        self.cursor
    }

    /// Puts the cursor back at `cursor`, clamped to the current history.
    pub fn restore(&mut self, cursor: Option<usize>, history: &SessionHistory) -> Option<usize> {
        self.cursor = cursor;
        self.clamp(history)
    }

    /// Pulls the cursor back into range after the history shrank.
    pub fn clamp(&mut self, history: &SessionHistory) -> Option<usize> {
        self.cursor = match (self.cursor, history.latest_index()) {
            (_, None) => None,
            (None, Some(latest)) => Some(latest),
            (Some(idx), Some(latest)) => Some(idx.min(latest)),
        };
        self.cursor
    }
}
