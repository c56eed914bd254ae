//! Restartable forward cursor over a snapshot of key order.
//!
//! ```text
//!                 rewind()                     advance()
//!   NotStarted ─────────────► Positioned(i) ─────────────► Positioned(j)
//!        │                        │   ▲                         │
//!        │ rewind() on            │   └──── rewind() ───────────┤
//!        │ empty / all dead       │ advance() past last live    │
//!        ▼                        ▼                             ▼
//!    Exhausted ◄──────────────────┴─────────────────────────────┘
//! ```
//!
//! The cursor never looks at values itself. The owning map passes an
//! `is_live` predicate that validates (and prunes) the entry behind a key, so
//! dead entries are skipped and removed while the cursor moves.

/// Position of a map's cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No positional call has been made since creation or `clear`.
    NotStarted,
    /// Positioned on a live key.
    Positioned,
    /// Past the last live key.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    NotStarted,
    At(usize),
    Exhausted,
}

#[derive(Debug, Clone)]
pub(crate) struct Cursor<K> {
    snapshot: Vec<K>,
    position: Position,
}

impl<K> Default for Cursor<K> {
    fn default() -> Self {
        Self {
            snapshot: Vec::new(),
            position: Position::NotStarted,
        }
    }
}

impl<K> Cursor<K> {
    pub(crate) fn state(&self) -> CursorState {
        match self.position {
            Position::NotStarted => CursorState::NotStarted,
            Position::At(_) => CursorState::Positioned,
            Position::Exhausted => CursorState::Exhausted,
        }
    }

    #[inline]
    pub(crate) fn is_started(&self) -> bool {
        self.position != Position::NotStarted
    }

    /// Key under the cursor, if positioned.
    pub(crate) fn key(&self) -> Option<&K> {
        match self.position {
            Position::At(idx) => self.snapshot.get(idx),
            _ => None,
        }
    }

    /// Replaces the snapshot and moves to its first live key.
    pub(crate) fn rewind(&mut self, keys: Vec<K>, is_live: impl FnMut(&K) -> bool) {
        self.snapshot = keys;
        self.seek(0, is_live);
    }

    /// Moves to the next live key after the current one.
    pub(crate) fn advance(&mut self, is_live: impl FnMut(&K) -> bool) {
        match self.position {
            Position::At(idx) => self.seek(idx + 1, is_live),
            Position::NotStarted | Position::Exhausted => {},
        }
    }

    /// Forgets the snapshot and returns to `NotStarted`.
    pub(crate) fn reset(&mut self) {
        self.snapshot.clear();
        self.position = Position::NotStarted;
    }

    fn seek(&mut self, from: usize, mut is_live: impl FnMut(&K) -> bool) {
        let found = self
            .snapshot
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, key)| is_live(key))
            .map(|(idx, _)| idx);
        self.position = match found {
            Some(idx) => Position::At(idx),
            None => {
                self.snapshot.clear();
                Position::Exhausted
            },
        };
    }
}
