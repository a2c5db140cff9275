//! Reversible history for board mutations.
//!
//! Every local mutation records a [`HistoryEntry`] describing enough
//! state to play it back in either direction. The stacks never hold
//! snapshots of whole pages (except for the page lifecycle entries,
//! where the page itself is the payload).

use crate::board::Page;
use crate::items::{BoardItem, ItemId, ItemMove, PageId};

/// Default maximum number of undo entries.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Previous lock state of one item, recorded by lock/unlock entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PrevLock {
    pub id: ItemId,
    pub locked: bool,
    pub locked_by: Option<String>,
}

/// One reversible step.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    AddItem {
        page_id: PageId,
        item: BoardItem,
    },
    RemoveItem {
        page_id: PageId,
        index: usize,
        item: BoardItem,
    },
    UpdateItem {
        page_id: PageId,
        prev: BoardItem,
        next: BoardItem,
    },
    /// Lock or unlock a set of items. `locked` is the new state;
    /// `states` holds what each item looked like before.
    SetLocked {
        page_id: PageId,
        states: Vec<PrevLock>,
        locked: bool,
        by: Option<String>,
    },
    /// Unlocked items removed from a page, with their indices so undo
    /// restores the original order.
    ClearPage {
        page_id: PageId,
        removed: Vec<(usize, BoardItem)>,
    },
    /// Batched translation, produced by move commits and alignment.
    MoveItems {
        page_id: PageId,
        moves: Vec<ItemMove>,
    },
    /// Clones inserted by duplicate; undo removes them again.
    Duplicate {
        page_id: PageId,
        clones: Vec<BoardItem>,
    },
    AddPage {
        page: Page,
        index: usize,
    },
    DeletePage {
        page: Page,
        index: usize,
        was_current: usize,
    },
    ReorderPages {
        from: usize,
        to: usize,
    },
    /// Entries recorded between start_batch/end_batch. Undo reverses
    /// the children back-to-front; redo replays them front-to-back.
    Batch(Vec<HistoryEntry>),
}

/// Undo/redo stacks with a FIFO cap and batch collection.
#[derive(Debug)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    cap: usize,
    batch: Option<Vec<HistoryEntry>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_cap(MAX_UNDO_HISTORY)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            cap: cap.max(1),
            batch: None,
        }
    }

    /// Record a new mutation. Redo is invalidated; inside a batch the
    /// entry is collected instead of pushed.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        if let Some(batch) = &mut self.batch {
            batch.push(entry);
            return;
        }
        self.undo.push(entry);
        if self.undo.len() > self.cap {
            // Oldest first out.
            self.undo.remove(0);
        }
    }

    /// Begin collecting mutations into one batch entry. A batch already
    /// in progress keeps collecting.
    pub fn start_batch(&mut self) {
        if self.batch.is_none() {
            self.batch = Some(Vec::new());
        }
    }

    /// Close the current batch. An empty batch pushes nothing.
    pub fn end_batch(&mut self) {
        if let Some(entries) = self.batch.take() {
            if !entries.is_empty() {
                self.push(HistoryEntry::Batch(entries));
            }
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Take the newest undo entry. The caller applies its inverse and
    /// hands it back via [`History::push_redo`].
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// Take the newest redo entry; the caller re-applies it and hands
    /// it back via [`History::push_undo_raw`].
    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// Return an entry to the undo stack without invalidating redo.
    /// Only for redo round-trips.
    pub fn push_undo_raw(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        if self.undo.len() > self.cap {
            self.undo.remove(0);
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.batch = None;
    }

    #[cfg(test)]
    pub(crate) fn peek_undo(&self) -> Option<&HistoryEntry> {
        self.undo.last()
    }
}
