//! The board document: pages of items, local mutations that record
//! history, and remote handlers that never do.
//!
//! Lock rules: a locked item ignores local delete/update/move until it
//! is unlocked. Remote handlers apply server state as-is (last writer
//! wins at these entry points) and look pages up by id, so a message
//! for a page that no longer exists is a silent no-op.

use kurbo::{Rect, Vec2};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{History, HistoryEntry, PrevLock};
use crate::items::{
    BoardItem, ItemId, ItemMove, ItemPatch, PageId, SerializableColor, StickyPatch,
    clamp_sticky_text,
};
use crate::selection::{HandleKind, Selection};

/// Hard ceiling on the number of pages in one board.
pub const MAX_PAGES: usize = 200;

/// Offset applied to duplicated items.
const DUPLICATE_OFFSET: f64 = 20.0;

/// One page of the board. Items are kept in z-order, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub items: Vec<BoardItem>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            items: Vec::new(),
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&BoardItem> {
        self.items.iter().find(|i| i.id() == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut BoardItem> {
        self.items.iter_mut().find(|i| i.id() == id)
    }

    pub fn item_index(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id() == id)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

/// Ids removed by `delete_selected`, partitioned by item kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletedIds {
    pub strokes: Vec<ItemId>,
    pub shapes: Vec<ItemId>,
    pub texts: Vec<ItemId>,
    pub stickies: Vec<ItemId>,
    pub images: Vec<ItemId>,
}

impl DeletedIds {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
            && self.shapes.is_empty()
            && self.texts.is_empty()
            && self.stickies.is_empty()
            && self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
            + self.shapes.len()
            + self.texts.len()
            + self.stickies.len()
            + self.images.len()
    }
}

enum Direction {
    Undo,
    Redo,
}

/// Board state and the operations that mutate it.
#[derive(Debug)]
pub struct Board {
    pages: Vec<Page>,
    current: usize,
    history: History,
    pub selection: Selection,
    lww_overwrites: u64,
}

impl Board {
    pub fn new() -> Self {
        Self {
            pages: vec![Page::new()],
            current: 0,
            history: History::new(),
            selection: Selection::new(),
            lww_overwrites: 0,
        }
    }

    // ── Pages ───────────────────────────────────────────────────────

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &Page {
        &self.pages[self.current]
    }

    pub fn current_page_id(&self) -> PageId {
        self.pages[self.current].id
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    fn page_index(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    /// Switch to another page. The selection is scoped to the current
    /// page, so switching clears it.
    pub fn set_current_page(&mut self, index: usize) {
        let index = index.min(self.pages.len() - 1);
        if index != self.current {
            self.selection.deselect_all();
        }
        self.current = index;
    }

    /// Append a page and switch to it. Refused at the page cap.
    pub fn add_page(&mut self) -> Option<PageId> {
        if self.pages.len() >= MAX_PAGES {
            warn!("page cap reached ({MAX_PAGES}), add_page refused");
            return None;
        }
        let page = Page::new();
        let id = page.id;
        let index = self.pages.len();
        self.pages.push(page.clone());
        self.current = index;
        self.selection.deselect_all();
        self.history.push(HistoryEntry::AddPage { page, index });
        Some(id)
    }

    /// Delete a page. The last remaining page cannot be deleted.
    pub fn delete_page(&mut self, index: usize) -> bool {
        if self.pages.len() <= 1 || index >= self.pages.len() {
            return false;
        }
        let page = self.pages.remove(index);
        let was_current = self.current;
        if self.current >= self.pages.len() {
            self.current = self.pages.len() - 1;
        }
        self.selection.deselect_all();
        self.history.push(HistoryEntry::DeletePage {
            page,
            index,
            was_current,
        });
        true
    }

    /// Move a page from one position to another.
    pub fn reorder_pages(&mut self, from: usize, to: usize) -> bool {
        if from == to || from >= self.pages.len() || to >= self.pages.len() {
            return false;
        }
        let page = self.pages.remove(from);
        self.pages.insert(to, page);
        self.current = shift_index(self.current, from, to);
        self.history.push(HistoryEntry::ReorderPages { from, to });
        true
    }

    // ── Item mutations (history-recording) ──────────────────────────

    /// Add an item to the current page.
    pub fn add_item(&mut self, item: BoardItem) -> ItemId {
        let id = item.id();
        let page_id = self.current_page_id();
        self.pages[self.current].items.push(item.clone());
        self.history.push(HistoryEntry::AddItem { page_id, item });
        id
    }

    /// Delete an item from the current page. Locked or missing items
    /// are a silent no-op.
    pub fn delete_item(&mut self, id: ItemId) -> bool {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let Some(index) = page.item_index(id) else {
            return false;
        };
        if page.items[index].is_locked() {
            debug!("delete on locked item {id} ignored");
            return false;
        }
        let item = page.items.remove(index);
        self.selection.remove_id(id);
        self.history.push(HistoryEntry::RemoveItem {
            page_id,
            index,
            item,
        });
        true
    }

    /// Patch an item on the current page. Locked items, kind
    /// mismatches and patches that change nothing are all silent
    /// no-ops that record no history.
    pub fn update_item(&mut self, id: ItemId, patch: &ItemPatch) -> bool {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let Some(item) = page.item_mut(id) else {
            return false;
        };
        if item.is_locked() {
            debug!("update on locked item {id} ignored");
            return false;
        }
        let prev = item.clone();
        if !item.apply_patch(patch) {
            return false;
        }
        if *item == prev {
            return false;
        }
        let next = item.clone();
        self.history
            .push(HistoryEntry::UpdateItem { page_id, prev, next });
        true
    }

    /// Replace a sticky note's text (clamped to 500 chars). Unchanged
    /// text records nothing.
    pub fn update_sticky_text(&mut self, id: ItemId, text: &str) -> bool {
        self.update_item(
            id,
            &ItemPatch::Sticky(StickyPatch {
                text: Some(text.to_string()),
                ..Default::default()
            }),
        )
    }

    /// Restyle a sticky note. Font size is clamped to 10..=32.
    pub fn update_sticky_style(
        &mut self,
        id: ItemId,
        fill: Option<SerializableColor>,
        font_size: Option<f64>,
    ) -> bool {
        self.update_item(
            id,
            &ItemPatch::Sticky(StickyPatch {
                fill,
                font_size,
                ..Default::default()
            }),
        )
    }

    /// Lock items on the current page for `by`. Already-locked items
    /// are skipped. Locking clears the selection.
    pub fn lock_items(&mut self, ids: &[ItemId], by: &str) -> usize {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let mut states = Vec::new();
        for &id in ids {
            let Some(item) = page.item_mut(id) else {
                continue;
            };
            if item.is_locked() {
                continue;
            }
            states.push(PrevLock {
                id,
                locked: false,
                locked_by: None,
            });
            item.set_locked(true, Some(by.to_string()));
        }
        let count = states.len();
        if count > 0 {
            self.selection.deselect_all();
            self.history.push(HistoryEntry::SetLocked {
                page_id,
                states,
                locked: true,
                by: Some(by.to_string()),
            });
        }
        count
    }

    /// Unlock items on the current page. Unlocked items are skipped.
    pub fn unlock_items(&mut self, ids: &[ItemId]) -> usize {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let mut states = Vec::new();
        for &id in ids {
            let Some(item) = page.item_mut(id) else {
                continue;
            };
            if !item.is_locked() {
                continue;
            }
            states.push(PrevLock {
                id,
                locked: true,
                locked_by: item.locked_by().map(str::to_string),
            });
            item.set_locked(false, None);
        }
        let count = states.len();
        if count > 0 {
            self.history.push(HistoryEntry::SetLocked {
                page_id,
                states,
                locked: false,
                by: None,
            });
        }
        count
    }

    /// Remove every unlocked item from the current page. Locked items
    /// survive. Returns the number removed.
    pub fn clear_page(&mut self) -> usize {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(page.items.len());
        for (index, item) in page.items.drain(..).enumerate() {
            if item.is_locked() {
                kept.push(item);
            } else {
                removed.push((index, item));
            }
        }
        page.items = kept;
        let count = removed.len();
        if count > 0 {
            self.selection.deselect_all();
            self.history.push(HistoryEntry::ClearPage { page_id, removed });
        }
        count
    }

    /// Apply a batch of translations as one history entry. Zero
    /// deltas, locked items and unknown ids are filtered out.
    pub fn apply_align(&mut self, moves: &[ItemMove]) -> bool {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let mut applied = Vec::new();
        for mv in moves {
            if mv.dx == 0.0 && mv.dy == 0.0 {
                continue;
            }
            let Some(item) = page.item_mut(mv.id) else {
                continue;
            };
            if item.is_locked() {
                continue;
            }
            item.translate(Vec2::new(mv.dx, mv.dy));
            applied.push(*mv);
        }
        if applied.is_empty() {
            return false;
        }
        self.history.push(HistoryEntry::MoveItems {
            page_id,
            moves: applied,
        });
        true
    }

    /// Translate the unlocked part of the selection.
    pub fn move_selected(&mut self, dx: f64, dy: f64) -> bool {
        let moves = self
            .selection
            .move_updates(&self.pages[self.current], dx, dy);
        self.apply_align(&moves)
    }

    /// Clone the unlocked part of the selection with a 20px offset and
    /// fresh ids. The clones become the new selection.
    pub fn duplicate_selected(&mut self) -> Vec<ItemId> {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let mut clones = Vec::new();
        for item in &page.items {
            if !self.selection.contains(item.id()) || item.is_locked() {
                continue;
            }
            let mut clone = item.clone();
            clone.set_id(Uuid::new_v4());
            clone.set_locked(false, None);
            clone.translate(Vec2::new(DUPLICATE_OFFSET, DUPLICATE_OFFSET));
            clones.push(clone);
        }
        if clones.is_empty() {
            return Vec::new();
        }
        let new_ids: Vec<ItemId> = clones.iter().map(|c| c.id()).collect();
        page.items.extend(clones.iter().cloned());
        self.selection.set_ids(new_ids.clone());
        self.history
            .push(HistoryEntry::Duplicate { page_id, clones });
        new_ids
    }

    /// Delete the unlocked part of the selection as one batch. Returns
    /// the removed ids partitioned by kind.
    pub fn delete_selected(&mut self) -> DeletedIds {
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let ids: Vec<ItemId> = page
            .items
            .iter()
            .filter(|i| self.selection.contains(i.id()) && !i.is_locked())
            .map(|i| i.id())
            .collect();

        let mut deleted = DeletedIds::default();
        let mut entries = Vec::new();
        for id in ids {
            let Some(index) = page.item_index(id) else {
                continue;
            };
            let item = page.items.remove(index);
            match &item {
                BoardItem::Stroke(_) => deleted.strokes.push(id),
                BoardItem::Shape(_) => deleted.shapes.push(id),
                BoardItem::Text(_) => deleted.texts.push(id),
                BoardItem::Sticky(_) => deleted.stickies.push(id),
                BoardItem::Image(_) => deleted.images.push(id),
            }
            entries.push(HistoryEntry::RemoveItem {
                page_id,
                index,
                item,
            });
        }
        if !entries.is_empty() {
            self.history.push(HistoryEntry::Batch(entries));
        }
        self.selection.deselect_all();
        deleted
    }

    /// Resize the selection by dragging one handle. Each unlocked
    /// member is remapped from the old union box into the new one; the
    /// whole gesture is one batch.
    pub fn resize_selected(&mut self, handle: HandleKind, delta: Vec2) -> bool {
        let Some(old_box) = self.selection.bounding_box(&self.pages[self.current]) else {
            return false;
        };
        let new_box = handle.resize(old_box, delta, 1.0);
        if new_box == old_box {
            return false;
        }
        let page_id = self.current_page_id();
        let page = &mut self.pages[self.current];
        let mut entries = Vec::new();
        for item in &mut page.items {
            if !self.selection.contains(item.id()) || item.is_locked() {
                continue;
            }
            let prev = item.clone();
            item.map_bounds(old_box, new_box);
            entries.push(HistoryEntry::UpdateItem {
                page_id,
                prev,
                next: item.clone(),
            });
        }
        if entries.is_empty() {
            return false;
        }
        self.history.push(HistoryEntry::Batch(entries));
        true
    }

    // ── Selection wrappers ──────────────────────────────────────────

    pub fn select_all(&mut self) {
        self.selection.select_all(&self.pages[self.current]);
    }

    pub fn selection_bounds(&self) -> Option<Rect> {
        self.selection.bounding_box(&self.pages[self.current])
    }

    pub fn finish_rect_select(&mut self) {
        let page = &self.pages[self.current];
        self.selection.finish_rect_select(page);
    }

    pub fn finish_lasso_select(&mut self) {
        let page = &self.pages[self.current];
        self.selection.finish_lasso_select(page);
    }

    // ── Batching ────────────────────────────────────────────────────

    pub fn start_batch(&mut self) {
        self.history.start_batch();
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    // ── Undo / redo ─────────────────────────────────────────────────

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop_undo() else {
            return false;
        };
        self.apply_entry(&entry, Direction::Undo);
        self.history.push_redo(entry);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.pop_redo() else {
            return false;
        };
        self.apply_entry(&entry, Direction::Redo);
        self.history.push_undo_raw(entry);
        true
    }

    /// Play an entry in the given direction. Entries referencing a
    /// page or item that no longer exists are inert no-ops, so undo
    /// stays safe after page deletion.
    fn apply_entry(&mut self, entry: &HistoryEntry, dir: Direction) {
        match entry {
            HistoryEntry::AddItem { page_id, item } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                match dir {
                    Direction::Undo => {
                        if let Some(index) = page.item_index(item.id()) {
                            page.items.remove(index);
                        }
                    }
                    Direction::Redo => {
                        if page.item_index(item.id()).is_none() {
                            page.items.push(item.clone());
                        }
                    }
                }
            }
            HistoryEntry::RemoveItem {
                page_id,
                index,
                item,
            } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                match dir {
                    Direction::Undo => {
                        if page.item_index(item.id()).is_none() {
                            let at = (*index).min(page.items.len());
                            page.items.insert(at, item.clone());
                        }
                    }
                    Direction::Redo => {
                        if let Some(at) = page.item_index(item.id()) {
                            page.items.remove(at);
                        }
                    }
                }
            }
            HistoryEntry::UpdateItem {
                page_id,
                prev,
                next,
            } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                let target = match dir {
                    Direction::Undo => prev,
                    Direction::Redo => next,
                };
                if let Some(item) = page.item_mut(target.id()) {
                    *item = target.clone();
                }
            }
            HistoryEntry::SetLocked {
                page_id,
                states,
                locked,
                by,
            } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                for state in states {
                    let Some(item) = page.item_mut(state.id) else {
                        continue;
                    };
                    match dir {
                        Direction::Undo => {
                            item.set_locked(state.locked, state.locked_by.clone())
                        }
                        Direction::Redo => item.set_locked(*locked, by.clone()),
                    }
                }
            }
            HistoryEntry::ClearPage { page_id, removed } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                match dir {
                    Direction::Undo => {
                        for (index, item) in removed {
                            if page.item_index(item.id()).is_none() {
                                let at = (*index).min(page.items.len());
                                page.items.insert(at, item.clone());
                            }
                        }
                    }
                    Direction::Redo => {
                        for (_, item) in removed {
                            if let Some(at) = page.item_index(item.id()) {
                                page.items.remove(at);
                            }
                        }
                    }
                }
            }
            HistoryEntry::MoveItems { page_id, moves } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                let sign = match dir {
                    Direction::Undo => -1.0,
                    Direction::Redo => 1.0,
                };
                for mv in moves {
                    if let Some(item) = page.item_mut(mv.id) {
                        item.translate(Vec2::new(mv.dx * sign, mv.dy * sign));
                    }
                }
            }
            HistoryEntry::Duplicate { page_id, clones } => {
                let Some(page) = self.page_mut(*page_id) else {
                    return;
                };
                match dir {
                    Direction::Undo => {
                        for clone in clones {
                            if let Some(at) = page.item_index(clone.id()) {
                                page.items.remove(at);
                            }
                        }
                    }
                    Direction::Redo => {
                        for clone in clones {
                            if page.item_index(clone.id()).is_none() {
                                page.items.push(clone.clone());
                            }
                        }
                    }
                }
            }
            HistoryEntry::AddPage { page, index } => {
                let prev = self.current_page_id();
                match dir {
                    Direction::Undo => {
                        if self.pages.len() > 1 {
                            if let Some(at) = self.page_index(page.id) {
                                self.pages.remove(at);
                                if self.current >= self.pages.len() {
                                    self.current = self.pages.len() - 1;
                                }
                            }
                        }
                    }
                    Direction::Redo => {
                        if self.page_index(page.id).is_none() {
                            let at = (*index).min(self.pages.len());
                            self.pages.insert(at, page.clone());
                            self.current = at;
                        }
                    }
                }
                self.clear_selection_if_page_changed(prev);
            }
            HistoryEntry::DeletePage {
                page,
                index,
                was_current,
            } => {
                let prev = self.current_page_id();
                match dir {
                    Direction::Undo => {
                        if self.page_index(page.id).is_none() {
                            let at = (*index).min(self.pages.len());
                            self.pages.insert(at, page.clone());
                            self.current = (*was_current).min(self.pages.len() - 1);
                        }
                    }
                    Direction::Redo => {
                        if self.pages.len() > 1 {
                            if let Some(at) = self.page_index(page.id) {
                                self.pages.remove(at);
                                if self.current >= self.pages.len() {
                                    self.current = self.pages.len() - 1;
                                }
                            }
                        }
                    }
                }
                self.clear_selection_if_page_changed(prev);
            }
            HistoryEntry::ReorderPages { from, to } => {
                let (from, to) = match dir {
                    Direction::Undo => (*to, *from),
                    Direction::Redo => (*from, *to),
                };
                if from < self.pages.len() && to < self.pages.len() && from != to {
                    let page = self.pages.remove(from);
                    self.pages.insert(to, page);
                    self.current = shift_index(self.current, from, to);
                }
            }
            HistoryEntry::Batch(children) => match dir {
                Direction::Undo => {
                    for child in children.iter().rev() {
                        self.apply_entry(child, Direction::Undo);
                    }
                }
                Direction::Redo => {
                    for child in children {
                        self.apply_entry(child, Direction::Redo);
                    }
                }
            },
        }
    }

    // ── Remote handlers (never push history) ────────────────────────

    /// Upsert an item arriving from a peer. Unknown page: no-op.
    pub fn handle_remote_add_item(&mut self, page_id: PageId, item: BoardItem) {
        let Some(page) = self.page_mut(page_id) else {
            debug!("remote add for unknown page {page_id}, ignored");
            return;
        };
        if let Some(existing) = page.item_mut(item.id()) {
            if *existing != item {
                *existing = item;
                self.lww_overwrites += 1;
            }
        } else {
            page.items.push(item);
        }
    }

    /// Overwrite an item with peer state (last writer wins). Unknown
    /// page or item: no-op.
    pub fn handle_remote_update_item(&mut self, page_id: PageId, item: BoardItem) {
        let Some(page) = self.page_mut(page_id) else {
            return;
        };
        let Some(existing) = page.item_mut(item.id()) else {
            return;
        };
        if *existing != item {
            debug!("lww overwrite of item {}", item.id());
            *existing = item;
            self.lww_overwrites += 1;
        }
    }

    pub fn handle_remote_delete_item(&mut self, page_id: PageId, id: ItemId) {
        let Some(page) = self.page_mut(page_id) else {
            return;
        };
        if let Some(index) = page.item_index(id) {
            page.items.remove(index);
            self.selection.remove_id(id);
        }
    }

    /// Peer sticky text edit. Clamped like the local path.
    pub fn handle_remote_sticky_text(&mut self, page_id: PageId, id: ItemId, text: &str) {
        let Some(page) = self.page_mut(page_id) else {
            return;
        };
        if let Some(BoardItem::Sticky(sticky)) = page.item_mut(id) {
            sticky.text = clamp_sticky_text(text);
        }
    }

    pub fn handle_remote_sticky_style(
        &mut self,
        page_id: PageId,
        id: ItemId,
        fill: Option<SerializableColor>,
        font_size: Option<f64>,
    ) {
        let Some(page) = self.page_mut(page_id) else {
            return;
        };
        if let Some(BoardItem::Sticky(sticky)) = page.item_mut(id) {
            if let Some(fill) = fill {
                sticky.style.fill = fill;
            }
            if let Some(size) = font_size {
                sticky.style.font_size =
                    size.clamp(crate::items::STICKY_FONT_MIN, crate::items::STICKY_FONT_MAX);
            }
        }
    }

    /// Peer cleared a page; locked items survive like the local path.
    pub fn handle_remote_page_clear(&mut self, page_id: PageId) {
        let Some(page) = self.page_mut(page_id) else {
            return;
        };
        page.items.retain(|i| i.is_locked());
    }

    pub fn handle_remote_page_reorder(&mut self, page_id: PageId, new_index: usize) {
        let Some(from) = self.page_index(page_id) else {
            return;
        };
        let to = new_index.min(self.pages.len() - 1);
        if from != to {
            let page = self.pages.remove(from);
            self.pages.insert(to, page);
            self.current = shift_index(self.current, from, to);
        }
    }

    /// How often a remote update has overwritten diverged local state.
    pub fn lww_overwrites(&self) -> u64 {
        self.lww_overwrites
    }

    /// Selection ids are only meaningful on the page they were made
    /// on; drop them when `current` ends up on a different page.
    fn clear_selection_if_page_changed(&mut self, prev: PageId) {
        if self.current_page_id() != prev {
            self.selection.deselect_all();
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an index lands after the element at `from` moved to `to`.
fn shift_index(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        to
    } else if from < index && index <= to {
        index - 1
    } else if to <= index && index < from {
        index + 1
    } else {
        index
    }
}
