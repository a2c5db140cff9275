//! Alignment and distribution over the current selection.
//!
//! Locked items count toward the reference frame (the group extremes
//! are computed over every selected item) but never receive a move.
//! The output is one `Vec<ItemMove>` handed to `Board::apply_align` so
//! the whole operation is a single undo step.

use kurbo::Rect;

use crate::board::Page;
use crate::items::{ItemId, ItemMove};

/// Alignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMode {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

/// Distribution axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy)]
struct ItemBox {
    id: ItemId,
    rect: Rect,
    locked: bool,
}

fn collect_boxes(page: &Page, ids: &[ItemId]) -> Vec<ItemBox> {
    page.items
        .iter()
        .filter(|i| ids.contains(&i.id()))
        .map(|i| ItemBox {
            id: i.id(),
            rect: i.bounds(),
            locked: i.is_locked(),
        })
        .collect()
}

/// Alignment needs at least two selected items.
pub fn can_align(selected: usize) -> bool {
    selected >= 2
}

/// Distribution needs at least three selected items.
pub fn can_distribute(selected: usize) -> bool {
    selected >= 3
}

/// Compute alignment moves for the selected ids. Returns an empty vec
/// when fewer than two items resolve or nothing needs to move.
pub fn align(page: &Page, ids: &[ItemId], mode: AlignMode) -> Vec<ItemMove> {
    let boxes = collect_boxes(page, ids);
    if !can_align(boxes.len()) {
        return Vec::new();
    }

    // Group extremes over ALL selected items, locked included.
    let min_x = boxes.iter().map(|b| b.rect.x0).fold(f64::INFINITY, f64::min);
    let max_x = boxes.iter().map(|b| b.rect.x1).fold(f64::NEG_INFINITY, f64::max);
    let min_y = boxes.iter().map(|b| b.rect.y0).fold(f64::INFINITY, f64::min);
    let max_y = boxes.iter().map(|b| b.rect.y1).fold(f64::NEG_INFINITY, f64::max);
    let center_x = (min_x + max_x) / 2.0;
    let center_y = (min_y + max_y) / 2.0;

    boxes
        .iter()
        .filter(|b| !b.locked)
        .map(|b| {
            let (dx, dy) = match mode {
                AlignMode::Left => (min_x - b.rect.x0, 0.0),
                AlignMode::Center => (center_x - b.rect.center().x, 0.0),
                AlignMode::Right => (max_x - b.rect.x1, 0.0),
                AlignMode::Top => (0.0, min_y - b.rect.y0),
                AlignMode::Middle => (0.0, center_y - b.rect.center().y),
                AlignMode::Bottom => (0.0, max_y - b.rect.y1),
            };
            ItemMove { id: b.id, dx, dy }
        })
        .filter(|m| m.dx != 0.0 || m.dy != 0.0)
        .collect()
}

/// Compute distribution moves: first and last stay pinned, the rest
/// spread with equal gaps `(span - sum of sizes) / (count - 1)`.
pub fn distribute(page: &Page, ids: &[ItemId], axis: Axis) -> Vec<ItemMove> {
    let mut boxes = collect_boxes(page, ids);
    if !can_distribute(boxes.len()) {
        return Vec::new();
    }

    match axis {
        Axis::Horizontal => boxes.sort_by(|a, b| a.rect.x0.total_cmp(&b.rect.x0)),
        Axis::Vertical => boxes.sort_by(|a, b| a.rect.y0.total_cmp(&b.rect.y0)),
    }

    let (start, end, total_size): (f64, f64, f64) = match axis {
        Axis::Horizontal => (
            boxes[0].rect.x0,
            boxes[boxes.len() - 1].rect.x1,
            boxes.iter().map(|b| b.rect.width()).sum(),
        ),
        Axis::Vertical => (
            boxes[0].rect.y0,
            boxes[boxes.len() - 1].rect.y1,
            boxes.iter().map(|b| b.rect.height()).sum(),
        ),
    };
    let gap = (end - start - total_size) / (boxes.len() as f64 - 1.0);

    let mut moves = Vec::new();
    let mut cursor = start;
    for (i, b) in boxes.iter().enumerate() {
        let (pos, size) = match axis {
            Axis::Horizontal => (b.rect.x0, b.rect.width()),
            Axis::Vertical => (b.rect.y0, b.rect.height()),
        };
        // First and last stay where they are.
        let target = if i == 0 || i == boxes.len() - 1 {
            pos
        } else {
            cursor
        };
        if !b.locked && target != pos {
            let d = target - pos;
            moves.push(match axis {
                Axis::Horizontal => ItemMove { id: b.id, dx: d, dy: 0.0 },
                Axis::Vertical => ItemMove { id: b.id, dx: 0.0, dy: d },
            });
        }
        cursor = target + size + gap;
    }
    moves
}
