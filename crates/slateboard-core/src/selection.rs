//! Selection state and interactive gestures.
//!
//! The selection is a flat id set plus a gesture mode. Gestures go
//! `Idle -> RectSelect | LassoSelect | Moving | Resizing -> Idle`;
//! starting a new gesture from a non-idle mode resets to idle first.

use kurbo::{Point, Rect, Vec2};

use crate::board::Page;
use crate::geometry::{point_to_polyline_dist, rect_intersects_polygon, rects_intersect};
use crate::items::{BoardItem, ItemId, ItemMove};

/// A drag smaller than this (in both axes) is treated as a click.
pub const CLICK_THRESHOLD: f64 = 3.0;

/// Minimum hit-test tolerance for thin strokes.
const MIN_HIT_TOLERANCE: f64 = 5.0;

/// The eight resize handles on the selection bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Nw,
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
}

impl HandleKind {
    pub fn all() -> [HandleKind; 8] {
        [
            HandleKind::Nw,
            HandleKind::N,
            HandleKind::Ne,
            HandleKind::E,
            HandleKind::Se,
            HandleKind::S,
            HandleKind::Sw,
            HandleKind::W,
        ]
    }

    /// Handle position on a bounding box: corners plus edge midpoints.
    pub fn position(&self, rect: Rect) -> Point {
        let cx = (rect.x0 + rect.x1) / 2.0;
        let cy = (rect.y0 + rect.y1) / 2.0;
        match self {
            HandleKind::Nw => Point::new(rect.x0, rect.y0),
            HandleKind::N => Point::new(cx, rect.y0),
            HandleKind::Ne => Point::new(rect.x1, rect.y0),
            HandleKind::E => Point::new(rect.x1, cy),
            HandleKind::Se => Point::new(rect.x1, rect.y1),
            HandleKind::S => Point::new(cx, rect.y1),
            HandleKind::Sw => Point::new(rect.x0, rect.y1),
            HandleKind::W => Point::new(rect.x0, cy),
        }
    }

    /// New box after dragging this handle by `delta`. Each moved edge
    /// is clamped so the box never collapses below `min_size`.
    pub fn resize(&self, rect: Rect, delta: Vec2, min_size: f64) -> Rect {
        let mut r = rect;
        let moves_west = matches!(self, HandleKind::Nw | HandleKind::W | HandleKind::Sw);
        let moves_east = matches!(self, HandleKind::Ne | HandleKind::E | HandleKind::Se);
        let moves_north = matches!(self, HandleKind::Nw | HandleKind::N | HandleKind::Ne);
        let moves_south = matches!(self, HandleKind::Sw | HandleKind::S | HandleKind::Se);

        if moves_west {
            r.x0 = (r.x0 + delta.x).min(r.x1 - min_size);
        }
        if moves_east {
            r.x1 = (r.x1 + delta.x).max(r.x0 + min_size);
        }
        if moves_north {
            r.y0 = (r.y0 + delta.y).min(r.y1 - min_size);
        }
        if moves_south {
            r.y1 = (r.y1 + delta.y).max(r.y0 + min_size);
        }
        r
    }
}

/// Current gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Idle,
    RectSelect,
    LassoSelect,
    Moving,
    Resizing(HandleKind),
}

/// The selection engine.
#[derive(Debug, Default)]
pub struct Selection {
    ids: Vec<ItemId>,
    mode: SelectionMode,
    anchor: Option<Point>,
    rect: Option<Rect>,
    lasso: Vec<Point>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Replace the selection wholesale.
    pub fn set_ids(&mut self, ids: Vec<ItemId>) {
        self.ids = ids;
    }

    /// Select one item. Additive toggles membership; non-additive
    /// replaces the selection with just this item.
    pub fn select_item(&mut self, id: ItemId, additive: bool) {
        if additive {
            if let Some(pos) = self.ids.iter().position(|&i| i == id) {
                self.ids.remove(pos);
            } else {
                self.ids.push(id);
            }
        } else {
            self.ids = vec![id];
        }
    }

    /// Select every selectable item on the page.
    pub fn select_all(&mut self, page: &Page) {
        self.ids = page
            .items
            .iter()
            .filter(|i| i.is_selectable())
            .map(|i| i.id())
            .collect();
    }

    pub fn deselect_all(&mut self) {
        self.ids.clear();
    }

    /// Drop one id from the selection (item deleted elsewhere).
    pub fn remove_id(&mut self, id: ItemId) {
        self.ids.retain(|&i| i != id);
    }

    /// Union of the selected items' bounds; `None` when nothing on
    /// this page is selected.
    pub fn bounding_box(&self, page: &Page) -> Option<Rect> {
        let mut union: Option<Rect> = None;
        for item in &page.items {
            if !self.contains(item.id()) {
                continue;
            }
            let b = item.bounds();
            union = Some(match union {
                Some(u) => u.union(b),
                None => b,
            });
        }
        union
    }

    // ── Rect select gesture ─────────────────────────────────────────

    pub fn begin_rect_select(&mut self, pos: Point) {
        self.mode = SelectionMode::RectSelect;
        self.anchor = Some(pos);
        self.rect = Some(Rect::from_points(pos, pos));
    }

    pub fn update_rect_select(&mut self, pos: Point) {
        if self.mode != SelectionMode::RectSelect {
            return;
        }
        if let Some(anchor) = self.anchor {
            self.rect = Some(Rect::from_points(anchor, pos));
        }
    }

    pub fn selection_rect(&self) -> Option<Rect> {
        self.rect
    }

    /// Close the rect gesture. A sub-3px drag is a click on empty
    /// space and clears the selection; otherwise the selection becomes
    /// the items whose bounds intersect the rect.
    pub fn finish_rect_select(&mut self, page: &Page) {
        let rect = self.rect.take();
        self.anchor = None;
        self.mode = SelectionMode::Idle;

        let Some(rect) = rect else {
            return;
        };
        if rect.width() < CLICK_THRESHOLD && rect.height() < CLICK_THRESHOLD {
            self.deselect_all();
            return;
        }
        self.ids = page
            .items
            .iter()
            .filter(|i| i.is_selectable() && rects_intersect(rect, i.bounds()))
            .map(|i| i.id())
            .collect();
    }

    // ── Lasso select gesture ────────────────────────────────────────

    pub fn begin_lasso_select(&mut self, pos: Point) {
        self.mode = SelectionMode::LassoSelect;
        self.lasso.clear();
        self.lasso.push(pos);
    }

    pub fn extend_lasso(&mut self, pos: Point) {
        if self.mode == SelectionMode::LassoSelect {
            self.lasso.push(pos);
        }
    }

    pub fn lasso_path(&self) -> &[Point] {
        &self.lasso
    }

    /// Close the lasso polygon and select the items it captures. A
    /// degenerate path (fewer than 3 points, or click-sized) clears.
    pub fn finish_lasso_select(&mut self, page: &Page) {
        let lasso = std::mem::take(&mut self.lasso);
        self.mode = SelectionMode::Idle;

        if lasso.len() < 3 || is_click_sized(&lasso) {
            self.deselect_all();
            return;
        }
        self.ids = page
            .items
            .iter()
            .filter(|i| i.is_selectable() && rect_intersects_polygon(i.bounds(), &lasso))
            .map(|i| i.id())
            .collect();
    }

    // ── Move / resize gestures ──────────────────────────────────────

    pub fn begin_move(&mut self) {
        if !self.ids.is_empty() {
            self.mode = SelectionMode::Moving;
        }
    }

    pub fn begin_resize(&mut self, handle: HandleKind) {
        if !self.ids.is_empty() {
            self.mode = SelectionMode::Resizing(handle);
        }
    }

    pub fn finish_gesture(&mut self) {
        self.mode = SelectionMode::Idle;
    }

    /// Moves for the unlocked part of the selection. Pure: nothing on
    /// the page changes.
    pub fn move_updates(&self, page: &Page, dx: f64, dy: f64) -> Vec<ItemMove> {
        page.items
            .iter()
            .filter(|i| self.contains(i.id()) && !i.is_locked())
            .map(|i| ItemMove { id: i.id(), dx, dy })
            .collect()
    }

    /// Topmost selectable item under the cursor. Strokes hit along the
    /// polyline within a pen-width tolerance; everything else hits by
    /// bounds.
    pub fn hit_test(&self, page: &Page, pos: Point) -> Option<ItemId> {
        for item in page.items.iter().rev() {
            if !item.is_selectable() {
                continue;
            }
            let hit = match item {
                BoardItem::Stroke(s) => {
                    let tolerance = (s.size / 2.0).max(MIN_HIT_TOLERANCE);
                    point_to_polyline_dist(pos, &s.points) <= tolerance
                }
                other => other.bounds().contains(pos),
            };
            if hit {
                return Some(item.id());
            }
        }
        None
    }
}

fn is_click_sized(path: &[Point]) -> bool {
    let mut min = path[0];
    let mut max = path[0];
    for p in path {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (max.x - min.x) < CLICK_THRESHOLD && (max.y - min.y) < CLICK_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{
        SerializableColor, Shape, ShapeKind, Sticky, Stroke, StrokeTool,
    };

    fn page_with(items: Vec<BoardItem>) -> Page {
        let mut page = Page::new();
        page.items = items;
        page
    }

    fn rect_item(x: f64, y: f64, w: f64, h: f64) -> BoardItem {
        BoardItem::Shape(Shape::new(Point::new(x, y), w, h, ShapeKind::Rectangle))
    }

    fn circle_item(x0: f64, x1: f64) -> BoardItem {
        BoardItem::Shape(Shape::new(
            Point::new(x0, x0),
            x1 - x0,
            x1 - x0,
            ShapeKind::Ellipse,
        ))
    }

    #[test]
    fn test_select_item_toggle_semantics() {
        let mut sel = Selection::new();
        let a = rect_item(0.0, 0.0, 10.0, 10.0).id();
        let b = rect_item(0.0, 0.0, 10.0, 10.0).id();

        sel.select_item(a, false);
        sel.select_item(b, true);
        assert_eq!(sel.len(), 2);

        // Additive again toggles off.
        sel.select_item(b, true);
        assert!(!sel.contains(b));

        // Non-additive replaces.
        sel.select_item(b, false);
        assert_eq!(sel.ids(), &[b]);
    }

    #[test]
    fn test_select_all_skips_erasers() {
        let mut eraser = Stroke::new(
            vec![Point::new(0.0, 0.0)],
            SerializableColor::white(),
            10.0,
            StrokeTool::Pen,
        );
        eraser.tool = StrokeTool::Eraser;
        let keep = rect_item(0.0, 0.0, 10.0, 10.0);
        let keep_id = keep.id();
        let page = page_with(vec![BoardItem::Stroke(eraser), keep]);

        let mut sel = Selection::new();
        sel.select_all(&page);
        assert_eq!(sel.ids(), &[keep_id]);
    }

    #[test]
    fn test_bounding_box_union() {
        // A 100x50 box at (200,200) plus a circle spanning 370..430
        // must union to a box covering both extents.
        let a = rect_item(200.0, 200.0, 100.0, 50.0);
        let b = circle_item(370.0, 430.0);
        let mut sel = Selection::new();
        sel.set_ids(vec![a.id(), b.id()]);
        let page = page_with(vec![a, b]);

        let bb = sel.bounding_box(&page).unwrap();
        assert_eq!(bb, Rect::new(200.0, 200.0, 430.0, 430.0));
    }

    #[test]
    fn test_bounding_box_empty_selection() {
        let page = page_with(vec![rect_item(0.0, 0.0, 10.0, 10.0)]);
        let sel = Selection::new();
        assert!(sel.bounding_box(&page).is_none());
    }

    #[test]
    fn test_rect_select_picks_intersecting() {
        let inside = rect_item(10.0, 10.0, 20.0, 20.0);
        let touching = rect_item(45.0, 45.0, 30.0, 30.0);
        let outside = rect_item(200.0, 200.0, 10.0, 10.0);
        let (inside_id, touching_id) = (inside.id(), touching.id());
        let page = page_with(vec![inside, touching, outside]);

        let mut sel = Selection::new();
        sel.begin_rect_select(Point::new(0.0, 0.0));
        sel.update_rect_select(Point::new(50.0, 50.0));
        sel.finish_rect_select(&page);

        assert_eq!(sel.ids(), &[inside_id, touching_id]);
        assert_eq!(sel.mode(), SelectionMode::Idle);
    }

    #[test]
    fn test_tiny_rect_drag_is_click_and_clears() {
        let item = rect_item(0.0, 0.0, 10.0, 10.0);
        let id = item.id();
        let page = page_with(vec![item]);

        let mut sel = Selection::new();
        sel.select_item(id, false);
        sel.begin_rect_select(Point::new(5.0, 5.0));
        sel.update_rect_select(Point::new(7.0, 6.5));
        sel.finish_rect_select(&page);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_lasso_select_captures_enclosed() {
        let inside = rect_item(10.0, 10.0, 5.0, 5.0);
        let outside = rect_item(100.0, 100.0, 5.0, 5.0);
        let inside_id = inside.id();
        let page = page_with(vec![inside, outside]);

        let mut sel = Selection::new();
        sel.begin_lasso_select(Point::new(0.0, 0.0));
        sel.extend_lasso(Point::new(50.0, 0.0));
        sel.extend_lasso(Point::new(50.0, 50.0));
        sel.extend_lasso(Point::new(0.0, 50.0));
        sel.finish_lasso_select(&page);

        assert_eq!(sel.ids(), &[inside_id]);
    }

    #[test]
    fn test_degenerate_lasso_clears() {
        let item = rect_item(0.0, 0.0, 10.0, 10.0);
        let id = item.id();
        let page = page_with(vec![item]);

        let mut sel = Selection::new();
        sel.select_item(id, false);
        sel.begin_lasso_select(Point::new(5.0, 5.0));
        sel.extend_lasso(Point::new(6.0, 5.0));
        sel.finish_lasso_select(&page);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_handles_cover_corners_and_midpoints() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let positions: Vec<Point> = HandleKind::all()
            .iter()
            .map(|h| h.position(rect))
            .collect();
        assert_eq!(positions.len(), 8);
        assert!(positions.contains(&Point::new(0.0, 0.0)));
        assert!(positions.contains(&Point::new(50.0, 0.0)));
        assert!(positions.contains(&Point::new(100.0, 25.0)));
        assert!(positions.contains(&Point::new(50.0, 50.0)));
    }

    #[test]
    fn test_resize_clamps_to_min_size() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        let r = HandleKind::E.resize(rect, Vec2::new(-200.0, 0.0), 1.0);
        assert_eq!(r.width(), 1.0);
        assert_eq!(r.x0, 0.0);
    }

    #[test]
    fn test_move_updates_is_pure_and_skips_locked() {
        let movable = rect_item(0.0, 0.0, 10.0, 10.0);
        let mut locked = rect_item(20.0, 20.0, 10.0, 10.0);
        locked.set_locked(true, Some("t".into()));
        let (movable_id, locked_id) = (movable.id(), locked.id());
        let page = page_with(vec![movable, locked]);

        let mut sel = Selection::new();
        sel.set_ids(vec![movable_id, locked_id]);
        let before = page.clone();
        let moves = sel.move_updates(&page, 5.0, 5.0);

        assert_eq!(moves, vec![ItemMove { id: movable_id, dx: 5.0, dy: 5.0 }]);
        assert_eq!(page, before);
    }

    #[test]
    fn test_gesture_state_machine() {
        let mut sel = Selection::new();
        assert_eq!(sel.mode(), SelectionMode::Idle);

        // Move and resize need a non-empty selection.
        sel.begin_move();
        assert_eq!(sel.mode(), SelectionMode::Idle);

        sel.select_item(rect_item(0.0, 0.0, 1.0, 1.0).id(), false);
        sel.begin_move();
        assert_eq!(sel.mode(), SelectionMode::Moving);
        sel.finish_gesture();

        sel.begin_resize(HandleKind::Se);
        assert_eq!(sel.mode(), SelectionMode::Resizing(HandleKind::Se));
        sel.finish_gesture();
        assert_eq!(sel.mode(), SelectionMode::Idle);
    }

    #[test]
    fn test_hit_test_topmost_wins() {
        let below = rect_item(0.0, 0.0, 50.0, 50.0);
        let above = BoardItem::Sticky(Sticky::new(Point::new(10.0, 10.0), 30.0, 30.0));
        let above_id = above.id();
        let page = page_with(vec![below, above]);

        let sel = Selection::new();
        assert_eq!(sel.hit_test(&page, Point::new(20.0, 20.0)), Some(above_id));
        assert_eq!(sel.hit_test(&page, Point::new(200.0, 200.0)), None);
    }

    #[test]
    fn test_hit_test_stroke_tolerance() {
        let stroke = BoardItem::Stroke(Stroke::new(
            vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
            SerializableColor::black(),
            2.0,
            StrokeTool::Pen,
        ));
        let id = stroke.id();
        let page = page_with(vec![stroke]);

        let sel = Selection::new();
        // Thin stroke still hittable within the 5px floor.
        assert_eq!(sel.hit_test(&page, Point::new(50.0, 4.0)), Some(id));
        assert_eq!(sel.hit_test(&page, Point::new(50.0, 8.0)), None);
    }
}
