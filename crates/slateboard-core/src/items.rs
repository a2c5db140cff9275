//! Board item definitions.
//!
//! Everything that can live on a page is a [`BoardItem`] variant. The
//! variants are plain data structs; behavior that needs to see every
//! kind goes through exhaustive matches here so adding a kind is a
//! compile error everywhere it matters.

use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for items.
pub type ItemId = Uuid;

/// Unique identifier for pages.
pub type PageId = Uuid;

/// Maximum sticky note text length.
pub const STICKY_TEXT_MAX: usize = 500;

/// Allowed sticky font size range.
pub const STICKY_FONT_MIN: f64 = 10.0;
pub const STICKY_FONT_MAX: f64 = 32.0;

/// Allowed stroke size range.
pub const STROKE_SIZE_MIN: f64 = 1.0;
pub const STROKE_SIZE_MAX: f64 = 50.0;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Drawing tool that produced a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeTool {
    #[default]
    Pen,
    Highlighter,
    Line,
    Eraser,
}

/// Geometric shape kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
}

/// Freehand or line stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: ItemId,
    pub points: Vec<Point>,
    pub color: SerializableColor,
    /// Pen width, clamped to 1..=50.
    pub size: f64,
    pub tool: StrokeTool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
}

impl Stroke {
    pub fn new(points: Vec<Point>, color: SerializableColor, size: f64, tool: StrokeTool) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            color,
            size: size.clamp(STROKE_SIZE_MIN, STROKE_SIZE_MAX),
            tool,
            locked: false,
            locked_by: None,
        }
    }

    /// Bounding box of the points, padded by half the pen width.
    pub fn bounds(&self) -> Rect {
        if self.points.is_empty() {
            return Rect::ZERO;
        }
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let pad = self.size / 2.0;
        Rect::new(min_x - pad, min_y - pad, max_x + pad, max_y + pad)
    }
}

/// Rectangle or ellipse drawn on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ItemId,
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    pub kind: ShapeKind,
    pub color: SerializableColor,
    pub stroke_width: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
}

impl Shape {
    pub fn new(origin: Point, width: f64, height: f64, kind: ShapeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            width,
            height,
            kind,
            color: SerializableColor::black(),
            stroke_width: 2.0,
            locked: false,
            locked_by: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + self.width,
            self.origin.y + self.height,
        )
    }
}

/// Free-standing text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub id: ItemId,
    pub origin: Point,
    pub content: String,
    pub font_size: f64,
    pub color: SerializableColor,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
}

impl Text {
    pub fn new(origin: Point, content: impl Into<String>, font_size: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            content: content.into(),
            font_size,
            color: SerializableColor::black(),
            locked: false,
            locked_by: None,
        }
    }

    /// Estimated bounds; real text metrics belong to the renderer.
    pub fn bounds(&self) -> Rect {
        let est_width = (self.content.chars().count() as f64 * self.font_size * 0.6).max(20.0);
        let est_height = self.font_size * 1.4;
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + est_width,
            self.origin.y + est_height,
        )
    }
}

/// Visual style of a sticky note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyStyle {
    pub fill: SerializableColor,
    /// Clamped to 10..=32.
    pub font_size: f64,
}

impl Default for StickyStyle {
    fn default() -> Self {
        Self {
            fill: SerializableColor::new(255, 235, 130, 255),
            font_size: 16.0,
        }
    }
}

/// Sticky note with editable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sticky {
    pub id: ItemId,
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    /// At most 500 characters.
    pub text: String,
    pub style: StickyStyle,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
}

impl Sticky {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            width,
            height,
            text: String::new(),
            style: StickyStyle::default(),
            locked: false,
            locked_by: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + self.width,
            self.origin.y + self.height,
        )
    }
}

/// Placed image asset (referenced by source URL/key, never inlined).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ItemId,
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    pub src: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
}

impl Image {
    pub fn new(origin: Point, width: f64, height: f64, src: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            width,
            height,
            src: src.into(),
            locked: false,
            locked_by: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.origin.x + self.width,
            self.origin.y + self.height,
        )
    }
}

/// Enum wrapper for all item kinds (for serialization and storage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardItem {
    Stroke(Stroke),
    Shape(Shape),
    Text(Text),
    Sticky(Sticky),
    Image(Image),
}

impl BoardItem {
    pub fn id(&self) -> ItemId {
        match self {
            BoardItem::Stroke(s) => s.id,
            BoardItem::Shape(s) => s.id,
            BoardItem::Text(t) => t.id,
            BoardItem::Sticky(s) => s.id,
            BoardItem::Image(i) => i.id,
        }
    }

    pub fn set_id(&mut self, id: ItemId) {
        match self {
            BoardItem::Stroke(s) => s.id = id,
            BoardItem::Shape(s) => s.id = id,
            BoardItem::Text(t) => t.id = id,
            BoardItem::Sticky(s) => s.id = id,
            BoardItem::Image(i) => i.id = id,
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            BoardItem::Stroke(s) => s.bounds(),
            BoardItem::Shape(s) => s.bounds(),
            BoardItem::Text(t) => t.bounds(),
            BoardItem::Sticky(s) => s.bounds(),
            BoardItem::Image(i) => i.bounds(),
        }
    }

    pub fn is_locked(&self) -> bool {
        match self {
            BoardItem::Stroke(s) => s.locked,
            BoardItem::Shape(s) => s.locked,
            BoardItem::Text(t) => t.locked,
            BoardItem::Sticky(s) => s.locked,
            BoardItem::Image(i) => i.locked,
        }
    }

    pub fn locked_by(&self) -> Option<&str> {
        match self {
            BoardItem::Stroke(s) => s.locked_by.as_deref(),
            BoardItem::Shape(s) => s.locked_by.as_deref(),
            BoardItem::Text(t) => t.locked_by.as_deref(),
            BoardItem::Sticky(s) => s.locked_by.as_deref(),
            BoardItem::Image(i) => i.locked_by.as_deref(),
        }
    }

    pub fn set_locked(&mut self, locked: bool, by: Option<String>) {
        match self {
            BoardItem::Stroke(s) => {
                s.locked = locked;
                s.locked_by = by;
            }
            BoardItem::Shape(s) => {
                s.locked = locked;
                s.locked_by = by;
            }
            BoardItem::Text(t) => {
                t.locked = locked;
                t.locked_by = by;
            }
            BoardItem::Sticky(s) => {
                s.locked = locked;
                s.locked_by = by;
            }
            BoardItem::Image(i) => {
                i.locked = locked;
                i.locked_by = by;
            }
        }
    }

    /// Whether this item can enter a selection. Eraser marks are
    /// visual-only and never selectable.
    pub fn is_selectable(&self) -> bool {
        match self {
            BoardItem::Stroke(s) => s.tool != StrokeTool::Eraser,
            _ => true,
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            BoardItem::Stroke(s) => {
                for p in &mut s.points {
                    *p += delta;
                }
            }
            BoardItem::Shape(s) => s.origin += delta,
            BoardItem::Text(t) => t.origin += delta,
            BoardItem::Sticky(s) => s.origin += delta,
            BoardItem::Image(i) => i.origin += delta,
        }
    }

    /// Remap this item from one reference box into another, scaling
    /// positions and extents proportionally. Used by resize.
    pub fn map_bounds(&mut self, from: Rect, to: Rect) {
        let sx = if from.width() > f64::EPSILON {
            to.width() / from.width()
        } else {
            1.0
        };
        let sy = if from.height() > f64::EPSILON {
            to.height() / from.height()
        } else {
            1.0
        };
        let map = |p: Point| {
            Point::new(
                to.x0 + (p.x - from.x0) * sx,
                to.y0 + (p.y - from.y0) * sy,
            )
        };
        match self {
            BoardItem::Stroke(s) => {
                for p in &mut s.points {
                    *p = map(*p);
                }
            }
            BoardItem::Shape(s) => {
                s.origin = map(s.origin);
                s.width *= sx;
                s.height *= sy;
            }
            BoardItem::Text(t) => {
                t.origin = map(t.origin);
            }
            BoardItem::Sticky(s) => {
                s.origin = map(s.origin);
                s.width *= sx;
                s.height *= sy;
            }
            BoardItem::Image(i) => {
                i.origin = map(i.origin);
                i.width *= sx;
                i.height *= sy;
            }
        }
    }

    /// Apply a patch to this item. Returns false when the patch kind
    /// does not match the item kind; nothing is changed in that case.
    pub fn apply_patch(&mut self, patch: &ItemPatch) -> bool {
        match (self, patch) {
            (BoardItem::Stroke(s), ItemPatch::Stroke(p)) => {
                if let Some(points) = &p.points {
                    s.points = points.clone();
                }
                if let Some(color) = p.color {
                    s.color = color;
                }
                if let Some(size) = p.size {
                    s.size = size.clamp(STROKE_SIZE_MIN, STROKE_SIZE_MAX);
                }
                true
            }
            (BoardItem::Shape(s), ItemPatch::Shape(p)) => {
                if let Some(origin) = p.origin {
                    s.origin = origin;
                }
                if let Some(width) = p.width {
                    s.width = width;
                }
                if let Some(height) = p.height {
                    s.height = height;
                }
                if let Some(color) = p.color {
                    s.color = color;
                }
                true
            }
            (BoardItem::Text(t), ItemPatch::Text(p)) => {
                if let Some(origin) = p.origin {
                    t.origin = origin;
                }
                if let Some(content) = &p.content {
                    t.content = content.clone();
                }
                if let Some(font_size) = p.font_size {
                    t.font_size = font_size;
                }
                if let Some(color) = p.color {
                    t.color = color;
                }
                true
            }
            (BoardItem::Sticky(s), ItemPatch::Sticky(p)) => {
                if let Some(origin) = p.origin {
                    s.origin = origin;
                }
                if let Some(width) = p.width {
                    s.width = width;
                }
                if let Some(height) = p.height {
                    s.height = height;
                }
                if let Some(text) = &p.text {
                    s.text = clamp_sticky_text(text);
                }
                if let Some(fill) = p.fill {
                    s.style.fill = fill;
                }
                if let Some(font_size) = p.font_size {
                    s.style.font_size = font_size.clamp(STICKY_FONT_MIN, STICKY_FONT_MAX);
                }
                true
            }
            (BoardItem::Image(i), ItemPatch::Image(p)) => {
                if let Some(origin) = p.origin {
                    i.origin = origin;
                }
                if let Some(width) = p.width {
                    i.width = width;
                }
                if let Some(height) = p.height {
                    i.height = height;
                }
                true
            }
            _ => false,
        }
    }
}

/// Truncate sticky text to the 500-character ceiling.
pub fn clamp_sticky_text(text: &str) -> String {
    text.chars().take(STICKY_TEXT_MAX).collect()
}

/// Per-kind partial updates. Every field is optional; `None` leaves the
/// current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokePatch {
    pub points: Option<Vec<Point>>,
    pub color: Option<SerializableColor>,
    pub size: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapePatch {
    pub origin: Option<Point>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub color: Option<SerializableColor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPatch {
    pub origin: Option<Point>,
    pub content: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<SerializableColor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickyPatch {
    pub origin: Option<Point>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub text: Option<String>,
    pub fill: Option<SerializableColor>,
    pub font_size: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePatch {
    pub origin: Option<Point>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Patch wrapper matching the item union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPatch {
    Stroke(StrokePatch),
    Shape(ShapePatch),
    Text(TextPatch),
    Sticky(StickyPatch),
    Image(ImagePatch),
}

/// A translation to apply to one item, produced by move and align
/// operations and applied as a single history entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemMove {
    pub id: ItemId,
    pub dx: f64,
    pub dy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(points: &[(f64, f64)], size: f64) -> Stroke {
        Stroke::new(
            points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            SerializableColor::black(),
            size,
            StrokeTool::Pen,
        )
    }

    #[test]
    fn test_stroke_bounds_padded_by_half_size() {
        let s = stroke(&[(10.0, 10.0), (20.0, 30.0)], 4.0);
        let b = s.bounds();
        assert_eq!(b, Rect::new(8.0, 8.0, 22.0, 32.0));
    }

    #[test]
    fn test_stroke_size_clamped() {
        let s = stroke(&[(0.0, 0.0)], 99.0);
        assert_eq!(s.size, STROKE_SIZE_MAX);
        let s = stroke(&[(0.0, 0.0)], 0.0);
        assert_eq!(s.size, STROKE_SIZE_MIN);
    }

    #[test]
    fn test_eraser_not_selectable() {
        let mut s = stroke(&[(0.0, 0.0)], 2.0);
        s.tool = StrokeTool::Eraser;
        assert!(!BoardItem::Stroke(s).is_selectable());
    }

    #[test]
    fn test_translate_moves_all_points() {
        let mut item = BoardItem::Stroke(stroke(&[(0.0, 0.0), (10.0, 10.0)], 2.0));
        item.translate(Vec2::new(5.0, -5.0));
        let BoardItem::Stroke(s) = &item else {
            unreachable!()
        };
        assert_eq!(s.points[0], Point::new(5.0, -5.0));
        assert_eq!(s.points[1], Point::new(15.0, 5.0));
    }

    #[test]
    fn test_patch_kind_mismatch_is_noop() {
        let before = BoardItem::Sticky(Sticky::new(Point::new(0.0, 0.0), 100.0, 100.0));
        let mut item = before.clone();
        let applied = item.apply_patch(&ItemPatch::Image(ImagePatch {
            width: Some(500.0),
            ..Default::default()
        }));
        assert!(!applied);
        assert_eq!(item, before);
    }

    #[test]
    fn test_sticky_patch_clamps_text_and_font() {
        let mut item = BoardItem::Sticky(Sticky::new(Point::new(0.0, 0.0), 100.0, 100.0));
        let long = "x".repeat(600);
        item.apply_patch(&ItemPatch::Sticky(StickyPatch {
            text: Some(long),
            font_size: Some(99.0),
            ..Default::default()
        }));
        let BoardItem::Sticky(s) = &item else {
            unreachable!()
        };
        assert_eq!(s.text.chars().count(), STICKY_TEXT_MAX);
        assert_eq!(s.style.font_size, STICKY_FONT_MAX);
    }

    #[test]
    fn test_map_bounds_scales_shape() {
        let mut item = BoardItem::Shape(Shape::new(
            Point::new(10.0, 10.0),
            10.0,
            10.0,
            ShapeKind::Rectangle,
        ));
        item.map_bounds(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(0.0, 0.0, 200.0, 50.0),
        );
        let BoardItem::Shape(s) = &item else {
            unreachable!()
        };
        assert_eq!(s.origin, Point::new(20.0, 5.0));
        assert_eq!(s.width, 20.0);
        assert_eq!(s.height, 5.0);
    }

    #[test]
    fn test_item_serializes_with_kind_tag() {
        let item = BoardItem::Sticky(Sticky::new(Point::new(1.0, 2.0), 100.0, 100.0));
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains(r#""kind":"sticky""#));

        let back: BoardItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_missing_lock_fields_default_unlocked() {
        let json = r#"{"kind":"text","id":"6f61b1a4-6d94-4f54-8a66-1c6cdd04d34b",
            "origin":{"x":0.0,"y":0.0},"content":"hi","font_size":16.0,
            "color":{"r":0,"g":0,"b":0,"a":255}}"#;
        let item: BoardItem = serde_json::from_str(json).unwrap();
        assert!(!item.is_locked());
        assert!(item.locked_by().is_none());
    }

    #[test]
    fn test_text_bounds_estimate_has_minimum_width() {
        let t = Text::new(Point::new(0.0, 0.0), "", 16.0);
        assert_eq!(t.bounds().width(), 20.0);
    }
}
