//! Drawable elements of a whiteboard.
//!
//! An [`Element`] carries the fields every kind shares (id, anchor position,
//! signed size, style) plus an [`ElementKind`] holding the fields only some
//! kinds have. Freehand paths own their points, text owns its content and font;
//! the other kinds are fully described by their box.

mod color;
mod geometry;

pub use color::{Color, ColorParseError, TRANSPARENT, fill_to_string, parse_fill};
pub use geometry::{HIT_TOLERANCE, topmost_at};

use kurbo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Reasons an element is rejected before it can enter a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidElement {
    #[error("element id is nil")]
    NilId,
    #[error("stroke width must be positive, got {0}")]
    StrokeWidth(f64),
    #[error("opacity must be within [0, 1], got {0}")]
    Opacity(f64),
    #[error("freehand path needs at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("text element has no content")]
    EmptyText,
    #[error("font size must be positive, got {0}")]
    FontSize(f64),
    #[error("font family is empty")]
    EmptyFontFamily,
    #[error("element geometry is not finite")]
    NonFinite,
}

/// Kind discriminant, also the `type` string written to documents and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Rectangle,
    Ellipse,
    Diamond,
    Line,
    Arrow,
    Freehand,
    Text,
}

impl ElementType {
    pub const ALL: [ElementType; 7] = [
        ElementType::Rectangle,
        ElementType::Ellipse,
        ElementType::Diamond,
        ElementType::Line,
        ElementType::Arrow,
        ElementType::Freehand,
        ElementType::Text,
    ];

    /// Tag used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Rectangle => "rect",
            ElementType::Ellipse => "ellipse",
            ElementType::Diamond => "diamond",
            ElementType::Line => "line",
            ElementType::Arrow => "arrow",
            ElementType::Freehand => "draw",
            ElementType::Text => "text",
        }
    }

    /// Inverse of [`ElementType::as_str`].
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

/// Style properties shared by every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    /// Stroke color.
    pub stroke_color: Color,
    /// Fill color (None = transparent).
    pub fill_color: Option<Color>,
    /// Stroke width, strictly positive.
    pub stroke_width: f64,
    /// Overall opacity (0.0 = invisible, 1.0 = opaque).
    pub opacity: f64,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color::SLATE_ORANGE,
            fill_color: None,
            stroke_width: 2.0,
            opacity: 1.0,
        }
    }
}

impl ElementStyle {
    fn validate(&self) -> Result<(), InvalidElement> {
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            return Err(InvalidElement::StrokeWidth(self.stroke_width));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(InvalidElement::Opacity(self.opacity));
        }
        Ok(())
    }
}

/// Text payload of a text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
    pub font_size: f64,
    pub font_family: String,
}

/// Kind-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    /// Runs from `position` to `position + size`.
    Line,
    /// Runs from `position` to `position + size`, head at the end.
    Arrow,
    Freehand { points: Vec<Point> },
    Text(TextContent),
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Rectangle => ElementType::Rectangle,
            ElementKind::Ellipse => ElementType::Ellipse,
            ElementKind::Diamond => ElementType::Diamond,
            ElementKind::Line => ElementType::Line,
            ElementKind::Arrow => ElementType::Arrow,
            ElementKind::Freehand { .. } => ElementType::Freehand,
            ElementKind::Text(_) => ElementType::Text,
        }
    }
}

/// A drawable object on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub(crate) id: ElementId,
    /// Top-left corner for box kinds, start point for lines and arrows.
    pub position: Point,
    /// Signed width; negative when the shape was dragged leftwards.
    pub width: f64,
    /// Signed height; negative when the shape was dragged upwards.
    pub height: f64,
    pub style: ElementStyle,
    pub kind: ElementKind,
}

impl Element {
    /// Create a new element with a fresh id and the default style.
    pub fn new(kind: ElementKind, position: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            width,
            height,
            style: ElementStyle::default(),
            kind,
        }
    }

    /// Reconstruct an element with a known id (documents, files).
    pub(crate) fn reconstruct(
        id: ElementId,
        position: Point,
        width: f64,
        height: f64,
        style: ElementStyle,
        kind: ElementKind,
    ) -> Self {
        Self {
            id,
            position,
            width,
            height,
            style,
            kind,
        }
    }

    pub fn rectangle(position: Point, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Rectangle, position, width, height)
    }

    pub fn ellipse(position: Point, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Ellipse, position, width, height)
    }

    pub fn diamond(position: Point, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Diamond, position, width, height)
    }

    pub fn line(start: Point, end: Point) -> Self {
        Self::new(ElementKind::Line, start, end.x - start.x, end.y - start.y)
    }

    pub fn arrow(start: Point, end: Point) -> Self {
        Self::new(ElementKind::Arrow, start, end.x - start.x, end.y - start.y)
    }

    /// Create a freehand path; position and size follow the points' extent.
    pub fn freehand(points: Vec<Point>) -> Self {
        let mut element = Self::new(ElementKind::Freehand { points }, Point::ZERO, 0.0, 0.0);
        element.refresh_extent();
        element
    }

    /// Create a text element whose box is estimated from the content.
    pub fn text(
        position: Point,
        content: impl Into<String>,
        font_size: f64,
        font_family: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let (width, height) = estimate_text_size(&content, font_size);
        let kind = ElementKind::Text(TextContent {
            content,
            font_size,
            font_family: font_family.into(),
        });
        Self::new(kind, position, width, height)
    }

    /// Builder-style style override.
    pub fn with_style(mut self, style: ElementStyle) -> Self {
        self.style = style;
        self
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    /// Points of a freehand path; empty for every other kind.
    pub fn points(&self) -> &[Point] {
        match &self.kind {
            ElementKind::Freehand { points } => points,
            _ => &[],
        }
    }

    pub fn text_content(&self) -> Option<&TextContent> {
        match &self.kind {
            ElementKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Append a point to a freehand path. Returns false for other kinds.
    pub fn push_point(&mut self, point: Point) -> bool {
        let ElementKind::Freehand { points } = &mut self.kind else {
            return false;
        };
        points.push(point);
        self.refresh_extent();
        true
    }

    /// Copy of `self` where every field still holding its `from` value takes
    /// the `to` value instead. Fields changed since `from` keep their
    /// current value.
    pub fn patched(&self, from: &Element, to: &Element) -> Element {
        fn pick<T: PartialEq + Clone>(current: &T, from: &T, to: &T) -> T {
            if current == from { to.clone() } else { current.clone() }
        }

        Element {
            id: self.id,
            position: pick(&self.position, &from.position, &to.position),
            width: pick(&self.width, &from.width, &to.width),
            height: pick(&self.height, &from.height, &to.height),
            style: ElementStyle {
                stroke_color: pick(
                    &self.style.stroke_color,
                    &from.style.stroke_color,
                    &to.style.stroke_color,
                ),
                fill_color: pick(
                    &self.style.fill_color,
                    &from.style.fill_color,
                    &to.style.fill_color,
                ),
                stroke_width: pick(
                    &self.style.stroke_width,
                    &from.style.stroke_width,
                    &to.style.stroke_width,
                ),
                opacity: pick(&self.style.opacity, &from.style.opacity, &to.style.opacity),
            },
            kind: pick(&self.kind, &from.kind, &to.kind),
        }
    }

    /// Check the element can be stored: positive stroke width, opacity in
    /// [0, 1], finite geometry and complete kind-specific data.
    pub fn validate(&self) -> Result<(), InvalidElement> {
        if self.id.is_nil() {
            return Err(InvalidElement::NilId);
        }
        if !(self.position.is_finite() && self.width.is_finite() && self.height.is_finite()) {
            return Err(InvalidElement::NonFinite);
        }
        self.style.validate()?;

        match &self.kind {
            ElementKind::Freehand { points } => {
                if points.len() < 2 {
                    return Err(InvalidElement::TooFewPoints(points.len()));
                }
                if !points.iter().all(|p| p.is_finite()) {
                    return Err(InvalidElement::NonFinite);
                }
            }
            ElementKind::Text(text) => {
                if text.content.trim().is_empty() {
                    return Err(InvalidElement::EmptyText);
                }
                if !text.font_size.is_finite() || text.font_size <= 0.0 {
                    return Err(InvalidElement::FontSize(text.font_size));
                }
                if text.font_family.trim().is_empty() {
                    return Err(InvalidElement::EmptyFontFamily);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Keep a freehand path's position and size equal to its points' extent.
    fn refresh_extent(&mut self) {
        if let ElementKind::Freehand { points } = &self.kind {
            if let Some(bounds) = geometry::points_bounds(points) {
                self.position = bounds.origin();
                self.width = bounds.width();
                self.height = bounds.height();
            }
        }
    }
}

/// Rough text box: 0.6 em per character of the longest line, 1.2 em per line.
pub fn estimate_text_size(content: &str, font_size: f64) -> (f64, f64) {
    let lines = content.lines().count().max(1);
    let longest = content.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    (
        longest as f64 * font_size * 0.6,
        lines as f64 * font_size * 1.2,
    )
}
