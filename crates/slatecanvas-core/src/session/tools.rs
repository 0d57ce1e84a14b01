//! Tools, keyboard shortcuts and in-progress drawings.

use crate::element::{Element, ElementId, ElementKind, ElementStyle};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Rectangle,
    Ellipse,
    Diamond,
    Line,
    Arrow,
    Freehand,
    Text,
    Eraser,
}

impl ToolKind {
    /// Single-key tool shortcut.
    pub fn from_shortcut(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'v' => Some(ToolKind::Select),
            'r' => Some(ToolKind::Rectangle),
            'e' => Some(ToolKind::Ellipse),
            'd' => Some(ToolKind::Diamond),
            'l' => Some(ToolKind::Line),
            'a' => Some(ToolKind::Arrow),
            'p' | 'f' => Some(ToolKind::Freehand),
            't' => Some(ToolKind::Text),
            'x' => Some(ToolKind::Eraser),
            _ => None,
        }
    }

    /// Whether a gesture with this tool draws an element.
    pub fn draws(self) -> bool {
        matches!(
            self,
            ToolKind::Rectangle
                | ToolKind::Ellipse
                | ToolKind::Diamond
                | ToolKind::Line
                | ToolKind::Arrow
                | ToolKind::Freehand
        )
    }
}

/// Editing commands bound to keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    Undo,
    Redo,
    Delete,
    SelectAll,
    /// Save the board to a file; handled outside the session.
    Export,
}

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Tool(ToolKind),
    Shortcut(Shortcut),
}

/// Resolve a key press. `modifier` is Ctrl or Cmd.
pub fn resolve_key(key: &str, modifier: bool, shift: bool) -> Option<KeyCommand> {
    if modifier {
        return match key.to_ascii_lowercase().as_str() {
            "z" if shift => Some(KeyCommand::Shortcut(Shortcut::Redo)),
            "z" => Some(KeyCommand::Shortcut(Shortcut::Undo)),
            "y" => Some(KeyCommand::Shortcut(Shortcut::Redo)),
            "a" => Some(KeyCommand::Shortcut(Shortcut::SelectAll)),
            "s" => Some(KeyCommand::Shortcut(Shortcut::Export)),
            _ => None,
        };
    }
    match key {
        "Delete" | "Backspace" => Some(KeyCommand::Shortcut(Shortcut::Delete)),
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ToolKind::from_shortcut(c).map(KeyCommand::Tool),
                _ => None,
            }
        }
    }
}

/// An element being drawn, alive between gesture start and gesture end.
/// Never part of a document until [`Drawing::finish`] accepts it.
#[derive(Debug, Clone)]
pub struct Drawing {
    id: ElementId,
    tool: ToolKind,
    start: Point,
    current: Point,
    points: Vec<Point>,
    style: ElementStyle,
}

impl Drawing {
    /// Start drawing at `start`. `None` for tools that do not draw.
    pub fn begin(tool: ToolKind, start: Point, style: ElementStyle) -> Option<Self> {
        if !tool.draws() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            tool,
            start,
            current: start,
            points: vec![start],
            style,
        })
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Pointer moved: stretch the shape or add a point to the path.
    pub fn extend(&mut self, point: Point) {
        self.current = point;
        if self.tool == ToolKind::Freehand {
            self.points.push(point);
        }
    }

    /// Pointer released at `point`. Paths keep their sampled points.
    pub fn release(&mut self, point: Point) {
        if self.tool != ToolKind::Freehand {
            self.current = point;
        }
    }

    /// The element as currently drawn.
    pub fn preview(&self) -> Option<Element> {
        let mut element = match self.tool {
            ToolKind::Rectangle => Element::rectangle(
                self.start,
                self.current.x - self.start.x,
                self.current.y - self.start.y,
            ),
            ToolKind::Ellipse => Element::ellipse(
                self.start,
                self.current.x - self.start.x,
                self.current.y - self.start.y,
            ),
            ToolKind::Diamond => Element::diamond(
                self.start,
                self.current.x - self.start.x,
                self.current.y - self.start.y,
            ),
            ToolKind::Line => Element::line(self.start, self.current),
            ToolKind::Arrow => Element::arrow(self.start, self.current),
            ToolKind::Freehand => Element::freehand(self.points.clone()),
            ToolKind::Select | ToolKind::Text | ToolKind::Eraser => return None,
        };
        element.id = self.id;
        element.style = self.style.clone();
        Some(element)
    }

    /// The element to commit, if it passes the minimum-size filter: paths
    /// need `min_points` points, shapes need |width| or |height| above
    /// `min_extent`.
    pub fn finish(self, min_extent: f64, min_points: usize) -> Option<Element> {
        let element = self.preview()?;
        let keep = match &element.kind {
            ElementKind::Freehand { points } => points.len() >= min_points,
            _ => element.width.abs() > min_extent || element.height.abs() > min_extent,
        };
        keep.then_some(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;

    #[test]
    fn test_tool_shortcuts() {
        assert_eq!(ToolKind::from_shortcut('r'), Some(ToolKind::Rectangle));
        assert_eq!(ToolKind::from_shortcut('F'), Some(ToolKind::Freehand));
        assert_eq!(ToolKind::from_shortcut('x'), Some(ToolKind::Eraser));
        assert_eq!(ToolKind::from_shortcut('q'), None);
    }

    #[test]
    fn test_resolve_key() {
        assert_eq!(resolve_key("z", true, false), Some(KeyCommand::Shortcut(Shortcut::Undo)));
        assert_eq!(resolve_key("z", true, true), Some(KeyCommand::Shortcut(Shortcut::Redo)));
        assert_eq!(resolve_key("y", true, false), Some(KeyCommand::Shortcut(Shortcut::Redo)));
        assert_eq!(resolve_key("a", true, false), Some(KeyCommand::Shortcut(Shortcut::SelectAll)));
        assert_eq!(resolve_key("s", true, false), Some(KeyCommand::Shortcut(Shortcut::Export)));
        assert_eq!(resolve_key("s", false, false), None);
        assert_eq!(resolve_key("a", false, false), Some(KeyCommand::Tool(ToolKind::Arrow)));
        assert_eq!(resolve_key("Backspace", false, false), Some(KeyCommand::Shortcut(Shortcut::Delete)));
        assert_eq!(resolve_key("Enter", false, false), None);
    }

    #[test]
    fn test_select_tool_no_drawing() {
        assert!(Drawing::begin(ToolKind::Select, Point::ZERO, ElementStyle::default()).is_none());
        assert!(Drawing::begin(ToolKind::Text, Point::ZERO, ElementStyle::default()).is_none());
    }

    #[test]
    fn test_shape_drawing_filter() {
        let mut drawing =
            Drawing::begin(ToolKind::Diamond, Point::new(10.0, 10.0), ElementStyle::default()).unwrap();
        drawing.extend(Point::new(11.0, 12.0));
        assert!(drawing.clone().finish(2.0, 3).is_none());

        drawing.release(Point::new(10.0, 40.0));
        let element = drawing.finish(2.0, 3).unwrap();
        assert_eq!(element.element_type(), ElementType::Diamond);
        assert!((element.height - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_preview_keeps_id() {
        let mut drawing =
            Drawing::begin(ToolKind::Line, Point::ZERO, ElementStyle::default()).unwrap();
        drawing.extend(Point::new(30.0, -20.0));
        let first = drawing.preview().unwrap();
        drawing.extend(Point::new(60.0, -40.0));
        let second = drawing.preview().unwrap();
        assert_eq!(first.id(), second.id());
        assert!((second.width - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_freehand_point_filter() {
        let mut drawing =
            Drawing::begin(ToolKind::Freehand, Point::ZERO, ElementStyle::default()).unwrap();
        drawing.extend(Point::new(1.0, 1.0));
        drawing.release(Point::new(5.0, 5.0));
        assert_eq!(drawing.point_count(), 2);
        assert!(drawing.clone().finish(2.0, 3).is_none());

        drawing.extend(Point::new(2.0, 3.0));
        assert_eq!(drawing.finish(2.0, 3).map(|e| e.points().len()), Some(3));
    }
}
