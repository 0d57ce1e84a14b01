//! Local selection set and corner resize handles.

use crate::element::{Element, ElementId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Ids of locally selected elements, in selection order.
///
/// Never replicated and never owns elements; ids whose element disappears
/// are dropped by [`Selection::retain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    /// The selected id when exactly one element is selected.
    pub fn sole(&self) -> Option<ElementId> {
        match self.ids.as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }

    /// Plain click: select only `id`.
    pub fn replace(&mut self, id: ElementId) {
        self.ids.clear();
        self.ids.push(id);
    }

    /// Shift click: add `id`, or remove it if already selected.
    pub fn toggle(&mut self, id: ElementId) {
        if let Some(pos) = self.ids.iter().position(|other| *other == id) {
            self.ids.remove(pos);
        } else {
            self.ids.push(id);
        }
    }

    /// Select exactly `ids`, dropping repeats.
    pub fn set(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.ids.clear();
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
    }

    pub fn remove(&mut self, id: ElementId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|other| *other != id);
        self.ids.len() != before
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Keep only ids for which `present` holds.
    pub fn retain(&mut self, mut present: impl FnMut(ElementId) -> bool) {
        self.ids.retain(|id| present(*id));
    }
}

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }

    /// This corner of a normalized rectangle.
    pub fn of(self, bounds: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(bounds.x0, bounds.y0),
            Corner::TopRight => Point::new(bounds.x1, bounds.y0),
            Corner::BottomLeft => Point::new(bounds.x0, bounds.y1),
            Corner::BottomRight => Point::new(bounds.x1, bounds.y1),
        }
    }
}

/// A resize handle with its position in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub position: Point,
    pub corner: Corner,
}

impl Handle {
    /// Check if a point hits this handle.
    /// `tolerance` should be adjusted for viewport zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let dx = point.x - self.position.x;
        let dy = point.y - self.position.y;
        dx * dx + dy * dy <= tolerance * tolerance
    }
}

/// Corner handles of an element; none for kinds that cannot be resized.
pub fn corner_handles(element: &Element) -> Vec<Handle> {
    if !element.is_resizable() {
        return Vec::new();
    }
    let bounds = element.bounding_box();
    Corner::ALL
        .into_iter()
        .map(|corner| Handle {
            position: corner.of(bounds),
            corner,
        })
        .collect()
}

/// Which corner handle of `element`, if any, is under `point`.
pub fn hit_test_handles(element: &Element, point: Point, tolerance: f64) -> Option<Corner> {
    corner_handles(element)
        .into_iter()
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.corner)
}

/// Resize `original` so the dragged `corner` lands on `to` while the opposite
/// corner stays put. Dragging past the anchor flips the shape, giving a
/// negative size. Axes with no extent are left unscaled.
pub fn apply_corner_resize(original: &Element, corner: Corner, to: Point) -> Element {
    let bounds = original.bounding_box();
    let anchor = corner.opposite().of(bounds);
    let dragged = corner.of(bounds);

    let scale = |target: f64, from: f64, fixed: f64| {
        let extent = from - fixed;
        if extent.abs() < f64::EPSILON {
            1.0
        } else {
            (target - fixed) / extent
        }
    };
    let sx = scale(to.x, dragged.x, anchor.x);
    let sy = scale(to.y, dragged.y, anchor.y);

    let mut resized = original.clone();
    resized.map_geometry(|p| {
        Point::new(
            anchor.x + (p.x - anchor.x) * sx,
            anchor.y + (p.y - anchor.y) * sy,
        )
    });
    resized
}
