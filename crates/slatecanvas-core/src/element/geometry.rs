//! Bounding boxes, hit testing and affine edits of elements.

use super::{Element, ElementKind};
use kurbo::{Point, Rect, Vec2};

/// Default hit-test padding in canvas units.
pub const HIT_TOLERANCE: f64 = 10.0;

/// Smallest rectangle containing all points.
pub(crate) fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let init = Rect::from_points(*first, *first);
    Some(points.iter().skip(1).fold(init, |r, p| r.union_pt(*p)))
}

impl Element {
    /// Normalized bounding box (x0 <= x1, y0 <= y1) whatever the sign of the size.
    pub fn bounding_box(&self) -> Rect {
        match &self.kind {
            ElementKind::Freehand { points } => points_bounds(points)
                .unwrap_or_else(|| Rect::from_origin_size(self.position, (0.0, 0.0))),
            _ => Rect::new(
                self.position.x,
                self.position.y,
                self.position.x + self.width,
                self.position.y + self.height,
            )
            .abs(),
        }
    }

    /// Whether `point` falls inside the bounding box padded by `tolerance`.
    /// Edges are inclusive.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let b = self.bounding_box().inflate(tolerance, tolerance);
        point.x >= b.x0 && point.x <= b.x1 && point.y >= b.y0 && point.y <= b.y1
    }

    /// Shift position and every freehand point by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
        if let ElementKind::Freehand { points } = &mut self.kind {
            for p in points.iter_mut() {
                *p += delta;
            }
        }
    }

    /// Copy of this element moved by `delta`, same id.
    pub fn translated(&self, delta: Vec2) -> Self {
        let mut moved = self.clone();
        moved.translate(delta);
        moved
    }

    /// Text boxes follow their content, every other kind can be resized.
    pub fn is_resizable(&self) -> bool {
        !matches!(self.kind, ElementKind::Text(_))
    }

    /// Apply a point mapping to the geometry: the anchor and far corner of
    /// box kinds, the endpoints of lines, every point of a freehand path.
    pub(crate) fn map_geometry(&mut self, f: impl Fn(Point) -> Point) {
        let end = f(self.position + Vec2::new(self.width, self.height));
        let start = f(self.position);
        self.position = start;
        self.width = end.x - start.x;
        self.height = end.y - start.y;

        if let ElementKind::Freehand { points } = &mut self.kind {
            for p in points.iter_mut() {
                *p = f(*p);
            }
            if let Some(bounds) = points_bounds(points) {
                self.position = bounds.origin();
                self.width = bounds.width();
                self.height = bounds.height();
            }
        }
    }
}

/// Topmost element under `point`; later elements are drawn above earlier ones.
pub fn topmost_at(elements: &[Element], point: Point, tolerance: f64) -> Option<&Element> {
    elements.iter().rev().find(|e| e.hit_test(point, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_negative_size() {
        let rect = Element::rectangle(Point::new(100.0, 100.0), -40.0, -20.0);
        let b = rect.bounding_box();
        assert!((b.x0 - 60.0).abs() < f64::EPSILON);
        assert!((b.y0 - 80.0).abs() < f64::EPSILON);
        assert!((b.x1 - 100.0).abs() < f64::EPSILON);
        assert!((b.y1 - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_test_padding_inclusive() {
        let rect = Element::rectangle(Point::new(0.0, 0.0), 10.0, 10.0);
        assert!(rect.hit_test(Point::new(5.0, 5.0), 0.0));
        assert!(rect.hit_test(Point::new(20.0, 5.0), HIT_TOLERANCE));
        assert!(!rect.hit_test(Point::new(20.1, 5.0), HIT_TOLERANCE));
        assert!(!rect.hit_test(Point::new(11.0, 5.0), 0.0));
    }

    #[test]
    fn test_freehand_bounds_from_points() {
        let path = Element::freehand(vec![
            Point::new(3.0, 9.0),
            Point::new(-2.0, 4.0),
            Point::new(7.0, 5.0),
        ]);
        let b = path.bounding_box();
        assert!((b.x0 + 2.0).abs() < f64::EPSILON);
        assert!((b.x1 - 7.0).abs() < f64::EPSILON);
        assert!((b.y0 - 4.0).abs() < f64::EPSILON);
        assert!((b.y1 - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_translate_moves_points() {
        let mut path = Element::freehand(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]);
        path.translate(Vec2::new(5.0, -5.0));
        assert_eq!(path.points()[0], Point::new(5.0, -5.0));
        assert_eq!(path.points()[1], Point::new(15.0, 5.0));
        assert!((path.position.x - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_topmost_prefers_last() {
        let below = Element::rectangle(Point::new(0.0, 0.0), 100.0, 100.0);
        let above = Element::ellipse(Point::new(50.0, 50.0), 100.0, 100.0);
        let above_id = above.id();
        let below_id = below.id();
        let elements = vec![below, above];

        let hit = topmost_at(&elements, Point::new(75.0, 75.0), 0.0).map(|e| e.id());
        assert_eq!(hit, Some(above_id));
        let hit = topmost_at(&elements, Point::new(10.0, 10.0), 0.0).map(|e| e.id());
        assert_eq!(hit, Some(below_id));
        assert!(topmost_at(&elements, Point::new(500.0, 500.0), 0.0).is_none());
    }

    #[test]
    fn test_map_geometry_scales_line() {
        let mut line = Element::line(Point::new(0.0, 0.0), Point::new(10.0, 20.0));
        line.map_geometry(|p| Point::new(p.x * 2.0, p.y * 2.0));
        assert!((line.width - 20.0).abs() < f64::EPSILON);
        assert!((line.height - 40.0).abs() < f64::EPSILON);
    }
}
