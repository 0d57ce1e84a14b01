//! Conversion between elements and Loro values.

use crate::element::{
    Color, Element, ElementKind, ElementStyle, ElementType, TextContent, fill_to_string,
    parse_fill,
};
use kurbo::Point;
use loro::{LoroList, LoroMap, LoroMapValue, LoroResult, LoroValue};
use uuid::Uuid;

// Common keys
const KEY_ID: &str = "id";
const KEY_TYPE: &str = "type";
const KEY_X: &str = "x";
const KEY_Y: &str = "y";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";

// Style keys
const KEY_STROKE_COLOR: &str = "stroke_color";
const KEY_FILL_COLOR: &str = "fill_color";
const KEY_STROKE_WIDTH: &str = "stroke_width";
const KEY_OPACITY: &str = "opacity";

// Freehand keys
const KEY_POINTS: &str = "points";

// Text keys
const KEY_CONTENT: &str = "content";
const KEY_FONT_SIZE: &str = "font_size";
const KEY_FONT_FAMILY: &str = "font_family";

fn get_double(map: &LoroMapValue, key: &str) -> Option<f64> {
    number(map.get(key)?)
}

fn get_string(map: &LoroMapValue, key: &str) -> Option<String> {
    match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn number(value: &LoroValue) -> Option<f64> {
    match value {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

/// Write every field of `element` into `map`.
pub fn element_to_loro(element: &Element, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_ID, element.id().to_string())?;
    map.insert(KEY_TYPE, element.element_type().as_str())?;
    map.insert(KEY_X, element.position.x)?;
    map.insert(KEY_Y, element.position.y)?;
    map.insert(KEY_WIDTH, element.width)?;
    map.insert(KEY_HEIGHT, element.height)?;
    style_to_loro(&element.style, map)?;

    match &element.kind {
        ElementKind::Freehand { points } => {
            // Points as a list of [x, y] pairs
            let points_list = map.insert_container(KEY_POINTS, LoroList::new())?;
            for point in points {
                let pair = points_list.insert_container(points_list.len(), LoroList::new())?;
                pair.push(point.x)?;
                pair.push(point.y)?;
            }
        }
        ElementKind::Text(text) => {
            map.insert(KEY_CONTENT, text.content.as_str())?;
            map.insert(KEY_FONT_SIZE, text.font_size)?;
            map.insert(KEY_FONT_FAMILY, text.font_family.as_str())?;
        }
        _ => {}
    }
    Ok(())
}

fn style_to_loro(style: &ElementStyle, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_STROKE_COLOR, style.stroke_color.to_hex())?;
    map.insert(KEY_FILL_COLOR, fill_to_string(style.fill_color))?;
    map.insert(KEY_STROKE_WIDTH, style.stroke_width)?;
    map.insert(KEY_OPACITY, style.opacity)?;
    Ok(())
}

/// Read an element back from its deep map value.
/// Returns `None` when a required field is missing or malformed.
pub fn element_from_loro(map: &LoroMapValue) -> Option<Element> {
    let id = Uuid::parse_str(&get_string(map, KEY_ID)?).ok()?;
    let element_type = ElementType::from_wire(&get_string(map, KEY_TYPE)?)?;
    let position = Point::new(get_double(map, KEY_X)?, get_double(map, KEY_Y)?);
    let width = get_double(map, KEY_WIDTH).unwrap_or(0.0);
    let height = get_double(map, KEY_HEIGHT).unwrap_or(0.0);
    let style = style_from_loro(map)?;

    let kind = match element_type {
        ElementType::Rectangle => ElementKind::Rectangle,
        ElementType::Ellipse => ElementKind::Ellipse,
        ElementType::Diamond => ElementKind::Diamond,
        ElementType::Line => ElementKind::Line,
        ElementType::Arrow => ElementKind::Arrow,
        ElementType::Freehand => ElementKind::Freehand {
            points: points_from_loro(map)?,
        },
        ElementType::Text => ElementKind::Text(TextContent {
            content: get_string(map, KEY_CONTENT)?,
            font_size: get_double(map, KEY_FONT_SIZE)?,
            font_family: get_string(map, KEY_FONT_FAMILY)?,
        }),
    };

    Some(Element::reconstruct(id, position, width, height, style, kind))
}

fn points_from_loro(map: &LoroMapValue) -> Option<Vec<Point>> {
    let LoroValue::List(list) = map.get(KEY_POINTS)? else {
        return None;
    };
    list.iter()
        .map(|pair| match pair {
            LoroValue::List(coords) if coords.len() >= 2 => {
                Some(Point::new(number(&coords[0])?, number(&coords[1])?))
            }
            _ => None,
        })
        .collect()
}

fn style_from_loro(map: &LoroMapValue) -> Option<ElementStyle> {
    let stroke_color: Color = get_string(map, KEY_STROKE_COLOR)?.parse().ok()?;
    let fill_color = parse_fill(&get_string(map, KEY_FILL_COLOR).unwrap_or_default()).ok()?;
    Some(ElementStyle {
        stroke_color,
        fill_color,
        stroke_width: get_double(map, KEY_STROKE_WIDTH)?,
        opacity: get_double(map, KEY_OPACITY).unwrap_or(1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loro::LoroDoc;

    fn roundtrip(element: &Element) -> Option<Element> {
        let doc = LoroDoc::new();
        let root = doc.get_map("elements");
        let map = root
            .insert_container(&element.id().to_string(), LoroMap::new())
            .unwrap();
        element_to_loro(element, &map).unwrap();
        doc.commit();
        match map.get_deep_value() {
            LoroValue::Map(value) => element_from_loro(&value),
            _ => None,
        }
    }

    #[test]
    fn test_roundtrip_filled_rectangle() {
        let style = ElementStyle {
            fill_color: Some(Color::rgb(0x10, 0xb9, 0x81)),
            stroke_width: 4.0,
            opacity: 0.5,
            ..ElementStyle::default()
        };
        let rect = Element::rectangle(Point::new(10.0, 20.0), -30.0, 40.0).with_style(style);
        assert_eq!(roundtrip(&rect), Some(rect));
    }

    #[test]
    fn test_roundtrip_freehand_and_text() {
        let path = Element::freehand(vec![
            Point::new(0.0, 0.0),
            Point::new(4.5, 2.0),
            Point::new(9.0, -3.0),
        ]);
        assert_eq!(roundtrip(&path), Some(path));

        let text = Element::text(Point::new(5.0, 5.0), "line one\nline two", 24.0, "Inter");
        assert_eq!(roundtrip(&text), Some(text));
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let doc = LoroDoc::new();
        let map = doc.get_map("bogus");
        map.insert(KEY_ID, Uuid::new_v4().to_string()).unwrap();
        map.insert(KEY_TYPE, "hexagon").unwrap();
        map.insert(KEY_X, 0.0).unwrap();
        map.insert(KEY_Y, 0.0).unwrap();
        doc.commit();
        let LoroValue::Map(value) = map.get_deep_value() else {
            panic!("expected map value");
        };
        assert!(element_from_loro(&value).is_none());
    }
}
