//! Binary board format for export and import.
//!
//! A board file is one protobuf `WhiteboardState` message. The element
//! message is a flat union of every kind's fields; fields a kind does not use
//! are left at their proto3 defaults.
//!
//! Two revisions exist. The first wrote coordinates as `float` and carried no
//! version. The current one writes `double` and sets `version = 4` to
//! [`FORMAT_VERSION`]. Decoding peeks the version before choosing a schema.

mod file;
mod wire;

pub use file::{
    FileError, IMPORTED_BOARD_NAME, export_into, export_to_file, file_name_for, import_from_file,
};

use crate::element::{
    ColorParseError, Element, ElementId, ElementKind, ElementStyle, ElementType, InvalidElement,
    TextContent, fill_to_string, parse_fill,
};
use kurbo::Point;
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;
use wire::{LegacyBoard, WireBoard, WireElement, WireHeader, WirePoint};

/// File extension of exported boards, without the dot.
pub const FILE_EXTENSION: &str = "slatecanvas";
/// Version written by [`encode`].
pub const FORMAT_VERSION: u32 = 2;
/// Version of files without a version field.
pub const LEGACY_FORMAT_VERSION: u32 = 0;

/// Point-in-time content of a board: id, display name and elements in
/// stacking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub id: String,
    pub name: String,
    pub elements: Vec<Element>,
}

/// Board bytes could not be turned into a snapshot.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed board data: {0}")]
    Malformed(#[from] prost::DecodeError),
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("element {index}: unknown type {kind:?}")]
    UnknownType { index: usize, kind: String },
    #[error("element {index}: bad id {id:?}")]
    BadId { index: usize, id: String },
    #[error("element {index}: {source}")]
    BadColor {
        index: usize,
        #[source]
        source: ColorParseError,
    },
    #[error("duplicate element id {0}")]
    DuplicateId(ElementId),
    #[error("element {index}: {source}")]
    InvalidElement {
        index: usize,
        #[source]
        source: InvalidElement,
    },
}

/// Encode a board in the current format.
///
/// The output depends only on the input: fields are written in declaration
/// order and repeated fields in sequence order.
pub fn encode(id: &str, name: &str, elements: &[Element]) -> Vec<u8> {
    let board = WireBoard {
        id: id.to_string(),
        name: name.to_string(),
        elements: elements.iter().map(element_to_wire).collect(),
        version: FORMAT_VERSION,
    };
    let mut out = Vec::with_capacity(board.encoded_len());
    // Writing into a growable Vec cannot run out of capacity.
    board.encode(&mut out).unwrap_or_default();
    out
}

pub fn encode_snapshot(snapshot: &BoardSnapshot) -> Vec<u8> {
    encode(&snapshot.id, &snapshot.name, &snapshot.elements)
}

/// Format version of encoded board bytes.
pub fn format_version(bytes: &[u8]) -> Result<u32, DecodeError> {
    Ok(WireHeader::decode(bytes)?.version)
}

/// Decode board bytes of any supported version.
///
/// Every element is validated; a single bad element fails the whole decode.
/// Legacy freehand paths with fewer than two points are dropped instead,
/// since the old exporter could write them.
pub fn decode(bytes: &[u8]) -> Result<BoardSnapshot, DecodeError> {
    let (board, legacy) = match format_version(bytes)? {
        FORMAT_VERSION => (WireBoard::decode(bytes)?, false),
        LEGACY_FORMAT_VERSION => {
            log::info!("decoding legacy single-precision board");
            let old = LegacyBoard::decode(bytes)?;
            let board = WireBoard {
                id: old.id,
                name: old.name,
                elements: old.elements.into_iter().map(WireElement::from).collect(),
                version: LEGACY_FORMAT_VERSION,
            };
            (board, true)
        }
        other => return Err(DecodeError::UnsupportedVersion(other)),
    };

    let mut ids = HashSet::new();
    let mut elements = Vec::with_capacity(board.elements.len());
    for (index, wire) in board.elements.into_iter().enumerate() {
        if legacy && wire.kind == ElementType::Freehand.as_str() && wire.points.len() < 2 {
            log::warn!(
                "discarding freehand element {} with {} points",
                wire.id,
                wire.points.len()
            );
            continue;
        }
        let element = element_from_wire(index, wire)?;
        if !ids.insert(element.id()) {
            return Err(DecodeError::DuplicateId(element.id()));
        }
        elements.push(element);
    }

    Ok(BoardSnapshot {
        id: board.id,
        name: board.name,
        elements,
    })
}

fn element_to_wire(element: &Element) -> WireElement {
    let mut wire = WireElement {
        id: element.id().to_string(),
        kind: element.element_type().as_str().to_string(),
        x: element.position.x,
        y: element.position.y,
        width: element.width,
        height: element.height,
        stroke_color: element.style.stroke_color.to_hex(),
        background_color: fill_to_string(element.style.fill_color),
        stroke_width: element.style.stroke_width,
        opacity: element.style.opacity,
        ..WireElement::default()
    };

    match &element.kind {
        ElementKind::Freehand { points } => {
            wire.points = points.iter().map(|p| WirePoint { x: p.x, y: p.y }).collect();
        }
        ElementKind::Text(text) => {
            wire.text = text.content.clone();
            wire.font_size = text.font_size;
            wire.font_family = text.font_family.clone();
        }
        _ => {}
    }
    wire
}

fn element_from_wire(index: usize, wire: WireElement) -> Result<Element, DecodeError> {
    let element_type = ElementType::from_wire(&wire.kind).ok_or_else(|| DecodeError::UnknownType {
        index,
        kind: wire.kind.clone(),
    })?;
    let id = Uuid::parse_str(&wire.id).map_err(|_| DecodeError::BadId {
        index,
        id: wire.id.clone(),
    })?;
    let bad_color = |source: ColorParseError| DecodeError::BadColor { index, source };
    let style = ElementStyle {
        stroke_color: wire.stroke_color.parse().map_err(bad_color)?,
        fill_color: parse_fill(&wire.background_color).map_err(bad_color)?,
        stroke_width: wire.stroke_width,
        opacity: wire.opacity,
    };

    let kind = match element_type {
        ElementType::Rectangle => ElementKind::Rectangle,
        ElementType::Ellipse => ElementKind::Ellipse,
        ElementType::Diamond => ElementKind::Diamond,
        ElementType::Line => ElementKind::Line,
        ElementType::Arrow => ElementKind::Arrow,
        ElementType::Freehand => ElementKind::Freehand {
            points: wire.points.iter().map(|p| Point::new(p.x, p.y)).collect(),
        },
        ElementType::Text => ElementKind::Text(TextContent {
            content: wire.text,
            font_size: wire.font_size,
            font_family: wire.font_family,
        }),
    };

    let element = Element::reconstruct(
        id,
        Point::new(wire.x, wire.y),
        wire.width,
        wire.height,
        style,
        kind,
    );
    element
        .validate()
        .map_err(|source| DecodeError::InvalidElement { index, source })?;
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Color;
    use wire::{LegacyElement, LegacyPoint};

    fn every_kind() -> Vec<Element> {
        vec![
            Element::rectangle(Point::new(10.0, 10.0), 50.0, 50.0).with_style(ElementStyle {
                stroke_color: Color::rgb(0xef, 0x44, 0x44),
                ..ElementStyle::default()
            }),
            Element::ellipse(Point::new(100.0, 100.0), -30.0, 30.0).with_style(ElementStyle {
                fill_color: Some(Color::new(0x10, 0xb9, 0x81, 0x80)),
                opacity: 0.4,
                ..ElementStyle::default()
            }),
            Element::diamond(Point::new(0.1, 0.2), 0.3, 7.0),
            Element::line(Point::new(1.0, 1.0), Point::new(-4.0, 9.5)),
            Element::arrow(Point::new(3.0, 3.0), Point::new(8.0, 1.0)),
            Element::freehand(vec![
                Point::new(0.125, 0.5),
                Point::new(1.0 / 3.0, 2.0),
                Point::new(4.0, 4.0),
            ]),
            Element::text(Point::new(20.0, 30.0), "hello\nworld", 20.0, "Inter"),
        ]
    }

    #[test]
    fn test_roundtrip_every_kind() {
        let elements = every_kind();
        let bytes = encode("board-1", "Planning", &elements);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.id, "board-1");
        assert_eq!(decoded.name, "Planning");
        assert_eq!(decoded.elements, elements);
    }

    #[test]
    fn test_empty_board_is_valid() {
        let bytes = encode("empty", "", &[]);
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.elements.is_empty());
        assert_eq!(decoded.name, "");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let elements = every_kind();
        assert_eq!(encode("b", "n", &elements), encode("b", "n", &elements));
        assert_eq!(format_version(&encode("b", "n", &elements)).unwrap(), FORMAT_VERSION);
    }

    #[test]
    fn test_truncated_input_fails() {
        let bytes = encode("board", "name", &every_kind());
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let board = WireBoard {
            version: 7,
            ..WireBoard::default()
        };
        let bytes = board.encode_to_vec();
        assert!(matches!(decode(&bytes), Err(DecodeError::UnsupportedVersion(7))));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut wire = element_to_wire(&Element::rectangle(Point::ZERO, 5.0, 5.0));
        wire.kind = "hexagon".to_string();
        let board = WireBoard {
            elements: vec![wire],
            version: FORMAT_VERSION,
            ..WireBoard::default()
        };
        let result = decode(&board.encode_to_vec());
        assert!(matches!(result, Err(DecodeError::UnknownType { index: 0, .. })));
    }

    #[test]
    fn test_invalid_element_rejected() {
        let mut rect = Element::rectangle(Point::ZERO, 5.0, 5.0);
        rect.style.stroke_width = 0.0;
        let bytes = encode("b", "n", &[rect]);
        assert!(matches!(decode(&bytes), Err(DecodeError::InvalidElement { index: 0, .. })));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rect = Element::rectangle(Point::ZERO, 5.0, 5.0);
        let bytes = encode("b", "n", &[rect.clone(), rect]);
        assert!(matches!(decode(&bytes), Err(DecodeError::DuplicateId(_))));
    }

    #[test]
    fn test_legacy_float_file() {
        let rect_id = Uuid::new_v4();
        let legacy = LegacyBoard {
            id: "old".to_string(),
            name: "Old board".to_string(),
            elements: vec![
                LegacyElement {
                    id: rect_id.to_string(),
                    kind: "rect".to_string(),
                    x: 10.5,
                    y: 20.0,
                    width: 40.0,
                    height: -10.0,
                    stroke_color: "#ff8a65".to_string(),
                    background_color: "transparent".to_string(),
                    stroke_width: 2.0,
                    opacity: 1.0,
                    ..LegacyElement::default()
                },
                LegacyElement {
                    id: Uuid::new_v4().to_string(),
                    kind: "draw".to_string(),
                    stroke_color: "#ff8a65".to_string(),
                    background_color: "transparent".to_string(),
                    stroke_width: 2.0,
                    opacity: 1.0,
                    points: vec![LegacyPoint { x: 1.0, y: 1.0 }],
                    ..LegacyElement::default()
                },
            ],
        };
        let bytes = legacy.encode_to_vec();
        assert_eq!(format_version(&bytes).unwrap(), LEGACY_FORMAT_VERSION);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.name, "Old board");
        assert_eq!(decoded.elements.len(), 1);
        let rect = &decoded.elements[0];
        assert_eq!(rect.id(), rect_id);
        assert!((rect.position.x - 10.5).abs() < 1e-6);
        assert!((rect.height + 10.0).abs() < 1e-6);
        assert_eq!(rect.style.fill_color, None);
    }

    #[test]
    fn test_upgrade_legacy_roundtrip() {
        let legacy = LegacyBoard {
            id: "old".to_string(),
            name: "Old".to_string(),
            elements: Vec::new(),
        };
        let decoded = decode(&legacy.encode_to_vec()).unwrap();
        let upgraded = encode_snapshot(&decoded);
        assert_eq!(format_version(&upgraded).unwrap(), FORMAT_VERSION);
        assert_eq!(decode(&upgraded).unwrap(), decoded);
    }
}
