//! Protobuf messages of the board file format.
//!
//! Both schemas share field numbers; the current one widens coordinates to
//! `double` and adds `version = 4` to the board message. Kind-irrelevant
//! fields are written as proto3 defaults.

use prost::Message;

/// Only the version tag; used to pick a schema before the full decode.
#[derive(Clone, PartialEq, Message)]
pub(crate) struct WireHeader {
    #[prost(uint32, tag = "4")]
    pub version: u32,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct WirePoint {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct WireElement {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub kind: String,
    #[prost(double, tag = "3")]
    pub x: f64,
    #[prost(double, tag = "4")]
    pub y: f64,
    #[prost(double, tag = "5")]
    pub width: f64,
    #[prost(double, tag = "6")]
    pub height: f64,
    #[prost(string, tag = "7")]
    pub stroke_color: String,
    #[prost(string, tag = "8")]
    pub background_color: String,
    #[prost(double, tag = "9")]
    pub stroke_width: f64,
    #[prost(double, tag = "10")]
    pub opacity: f64,
    #[prost(message, repeated, tag = "11")]
    pub points: Vec<WirePoint>,
    #[prost(string, tag = "12")]
    pub text: String,
    #[prost(double, tag = "13")]
    pub font_size: f64,
    #[prost(string, tag = "14")]
    pub font_family: String,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct WireBoard {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, repeated, tag = "3")]
    pub elements: Vec<WireElement>,
    #[prost(uint32, tag = "4")]
    pub version: u32,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct LegacyPoint {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct LegacyElement {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub kind: String,
    #[prost(float, tag = "3")]
    pub x: f32,
    #[prost(float, tag = "4")]
    pub y: f32,
    #[prost(float, tag = "5")]
    pub width: f32,
    #[prost(float, tag = "6")]
    pub height: f32,
    #[prost(string, tag = "7")]
    pub stroke_color: String,
    #[prost(string, tag = "8")]
    pub background_color: String,
    #[prost(float, tag = "9")]
    pub stroke_width: f32,
    #[prost(float, tag = "10")]
    pub opacity: f32,
    #[prost(message, repeated, tag = "11")]
    pub points: Vec<LegacyPoint>,
    #[prost(string, tag = "12")]
    pub text: String,
    #[prost(float, tag = "13")]
    pub font_size: f32,
    #[prost(string, tag = "14")]
    pub font_family: String,
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct LegacyBoard {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, repeated, tag = "3")]
    pub elements: Vec<LegacyElement>,
}

impl From<LegacyElement> for WireElement {
    fn from(legacy: LegacyElement) -> Self {
        Self {
            id: legacy.id,
            kind: legacy.kind,
            x: f64::from(legacy.x),
            y: f64::from(legacy.y),
            width: f64::from(legacy.width),
            height: f64::from(legacy.height),
            stroke_color: legacy.stroke_color,
            background_color: legacy.background_color,
            stroke_width: f64::from(legacy.stroke_width),
            opacity: f64::from(legacy.opacity),
            points: legacy
                .points
                .into_iter()
                .map(|p| WirePoint {
                    x: f64::from(p.x),
                    y: f64::from(p.y),
                })
                .collect(),
            text: legacy.text,
            font_size: f64::from(legacy.font_size),
            font_family: legacy.font_family,
        }
    }
}
