//! SlateCanvas Core Library
//!
//! Element model, convergent board document, local edit session and the
//! `.slatecanvas` file codec for a collaborative whiteboard. Rendering and
//! transport live outside this crate.

pub mod codec;
pub mod collaboration;
pub mod config;
pub mod document;
pub mod element;
pub mod session;

pub use codec::{BoardSnapshot, DecodeError, FileError};
pub use collaboration::{
    CollaborationRoom, ConnectionStatus, Gateway, GatewayError, GatewayEvent, LoopbackHub,
    PresenceState,
};
pub use config::{Config, ConfigError};
pub use document::{Document, DocumentError, DocumentResult, Operation};
pub use element::{Color, Element, ElementId, ElementKind, ElementStyle, ElementType, InvalidElement};
pub use session::{EditSession, GestureOutcome, KeyOutcome, PointerInput, ToolKind, Viewport};
