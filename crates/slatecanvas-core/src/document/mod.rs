//! Replicated whiteboard document backed by Loro.
//!
//! # Schema
//!
//! ```text
//! LoroDoc
//! ├── "elements": LoroMap<ElementId, LoroMap> (element content)
//! ├── "order": LoroMovableList<String> (visible ids, bottom to top)
//! └── "meta": LoroMap<String, String> (board name and other metadata)
//! ```
//!
//! Each element map holds `id`, `type` (wire tag), `x`, `y`, `width`,
//! `height`, the style fields and the kind-specific fields (`points` for
//! freehand paths, `content`/`font_size`/`font_family` for text).
//!
//! Only the order list decides visibility. A replace rewrites the content
//! map and never touches the list, so a concurrent delete always wins.

mod convert;
mod operation;
mod schema;

pub use convert::{element_from_loro, element_to_loro};
pub use operation::Operation;
pub use schema::{
    DEFAULT_BOARD_NAME, Document, ELEMENTS_KEY, META_KEY, NAME_KEY, ORDER_KEY, PendingUpdate,
    SubscriptionId,
};

// Re-export Loro types that may be useful for collaboration
pub use loro::VersionVector;

use crate::element::{ElementId, InvalidElement};
use thiserror::Error;

/// Errors raised by document writes.
///
/// Operations on ids that no longer exist are not errors; they report
/// "nothing changed" instead.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid element: {0}")]
    InvalidElement(#[from] InvalidElement),
    #[error("element {0} already exists")]
    DuplicateId(ElementId),
    #[error("replicated log error: {0}")]
    Log(#[from] loro::LoroError),
    #[error("failed to encode document: {0}")]
    Export(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;
