//! Edit operations exchanged between the session and the document.

use crate::element::{Element, ElementId};
use kurbo::Vec2;
use serde::{Deserialize, Serialize};

/// A single document mutation.
///
/// Applying an operation through [`Document::apply`](super::Document::apply)
/// yields its inverse, which is what the undo history stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Add an element on top of the stack.
    Append(Element),
    /// Add an element at a given stack position (clamped to the length).
    Insert { index: usize, element: Element },
    /// Overwrite the element with the same id.
    Replace(Element),
    /// Set the fields of an element that still hold their `from` values to
    /// the `to` values, leaving fields changed since then alone. Undo uses
    /// this so reverting a local edit keeps later edits from peers.
    Patch { from: Element, to: Element },
    /// Remove an element.
    Delete(ElementId),
    /// Translate several elements at once, in one transaction.
    BatchMove { ids: Vec<ElementId>, delta: Vec2 },
    /// Move an element to a new stack position.
    Reorder { id: ElementId, index: usize },
    /// Set or clear a board metadata entry.
    SetMetadata { key: String, value: Option<String> },
}

impl Operation {
    /// Ids of the elements this operation touches.
    pub fn element_ids(&self) -> Vec<ElementId> {
        match self {
            Operation::Append(e) | Operation::Replace(e) => vec![e.id()],
            Operation::Insert { element, .. } => vec![element.id()],
            Operation::Patch { from, .. } => vec![from.id()],
            Operation::Delete(id) | Operation::Reorder { id, .. } => vec![*id],
            Operation::BatchMove { ids, .. } => ids.clone(),
            Operation::SetMetadata { .. } => Vec::new(),
        }
    }

    /// Fold the inverse `next`, recorded after `self`, into `self`.
    ///
    /// Moves of the same ids add up. Two patches of one element combine into
    /// one running from the latest `from` back to the earliest `to`.
    pub(crate) fn coalesce(&mut self, next: &Operation) -> bool {
        match (self, next) {
            (Operation::Patch { from, to }, Operation::Patch { from: next_from, .. })
                if to.id() == next_from.id() =>
            {
                *from = next_from.clone();
                true
            }
            (
                Operation::BatchMove { ids, delta },
                Operation::BatchMove {
                    ids: next_ids,
                    delta: next_delta,
                },
            ) if ids == next_ids => {
                *delta += *next_delta;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_coalesce_moves_of_same_ids() {
        let rect = Element::rectangle(Point::ZERO, 10.0, 10.0);
        let ids = vec![rect.id()];
        let mut first = Operation::BatchMove {
            ids: ids.clone(),
            delta: Vec2::new(1.0, 2.0),
        };
        let second = Operation::BatchMove {
            ids,
            delta: Vec2::new(3.0, -1.0),
        };
        assert!(first.coalesce(&second));
        assert_eq!(
            first,
            Operation::BatchMove {
                ids: vec![rect.id()],
                delta: Vec2::new(4.0, 1.0)
            }
        );
    }

    #[test]
    fn test_coalesce_patches_keeps_outer_states() {
        let first = Element::rectangle(Point::ZERO, 10.0, 10.0);
        let mut second = first.clone();
        second.width = 20.0;
        let mut third = second.clone();
        third.width = 30.0;

        let mut earlier = Operation::Patch {
            from: second.clone(),
            to: first.clone(),
        };
        let later = Operation::Patch {
            from: third.clone(),
            to: second,
        };
        assert!(earlier.coalesce(&later));
        assert_eq!(earlier, Operation::Patch { from: third, to: first });
    }

    #[test]
    fn test_no_coalesce_across_kinds() {
        let rect = Element::rectangle(Point::ZERO, 10.0, 10.0);
        let mut append = Operation::Append(rect.clone());
        assert!(!append.coalesce(&Operation::Delete(rect.id())));
        assert_eq!(append.element_ids(), vec![rect.id()]);
    }
}
