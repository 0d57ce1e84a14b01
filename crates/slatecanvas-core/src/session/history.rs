//! Bounded undo/redo of local operations.

use crate::document::{Document, DocumentResult, Operation};
use std::collections::VecDeque;

/// One undo step: inverse operations in recording order. Undoing applies
/// them last to first.
type Step = Vec<Operation>;

/// Undo/redo stacks holding inverse operations of local edits only.
///
/// Operations recorded while a group is open form one step; consecutive
/// moves of the same elements inside a group are folded together.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Step>,
    redo: Vec<Step>,
    open: Option<Step>,
    max_steps: usize,
}

impl History {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            open: None,
            max_steps: max_steps.max(1),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty() || self.open.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    /// Start collecting operations into a single step.
    pub fn begin_group(&mut self) {
        self.end_group();
        self.open = Some(Vec::new());
    }

    /// Close the open step, if any.
    pub fn end_group(&mut self) {
        if let Some(step) = self.open.take() {
            self.push(step);
        }
    }

    /// Record the inverse of an operation just applied locally.
    pub fn record(&mut self, inverse: Operation) {
        match &mut self.open {
            Some(step) => {
                let folded = step.last_mut().is_some_and(|last| last.coalesce(&inverse));
                if !folded {
                    step.push(inverse);
                }
            }
            None => self.push(vec![inverse]),
        }
    }

    fn push(&mut self, step: Step) {
        if step.is_empty() {
            return;
        }
        self.redo.clear();
        self.undo.push_back(step);
        while self.undo.len() > self.max_steps {
            self.undo.pop_front();
        }
    }

    /// Revert the latest step. Targets removed meanwhile by peers are
    /// skipped. Returns whether the document changed.
    pub fn undo(&mut self, doc: &mut Document) -> DocumentResult<bool> {
        self.end_group();
        let Some(step) = self.undo.pop_back() else {
            return Ok(false);
        };
        let reverted = replay(doc, &step)?;
        let changed = !reverted.is_empty();
        if changed {
            self.redo.push(reverted);
        }
        Ok(changed)
    }

    /// Re-apply the latest undone step.
    pub fn redo(&mut self, doc: &mut Document) -> DocumentResult<bool> {
        self.end_group();
        let Some(step) = self.redo.pop() else {
            return Ok(false);
        };
        let reapplied = replay(doc, &step)?;
        let changed = !reapplied.is_empty();
        if changed {
            self.undo.push_back(reapplied);
        }
        Ok(changed)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.open = None;
    }
}

/// Apply a step last to first, collecting the inverses in application order.
fn replay(doc: &mut Document, step: &Step) -> DocumentResult<Step> {
    let mut inverses = Vec::with_capacity(step.len());
    for op in step.iter().rev() {
        if let Some(inverse) = doc.apply(op)? {
            inverses.push(inverse);
        }
    }
    Ok(inverses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use kurbo::{Point, Vec2};

    fn record_apply(history: &mut History, doc: &mut Document, op: Operation) {
        if let Some(inverse) = doc.apply(&op).unwrap() {
            history.record(inverse);
        }
    }

    #[test]
    fn test_undo_redo_append() {
        let mut doc = Document::new("board");
        let mut history = History::new(100);
        let rect = Element::rectangle(Point::ZERO, 10.0, 10.0);
        record_apply(&mut history, &mut doc, Operation::Append(rect.clone()));

        assert!(history.undo(&mut doc).unwrap());
        assert!(doc.is_empty());
        assert!(history.can_redo());
        assert!(history.redo(&mut doc).unwrap());
        assert_eq!(doc.elements(), vec![rect]);
    }

    #[test]
    fn test_group_is_one_step() {
        let mut doc = Document::new("board");
        let mut history = History::new(100);
        let rect = Element::rectangle(Point::ZERO, 10.0, 10.0);
        doc.append(rect.clone()).unwrap();

        history.begin_group();
        for _ in 0..4 {
            let op = Operation::BatchMove {
                ids: vec![rect.id()],
                delta: Vec2::new(2.5, 1.0),
            };
            record_apply(&mut history, &mut doc, op);
        }
        history.end_group();
        assert_eq!(history.undo_count(), 1);

        assert!(history.undo(&mut doc).unwrap());
        let restored = doc.get(rect.id()).unwrap();
        assert!(restored.position.x.abs() < 1e-9);
        assert!(restored.position.y.abs() < 1e-9);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut doc = Document::new("board");
        let mut history = History::new(100);
        record_apply(
            &mut history,
            &mut doc,
            Operation::Append(Element::rectangle(Point::ZERO, 10.0, 10.0)),
        );
        history.undo(&mut doc).unwrap();
        record_apply(
            &mut history,
            &mut doc,
            Operation::Append(Element::ellipse(Point::ZERO, 10.0, 10.0)),
        );
        assert!(!history.can_redo());
    }

    #[test]
    fn test_bounded_steps() {
        let mut doc = Document::new("board");
        let mut history = History::new(3);
        for i in 0..5 {
            let rect = Element::rectangle(Point::new(i as f64, 0.0), 10.0, 10.0);
            record_apply(&mut history, &mut doc, Operation::Append(rect));
        }
        assert_eq!(history.undo_count(), 3);
        while history.undo(&mut doc).unwrap() {}
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_undo_of_removed_target_is_noop() {
        let mut doc = Document::new("board");
        let mut history = History::new(100);
        let rect = Element::rectangle(Point::ZERO, 10.0, 10.0);
        doc.append(rect.clone()).unwrap();
        record_apply(
            &mut history,
            &mut doc,
            Operation::BatchMove {
                ids: vec![rect.id()],
                delta: Vec2::new(5.0, 5.0),
            },
        );
        // A peer deletes the element; this replica applies it without recording.
        doc.delete_by_id(rect.id()).unwrap();

        assert!(!history.undo(&mut doc).unwrap());
        assert!(doc.is_empty());
        assert!(!history.can_redo());
    }
}
