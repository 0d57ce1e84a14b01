//! Local edit session: tools, gestures, selection, viewport and undo.
//!
//! The session turns pointer and keyboard input into [`Operation`]s applied
//! to a [`Document`] passed in by the caller. It is the only local path that
//! mutates a document, and every write goes through [`EditSession::can_write`]
//! and the undo history. Nothing here is replicated.

mod history;
mod selection;
mod tools;
mod viewport;

pub use history::History;
pub use selection::{
    Corner, Handle, Selection, apply_corner_resize, corner_handles, hit_test_handles,
};
pub use tools::{Drawing, KeyCommand, Shortcut, ToolKind, resolve_key};
pub use viewport::Viewport;

use crate::config::Config;
use crate::document::{Document, DocumentResult, Operation};
use crate::element::{Color, Element, ElementId, ElementStyle, topmost_at};
use kurbo::{Point, Vec2};
use std::collections::HashSet;
use std::mem;

/// Pointer button of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

/// Modifier keys held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    /// Space bar held (temporary pan).
    pub space: bool,
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerInput {
    pub position: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerInput {
    /// Primary button, no modifiers.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    pub fn with_space(mut self) -> Self {
        self.modifiers.space = true;
        self
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }
}

/// What a pointer event did to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    None,
    /// A drawn element passed the size filter and was appended.
    Committed(ElementId),
    /// A drawing was too small and thrown away.
    Discarded,
    /// The eraser removed an element.
    Deleted(ElementId),
    /// The text tool wants content for a new text element at this canvas point.
    TextRequested { at: Point },
}

/// What a key press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Unchanged,
    /// The document or the selection changed.
    Changed,
    /// The caller should export the board to a file.
    ExportRequested,
}

/// Gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Drawing,
    Dragging,
    Resizing,
    Panning,
}

#[derive(Debug, Clone)]
enum Interaction {
    Idle,
    Drawing(Drawing),
    /// `click` is the element to select alone if the pointer is released
    /// without moving.
    Dragging { last: Point, click: Option<ElementId> },
    Resizing { original: Element, corner: Corner },
    Panning { last_screen: Point },
}

/// A style property edit from the properties panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StyleChange {
    StrokeColor(Color),
    Fill(Option<Color>),
    StrokeWidth(f64),
    Opacity(f64),
}

impl StyleChange {
    pub fn apply_to(self, style: &mut ElementStyle) {
        match self {
            StyleChange::StrokeColor(color) => style.stroke_color = color,
            StyleChange::Fill(fill) => style.fill_color = fill,
            StyleChange::StrokeWidth(width) => style.stroke_width = width,
            StyleChange::Opacity(opacity) => style.opacity = opacity,
        }
    }
}

/// Per-user editing state over one document.
#[derive(Debug, Clone)]
pub struct EditSession {
    tool: ToolKind,
    style: ElementStyle,
    selection: Selection,
    viewport: Viewport,
    history: History,
    interaction: Interaction,
    can_write: bool,
    config: Config,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl EditSession {
    pub fn new(config: Config) -> Self {
        Self {
            tool: ToolKind::default(),
            style: config.default_style.clone(),
            selection: Selection::new(),
            viewport: Viewport::new(config.min_zoom, config.max_zoom),
            history: History::new(config.max_undo_steps),
            interaction: Interaction::Idle,
            can_write: true,
            config,
        }
    }

    /// A session that may not modify the document.
    pub fn read_only(config: Config) -> Self {
        let mut session = Self::new(config);
        session.can_write = false;
        session
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Switch tools. An unfinished gesture is abandoned.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.reset_interaction();
        self.tool = tool;
    }

    pub fn can_write(&self) -> bool {
        self.can_write
    }

    pub fn set_can_write(&mut self, can_write: bool) {
        if !can_write {
            self.reset_interaction();
        }
        self.can_write = can_write;
    }

    /// Style applied to new elements.
    pub fn style(&self) -> &ElementStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut ElementStyle {
        &mut self.style
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        match self.interaction {
            Interaction::Idle => SessionState::Idle,
            Interaction::Drawing(_) => SessionState::Drawing,
            Interaction::Dragging { .. } => SessionState::Dragging,
            Interaction::Resizing { .. } => SessionState::Resizing,
            Interaction::Panning { .. } => SessionState::Panning,
        }
    }

    /// The element being drawn, for rendering.
    pub fn preview(&self) -> Option<Element> {
        match &self.interaction {
            Interaction::Drawing(drawing) => drawing.preview(),
            _ => None,
        }
    }

    // --- Pointer gestures ---

    pub fn pointer_down(
        &mut self,
        doc: &mut Document,
        input: PointerInput,
    ) -> DocumentResult<GestureOutcome> {
        // A gesture whose end never arrived is closed before the new one starts.
        self.finish_interaction(doc)?;

        let point = self.viewport.screen_to_canvas(input.position);
        let pan = input.button == PointerButton::Middle
            || (self.tool == ToolKind::Select && input.modifiers.space);
        if pan {
            self.interaction = Interaction::Panning {
                last_screen: input.position,
            };
            return Ok(GestureOutcome::None);
        }
        if input.button != PointerButton::Primary {
            return Ok(GestureOutcome::None);
        }

        match self.tool {
            ToolKind::Select => {
                self.begin_select(doc, point, input.modifiers.shift);
                Ok(GestureOutcome::None)
            }
            ToolKind::Eraser => self.erase_at(doc, point),
            ToolKind::Text => {
                if !self.can_write {
                    log::debug!("read-only session, text tool ignored");
                    return Ok(GestureOutcome::None);
                }
                Ok(GestureOutcome::TextRequested { at: point })
            }
            tool => {
                if !self.can_write {
                    log::debug!("read-only session, drawing ignored");
                    return Ok(GestureOutcome::None);
                }
                if let Some(drawing) = Drawing::begin(tool, point, self.style.clone()) {
                    self.interaction = Interaction::Drawing(drawing);
                }
                Ok(GestureOutcome::None)
            }
        }
    }

    pub fn pointer_move(
        &mut self,
        doc: &mut Document,
        input: PointerInput,
    ) -> DocumentResult<GestureOutcome> {
        let point = self.viewport.screen_to_canvas(input.position);
        let op = match &mut self.interaction {
            Interaction::Idle => None,
            Interaction::Drawing(drawing) => {
                drawing.extend(point);
                None
            }
            Interaction::Dragging { last, click } => {
                // Incremental: each sample moves by the distance since the previous one.
                let delta = point - *last;
                *last = point;
                if delta != Vec2::ZERO {
                    *click = None;
                }
                (delta != Vec2::ZERO).then(|| Operation::BatchMove {
                    ids: self.selection.ids().to_vec(),
                    delta,
                })
            }
            Interaction::Resizing { original, corner } => {
                Some(Operation::Replace(apply_corner_resize(original, *corner, point)))
            }
            Interaction::Panning { last_screen } => {
                self.viewport.pan(input.position - *last_screen);
                *last_screen = input.position;
                None
            }
        };
        if let Some(op) = op {
            self.commit(doc, op)?;
        }
        Ok(GestureOutcome::None)
    }

    pub fn pointer_up(
        &mut self,
        doc: &mut Document,
        input: PointerInput,
    ) -> DocumentResult<GestureOutcome> {
        if let Interaction::Drawing(drawing) = &mut self.interaction {
            drawing.release(self.viewport.screen_to_canvas(input.position));
        }
        self.finish_interaction(doc)
    }

    /// The surface lost focus or visibility; close any open gesture.
    pub fn visibility_lost(&mut self, doc: &mut Document) -> DocumentResult<GestureOutcome> {
        self.finish_interaction(doc)
    }

    fn finish_interaction(&mut self, doc: &mut Document) -> DocumentResult<GestureOutcome> {
        match mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::Drawing(drawing) => self.finish_drawing(doc, drawing),
            Interaction::Dragging { click, .. } => {
                self.history.end_group();
                if let Some(id) = click {
                    self.selection.replace(id);
                }
                Ok(GestureOutcome::None)
            }
            Interaction::Resizing { .. } => {
                self.history.end_group();
                Ok(GestureOutcome::None)
            }
            Interaction::Idle | Interaction::Panning { .. } => Ok(GestureOutcome::None),
        }
    }

    fn reset_interaction(&mut self) {
        if matches!(
            self.interaction,
            Interaction::Dragging { .. } | Interaction::Resizing { .. }
        ) {
            self.history.end_group();
        }
        self.interaction = Interaction::Idle;
    }

    fn finish_drawing(
        &mut self,
        doc: &mut Document,
        drawing: Drawing,
    ) -> DocumentResult<GestureOutcome> {
        let tool = drawing.tool();
        match drawing.finish(self.config.min_shape_extent, self.config.min_freehand_points) {
            Some(element) => {
                let id = element.id();
                self.commit(doc, Operation::Append(element))?;
                Ok(GestureOutcome::Committed(id))
            }
            None => {
                log::debug!("discarded {tool:?} drawing below minimum size");
                Ok(GestureOutcome::Discarded)
            }
        }
    }

    fn begin_select(&mut self, doc: &Document, point: Point, shift: bool) {
        let zoom = self.viewport.zoom();
        if self.can_write && !shift {
            let handle_hit = self
                .selection
                .sole()
                .and_then(|id| doc.get(id))
                .and_then(|el| {
                    hit_test_handles(&el, point, self.config.handle_tolerance / zoom)
                        .map(|corner| (el, corner))
                });
            if let Some((original, corner)) = handle_hit {
                self.history.begin_group();
                self.interaction = Interaction::Resizing { original, corner };
                return;
            }
        }

        let elements = doc.elements();
        let Some(id) = topmost_at(&elements, point, self.config.hit_tolerance).map(Element::id)
        else {
            if !shift {
                self.selection.clear();
            }
            return;
        };

        if shift {
            self.selection.toggle(id);
        } else if !self.selection.contains(id) || !self.can_write {
            self.selection.replace(id);
        }
        if self.can_write && self.selection.contains(id) {
            // Pressing on a member of a group may start a group drag; a
            // plain click narrows the selection on release instead.
            let click = (!shift && self.selection.len() > 1).then_some(id);
            self.history.begin_group();
            self.interaction = Interaction::Dragging { last: point, click };
        }
    }

    fn erase_at(&mut self, doc: &mut Document, point: Point) -> DocumentResult<GestureOutcome> {
        let elements = doc.elements();
        let Some(id) = topmost_at(&elements, point, self.config.hit_tolerance).map(Element::id)
        else {
            return Ok(GestureOutcome::None);
        };
        if self.commit(doc, Operation::Delete(id))? {
            self.selection.remove(id);
            return Ok(GestureOutcome::Deleted(id));
        }
        Ok(GestureOutcome::None)
    }

    /// Apply a local operation if writing is allowed and record its inverse.
    /// Returns whether the document changed.
    fn commit(&mut self, doc: &mut Document, op: Operation) -> DocumentResult<bool> {
        if !self.can_write {
            log::debug!("read-only session, dropped {op:?}");
            return Ok(false);
        }
        match doc.apply(&op)? {
            Some(inverse) => {
                self.history.record(inverse);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Commands ---

    /// Append a text element with the session's style and font. Blank
    /// content creates nothing.
    pub fn commit_text(
        &mut self,
        doc: &mut Document,
        at: Point,
        content: &str,
    ) -> DocumentResult<Option<ElementId>> {
        if content.trim().is_empty() {
            return Ok(None);
        }
        let element = Element::text(
            at,
            content,
            self.config.default_font_size,
            self.config.default_font_family.as_str(),
        )
        .with_style(self.style.clone());
        let id = element.id();
        Ok(self.commit(doc, Operation::Append(element))?.then_some(id))
    }

    /// Delete every selected element as one undo step.
    pub fn delete_selected(&mut self, doc: &mut Document) -> DocumentResult<usize> {
        if !self.can_write {
            log::debug!("read-only session, delete ignored");
            return Ok(0);
        }
        let ids = self.selection.ids().to_vec();
        self.history.begin_group();
        let mut deleted = 0;
        let result = ids.iter().try_for_each(|id| {
            if self.commit(doc, Operation::Delete(*id))? {
                deleted += 1;
            }
            Ok(())
        });
        self.history.end_group();
        self.selection.clear();
        result.map(|()| deleted)
    }

    pub fn select_all(&mut self, doc: &Document) {
        self.selection.set(doc.order());
    }

    /// Apply a style edit to every selected element as one undo step.
    /// Returns how many elements changed.
    pub fn restyle_selection(
        &mut self,
        doc: &mut Document,
        change: StyleChange,
    ) -> DocumentResult<usize> {
        let targets: Vec<Element> = self
            .selection
            .ids()
            .iter()
            .filter_map(|id| doc.get(*id))
            .collect();
        self.history.begin_group();
        let mut changed = 0;
        let result = targets.into_iter().try_for_each(|mut element| {
            change.apply_to(&mut element.style);
            if self.commit(doc, Operation::Replace(element))? {
                changed += 1;
            }
            Ok(())
        });
        self.history.end_group();
        result.map(|()| changed)
    }

    pub fn undo(&mut self, doc: &mut Document) -> DocumentResult<bool> {
        if !self.can_write {
            return Ok(false);
        }
        self.reset_interaction();
        let changed = self.history.undo(doc)?;
        self.sync_selection(doc);
        Ok(changed)
    }

    pub fn redo(&mut self, doc: &mut Document) -> DocumentResult<bool> {
        if !self.can_write {
            return Ok(false);
        }
        self.reset_interaction();
        let changed = self.history.redo(doc)?;
        self.sync_selection(doc);
        Ok(changed)
    }

    /// Run a keyboard command. Returns whether anything changed.
    pub fn shortcut(&mut self, doc: &mut Document, shortcut: Shortcut) -> DocumentResult<bool> {
        match shortcut {
            Shortcut::Undo => self.undo(doc),
            Shortcut::Redo => self.redo(doc),
            Shortcut::Delete => Ok(self.delete_selected(doc)? > 0),
            Shortcut::SelectAll => {
                self.select_all(doc);
                Ok(!self.selection.is_empty())
            }
            // Writing the file is up to the caller.
            Shortcut::Export => Ok(false),
        }
    }

    /// Handle a key press: tool switch, editing command or export request.
    pub fn key(
        &mut self,
        doc: &mut Document,
        key: &str,
        modifier: bool,
        shift: bool,
    ) -> DocumentResult<KeyOutcome> {
        match resolve_key(key, modifier, shift) {
            Some(KeyCommand::Tool(tool)) => {
                self.set_tool(tool);
                Ok(KeyOutcome::Unchanged)
            }
            Some(KeyCommand::Shortcut(Shortcut::Export)) => Ok(KeyOutcome::ExportRequested),
            Some(KeyCommand::Shortcut(shortcut)) => Ok(if self.shortcut(doc, shortcut)? {
                KeyOutcome::Changed
            } else {
                KeyOutcome::Unchanged
            }),
            None => Ok(KeyOutcome::Unchanged),
        }
    }

    /// Drop selected ids that no longer exist, after remote changes.
    pub fn sync_selection(&mut self, doc: &Document) {
        let present: HashSet<ElementId> = doc.order().into_iter().collect();
        self.selection.retain(|id| present.contains(&id));
        let target_gone = matches!(
            &self.interaction,
            Interaction::Resizing { original, .. } if !present.contains(&original.id())
        );
        if target_gone {
            self.reset_interaction();
        }
    }
}
