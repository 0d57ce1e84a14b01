//! Loro document schema and operations.

use super::convert::{element_from_loro, element_to_loro};
use super::{DocumentError, DocumentResult, Operation};
use crate::codec::BoardSnapshot;
use crate::element::{Element, ElementId, InvalidElement};
use kurbo::Vec2;
use loro::{
    Container, ExportMode, LoroDoc, LoroMap, LoroMovableList, LoroResult, LoroValue,
    ValueOrContainer, VersionVector,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Key for the element content map in the document.
pub const ELEMENTS_KEY: &str = "elements";
/// Key for the stacking-order list in the document.
pub const ORDER_KEY: &str = "order";
/// Key for the metadata map in the document.
pub const META_KEY: &str = "meta";
/// Metadata key holding the board name.
pub const NAME_KEY: &str = "name";
/// Name reported for boards that never had one set.
pub const DEFAULT_BOARD_NAME: &str = "Untitled Slate";

/// Handle returned by [`Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&[Element])>;

/// Encoded local history not yet confirmed as broadcast.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub bytes: Vec<u8>,
    /// Version to pass to [`Document::acknowledge`] once the bytes went out.
    pub version: VersionVector,
}

/// Visible state captured before a write so a failed write can be undone.
struct Checkpoint {
    elements: Vec<Element>,
    metadata: BTreeMap<String, String>,
}

/// A CRDT-backed whiteboard document.
///
/// Element content lives in a map keyed by id; visibility and stacking
/// order are governed by a movable list of ids. Every public write is one
/// Loro commit followed by exactly one listener notification.
pub struct Document {
    doc: LoroDoc,
    board_id: String,
    /// Version already handed to the network.
    acknowledged: VersionVector,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Document {
    /// Create an empty document for a board.
    pub fn new(board_id: impl Into<String>) -> Self {
        Self {
            doc: LoroDoc::new(),
            board_id: board_id.into(),
            acknowledged: VersionVector::default(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Create an empty document with a fixed replica id.
    pub fn with_peer_id(board_id: impl Into<String>, peer: u64) -> DocumentResult<Self> {
        let document = Self::new(board_id);
        document.doc.set_peer_id(peer)?;
        Ok(document)
    }

    /// Rebuild a replica from [`Document::export_replica`] bytes.
    /// The imported history counts as already broadcast.
    pub fn from_replica(board_id: impl Into<String>, bytes: &[u8]) -> DocumentResult<Self> {
        let mut document = Self::new(board_id);
        document.doc.import(bytes)?;
        document.acknowledged = document.doc.oplog_vv();
        Ok(document)
    }

    /// Full CRDT state, history included.
    pub fn export_replica(&self) -> DocumentResult<Vec<u8>> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| DocumentError::Export(e.to_string()))
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    /// Current version vector of the operation log.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    fn elements_map(&self) -> LoroMap {
        self.doc.get_map(ELEMENTS_KEY)
    }

    fn order_list(&self) -> LoroMovableList {
        self.doc.get_movable_list(ORDER_KEY)
    }

    fn meta_map(&self) -> LoroMap {
        self.doc.get_map(META_KEY)
    }

    // --- Reads ---

    /// List entries as stored, aligned with list positions.
    fn raw_order(&self) -> Vec<Option<ElementId>> {
        let list = self.order_list();
        (0..list.len())
            .map(|i| match list.get(i) {
                Some(ValueOrContainer::Value(LoroValue::String(s))) => {
                    Uuid::parse_str(&s.to_string()).ok()
                }
                _ => None,
            })
            .collect()
    }

    /// Visible elements, bottom to top.
    ///
    /// An element is visible when its id is in the order list and its content
    /// entry parses. Repeated list entries show once, at the first position.
    pub fn elements(&self) -> Vec<Element> {
        let LoroValue::Map(entries) = self.elements_map().get_deep_value() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        self.raw_order()
            .into_iter()
            .flatten()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| match entries.get(&id.to_string()) {
                Some(LoroValue::Map(map)) => element_from_loro(map),
                _ => None,
            })
            .collect()
    }

    /// Visible ids, bottom to top.
    pub fn order(&self) -> Vec<ElementId> {
        self.elements().iter().map(Element::id).collect()
    }

    /// A visible element, looked up by id without reading the whole board.
    pub fn get(&self, id: ElementId) -> Option<Element> {
        if !self.raw_order().contains(&Some(id)) {
            return None;
        }
        self.content(id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Stored content of `id`, listed or not.
    fn content(&self, id: ElementId) -> Option<Element> {
        match self.elements_map().get(&id.to_string())? {
            ValueOrContainer::Container(Container::Map(map)) => match map.get_deep_value() {
                LoroValue::Map(value) => element_from_loro(&value),
                _ => None,
            },
            _ => None,
        }
    }

    /// Stacking position of a visible element.
    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        self.order().iter().position(|other| *other == id)
    }

    pub fn len(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metadata(&self, key: &str) -> Option<String> {
        match self.meta_map().get(key) {
            Some(ValueOrContainer::Value(LoroValue::String(s))) => Some(s.to_string()),
            _ => None,
        }
    }

    /// Every metadata entry.
    pub fn metadata_entries(&self) -> BTreeMap<String, String> {
        let LoroValue::Map(map) = self.meta_map().get_deep_value() else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(k, v)| match v {
                LoroValue::String(s) => Some((k.clone(), s.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Board display name.
    pub fn name(&self) -> String {
        self.metadata(NAME_KEY)
            .unwrap_or_else(|| DEFAULT_BOARD_NAME.to_string())
    }

    /// Consistent point-in-time copy for serialization.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            id: self.board_id.clone(),
            name: self.name(),
            elements: self.elements(),
        }
    }

    // --- Writes ---

    /// Apply one operation as a single transaction.
    ///
    /// Returns the inverse operation, or `None` when nothing changed (target
    /// missing, element already in the requested state). Invalid elements
    /// are rejected before anything is written.
    pub fn apply(&mut self, op: &Operation) -> DocumentResult<Option<Operation>> {
        match op {
            Operation::Append(element) => self.apply_add(element, None),
            Operation::Insert { index, element } => self.apply_add(element, Some(*index)),
            Operation::Replace(element) => self.apply_replace(element),
            Operation::Patch { from, to } => self.apply_patch(from, to),
            Operation::Delete(id) => self.apply_delete(*id),
            Operation::BatchMove { ids, delta } => self.apply_batch_move(ids, *delta),
            Operation::Reorder { id, index } => self.apply_reorder(*id, *index),
            Operation::SetMetadata { key, value } => self.apply_set_metadata(key, value.as_deref()),
        }
    }

    /// Add an element on top of the stack.
    pub fn append(&mut self, element: Element) -> DocumentResult<()> {
        self.apply(&Operation::Append(element)).map(|_| ())
    }

    /// Overwrite the content of `id`. Returns false when `id` is gone or the
    /// content is unchanged.
    pub fn replace(&mut self, id: ElementId, mut element: Element) -> DocumentResult<bool> {
        element.id = id;
        Ok(self.apply(&Operation::Replace(element))?.is_some())
    }

    /// Remove `id` if present.
    pub fn delete_by_id(&mut self, id: ElementId) -> DocumentResult<bool> {
        Ok(self.apply(&Operation::Delete(id))?.is_some())
    }

    /// Shift every present element of `ids` by the same delta, in one transaction.
    pub fn batch_move(&mut self, ids: &[ElementId], dx: f64, dy: f64) -> DocumentResult<bool> {
        let op = Operation::BatchMove {
            ids: ids.to_vec(),
            delta: Vec2::new(dx, dy),
        };
        Ok(self.apply(&op)?.is_some())
    }

    pub fn set_metadata(&mut self, key: &str, value: Option<&str>) -> DocumentResult<bool> {
        let op = Operation::SetMetadata {
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        Ok(self.apply(&op)?.is_some())
    }

    pub fn set_name(&mut self, name: &str) -> DocumentResult<bool> {
        self.set_metadata(NAME_KEY, Some(name))
    }

    pub fn bring_to_front(&mut self, id: ElementId) -> DocumentResult<bool> {
        Ok(self.apply(&Operation::Reorder { id, index: usize::MAX })?.is_some())
    }

    pub fn send_to_back(&mut self, id: ElementId) -> DocumentResult<bool> {
        Ok(self.apply(&Operation::Reorder { id, index: 0 })?.is_some())
    }

    /// Move one step up the stack.
    pub fn bring_forward(&mut self, id: ElementId) -> DocumentResult<bool> {
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        Ok(self.apply(&Operation::Reorder { id, index: index + 1 })?.is_some())
    }

    /// Move one step down the stack.
    pub fn send_backward(&mut self, id: ElementId) -> DocumentResult<bool> {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                Ok(self.apply(&Operation::Reorder { id, index: index - 1 })?.is_some())
            }
            _ => Ok(false),
        }
    }

    /// Replace the whole board content (elements and name) in one transaction.
    /// Nothing is written if any element is invalid or ids repeat.
    pub fn install(&mut self, snapshot: &BoardSnapshot) -> DocumentResult<()> {
        let mut ids = HashSet::new();
        for element in &snapshot.elements {
            element.validate()?;
            if !ids.insert(element.id()) {
                return Err(DocumentError::DuplicateId(element.id()));
            }
        }

        self.transact(|doc| {
            let list = doc.order_list();
            if list.len() > 0 {
                list.delete(0, list.len())?;
            }
            let map = doc.elements_map();
            if let LoroValue::Map(entries) = map.get_deep_value() {
                for key in entries.keys() {
                    map.delete(key)?;
                }
            }
            for element in &snapshot.elements {
                doc.write_element(element)?;
                list.push(LoroValue::String(element.id().to_string().into()))?;
            }
            if !snapshot.name.is_empty() {
                doc.meta_map().insert(NAME_KEY, snapshot.name.as_str())?;
            }
            Ok(())
        })?;
        log::info!(
            "installed {} elements into board {}",
            snapshot.elements.len(),
            self.board_id
        );
        Ok(())
    }

    fn apply_add(&mut self, element: &Element, index: Option<usize>) -> DocumentResult<Option<Operation>> {
        if let Err(err) = element.validate() {
            log::warn!("rejected element {}: {err}", element.id());
            return Err(err.into());
        }
        if self.contains(element.id()) {
            log::warn!("rejected element {}: id already present", element.id());
            return Err(DocumentError::DuplicateId(element.id()));
        }

        self.transact(|doc| {
            doc.write_element(element)?;
            let entry = LoroValue::String(element.id().to_string().into());
            let list = doc.order_list();
            match index {
                Some(index) => {
                    doc.compact_order()?;
                    list.insert(index.min(list.len()), entry)
                }
                None => list.push(entry),
            }
        })?;
        Ok(Some(Operation::Delete(element.id())))
    }

    fn apply_replace(&mut self, element: &Element) -> DocumentResult<Option<Operation>> {
        if let Err(err) = element.validate() {
            log::warn!("rejected replacement of {}: {err}", element.id());
            return Err(err.into());
        }
        let Some(previous) = self.get(element.id()) else {
            log::debug!("replace of missing element {} ignored", element.id());
            return Ok(None);
        };
        if previous == *element {
            return Ok(None);
        }

        self.transact(|doc| doc.write_element(element))?;
        Ok(Some(Operation::Patch {
            from: element.clone(),
            to: previous,
        }))
    }

    fn apply_patch(&mut self, from: &Element, to: &Element) -> DocumentResult<Option<Operation>> {
        let Some(current) = self.get(from.id()) else {
            log::debug!("patch of missing element {} ignored", from.id());
            return Ok(None);
        };
        self.apply_replace(&current.patched(from, to))
    }

    fn apply_delete(&mut self, id: ElementId) -> DocumentResult<Option<Operation>> {
        let elements = self.elements();
        let Some(index) = elements.iter().position(|e| e.id() == id) else {
            log::debug!("delete of missing element {id} ignored");
            return Ok(None);
        };
        let previous = elements[index].clone();

        self.transact(|doc| doc.remove_element(id))?;
        Ok(Some(Operation::Insert {
            index,
            element: previous,
        }))
    }

    fn apply_batch_move(&mut self, ids: &[ElementId], delta: Vec2) -> DocumentResult<Option<Operation>> {
        if !delta.is_finite() {
            log::warn!("rejected move by non-finite delta");
            return Err(InvalidElement::NonFinite.into());
        }
        let mut current = HashMap::new();
        for id in ids {
            if current.contains_key(id) {
                continue;
            }
            if let Some(element) = self.get(*id) {
                current.insert(*id, element);
            }
        }
        let mut seen = HashSet::new();
        let present: Vec<ElementId> = ids
            .iter()
            .copied()
            .filter(|id| current.contains_key(id) && seen.insert(*id))
            .collect();
        if present.len() < ids.len() {
            log::debug!("move skipped {} missing elements", ids.len() - present.len());
        }
        if present.is_empty() || delta == Vec2::ZERO {
            return Ok(None);
        }

        self.transact(|doc| {
            for id in &present {
                if let Some(element) = current.get(id) {
                    doc.write_element(&element.translated(delta))?;
                }
            }
            Ok(())
        })?;
        Ok(Some(Operation::BatchMove {
            ids: present,
            delta: -delta,
        }))
    }

    fn apply_reorder(&mut self, id: ElementId, index: usize) -> DocumentResult<Option<Operation>> {
        let order = self.order();
        let Some(from) = order.iter().position(|other| *other == id) else {
            log::debug!("reorder of missing element {id} ignored");
            return Ok(None);
        };
        let to = index.min(order.len() - 1);
        if from == to {
            return Ok(None);
        }

        self.transact(|doc| {
            doc.compact_order()?;
            doc.order_list().mov(from, to)
        })?;
        Ok(Some(Operation::Reorder { id, index: from }))
    }

    fn apply_set_metadata(&mut self, key: &str, value: Option<&str>) -> DocumentResult<Option<Operation>> {
        let previous = self.metadata(key);
        if previous.as_deref() == value {
            return Ok(None);
        }

        self.transact(|doc| {
            let meta = doc.meta_map();
            match value {
                Some(value) => meta.insert(key, value),
                None => meta.delete(key),
            }
        })?;
        Ok(Some(Operation::SetMetadata {
            key: key.to_string(),
            value: previous,
        }))
    }

    /// Run `write` as one commit. On failure the visible state is restored
    /// before committing and listeners are not notified.
    fn transact<T>(&mut self, write: impl FnOnce(&Self) -> LoroResult<T>) -> DocumentResult<T> {
        let checkpoint = self.checkpoint();
        match write(self) {
            Ok(value) => {
                self.doc.commit();
                self.notify();
                Ok(value)
            }
            Err(err) => {
                log::warn!("transaction on board {} failed, rolling back: {err}", self.board_id);
                if let Err(restore_err) = self.restore(&checkpoint) {
                    log::warn!("rollback incomplete: {restore_err}");
                }
                self.doc.commit();
                Err(err.into())
            }
        }
    }

    fn write_element(&self, element: &Element) -> LoroResult<()> {
        let map = self
            .elements_map()
            .insert_container(&element.id().to_string(), LoroMap::new())?;
        element_to_loro(element, &map)
    }

    /// Remove every list entry for `id` and its content.
    fn remove_element(&self, id: ElementId) -> LoroResult<()> {
        let list = self.order_list();
        for (i, entry) in self.raw_order().iter().enumerate().rev() {
            if *entry == Some(id) {
                list.delete(i, 1)?;
            }
        }
        self.elements_map().delete(&id.to_string())
    }

    /// Drop list entries that are not visible so list positions equal
    /// stacking positions.
    fn compact_order(&self) -> LoroResult<()> {
        let visible: HashSet<ElementId> = self.elements().iter().map(Element::id).collect();
        let mut seen = HashSet::new();
        let stale: Vec<usize> = self
            .raw_order()
            .iter()
            .enumerate()
            .filter(|(_, entry)| match entry {
                Some(id) => !(visible.contains(id) && seen.insert(*id)),
                None => true,
            })
            .map(|(i, _)| i)
            .collect();

        let list = self.order_list();
        for i in stale.into_iter().rev() {
            list.delete(i, 1)?;
        }
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            elements: self.elements(),
            metadata: self.metadata_entries(),
        }
    }

    fn restore(&self, checkpoint: &Checkpoint) -> LoroResult<()> {
        let current = self.elements();
        let keep: HashSet<ElementId> = checkpoint.elements.iter().map(Element::id).collect();
        for element in &current {
            if !keep.contains(&element.id()) {
                self.remove_element(element.id())?;
            }
        }
        for element in &checkpoint.elements {
            if !current.contains(element) {
                self.write_element(element)?;
            }
        }

        let ids: Vec<ElementId> = checkpoint.elements.iter().map(Element::id).collect();
        if self.order() != ids {
            let list = self.order_list();
            if list.len() > 0 {
                list.delete(0, list.len())?;
            }
            for id in ids {
                list.push(LoroValue::String(id.to_string().into()))?;
            }
        }

        let meta = self.meta_map();
        let current_meta = self.metadata_entries();
        for key in current_meta.keys() {
            if !checkpoint.metadata.contains_key(key) {
                meta.delete(key)?;
            }
        }
        for (key, value) in &checkpoint.metadata {
            if current_meta.get(key) != Some(value) {
                meta.insert(key, value.as_str())?;
            }
        }
        Ok(())
    }

    // --- Change notification ---

    /// Register a listener called with the full element sequence after each
    /// applied transaction, local or remote.
    pub fn subscribe(&mut self, listener: impl FnMut(&[Element]) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let elements = self.elements();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&elements);
        }
    }

    // --- Replication ---

    /// Import an update produced by another replica.
    pub fn apply_remote(&mut self, update: &[u8]) -> DocumentResult<()> {
        let before = self.doc.oplog_vv();
        let caught_up = before == self.acknowledged;
        if let Err(err) = self.doc.import(update) {
            log::warn!("failed to import remote update on board {}: {err}", self.board_id);
            return Err(err.into());
        }

        let after = self.doc.oplog_vv();
        if caught_up {
            // Nothing local is outstanding, so nothing after `after` is ours.
            self.acknowledged = after.clone();
        }
        if after != before {
            log::debug!("imported remote update ({} bytes)", update.len());
            self.notify();
        }
        Ok(())
    }

    /// Updates since the last acknowledged broadcast, if any.
    pub fn pending_update(&self) -> DocumentResult<Option<PendingUpdate>> {
        let version = self.doc.oplog_vv();
        if version == self.acknowledged {
            return Ok(None);
        }
        let bytes = self
            .doc
            .export(ExportMode::updates(&self.acknowledged))
            .map_err(|e| DocumentError::Export(e.to_string()))?;
        Ok(Some(PendingUpdate { bytes, version }))
    }

    /// Mark everything up to `version` as delivered to the gateway.
    pub fn acknowledge(&mut self, version: VersionVector) {
        self.acknowledged = version;
    }
}
