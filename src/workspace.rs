use crate::entity::{AttrValue, Document, EntityId, ListRef};
use crate::error::EditorResult;
use crate::mirror::{NodeId, TreeMirror};
use crate::search::SearchCriteria;
use tracing::warn;

/// Notifications for the presentation layer, queued in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    NodeInserted {
        parent: NodeId,
        node: NodeId,
        index: usize,
    },
    NodeRemoved {
        parent: NodeId,
        node: NodeId,
    },
    PropertyChanged {
        entity: EntityId,
        property: String,
        old: AttrValue,
        new: AttrValue,
    },
    TreeRebuilt {
        matches: usize,
    },
}

/// The document, its mirror and the pending event queue.
///
/// Every structural operation here mutates the document and patches the
/// mirror in the same call, so the two never disagree between calls.
#[derive(Debug)]
pub struct Workspace {
    document: Document,
    mirror: TreeMirror,
    events: Vec<DocumentEvent>,
}

impl Workspace {
    /// A workspace with an empty mirror; call `rebuild` before showing it.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            mirror: TreeMirror::default(),
            events: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct document access for allocations (clones, imports, creates).
    /// Structural changes to attached entities must go through the methods below.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn mirror(&self) -> &TreeMirror {
        &self.mirror
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Replace the mirror with a fresh build; returns the direct match count.
    pub fn rebuild(&mut self, root_list: &str, criteria: &SearchCriteria) -> EditorResult<usize> {
        let (mirror, matches) = TreeMirror::build(&self.document, root_list, criteria)?;
        self.mirror = mirror;
        self.events.push(DocumentEvent::TreeRebuilt { matches });
        Ok(matches)
    }

    pub fn take_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[DocumentEvent] {
        &self.events
    }

    pub fn write_attribute(
        &mut self,
        entity: EntityId,
        property: &str,
        value: AttrValue,
    ) -> EditorResult<AttrValue> {
        let old = self.document.set_attribute(entity, property, value.clone())?;
        self.events.push(DocumentEvent::PropertyChanged {
            entity,
            property: property.to_string(),
            old: old.clone(),
            new: value,
        });
        Ok(old)
    }

    /// Insert `entity` into `list` at `index`, appending when the index is past
    /// the end. Returns the index actually used, or `None` if `list` is gone.
    pub fn insert_into(&mut self, list: &ListRef, index: usize, entity: EntityId) -> Option<usize> {
        let Some(items) = self.document.list_mut(list) else {
            warn!(%list, %entity, "insert target list no longer exists");
            return None;
        };
        let index = if index <= items.len() {
            index
        } else {
            warn!(%list, index, len = items.len(), "insert index out of range, appending");
            items.len()
        };
        items.insert(index, entity);

        if let Some(list_node) = self.mirror.list_node(list) {
            let node = match self.mirror.entity_node(entity) {
                Some(node) => Some(node),
                None => match self.mirror.materialize(&self.document, entity) {
                    Ok(node) => Some(node),
                    Err(err) => {
                        warn!(%entity, %err, "cannot mirror inserted entity");
                        None
                    }
                },
            };
            if let Some(node) = node {
                let position = self.mirror.position_for(&self.document, list_node, list, index);
                self.mirror.attach(list_node, node, position);
                self.events.push(DocumentEvent::NodeInserted {
                    parent: list_node,
                    node,
                    index: position,
                });
            }
        }
        Some(index)
    }

    /// Remove `entity` from `list` by identity. Returns its former index.
    pub fn remove_from(&mut self, list: &ListRef, entity: EntityId) -> Option<usize> {
        let Some(items) = self.document.list_mut(list) else {
            warn!(%list, %entity, "remove source list no longer exists");
            return None;
        };
        let Some(index) = items.iter().position(|e| *e == entity) else {
            warn!(%list, %entity, "entity is not in the list");
            return None;
        };
        items.remove(index);

        if let Some(node) = self.mirror.entity_node(entity) {
            if let Some((parent, _)) = self.mirror.detach(node) {
                self.events.push(DocumentEvent::NodeRemoved { parent, node });
            }
        }
        Some(index)
    }
}
