use crate::entity::{Document, EntityId, ListRef, Owner, Slot};
use crate::error::{EditorError, EditorResult};
use crate::search::SearchCriteria;
use crate::statics;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Synthetic node standing for one entity-list slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListHolder {
    pub list: ListRef,
    pub element_type: String,
}

impl ListHolder {
    pub fn owner(&self) -> EntityId {
        self.list.owner
    }

    pub fn field(&self) -> &str {
        &self.list.field
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorItem {
    Entity(EntityId),
    List(ListHolder),
}

#[derive(Debug, Clone)]
pub struct MirrorNode {
    pub item: MirrorItem,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl MirrorNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Navigable tree kept in lock-step with the document.
///
/// Nodes live in an arena. Nodes cut off by edits stay allocated (detached)
/// so that undo can reattach the same node; a rebuild starts a fresh arena.
#[derive(Debug, Clone, Default)]
pub struct TreeMirror {
    nodes: Vec<MirrorNode>,
    root: Option<NodeId>,
    by_entity: HashMap<EntityId, NodeId>,
    by_list: HashMap<ListRef, NodeId>,
}

impl TreeMirror {
    /// Build the mirror for the root entity's `root_list` field. With
    /// non-empty criteria only matching entities and their ancestors are
    /// kept; the returned count is the number of direct matches.
    pub fn build(
        document: &Document,
        root_list: &str,
        criteria: &SearchCriteria,
    ) -> EditorResult<(TreeMirror, usize)> {
        let filter = (!criteria.is_empty()).then_some(criteria);
        let mut mirror = TreeMirror::default();
        let mut matches = 0;
        let list = ListRef::new(document.root(), root_list);
        let root = mirror
            .expand_list(document, &list, filter, &mut matches, true)?
            .ok_or_else(|| EditorError::Schema(format!("root list {root_list} was pruned")))?;
        mirror.root = Some(root);
        Ok((mirror, matches))
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&MirrorNode> {
        self.nodes.get(id.0)
    }

    pub fn item(&self, id: NodeId) -> Option<&MirrorItem> {
        self.node(id).map(|n| &n.item)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[][..], |n| n.children.as_slice())
    }

    pub fn entity_of(&self, id: NodeId) -> Option<EntityId> {
        match self.item(id)? {
            MirrorItem::Entity(eid) => Some(*eid),
            MirrorItem::List(_) => None,
        }
    }

    pub fn list_holder(&self, id: NodeId) -> Option<&ListHolder> {
        match self.item(id)? {
            MirrorItem::List(holder) => Some(holder),
            MirrorItem::Entity(_) => None,
        }
    }

    pub fn entity_node(&self, entity: EntityId) -> Option<NodeId> {
        self.by_entity.get(&entity).copied()
    }

    pub fn list_node(&self, list: &ListRef) -> Option<NodeId> {
        self.by_list.get(list).copied()
    }

    /// The list holder directly above an entity node, if any.
    pub fn parent_holder(&self, id: NodeId) -> Option<(NodeId, &ListHolder)> {
        let parent = self.parent(id)?;
        self.list_holder(parent).map(|holder| (parent, holder))
    }

    /// True when the node hangs (transitively) below the mirror root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if Some(current) == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// True when `node` is `ancestor` or lies below it.
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Entities shown under a list holder, in display order.
    pub fn entities_under(&self, list_node: NodeId) -> Vec<EntityId> {
        self.children(list_node)
            .iter()
            .filter_map(|c| self.entity_of(*c))
            .collect()
    }

    /// Rebuild the children of an entity's node from the document, unfiltered.
    /// Creates a detached node if the entity has none yet.
    pub fn refresh_subtree(
        &mut self,
        document: &Document,
        entity: EntityId,
    ) -> EditorResult<NodeId> {
        let Some(node) = self.entity_node(entity) else {
            return self.materialize(document, entity);
        };
        let mut matches = 0;
        let children = self.expand_children(document, entity, None, &mut matches)?;
        for child in &children {
            self.nodes[child.0].parent = Some(node);
        }
        self.nodes[node.0].children = children;
        Ok(node)
    }

    /// Build a detached, unfiltered subtree for `entity`.
    pub(crate) fn materialize(
        &mut self,
        document: &Document,
        entity: EntityId,
    ) -> EditorResult<NodeId> {
        let mut matches = 0;
        self.expand_entity(document, entity, None, &mut matches)?
            .ok_or_else(|| EditorError::Schema(format!("entity {entity} produced no node")))
    }

    pub(crate) fn attach(&mut self, parent: NodeId, node: NodeId, index: usize) {
        self.detach(node);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, node);
        self.nodes[node.0].parent = Some(parent);
    }

    /// Unlink a node from its parent; returns the former parent and position.
    pub(crate) fn detach(&mut self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.nodes.get(node.0)?.parent?;
        let position = self.nodes[parent.0].children.iter().position(|c| *c == node)?;
        self.nodes[parent.0].children.remove(position);
        self.nodes[node.0].parent = None;
        Some((parent, position))
    }

    /// Child position under `list_node` for a list element at `index`: the
    /// number of earlier elements that currently have a node there.
    pub(crate) fn position_for(
        &self,
        document: &Document,
        list_node: NodeId,
        list: &ListRef,
        index: usize,
    ) -> usize {
        let Some(items) = document.list(list) else {
            return self.children(list_node).len();
        };
        items
            .iter()
            .take(index)
            .filter(|eid| {
                self.entity_node(**eid)
                    .is_some_and(|n| self.parent(n) == Some(list_node))
            })
            .count()
    }

    /// Script-style path of a node, e.g. `xdat.windows["Main"].children[2]`.
    pub fn path_of(&self, document: &Document, node: NodeId) -> String {
        let mut chain = Vec::new();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.parent(current);
        }
        chain.reverse();

        let mut path = String::from(statics::XD_PATH_ROOT);
        for current in chain {
            match self.item(current) {
                Some(MirrorItem::List(holder)) => {
                    path.push('.');
                    path.push_str(holder.field());
                }
                Some(MirrorItem::Entity(eid)) => {
                    let entity = document.get(*eid);
                    if let Some(name) = entity.and_then(|e| e.name()) {
                        path.push_str(&format!("[\"{name}\"]"));
                        continue;
                    }
                    match document.owner_of(*eid) {
                        Some(Owner::List(_, index)) => {
                            path.push_str(&format!("[{index}]"));
                        }
                        Some(Owner::Nested { field, .. }) => {
                            path.push('.');
                            path.push_str(&field);
                        }
                        None => {}
                    }
                }
                None => {}
            }
        }
        path
    }

    /// Attached node whose `path_of` equals `path`.
    pub fn find_path(&self, document: &Document, path: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(node) = stack.pop() {
            let own = self.path_of(document, node);
            if own == path {
                return Some(node);
            }
            if path.starts_with(&own) {
                stack.extend(self.children(node).iter().rev().copied());
            }
        }
        None
    }

    fn alloc(&mut self, item: MirrorItem, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        for child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        match &item {
            MirrorItem::Entity(eid) => {
                self.by_entity.insert(*eid, id);
            }
            MirrorItem::List(holder) => {
                self.by_list.insert(holder.list.clone(), id);
            }
        }
        self.nodes.push(MirrorNode {
            item,
            parent: None,
            children,
        });
        id
    }

    fn expand_entity(
        &mut self,
        document: &Document,
        entity: EntityId,
        filter: Option<&SearchCriteria>,
        matches: &mut usize,
    ) -> EditorResult<Option<NodeId>> {
        let direct = match filter {
            Some(criteria) => criteria.matches(document, entity),
            None => true,
        };
        if filter.is_some() && direct {
            *matches += 1;
        }
        let children = self.expand_children(document, entity, filter, matches)?;
        if filter.is_some() && !direct && children.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.alloc(MirrorItem::Entity(entity), children)))
    }

    /// One list holder per list slot and one entity node per occupied nested
    /// slot, in slot order.
    fn expand_children(
        &mut self,
        document: &Document,
        entity: EntityId,
        filter: Option<&SearchCriteria>,
        matches: &mut usize,
    ) -> EditorResult<Vec<NodeId>> {
        let node = document.entity(entity)?;
        let mut children = Vec::new();
        for (field, slot) in node.slots() {
            let child = match slot {
                Slot::List(_) => {
                    let list = ListRef::new(entity, field.clone());
                    self.expand_list(document, &list, filter, matches, false)?
                }
                Slot::Nested(Some(nested)) => {
                    self.expand_entity(document, *nested, filter, matches)?
                }
                _ => None,
            };
            children.extend(child);
        }
        Ok(children)
    }

    fn expand_list(
        &mut self,
        document: &Document,
        list: &ListRef,
        filter: Option<&SearchCriteria>,
        matches: &mut usize,
        keep_empty: bool,
    ) -> EditorResult<Option<NodeId>> {
        let element_type = document.element_type(list)?.to_string();
        let items = document
            .list(list)
            .ok_or_else(|| EditorError::Schema(format!("{list} is not an entity list")))?;

        let mut children = Vec::with_capacity(items.len());
        for item in items {
            children.extend(self.expand_entity(document, *item, filter, matches)?);
        }
        if filter.is_some() && children.is_empty() && !keep_empty {
            return Ok(None);
        }
        let holder = ListHolder {
            list: list.clone(),
            element_type,
        };
        Ok(Some(self.alloc(MirrorItem::List(holder), children)))
    }
}
