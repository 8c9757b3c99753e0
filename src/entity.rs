use crate::error::{EditorError, EditorResult};
use crate::schema::{Schema, SlotKind};
use crate::statics;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Index of an entity inside its `Document` arena. Ids are never reused while
/// the document lives, so commands can hold them across detach/attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Ref(i64),
    Blob(Arc<[u8]>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text used when matching against search input; `None` for values that
    /// have no sensible textual form.
    pub fn search_text(&self) -> Option<String> {
        match self {
            AttrValue::Null | AttrValue::Blob(_) => None,
            AttrValue::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => f.write_str(statics::EN_LITERAL_NULL),
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Int(v) | AttrValue::Ref(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Blob(_) => f.write_str(statics::EN_LITERAL_BLOB),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Attr(AttrValue),
    Nested(Option<EntityId>),
    List(Vec<EntityId>),
    Values(Vec<AttrValue>),
}

/// One node of the typed object graph. Slots are kept in schema layout order
/// (inherited slots first).
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    variant: String,
    slots: IndexMap<String, Slot>,
}

impl Entity {
    pub(crate) fn from_slots(variant: String, slots: IndexMap<String, Slot>) -> Self {
        Self { variant, slots }
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn slots(&self) -> &IndexMap<String, Slot> {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.get_mut(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        match self.slots.get(name)? {
            Slot::Attr(value) => Some(value),
            _ => None,
        }
    }

    /// The `name` attribute when it is set to something non-empty.
    pub fn name(&self) -> Option<&str> {
        self.attribute(statics::XD_PROP_NAME)
            .and_then(AttrValue::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// A live reference to one entity-list slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListRef {
    pub owner: EntityId,
    pub field: String,
}

impl ListRef {
    pub fn new(owner: EntityId, field: impl Into<String>) -> Self {
        Self {
            owner,
            field: field.into(),
        }
    }
}

impl fmt::Display for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.field)
    }
}

/// Where an entity is currently attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    List(ListRef, usize),
    Nested { owner: EntityId, field: String },
}

impl Owner {
    pub fn entity(&self) -> EntityId {
        match self {
            Owner::List(list, _) => list.owner,
            Owner::Nested { owner, .. } => *owner,
        }
    }
}

/// The entity graph: an append-only arena plus the root id.
///
/// Entities removed from their slot stay in the arena, detached, so that undo
/// can put the very same entity back.
#[derive(Debug, Clone)]
pub struct Document {
    schema: Arc<Schema>,
    entities: Vec<Entity>,
    root: EntityId,
}

impl Document {
    /// A document holding one freshly instantiated root entity.
    pub fn new(schema: Arc<Schema>) -> EditorResult<Self> {
        let root = schema.instantiate(schema.root_variant())?;
        Ok(Self {
            schema,
            entities: vec![root],
            root: EntityId(0),
        })
    }

    pub(crate) fn from_parts(schema: Arc<Schema>, entities: Vec<Entity>, root: EntityId) -> Self {
        Self {
            schema,
            entities,
            root,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Number of entities ever allocated (attached or not).
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.0)
    }

    pub(crate) fn entity(&self, id: EntityId) -> EditorResult<&Entity> {
        self.get(id)
            .ok_or_else(|| EditorError::InvalidTarget(format!("no entity {id}")))
    }

    pub(crate) fn entities_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.entities
    }

    pub(crate) fn alloc(&mut self, entity: Entity) -> EntityId {
        self.entities.push(entity);
        EntityId(self.entities.len() - 1)
    }

    /// Drop everything allocated after `len`; used to roll back failed clones/imports.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.entities.truncate(len);
    }

    /// Allocate a detached default entity of `variant`.
    pub fn create(&mut self, variant: &str) -> EditorResult<EntityId> {
        let entity = self.schema.instantiate(variant)?;
        Ok(self.alloc(entity))
    }

    pub fn variant_of(&self, id: EntityId) -> Option<&str> {
        self.get(id).map(Entity::variant)
    }

    pub fn attribute(&self, id: EntityId, name: &str) -> Option<&AttrValue> {
        self.get(id)?.attribute(name)
    }

    /// Store `value` in an attribute slot and return the previous value.
    pub fn set_attribute(
        &mut self,
        id: EntityId,
        name: &str,
        value: AttrValue,
    ) -> EditorResult<AttrValue> {
        let variant = self.entity(id)?.variant().to_string();
        let kind = match self.schema.slot(&variant, name).map(|s| &s.kind) {
            Some(SlotKind::Attribute(kind)) => *kind,
            _ => {
                return Err(EditorError::Schema(format!(
                    "{variant}.{name} is not an attribute"
                )));
            }
        };
        if !kind.accepts(&value) {
            return Err(EditorError::Schema(format!(
                "{variant}.{name} expects {kind:?}, got {value:?}"
            )));
        }

        match self.get_mut(id).and_then(|e| e.slot_mut(name)) {
            Some(Slot::Attr(current)) => Ok(std::mem::replace(current, value)),
            _ => Err(EditorError::Schema(format!(
                "{variant}.{name} is missing from the entity"
            ))),
        }
    }

    pub fn list(&self, list: &ListRef) -> Option<&[EntityId]> {
        match self.get(list.owner)?.slot(&list.field)? {
            Slot::List(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn list_mut(&mut self, list: &ListRef) -> Option<&mut Vec<EntityId>> {
        match self.get_mut(list.owner)?.slot_mut(&list.field)? {
            Slot::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn nested(&self, id: EntityId, field: &str) -> Option<EntityId> {
        match self.get(id)?.slot(field)? {
            Slot::Nested(child) => *child,
            _ => None,
        }
    }

    /// Replace a nested-entity slot, returning the previous occupant.
    pub fn set_nested(
        &mut self,
        id: EntityId,
        field: &str,
        child: Option<EntityId>,
    ) -> EditorResult<Option<EntityId>> {
        let variant = self.entity(id)?.variant().to_string();
        let required = match self.schema.slot(&variant, field).map(|s| &s.kind) {
            Some(SlotKind::Nested { variant }) => variant.clone(),
            _ => {
                return Err(EditorError::Schema(format!(
                    "{variant}.{field} is not a nested entity"
                )));
            }
        };
        if let Some(child) = child {
            let child_variant = self.entity(child)?.variant();
            if !self.schema.is_assignable(&required, child_variant) {
                return Err(EditorError::TypeIncompatibility {
                    payload: child_variant.to_string(),
                    constraint: required,
                });
            }
        }
        match self.get_mut(id).and_then(|e| e.slot_mut(field)) {
            Some(Slot::Nested(current)) => Ok(std::mem::replace(current, child)),
            _ => Err(EditorError::Schema(format!(
                "{variant}.{field} is missing from the entity"
            ))),
        }
    }

    /// Entity-list slots of `id`, in slot order.
    pub fn list_refs(&self, id: EntityId) -> Vec<ListRef> {
        let Some(entity) = self.get(id) else {
            return Vec::new();
        };
        entity
            .slots()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::List(_)))
            .map(|(field, _)| ListRef::new(id, field.clone()))
            .collect()
    }

    pub fn element_type(&self, list: &ListRef) -> EditorResult<&str> {
        let owner = self.entity(list.owner)?;
        self.schema.list_element(owner.variant(), &list.field)
    }

    /// Owned child entities of `id` (nested and list members), in slot order.
    pub fn children(&self, id: EntityId) -> Vec<EntityId> {
        let Some(entity) = self.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for slot in entity.slots().values() {
            match slot {
                Slot::Nested(Some(child)) => out.push(*child),
                Slot::List(items) => out.extend(items.iter().copied()),
                _ => {}
            }
        }
        out
    }

    /// Find the slot currently holding `id` by walking down from the root.
    /// Detached entities have no owner.
    pub fn owner_of(&self, id: EntityId) -> Option<Owner> {
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let entity = self.get(current)?;
            for (field, slot) in entity.slots() {
                match slot {
                    Slot::Nested(Some(child)) => {
                        if *child == id {
                            return Some(Owner::Nested {
                                owner: current,
                                field: field.clone(),
                            });
                        }
                        stack.push(*child);
                    }
                    Slot::List(items) => {
                        if let Some(index) = items.iter().position(|c| *c == id) {
                            return Some(Owner::List(ListRef::new(current, field.clone()), index));
                        }
                        stack.extend(items.iter().copied());
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// True when `id` is `ancestor` or lies anywhere inside its subtree.
    pub fn is_within(&self, id: EntityId, ancestor: EntityId) -> bool {
        let mut stack = vec![ancestor];
        while let Some(current) = stack.pop() {
            if current == id {
                return true;
            }
            stack.extend(self.children(current));
        }
        false
    }

    /// The `name` attribute if set and non-empty, otherwise the variant name.
    pub fn display_name(&self, id: EntityId) -> String {
        match self.get(id) {
            Some(entity) => entity
                .name()
                .unwrap_or_else(|| entity.variant())
                .to_string(),
            None => id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttrValue, Document, ListRef, Owner};
    use crate::error::EditorError;
    use crate::schema::Schema;
    use crate::statics;

    fn document() -> Document {
        Document::new(Schema::ui_descriptor().unwrap()).unwrap()
    }

    #[test]
    fn new_document_has_root_with_empty_lists() {
        let doc = document();
        assert_eq!(doc.variant_of(doc.root()), Some(statics::XD_VARIANT_ROOT));
        let windows = ListRef::new(doc.root(), statics::XD_LIST_WINDOWS);
        assert_eq!(doc.list(&windows), Some(&[][..]));
        assert_eq!(doc.list_refs(doc.root()).len(), 2);
    }

    #[test]
    fn set_attribute_returns_previous_and_checks_kind() {
        let mut doc = document();
        let button = doc.create("Button").unwrap();
        let old = doc
            .set_attribute(button, "name", AttrValue::Text("ok".into()))
            .unwrap();
        assert_eq!(old, AttrValue::Text(String::new()));
        assert_eq!(doc.display_name(button), "ok");

        let err = doc
            .set_attribute(button, "width", AttrValue::Text("wide".into()))
            .unwrap_err();
        assert!(matches!(err, EditorError::Schema(_)));
        let err = doc
            .set_attribute(button, "children", AttrValue::Null)
            .unwrap_err();
        assert!(matches!(err, EditorError::Schema(_)));
    }

    #[test]
    fn display_name_falls_back_to_variant() {
        let mut doc = document();
        let texture = doc.create("Texture").unwrap();
        assert_eq!(doc.display_name(texture), "Texture");
    }

    #[test]
    fn owner_of_finds_lists_and_nested_slots() {
        let mut doc = document();
        let windows = ListRef::new(doc.root(), statics::XD_LIST_WINDOWS);
        let window = doc.create("Window").unwrap();
        let tooltip = doc.create("Tooltip").unwrap();
        doc.list_mut(&windows).unwrap().push(window);
        doc.set_nested(window, "tooltip", Some(tooltip)).unwrap();

        assert_eq!(doc.owner_of(window), Some(Owner::List(windows, 0)));
        assert_eq!(
            doc.owner_of(tooltip),
            Some(Owner::Nested {
                owner: window,
                field: "tooltip".to_string()
            })
        );
        assert!(doc.is_within(tooltip, window));
        assert!(!doc.is_within(window, tooltip));

        let detached = doc.create("Button").unwrap();
        assert_eq!(doc.owner_of(detached), None);
    }

    #[test]
    fn set_nested_checks_variant() {
        let mut doc = document();
        let window = doc.create("Window").unwrap();
        let button = doc.create("Button").unwrap();
        let err = doc.set_nested(window, "tooltip", Some(button)).unwrap_err();
        assert!(matches!(err, EditorError::TypeIncompatibility { .. }));
    }
}
