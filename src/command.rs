use crate::entity::{AttrValue, Document, EntityId, ListRef};
use crate::error::{EditorError, EditorResult};
use crate::search::Replacement;
use crate::statics;
use crate::workspace::Workspace;
use std::fmt;
use std::time::SystemTime;
use tracing::warn;

/// A reversible edit. `undo` must exactly invert `execute` given the state
/// `execute` left behind.
pub trait Command: fmt::Debug {
    fn execute(&self, workspace: &mut Workspace);
    fn undo(&self, workspace: &mut Workspace);
    fn description(&self) -> String;
    fn timestamp(&self) -> SystemTime;
}

fn shorten(value: &AttrValue) -> String {
    let text = value.to_string();
    if text.chars().count() > statics::DESCRIPTION_VALUE_MAX_CHARS {
        let kept: String = text
            .chars()
            .take(statics::DESCRIPTION_VALUE_KEEP_CHARS)
            .collect();
        format!("{kept}{}", statics::EN_ELLIPSIS)
    } else {
        text
    }
}

#[derive(Debug, Clone)]
pub struct PropertyChangeCommand {
    target: EntityId,
    target_name: String,
    property: String,
    old: AttrValue,
    new: AttrValue,
    timestamp: SystemTime,
}

impl PropertyChangeCommand {
    /// Capture the current value of `property` as the undo state.
    pub fn new(
        document: &Document,
        target: EntityId,
        property: &str,
        new: AttrValue,
    ) -> EditorResult<Self> {
        let old = document
            .attribute(target, property)
            .cloned()
            .ok_or_else(|| {
                EditorError::Schema(format!(
                    "{} has no attribute {property}",
                    document.display_name(target)
                ))
            })?;
        Ok(Self {
            target,
            target_name: document.display_name(target),
            property: property.to_string(),
            old,
            new,
            timestamp: SystemTime::now(),
        })
    }

    /// Apply the edit right away and return the command describing it, ready
    /// to be recorded.
    pub fn stage(
        workspace: &mut Workspace,
        target: EntityId,
        property: &str,
        new: AttrValue,
    ) -> EditorResult<Self> {
        let target_name = workspace.document().display_name(target);
        let old = workspace.write_attribute(target, property, new.clone())?;
        Ok(Self {
            target,
            target_name,
            property: property.to_string(),
            old,
            new,
            timestamp: SystemTime::now(),
        })
    }

    pub fn target(&self) -> EntityId {
        self.target
    }

    fn write(&self, workspace: &mut Workspace, value: &AttrValue) {
        if let Err(err) = workspace.write_attribute(self.target, &self.property, value.clone()) {
            warn!(entity = %self.target, property = %self.property, %err, "property write failed");
        }
    }
}

impl Command for PropertyChangeCommand {
    fn execute(&self, workspace: &mut Workspace) {
        self.write(workspace, &self.new);
    }

    fn undo(&self, workspace: &mut Workspace) {
        self.write(workspace, &self.old);
    }

    fn description(&self) -> String {
        format!(
            "{}.{}: {} → {}",
            self.target_name,
            self.property,
            shorten(&self.old),
            shorten(&self.new)
        )
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// How an inserted entity came to be; only affects the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertKind {
    Create,
    Paste,
    Duplicate,
    Import { source: String },
}

/// Insert a (detached) entity into a list.
#[derive(Debug, Clone)]
pub struct InsertCommand {
    list: ListRef,
    entity: EntityId,
    index: usize,
    kind: InsertKind,
    name: String,
    timestamp: SystemTime,
}

impl InsertCommand {
    pub fn new(
        document: &Document,
        list: ListRef,
        index: usize,
        entity: EntityId,
        kind: InsertKind,
    ) -> Self {
        Self {
            name: document.display_name(entity),
            list,
            entity,
            index,
            kind,
            timestamp: SystemTime::now(),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn list(&self) -> &ListRef {
        &self.list
    }
}

impl Command for InsertCommand {
    fn execute(&self, workspace: &mut Workspace) {
        workspace.insert_into(&self.list, self.index, self.entity);
    }

    fn undo(&self, workspace: &mut Workspace) {
        workspace.remove_from(&self.list, self.entity);
    }

    fn description(&self) -> String {
        match &self.kind {
            InsertKind::Create => format!("{}: {}", statics::EN_ACTION_CREATE, self.name),
            InsertKind::Paste => format!("{}: {}", statics::EN_ACTION_PASTE, self.name),
            InsertKind::Duplicate => format!("{}: {}", statics::EN_ACTION_DUPLICATE, self.name),
            InsertKind::Import { source } => {
                format!(
                    "{}: {} (from {source})",
                    statics::EN_ACTION_IMPORT,
                    self.name
                )
            }
        }
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct DeleteCommand {
    list: ListRef,
    entity: EntityId,
    index: usize,
    name: String,
    timestamp: SystemTime,
}

impl DeleteCommand {
    /// Capture the entity's current index in `list`.
    pub fn new(document: &Document, list: ListRef, entity: EntityId) -> EditorResult<Self> {
        let index = document
            .list(&list)
            .and_then(|items| items.iter().position(|e| *e == entity))
            .ok_or_else(|| {
                EditorError::InvalidTarget(format!(
                    "{} is not an element of {list}",
                    document.display_name(entity)
                ))
            })?;
        Ok(Self {
            name: document.display_name(entity),
            list,
            entity,
            index,
            timestamp: SystemTime::now(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Command for DeleteCommand {
    fn execute(&self, workspace: &mut Workspace) {
        workspace.remove_from(&self.list, self.entity);
    }

    fn undo(&self, workspace: &mut Workspace) {
        workspace.insert_into(&self.list, self.index, self.entity);
    }

    fn description(&self) -> String {
        format!("{}: {}", statics::EN_ACTION_DELETE, self.name)
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// Move an entity between (or within) lists. `target_index` is expressed
/// against the target list as it was before the element was removed.
#[derive(Debug, Clone)]
pub struct MoveCommand {
    source: ListRef,
    source_index: usize,
    target: ListRef,
    target_index: usize,
    entity: EntityId,
    name: String,
    timestamp: SystemTime,
}

impl MoveCommand {
    pub fn new(
        document: &Document,
        source: ListRef,
        source_index: usize,
        target: ListRef,
        target_index: usize,
        entity: EntityId,
    ) -> Self {
        Self {
            name: document.display_name(entity),
            source,
            source_index,
            target,
            target_index,
            entity,
            timestamp: SystemTime::now(),
        }
    }

    /// Index the entity lands on in the target list.
    pub fn adjusted_target_index(&self) -> usize {
        if self.source == self.target && self.target_index > self.source_index {
            self.target_index - 1
        } else {
            self.target_index
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

impl Command for MoveCommand {
    fn execute(&self, workspace: &mut Workspace) {
        if workspace.remove_from(&self.source, self.entity).is_none() {
            return;
        }
        workspace.insert_into(&self.target, self.adjusted_target_index(), self.entity);
    }

    fn undo(&self, workspace: &mut Workspace) {
        if workspace.remove_from(&self.target, self.entity).is_none() {
            return;
        }
        workspace.insert_into(&self.source, self.source_index, self.entity);
    }

    fn description(&self) -> String {
        if self.source == self.target {
            format!(
                "{}: {} ({} -> {})",
                statics::EN_ACTION_MOVE,
                self.name,
                self.source_index,
                self.target_index
            )
        } else {
            format!(
                "{}: {} {}",
                statics::EN_ACTION_MOVE,
                self.name,
                statics::EN_MOVE_OTHER_LIST
            )
        }
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// Many text substitutions as one undo step.
#[derive(Debug, Clone)]
pub struct BatchReplaceCommand {
    search: String,
    replace: String,
    changes: Vec<Replacement>,
    timestamp: SystemTime,
}

impl BatchReplaceCommand {
    pub fn new(search: &str, replace: &str, changes: Vec<Replacement>) -> Self {
        Self {
            search: search.to_string(),
            replace: replace.to_string(),
            changes,
            timestamp: SystemTime::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn write(workspace: &mut Workspace, change: &Replacement, value: &str) {
        let value = AttrValue::Text(value.to_string());
        if let Err(err) = workspace.write_attribute(change.entity, &change.property, value) {
            warn!(
                entity = %change.entity,
                property = %change.property,
                %err,
                "replace write failed"
            );
        }
    }
}

impl Command for BatchReplaceCommand {
    fn execute(&self, workspace: &mut Workspace) {
        for change in &self.changes {
            Self::write(workspace, change, &change.new);
        }
    }

    fn undo(&self, workspace: &mut Workspace) {
        for change in self.changes.iter().rev() {
            Self::write(workspace, change, &change.old);
        }
    }

    fn description(&self) -> String {
        format!(
            "Replace '{}' with '{}' ({} occurrences)",
            self.search,
            self.replace,
            self.changes.len()
        )
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}
