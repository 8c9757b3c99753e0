use crate::command::{Command, MoveCommand};
use crate::entity::{EntityId, ListRef};
use crate::error::{EditorError, EditorResult};
use crate::history::UndoManager;
use crate::mirror::{MirrorItem, NodeId};
use crate::workspace::Workspace;
use tracing::info;

/// Vertical drop position within a target row, in the row's own coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropGeometry {
    pub offset_y: f32,
    pub row_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropZone {
    Before,
    Into,
    After,
}

impl DropGeometry {
    pub fn new(offset_y: f32, row_height: f32) -> Self {
        Self {
            offset_y,
            row_height,
        }
    }

    /// Rows are split into thirds: top inserts before, middle drops into,
    /// bottom inserts after.
    pub fn zone(&self) -> DropZone {
        if self.row_height <= 0.0 {
            return DropZone::Into;
        }
        let third = self.row_height / 3.0;
        if self.offset_y < third {
            DropZone::Before
        } else if self.offset_y > self.row_height - third {
            DropZone::After
        } else {
            DropZone::Into
        }
    }
}

/// Resolved destination of a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    pub list: ListRef,
    pub index: usize,
}

struct Dragged {
    entity: EntityId,
    source: ListRef,
    variant: String,
}

fn dragged_info(workspace: &Workspace, dragged: NodeId) -> Option<Dragged> {
    let mirror = workspace.mirror();
    let entity = mirror.entity_of(dragged)?;
    let (_, holder) = mirror.parent_holder(dragged)?;
    Some(Dragged {
        entity,
        source: holder.list.clone(),
        variant: workspace.document().variant_of(entity)?.to_string(),
    })
}

fn accepts(workspace: &Workspace, list: &ListRef, variant: &str) -> bool {
    workspace
        .document()
        .element_type(list)
        .is_ok_and(|constraint| {
            workspace
                .document()
                .schema()
                .is_assignable(constraint, variant)
        })
}

/// First list of the target entity that accepts `variant`.
fn compatible_own_list(workspace: &Workspace, target: EntityId, variant: &str) -> Option<ListRef> {
    workspace
        .document()
        .list_refs(target)
        .into_iter()
        .find(|list| accepts(workspace, list, variant))
}

/// Quick legality check used while hovering.
pub fn can_drop_on(workspace: &Workspace, dragged: NodeId, target: NodeId) -> bool {
    let Some(info) = dragged_info(workspace, dragged) else {
        return false;
    };
    let mirror = workspace.mirror();
    if dragged == target || mirror.is_within(target, dragged) {
        return false;
    }

    match mirror.item(target) {
        Some(MirrorItem::List(holder)) => accepts(workspace, &holder.list, &info.variant),
        Some(MirrorItem::Entity(target_entity)) => {
            let sibling_ok = mirror.parent_holder(target).is_some_and(|(_, holder)| {
                holder.list == info.source || accepts(workspace, &holder.list, &info.variant)
            });
            sibling_ok || compatible_own_list(workspace, *target_entity, &info.variant).is_some()
        }
        None => false,
    }
}

/// Work out the list and index a drop lands on.
pub fn resolve_drop(
    workspace: &Workspace,
    dragged: NodeId,
    target: NodeId,
    geometry: DropGeometry,
) -> EditorResult<DropTarget> {
    let info = dragged_info(workspace, dragged)
        .ok_or_else(|| EditorError::InvalidTarget("dragged node is not a list element".into()))?;
    let mirror = workspace.mirror();
    if dragged == target || mirror.is_within(target, dragged) {
        return Err(EditorError::InvalidTarget(
            "cannot drop an element into its own subtree".into(),
        ));
    }
    let document = workspace.document();

    let resolved = match mirror.item(target) {
        Some(MirrorItem::List(holder)) => {
            let len = document.list(&holder.list).map_or(0, <[EntityId]>::len);
            DropTarget {
                list: holder.list.clone(),
                index: len,
            }
        }
        Some(MirrorItem::Entity(target_entity)) => {
            let own = match geometry.zone() {
                DropZone::Into => compatible_own_list(workspace, *target_entity, &info.variant),
                _ => None,
            };
            match own {
                Some(list) => {
                    let len = document.list(&list).map_or(0, <[EntityId]>::len);
                    DropTarget { list, index: len }
                }
                None => {
                    let (_, holder) = mirror.parent_holder(target).ok_or_else(|| {
                        EditorError::InvalidTarget(format!(
                            "{} is not a list element",
                            document.display_name(*target_entity)
                        ))
                    })?;
                    let position = document
                        .list(&holder.list)
                        .and_then(|items| items.iter().position(|e| e == target_entity))
                        .ok_or_else(|| {
                            EditorError::InvalidTarget("drop target left its list".into())
                        })?;
                    let index = match geometry.zone() {
                        DropZone::Before => position,
                        DropZone::Into | DropZone::After => position + 1,
                    };
                    DropTarget {
                        list: holder.list.clone(),
                        index,
                    }
                }
            }
        }
        None => return Err(EditorError::InvalidTarget("unknown drop target".into())),
    };

    if resolved.list != info.source && !accepts(workspace, &resolved.list, &info.variant) {
        let constraint = document.element_type(&resolved.list)?.to_string();
        return Err(EditorError::TypeIncompatibility {
            payload: info.variant,
            constraint,
        });
    }
    Ok(resolved)
}

/// Apply a drop as a Move and record it. Returns the command's description.
pub fn perform_drop(
    workspace: &mut Workspace,
    history: &mut UndoManager,
    dragged: NodeId,
    target: NodeId,
    geometry: DropGeometry,
) -> EditorResult<String> {
    if !can_drop_on(workspace, dragged, target) {
        return Err(EditorError::InvalidTarget("drop not allowed here".into()));
    }
    let destination = resolve_drop(workspace, dragged, target, geometry)?;
    let info = dragged_info(workspace, dragged)
        .ok_or_else(|| EditorError::InvalidTarget("dragged node is not a list element".into()))?;
    let source_index = workspace
        .document()
        .list(&info.source)
        .and_then(|items| items.iter().position(|e| *e == info.entity))
        .ok_or_else(|| EditorError::InvalidTarget("dragged element left its list".into()))?;

    let command = MoveCommand::new(
        workspace.document(),
        info.source,
        source_index,
        destination.list,
        destination.index,
        info.entity,
    );
    command.execute(workspace);
    let description = command.description();
    info!(path = %workspace.mirror().path_of(workspace.document(), dragged), %description, "drop");
    history.record(command, workspace);
    Ok(description)
}
