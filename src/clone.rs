use crate::entity::{Document, EntityId, Slot};
use crate::error::{EditorError, EditorResult};
use std::collections::HashSet;

/// Deep-copy `source` into a new detached entity of the same variant.
///
/// Scalars and scalar lists are copied by value, nested entities and entity
/// lists recursively, blobs are shared. On failure nothing is left behind in
/// the arena.
pub fn deep_clone(document: &mut Document, source: EntityId) -> EditorResult<EntityId> {
    let mark = document.len();
    let mut path = HashSet::new();
    match clone_into(document, source, &mut path) {
        Ok(id) => Ok(id),
        Err(err) => {
            document.truncate(mark);
            Err(err)
        }
    }
}

fn clone_into(
    document: &mut Document,
    source: EntityId,
    path: &mut HashSet<EntityId>,
) -> EditorResult<EntityId> {
    let original = document.entity(source)?.clone();
    if !path.insert(source) {
        return Err(EditorError::CloneFailure {
            variant: original.variant().to_string(),
            reason: format!("{source} contains itself"),
        });
    }

    let mut copy = document.schema().instantiate(original.variant())?;
    for (name, slot) in original.slots() {
        let cloned = match slot {
            Slot::Attr(value) => Slot::Attr(value.clone()),
            Slot::Values(values) => Slot::Values(values.clone()),
            Slot::Nested(None) => Slot::Nested(None),
            Slot::Nested(Some(child)) => Slot::Nested(Some(clone_into(document, *child, path)?)),
            Slot::List(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(clone_into(document, *item, path)?);
                }
                Slot::List(cloned)
            }
        };
        if let Some(target) = copy.slot_mut(name) {
            *target = cloned;
        }
    }

    path.remove(&source);
    Ok(document.alloc(copy))
}
