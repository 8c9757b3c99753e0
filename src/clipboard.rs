use crate::clone::deep_clone;
use crate::entity::{Document, EntityId};
use crate::error::{EditorError, EditorResult};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardMode {
    Copy,
    Cut,
}

/// Holds at most one entity. A copied payload is a private clone; a cut
/// payload is the original entity itself.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    content: Option<(EntityId, ClipboardMode)>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(&mut self, document: &mut Document, entity: EntityId) -> EditorResult<()> {
        let clone = deep_clone(document, entity)?;
        debug!(%entity, %clone, "copied to clipboard");
        self.content = Some((clone, ClipboardMode::Copy));
        Ok(())
    }

    pub fn cut(&mut self, entity: EntityId) {
        debug!(%entity, "cut to clipboard");
        self.content = Some((entity, ClipboardMode::Cut));
    }

    /// Take the payload for insertion. A cut payload is returned once and the
    /// clipboard empties; a copied payload yields a fresh clone every time.
    pub fn paste(&mut self, document: &mut Document) -> EditorResult<Option<EntityId>> {
        match self.content {
            None => Ok(None),
            Some((entity, ClipboardMode::Cut)) => {
                self.content = None;
                Ok(Some(entity))
            }
            Some((entity, ClipboardMode::Copy)) => deep_clone(document, entity).map(Some),
        }
    }

    pub fn peek(&self) -> Option<EntityId> {
        self.content.map(|(entity, _)| entity)
    }

    pub fn mode(&self) -> Option<ClipboardMode> {
        self.content.map(|(_, mode)| mode)
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn is_cut(&self) -> bool {
        self.mode() == Some(ClipboardMode::Cut)
    }

    pub fn content_variant<'d>(&self, document: &'d Document) -> Option<&'d str> {
        document.variant_of(self.peek()?)
    }

    /// Fails with `TypeIncompatibility` unless the payload may go into a list
    /// constrained to `constraint`. An empty clipboard is compatible.
    pub fn check_compatible(&self, document: &Document, constraint: &str) -> EditorResult<()> {
        let Some(variant) = self.content_variant(document) else {
            return Ok(());
        };
        if document.schema().is_assignable(constraint, variant) {
            Ok(())
        } else {
            Err(EditorError::TypeIncompatibility {
                payload: variant.to_string(),
                constraint: constraint.to_string(),
            })
        }
    }

    pub fn clear(&mut self) {
        self.content = None;
    }
}
