use crate::clipboard::Clipboard;
use crate::clone::deep_clone;
use crate::codec;
use crate::command::{
    BatchReplaceCommand, DeleteCommand, InsertCommand, InsertKind, MoveCommand,
    PropertyChangeCommand,
};
use crate::dragdrop::{self, DropGeometry};
use crate::entity::{AttrValue, Document, EntityId, ListRef, Owner};
use crate::error::{EditorError, EditorResult};
use crate::history::{DocumentListener, UndoManager};
use crate::mirror::{MirrorItem, NodeId, TreeMirror};
use crate::save::{DocumentFile, DocumentFormat, LoadedDocument};
use crate::search::{Replacement, Replacer, SearchCriteria};
use crate::settings::EditorSettings;
use crate::statics;
use crate::workspace::Workspace;
use anyhow::Context;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// One open document and everything needed to edit it: the workspace, the
/// undo log, the clipboard and the active search filter.
#[derive(Debug)]
pub struct EditorSession {
    workspace: Workspace,
    history: UndoManager,
    clipboard: Clipboard,
    criteria: SearchCriteria,
    root_list: String,
    matches: usize,
    file: DocumentFile,
}

impl EditorSession {
    pub fn new(
        document: Document,
        root_list: &str,
        settings: &EditorSettings,
    ) -> EditorResult<Self> {
        Self::with_file(
            document,
            DocumentFile::unsaved(DocumentFormat::Binary),
            root_list,
            settings,
        )
    }

    pub fn open(
        loaded: LoadedDocument,
        root_list: &str,
        settings: &EditorSettings,
    ) -> EditorResult<Self> {
        Self::with_file(loaded.document, loaded.file, root_list, settings)
    }

    fn with_file(
        document: Document,
        file: DocumentFile,
        root_list: &str,
        settings: &EditorSettings,
    ) -> EditorResult<Self> {
        let mut workspace = Workspace::new(document);
        let criteria = SearchCriteria::default();
        let matches = workspace.rebuild(root_list, &criteria)?;
        Ok(Self {
            workspace,
            history: UndoManager::new(settings.max_history),
            clipboard: Clipboard::new(),
            criteria,
            root_list: root_list.to_string(),
            matches,
            file,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn document(&self) -> &Document {
        self.workspace.document()
    }

    pub fn mirror(&self) -> &TreeMirror {
        self.workspace.mirror()
    }

    pub fn history(&self) -> &UndoManager {
        &self.history
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn match_count(&self) -> usize {
        self.matches
    }

    pub fn file(&self) -> &DocumentFile {
        &self.file
    }

    /// File name for window titles, starred when there are unsaved edits.
    pub fn title(&self) -> String {
        let name = self
            .file
            .source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| statics::EN_PLACEHOLDER_UNSAVED.to_string());
        if self.is_modified() {
            format!("{name}*")
        } else {
            name
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn DocumentListener>) {
        self.history.add_listener(listener);
    }

    pub fn root_list(&self) -> ListRef {
        ListRef::new(self.document().root(), self.root_list.clone())
    }

    pub fn node_of(&self, entity: EntityId) -> Option<NodeId> {
        self.mirror().entity_node(entity)
    }

    /// Swap the filter and rebuild the mirror. Returns the direct match count.
    pub fn set_criteria(&mut self, criteria: SearchCriteria) -> EditorResult<usize> {
        self.check_property_filter(criteria.property_filter())?;
        self.matches = self.workspace.rebuild(&self.root_list, &criteria)?;
        self.criteria = criteria;
        self.history.dispatch(&mut self.workspace);
        Ok(self.matches)
    }

    pub fn rebuild(&mut self) -> EditorResult<usize> {
        self.matches = self.workspace.rebuild(&self.root_list, &self.criteria)?;
        self.history.dispatch(&mut self.workspace);
        Ok(self.matches)
    }

    /// A property filter must name an attribute some variant declares.
    fn check_property_filter(&self, property: Option<&str>) -> EditorResult<()> {
        match property {
            Some(property) if !self.document().schema().declares_attribute(property) => {
                Err(EditorError::Schema(format!(
                    "no variant declares a property named {property}"
                )))
            }
            _ => Ok(()),
        }
    }

    fn entity_at(&self, node: NodeId) -> EditorResult<EntityId> {
        self.mirror()
            .entity_of(node)
            .ok_or_else(|| EditorError::InvalidTarget("node is not an element".into()))
    }

    /// The list and index of an element node.
    fn membership(&self, node: NodeId) -> EditorResult<(ListRef, usize, EntityId)> {
        let entity = self.entity_at(node)?;
        let (_, holder) = self.mirror().parent_holder(node).ok_or_else(|| {
            EditorError::InvalidTarget(format!(
                "{} is not a list element",
                self.document().display_name(entity)
            ))
        })?;
        let index = self
            .document()
            .list(&holder.list)
            .and_then(|items| items.iter().position(|e| *e == entity))
            .ok_or_else(|| EditorError::InvalidTarget("element left its list".into()))?;
        Ok((holder.list.clone(), index, entity))
    }

    /// Paste destination: the root list with no selection, the selected list
    /// holder, or the list holding the selected element.
    fn paste_target(&self, selection: Option<NodeId>) -> EditorResult<ListRef> {
        let Some(node) = selection else {
            return Ok(self.root_list());
        };
        match self.mirror().item(node) {
            Some(MirrorItem::List(holder)) => Ok(holder.list.clone()),
            Some(MirrorItem::Entity(_)) => self
                .mirror()
                .parent_holder(node)
                .map(|(_, holder)| holder.list.clone())
                .ok_or_else(|| EditorError::InvalidTarget("selection has no list".into())),
            None => Err(EditorError::InvalidTarget("unknown selection".into())),
        }
    }

    fn list_len(&self, list: &ListRef) -> usize {
        self.document().list(list).map_or(0, <[EntityId]>::len)
    }

    /// Property-sheet edit: write now, record the staged command.
    pub fn set_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: AttrValue,
    ) -> EditorResult<()> {
        let entity = self.entity_at(node)?;
        if self.document().attribute(entity, property) == Some(&value) {
            return Ok(());
        }
        let command = PropertyChangeCommand::stage(&mut self.workspace, entity, property, value)?;
        self.history.record(command, &mut self.workspace);
        Ok(())
    }

    /// Variants offered by an "add" action on a list holder.
    pub fn creatable_variants(&self, list_node: NodeId) -> Vec<String> {
        let Some(holder) = self.mirror().list_holder(list_node) else {
            return Vec::new();
        };
        self.document()
            .schema()
            .creatable_variants(&holder.element_type)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Append a new default element to a list holder.
    pub fn create(&mut self, list_node: NodeId, variant: &str) -> EditorResult<NodeId> {
        let holder = self
            .mirror()
            .list_holder(list_node)
            .cloned()
            .ok_or_else(|| EditorError::InvalidTarget("create needs a list".into()))?;
        if !self.document().schema().is_assignable(&holder.element_type, variant) {
            return Err(EditorError::TypeIncompatibility {
                payload: variant.to_string(),
                constraint: holder.element_type,
            });
        }
        let entity = self.workspace.document_mut().create(variant)?;
        let index = self.list_len(&holder.list);
        self.insert(holder.list, index, entity, InsertKind::Create)
    }

    fn insert(
        &mut self,
        list: ListRef,
        index: usize,
        entity: EntityId,
        kind: InsertKind,
    ) -> EditorResult<NodeId> {
        let command = InsertCommand::new(self.document(), list, index, entity, kind);
        self.history.execute(command, &mut self.workspace);
        self.node_of(entity)
            .ok_or_else(|| EditorError::InvalidTarget("inserted element is not shown".into()))
    }

    pub fn delete(&mut self, node: NodeId) -> EditorResult<()> {
        let (list, _, entity) = self.membership(node)?;
        let command = DeleteCommand::new(self.document(), list, entity)?;
        info!(path = %self.mirror().path_of(self.document(), node), "delete");
        self.history.execute(command, &mut self.workspace);
        Ok(())
    }

    pub fn copy(&mut self, node: NodeId) -> EditorResult<()> {
        let entity = self.entity_at(node)?;
        self.clipboard.copy(self.workspace.document_mut(), entity)
    }

    /// Mark an element for moving. The document is untouched until paste.
    pub fn cut(&mut self, node: NodeId) -> EditorResult<()> {
        let (_, _, entity) = self.membership(node)?;
        self.clipboard.cut(entity);
        Ok(())
    }

    /// Paste the clipboard at the end of the target list. Returns the node of
    /// the pasted element, or `None` with an empty clipboard.
    pub fn paste(&mut self, selection: Option<NodeId>) -> EditorResult<Option<NodeId>> {
        let Some(payload) = self.clipboard.peek() else {
            return Ok(None);
        };
        let target = self.paste_target(selection)?;
        let constraint = self.document().element_type(&target)?.to_string();
        self.clipboard.check_compatible(self.document(), &constraint)?;

        if self.clipboard.is_cut() {
            if let Some(Owner::List(source, source_index)) = self.document().owner_of(payload) {
                if self.document().is_within(target.owner, payload) {
                    return Err(EditorError::InvalidTarget(
                        "cannot paste an element into itself".into(),
                    ));
                }
                self.clipboard.paste(self.workspace.document_mut())?;
                let index = self.list_len(&target);
                let command = MoveCommand::new(
                    self.document(),
                    source,
                    source_index,
                    target,
                    index,
                    payload,
                );
                info!(entity = %payload, "paste cut element");
                self.history.execute(command, &mut self.workspace);
                return Ok(self.node_of(payload));
            }
        }

        let Some(entity) = self.clipboard.paste(self.workspace.document_mut())? else {
            return Ok(None);
        };
        let index = self.list_len(&target);
        info!(entity = %entity, list = %target, "paste");
        self.insert(target, index, entity, InsertKind::Paste).map(Some)
    }

    /// Clone an element and insert the copy right after it.
    pub fn duplicate(&mut self, node: NodeId) -> EditorResult<NodeId> {
        let (list, index, entity) = self.membership(node)?;
        let copy = deep_clone(self.workspace.document_mut(), entity)?;
        self.insert(list, index + 1, copy, InsertKind::Duplicate)
    }

    /// Replace within one element. Returns the number of substitutions.
    pub fn replace_selected(&mut self, node: NodeId, replacer: &Replacer) -> EditorResult<usize> {
        self.check_property_filter(replacer.filtered_property())?;
        let entity = self.entity_at(node)?;
        let changes = replacer.plan_entity(self.document(), entity);
        Ok(self.apply_replacements(replacer, changes))
    }

    /// Replace across the whole tree under the root list.
    pub fn replace_all(&mut self, replacer: &Replacer) -> EditorResult<usize> {
        self.check_property_filter(replacer.filtered_property())?;
        let changes = replacer.plan_all(self.document(), &self.root_list());
        Ok(self.apply_replacements(replacer, changes))
    }

    fn apply_replacements(&mut self, replacer: &Replacer, changes: Vec<Replacement>) -> usize {
        let count = changes.len();
        if count == 0 {
            return 0;
        }
        let command = BatchReplaceCommand::new(replacer.search(), replacer.replacement(), changes);
        info!(count, search = replacer.search(), "replace");
        self.history.execute(command, &mut self.workspace);
        count
    }

    pub fn can_drop(&self, dragged: NodeId, target: NodeId) -> bool {
        dragdrop::can_drop_on(&self.workspace, dragged, target)
    }

    pub fn drop_on(
        &mut self,
        dragged: NodeId,
        target: NodeId,
        geometry: DropGeometry,
    ) -> EditorResult<String> {
        dragdrop::perform_drop(
            &mut self.workspace,
            &mut self.history,
            dragged,
            target,
            geometry,
        )
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.workspace)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.workspace)
    }

    pub fn is_modified(&self) -> bool {
        self.history.is_modified()
    }

    pub fn export_window(&self, node: NodeId, path: &Path) -> anyhow::Result<()> {
        let entity = self.entity_at(node)?;
        let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
        let mut writer = BufWriter::new(file);
        codec::export_window(self.document(), entity, &mut writer)
            .with_context(|| format!("exporting to {path:?}"))?;
        info!(?path, entity = %entity, "exported window");
        Ok(())
    }

    /// Read a window file and append it to the root list as one undoable step.
    pub fn import_window(&mut self, path: &Path) -> anyhow::Result<NodeId> {
        let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
        let mut reader = BufReader::new(file);
        let mark = self.document().len();
        let entity = codec::import_window(self.workspace.document_mut(), &mut reader)
            .with_context(|| format!("importing {path:?}"))?;

        let target = self.root_list();
        let constraint = self.document().element_type(&target)?.to_string();
        let variant = self.document().variant_of(entity).unwrap_or_default().to_string();
        if !self.document().schema().is_assignable(&constraint, &variant) {
            self.workspace.document_mut().truncate(mark);
            return Err(EditorError::TypeIncompatibility {
                payload: variant,
                constraint,
            }
            .into());
        }

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let index = self.list_len(&target);
        info!(?path, entity = %entity, "imported window");
        let node = self.insert(target, index, entity, InsertKind::Import { source })?;
        Ok(node)
    }

    /// Save to `path` (gzip when it ends in `.gz`) and mark the history saved.
    pub fn save_to_path(&mut self, path: &Path) -> anyhow::Result<()> {
        let modified = self.is_modified();
        self.file
            .save_to_path(self.workspace.document(), path, modified)?;
        self.history.mark_saved();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::EditorSession;
    use crate::entity::{AttrValue, Document};
    use crate::schema::Schema;
    use crate::settings::EditorSettings;
    use crate::statics;

    fn session() -> EditorSession {
        let doc = Document::new(Schema::ui_descriptor().unwrap()).unwrap();
        EditorSession::new(doc, statics::XD_LIST_WINDOWS, &EditorSettings::default()).unwrap()
    }

    #[test]
    fn create_offers_constructible_subtypes() {
        let mut s = session();
        let root = s.mirror().root().unwrap();
        assert_eq!(s.creatable_variants(root), vec!["Window".to_string()]);
        let node = s.create(root, "Window").unwrap();
        assert!(s.mirror().is_attached(node));
        assert_eq!(
            s.history().undo_description().as_deref(),
            Some("Create: Window")
        );
        assert!(s.create(root, "Button").is_err());
    }

    #[test]
    fn set_property_records_once_and_skips_noops() {
        let mut s = session();
        let root = s.mirror().root().unwrap();
        let node = s.create(root, "Window").unwrap();
        s.set_property(node, "name", AttrValue::Text("Main".into()))
            .unwrap();
        s.set_property(node, "name", AttrValue::Text("Main".into()))
            .unwrap();
        assert_eq!(s.history().undo_len(), 2);
        assert!(s.undo());
        let window = s.mirror().entity_of(node).unwrap();
        assert_eq!(s.document().display_name(window), "Window");
    }

    #[test]
    fn duplicate_lands_after_original() {
        let mut s = session();
        let root = s.mirror().root().unwrap();
        let a = s.create(root, "Window").unwrap();
        let b = s.create(root, "Window").unwrap();
        let copy = s.duplicate(a).unwrap();
        let order: Vec<_> = s.mirror().children(root).to_vec();
        assert_eq!(order, vec![a, copy, b]);
        assert!(s.undo());
        assert_eq!(s.mirror().children(root), &[a, b]);
    }
}
