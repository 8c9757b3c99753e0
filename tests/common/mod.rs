#![allow(dead_code)]

use xdat_editor::{
    AttrValue, Document, EditorSession, EditorSettings, EntityId, ListRef, NodeId, Schema,
    Workspace, statics,
};

/// Ids of the entities in `sample_document`.
pub struct Sample {
    pub document: Document,
    pub main: EntityId,
    pub options: EntityId,
    pub ok: EntityId,
    pub title: EntityId,
    pub cancel: EntityId,
}

pub fn text(value: &str) -> AttrValue {
    AttrValue::Text(value.to_string())
}

/// ```text
/// windows
///   Main      (Window, titleText "foo1 window")
///     children
///       OkButton     (Button, buttonNameText "bar")
///       Title        (TextBox, text "foo2")
///       CancelButton (Button)
///   Options   (Window)
/// ```
pub fn sample_document() -> Sample {
    let schema = Schema::ui_descriptor().unwrap();
    let mut workspace = Workspace::new(Document::new(schema).unwrap());
    let windows = ListRef::new(workspace.document().root(), statics::XD_LIST_WINDOWS);

    let main = element(
        &mut workspace,
        "Window",
        "Main",
        &[("titleText", "foo1 window")],
    );
    let options = element(&mut workspace, "Window", "Options", &[]);
    let ok = element(
        &mut workspace,
        "Button",
        "OkButton",
        &[("buttonNameText", "bar")],
    );
    let title = element(&mut workspace, "TextBox", "Title", &[("text", "foo2")]);
    let cancel = element(&mut workspace, "Button", "CancelButton", &[]);

    workspace.insert_into(&windows, 0, main);
    workspace.insert_into(&windows, 1, options);
    let children = ListRef::new(main, "children");
    for (index, id) in [ok, title, cancel].into_iter().enumerate() {
        workspace.insert_into(&children, index, id);
    }

    Sample {
        document: workspace.into_document(),
        main,
        options,
        ok,
        title,
        cancel,
    }
}

fn element(
    workspace: &mut Workspace,
    variant: &str,
    name: &str,
    attrs: &[(&str, &str)],
) -> EntityId {
    let document = workspace.document_mut();
    let id = document.create(variant).unwrap();
    document
        .set_attribute(id, statics::XD_PROP_NAME, text(name))
        .unwrap();
    for (property, value) in attrs {
        document.set_attribute(id, property, text(value)).unwrap();
    }
    id
}

pub fn session_with(document: Document, settings: &EditorSettings) -> EditorSession {
    EditorSession::new(document, statics::XD_LIST_WINDOWS, settings).unwrap()
}

pub fn sample_session() -> (EditorSession, Sample) {
    let sample = sample_document();
    let session = session_with(sample.document.clone(), &EditorSettings::default());
    (session, sample)
}

pub fn node(session: &EditorSession, entity: EntityId) -> NodeId {
    session.node_of(entity).unwrap()
}

pub fn list_node(session: &EditorSession, owner: EntityId, field: &str) -> NodeId {
    session
        .mirror()
        .list_node(&ListRef::new(owner, field))
        .unwrap()
}

pub fn names(session: &EditorSession, owner: EntityId, field: &str) -> Vec<String> {
    let document = session.document();
    document
        .list(&ListRef::new(owner, field))
        .unwrap_or_default()
        .iter()
        .map(|id| document.display_name(*id))
        .collect()
}

/// Whole-document snapshot for state comparisons.
pub fn snapshot(session: &EditorSession) -> String {
    let document = session.document();
    xdat_editor::DocValue::from_entity(document, document.root()).to_json5_compact()
}

/// Names of the entity nodes below a list holder, in mirror order.
pub fn mirror_names(session: &EditorSession, owner: EntityId, field: &str) -> Vec<String> {
    let mirror = session.mirror();
    let list = list_node(session, owner, field);
    mirror
        .entities_under(list)
        .into_iter()
        .map(|id| session.document().display_name(id))
        .collect()
}
