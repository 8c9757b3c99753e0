mod common;

use common::{names, node, sample_session, session_with, snapshot, text};
use pretty_assertions::assert_eq;
use std::io::Write;
use xdat_editor::{
    Document, DocumentFormat, EditorError, EditorSettings, LoadedDocument, Schema, statics,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn empty_session() -> xdat_editor::EditorSession {
    let document = Document::new(Schema::ui_descriptor().unwrap()).unwrap();
    session_with(document, &EditorSettings::default())
}

#[test]
fn roundtrip_unmodified_binary_bytes_identical() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let first = dir.path().join("ui.xdat");
    let second = dir.path().join("copy.xdat");

    let (mut session, _) = sample_session();
    session.save_to_path(&first)?;

    let loaded = LoadedDocument::load_path(&first, &Schema::ui_descriptor()?)?;
    assert_eq!(loaded.file.format, DocumentFormat::Binary);
    let mut reopened = xdat_editor::EditorSession::open(
        loaded,
        statics::XD_LIST_WINDOWS,
        &EditorSettings::default(),
    )?;
    assert_eq!(snapshot(&reopened), snapshot(&session));
    assert!(!reopened.is_modified());

    reopened.save_to_path(&second)?;
    assert_eq!(std::fs::read(&second)?, std::fs::read(&first)?);
    Ok(())
}

#[test]
fn roundtrip_gz_preserves_content() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ui.xdat.gz");
    let (mut session, _) = sample_session();
    session.save_to_path(&path)?;

    let bytes = std::fs::read(&path)?;
    assert_eq!(&bytes[..2], &statics::GZIP_MAGIC[..]);

    let loaded = LoadedDocument::load_path(&path, &Schema::ui_descriptor()?)?;
    assert_eq!(loaded.file.format, DocumentFormat::GzipBinary);
    assert_eq!(loaded.file.original_bytes, bytes);
    let reopened = xdat_editor::EditorSession::open(
        loaded,
        statics::XD_LIST_WINDOWS,
        &EditorSettings::default(),
    )?;
    assert_eq!(snapshot(&reopened), snapshot(&session));
    Ok(())
}

#[test]
fn gzip_is_detected_by_magic_without_extension() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let gz = dir.path().join("ui.xdat.gz");
    let plain_name = dir.path().join("renamed.xdat");
    let (mut session, _) = sample_session();
    session.save_to_path(&gz)?;
    std::fs::rename(&gz, &plain_name)?;

    let loaded = LoadedDocument::load_path(&plain_name, &Schema::ui_descriptor()?)?;
    assert_eq!(loaded.file.format, DocumentFormat::GzipBinary);
    Ok(())
}

#[test]
fn modified_document_is_re_encoded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ui.xdat");
    let (mut session, sample) = sample_session();
    session.save_to_path(&path)?;
    let original = std::fs::read(&path)?;

    session.set_property(node(&session, sample.ok), "buttonNameText", text("Accept"))?;
    assert!(session.is_modified());
    session.save_to_path(&path)?;
    assert!(!session.is_modified());
    let changed = std::fs::read(&path)?;
    assert_ne!(changed, original);

    let loaded = LoadedDocument::load_path(&path, &Schema::ui_descriptor()?)?;
    let reopened = xdat_editor::EditorSession::open(
        loaded,
        statics::XD_LIST_WINDOWS,
        &EditorSettings::default(),
    )?;
    assert_eq!(snapshot(&reopened), snapshot(&session));
    Ok(())
}

#[test]
fn truncated_file_reports_byte_offset() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ui.xdat");
    let (mut session, _) = sample_session();
    session.save_to_path(&path)?;
    let bytes = std::fs::read(&path)?;
    std::fs::write(&path, &bytes[..bytes.len() / 2])?;

    let err = LoadedDocument::load_path(&path, &Schema::ui_descriptor()?).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("unexpected end of data"), "{message}");
    assert!(message.contains("(at byte "), "{message}");
    Ok(())
}

#[test]
fn exported_window_imports_into_another_document() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let window_file = dir.path().join("main.xdatwin");
    let (session, sample) = sample_session();
    session.export_window(node(&session, sample.main), &window_file)?;

    let mut target = empty_session();
    let imported = target.import_window(&window_file)?;
    let entity = target.mirror().entity_of(imported).ok_or("not an entity")?;
    assert_eq!(target.document().display_name(entity), "Main");
    assert_eq!(
        names(&target, entity, "children"),
        vec!["OkButton", "Title", "CancelButton"]
    );
    assert_eq!(
        target.history().undo_description().as_deref(),
        Some("Import: Main (from main.xdatwin)")
    );

    assert!(target.undo());
    let root = target.document().root();
    assert!(names(&target, root, statics::XD_LIST_WINDOWS).is_empty());
    assert!(target.redo());
    assert_eq!(
        names(&target, target.document().root(), statics::XD_LIST_WINDOWS),
        vec!["Main"]
    );
    Ok(())
}

#[test]
fn newer_window_file_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("future.xdatwin");
    let mut file = std::fs::File::create(&path)?;
    file.write_all(&statics::WINDOW_MAGIC.to_le_bytes())?;
    file.write_all(&(statics::WINDOW_FORMAT_VERSION + 1).to_le_bytes())?;
    drop(file);

    let mut session = empty_session();
    let entities = session.document().len();
    let err = session.import_window(&path).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("newer than supported"), "{message}");
    assert!(message.contains("(at byte 4)"), "{message}");
    assert_eq!(session.document().len(), entities);
    assert!(!session.history().can_undo());
    Ok(())
}

#[test]
fn imported_element_must_fit_the_window_list() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("button.xdatwin");
    let (session, sample) = sample_session();
    session.export_window(node(&session, sample.ok), &path)?;

    let mut target = empty_session();
    let entities = target.document().len();
    let err = target.import_window(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EditorError>(),
        Some(EditorError::TypeIncompatibility { .. })
    ));
    assert_eq!(target.document().len(), entities);
    Ok(())
}
