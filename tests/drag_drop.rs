mod common;

use common::{list_node, names, node, sample_session, snapshot};
use pretty_assertions::assert_eq;
use xdat_editor::dragdrop::{DropGeometry, DropTarget, resolve_drop};
use xdat_editor::{EditorError, ListRef};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const ROW: f32 = 30.0;

fn before() -> DropGeometry {
    DropGeometry::new(2.0, ROW)
}

fn into() -> DropGeometry {
    DropGeometry::new(15.0, ROW)
}

fn after() -> DropGeometry {
    DropGeometry::new(28.0, ROW)
}

#[test]
fn reorder_within_a_list() -> Result<()> {
    let (mut session, sample) = sample_session();
    let ok = node(&session, sample.ok);
    let cancel = node(&session, sample.cancel);

    let description = session.drop_on(ok, cancel, after())?;
    assert_eq!(description, "Move: OkButton (0 -> 3)");
    assert_eq!(
        names(&session, sample.main, "children"),
        vec!["Title", "CancelButton", "OkButton"]
    );
    assert_eq!(
        common::mirror_names(&session, sample.main, "children"),
        vec!["Title", "CancelButton", "OkButton"]
    );

    assert!(session.undo());
    assert_eq!(
        names(&session, sample.main, "children"),
        vec!["OkButton", "Title", "CancelButton"]
    );
    Ok(())
}

#[test]
fn drop_before_an_earlier_sibling() -> Result<()> {
    let (mut session, sample) = sample_session();
    let ok = node(&session, sample.ok);
    let cancel = node(&session, sample.cancel);
    session.drop_on(cancel, ok, before())?;
    assert_eq!(
        names(&session, sample.main, "children"),
        vec!["CancelButton", "OkButton", "Title"]
    );
    Ok(())
}

#[test]
fn drop_into_an_element_uses_its_first_compatible_list() -> Result<()> {
    let (mut session, sample) = sample_session();
    let ok = node(&session, sample.ok);
    let options = node(&session, sample.options);

    let target = resolve_drop(session.workspace(), ok, options, into())?;
    assert_eq!(
        target,
        DropTarget {
            list: ListRef::new(sample.options, "children"),
            index: 0,
        }
    );
    session.drop_on(ok, options, into())?;
    assert_eq!(
        names(&session, sample.options, "children"),
        vec!["OkButton"]
    );
    assert_eq!(
        names(&session, sample.main, "children"),
        vec!["Title", "CancelButton"]
    );
    Ok(())
}

#[test]
fn drop_into_an_element_without_lists_goes_after_it() -> Result<()> {
    let (session, sample) = sample_session();
    let cancel = node(&session, sample.cancel);
    let ok = node(&session, sample.ok);
    let target = resolve_drop(session.workspace(), cancel, ok, into())?;
    assert_eq!(
        target,
        DropTarget {
            list: ListRef::new(sample.main, "children"),
            index: 1,
        }
    );
    Ok(())
}

#[test]
fn drop_on_a_list_holder_appends() -> Result<()> {
    let (mut session, sample) = sample_session();
    let title = node(&session, sample.title);
    let holder = list_node(&session, sample.options, "children");
    assert!(session.can_drop(title, holder));
    session.drop_on(title, holder, before())?;
    assert_eq!(names(&session, sample.options, "children"), vec!["Title"]);
    Ok(())
}

#[test]
fn window_cannot_be_dropped_into_its_own_subtree() -> Result<()> {
    let (mut session, sample) = sample_session();
    let before_state = snapshot(&session);
    let main = node(&session, sample.main);
    let ok = node(&session, sample.ok);
    let children = list_node(&session, sample.main, "children");

    assert!(!session.can_drop(main, main));
    assert!(!session.can_drop(main, ok));
    assert!(!session.can_drop(main, children));
    assert!(matches!(
        session.drop_on(main, ok, into()),
        Err(EditorError::InvalidTarget(_))
    ));
    assert!(matches!(
        resolve_drop(session.workspace(), main, children, after()),
        Err(EditorError::InvalidTarget(_))
    ));
    assert_eq!(snapshot(&session), before_state);
    assert!(!session.history().can_undo());
    Ok(())
}

#[test]
fn button_cannot_join_the_window_list() -> Result<()> {
    let (mut session, sample) = sample_session();
    let ok = node(&session, sample.ok);
    let windows = session.mirror().root().ok_or("no root")?;
    assert!(!session.can_drop(ok, windows));
    let err = resolve_drop(session.workspace(), ok, windows, after()).unwrap_err();
    assert!(matches!(err, EditorError::TypeIncompatibility { .. }));
    assert!(session.drop_on(ok, windows, after()).is_err());
    assert_eq!(names(&session, sample.main, "children").len(), 3);
    Ok(())
}
