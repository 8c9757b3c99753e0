//! Property tests for the reversible commands: moves land where the index
//! adjustment says, and undoing any sequence of edits restores the document.

use proptest::prelude::*;
use xdat_editor::command::{Command, MoveCommand, PropertyChangeCommand};
use xdat_editor::{
    AttrValue, Document, EntityId, ListRef, Schema, SearchCriteria, UndoManager, Workspace, statics,
};

fn windows(count: usize) -> (Workspace, ListRef, Vec<EntityId>) {
    let mut document = Document::new(Schema::ui_descriptor().unwrap()).unwrap();
    let list = ListRef::new(document.root(), statics::XD_LIST_WINDOWS);
    let ids: Vec<EntityId> = (0..count)
        .map(|i| {
            let id = document.create("Window").unwrap();
            document
                .set_attribute(id, "name", AttrValue::Text(format!("w{i}")))
                .unwrap();
            id
        })
        .collect();
    let mut workspace = Workspace::new(document);
    for (index, id) in ids.iter().enumerate() {
        workspace.insert_into(&list, index, *id);
    }
    workspace
        .rebuild(statics::XD_LIST_WINDOWS, &SearchCriteria::default())
        .unwrap();
    workspace.take_events();
    (workspace, list, ids)
}

fn order(workspace: &Workspace, list: &ListRef) -> Vec<EntityId> {
    workspace.document().list(list).unwrap().to_vec()
}

fn mirror_order(workspace: &Workspace) -> Vec<EntityId> {
    let mirror = workspace.mirror();
    mirror.entities_under(mirror.root().unwrap())
}

#[test]
fn move_forward_lands_one_before_the_drop_index() {
    let (mut workspace, list, ids) = windows(6);
    let command = MoveCommand::new(
        workspace.document(),
        list.clone(),
        2,
        list.clone(),
        5,
        ids[2],
    );
    assert_eq!(command.adjusted_target_index(), 4);
    command.execute(&mut workspace);
    assert_eq!(order(&workspace, &list)[4], ids[2]);
    command.undo(&mut workspace);
    assert_eq!(order(&workspace, &list), ids);
}

fn move_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..8).prop_flat_map(|count| {
        let one = (0..count, 0..=count);
        (Just(count), prop::collection::vec(one, 1..12))
    })
}

proptest! {
    #[test]
    fn single_move_matches_remove_then_insert(
        (count, moves) in move_strategy()
    ) {
        let (mut workspace, list, ids) = windows(count);
        let (from, to) = moves[0];
        let command = MoveCommand::new(
            workspace.document(),
            list.clone(),
            from,
            list.clone(),
            to,
            ids[from],
        );
        command.execute(&mut workspace);

        let mut expected = ids.clone();
        let moved = expected.remove(from);
        let landing = if to > from { to - 1 } else { to };
        expected.insert(landing, moved);

        prop_assert_eq!(command.adjusted_target_index(), landing);
        prop_assert_eq!(order(&workspace, &list), expected.clone());
        prop_assert_eq!(mirror_order(&workspace), expected);
    }

    #[test]
    fn undoing_every_edit_restores_the_start(
        (count, moves) in move_strategy(),
        widths in prop::collection::vec(0i64..500, 0..6)
    ) {
        let (mut workspace, list, ids) = windows(count);
        let mut history = UndoManager::default();

        for (from, to) in &moves {
            let current = order(&workspace, &list);
            let command = MoveCommand::new(
                workspace.document(),
                list.clone(),
                *from,
                list.clone(),
                *to,
                current[*from],
            );
            prop_assert!(history.execute(command, &mut workspace));
        }
        for (i, width) in widths.iter().enumerate() {
            let target = ids[i % count];
            let command = PropertyChangeCommand::new(
                workspace.document(),
                target,
                "width",
                AttrValue::Int(*width),
            ).unwrap();
            prop_assert!(history.execute(command, &mut workspace));
        }
        let edited = order(&workspace, &list);
        prop_assert_eq!(mirror_order(&workspace), edited.clone());

        while history.undo(&mut workspace) {}
        prop_assert_eq!(order(&workspace, &list), ids.clone());
        prop_assert_eq!(mirror_order(&workspace), ids.clone());
        for id in &ids {
            let width = workspace.document().attribute(*id, "width");
            prop_assert_eq!(width, Some(&AttrValue::Int(0)));
        }

        while history.redo(&mut workspace) {}
        prop_assert_eq!(order(&workspace, &list), edited);
    }
}
