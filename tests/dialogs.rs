// DialogService tests: create, join and list over a real shared region.

mod common;

use common::Scratch;
use dialog_shm::Dialog::layout::{MAX_DIALOGS, MAX_PARTICIPANTS};
use dialog_shm::{DialogError, Lookup, Pid, Resource, Session, Teardown};
use std::sync::Arc;

#[test]
fn test_dialog_ids_strictly_increase_across_closures() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let first = Session::with_pid(Arc::clone(&region), 1);
    let keeper = Session::with_pid(Arc::clone(&region), 2);

    let a = first.create_dialog().unwrap();
    let b = keeper.create_dialog().unwrap();

    // Close `a`; `b` keeps the region alive.
    first.send_termination(a).unwrap();
    let receipt = first.receive_messages(a).unwrap();
    assert_eq!(receipt.teardown, Teardown::DialogClosed);

    let c = first.create_dialog().unwrap();
    assert_eq!((a, b, c), (1, 2, 3));

    let open: Vec<_> = keeper.list_dialogs().unwrap().iter().map(|d| d.id).collect();
    // `c` took over the slot `a` freed.
    assert_eq!(open, vec![c, b]);
}

#[test]
fn test_join_unknown_dialog_is_not_found_and_changes_nothing() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let owner = Session::with_pid(Arc::clone(&region), 1);
    let dialog = owner.create_dialog().unwrap();
    let before = owner.list_dialogs().unwrap();

    let err = Session::with_pid(Arc::clone(&region), 2)
        .join_dialog(dialog + 41)
        .unwrap_err();

    assert!(matches!(err, DialogError::NotFound(Lookup::Dialog(id)) if id == dialog + 41));
    assert_eq!(owner.list_dialogs().unwrap(), before);
    assert_eq!(region.stats().unwrap().next_dialog_id, dialog + 1);
}

#[test]
fn test_join_appends_at_next_index() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let dialog = Session::with_pid(Arc::clone(&region), 100).create_dialog().unwrap();

    let second = Session::with_pid(Arc::clone(&region), 200).join_dialog(dialog).unwrap();
    let third = Session::with_pid(Arc::clone(&region), 300).join_dialog(dialog).unwrap();

    assert_eq!((second, third), (1, 2));
    let summary = Session::with_pid(region, 100).list_dialogs().unwrap()[0];
    assert_eq!(summary.participants, 3);
    assert_eq!(summary.active, 3);
}

#[test]
fn test_full_dialog_table() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let session = Session::with_pid(Arc::clone(&region), 5);

    let ids: Vec<_> = (0..MAX_DIALOGS)
        .map(|_| session.create_dialog().unwrap())
        .collect();
    let before = region.stats().unwrap();

    let err = session.create_dialog().unwrap_err();
    assert!(matches!(err, DialogError::ResourceExhausted(Resource::Dialogs)));
    assert_eq!(region.stats().unwrap(), before);
    assert_eq!(ids, (1..=MAX_DIALOGS as u32).collect::<Vec<_>>());
}

#[test]
fn test_full_participant_table() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let dialog = Session::with_pid(Arc::clone(&region), 1).create_dialog().unwrap();
    for pid in 2..=MAX_PARTICIPANTS as Pid {
        Session::with_pid(Arc::clone(&region), pid)
            .join_dialog(dialog)
            .unwrap();
    }

    let err = Session::with_pid(Arc::clone(&region), 999)
        .join_dialog(dialog)
        .unwrap_err();
    assert!(matches!(err, DialogError::ResourceExhausted(Resource::Participants)));

    // The rejected process never became a member.
    let err = Session::with_pid(region, 999).receive_messages(dialog).unwrap_err();
    assert!(matches!(err, DialogError::NotFound(Lookup::Participant { pid: 999, .. })));
}
