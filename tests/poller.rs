mod common;

use common::{eventually, Scratch};
use dialog_shm::Dialog::{Delivery, PollExit, Poller};
use dialog_shm::{DialogError, Lookup, Session, Teardown};
use parking_lot::Mutex;
use std::sync::Arc;

fn collector() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&Delivery) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |d: &Delivery| sink.lock().push(d.text.clone()))
}

#[test]
fn test_poller_delivers_then_cancels() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let owner = Session::with_pid(Arc::clone(&region), 1);
    let guest = Session::with_pid(Arc::clone(&region), 2);
    let dialog = owner.create_dialog().unwrap();
    guest.join_dialog(dialog).unwrap();

    let (seen, observer) = collector();
    let poller = Poller::spawn(guest, dialog, scratch.config.poll_interval(), observer).unwrap();

    owner.send_message(dialog, "one").unwrap();
    owner.send_message(dialog, "two").unwrap();
    assert!(eventually(|| seen.lock().len() == 2));
    assert_eq!(*seen.lock(), vec!["one", "two"]);
    assert!(poller.is_running());

    poller.stop();
    assert!(matches!(poller.join(), PollExit::Cancelled));
}

#[test]
fn test_poller_stops_on_sentinel() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let owner = Session::with_pid(Arc::clone(&region), 1);
    let guest = Session::with_pid(Arc::clone(&region), 2);
    let dialog = owner.create_dialog().unwrap();
    guest.join_dialog(dialog).unwrap();

    let (seen, observer) = collector();
    let poller = Poller::spawn(guest, dialog, scratch.config.poll_interval(), observer).unwrap();

    owner.send_termination(dialog).unwrap();
    assert!(eventually(|| !poller.is_running()));
    assert!(matches!(poller.join(), PollExit::Terminated(Teardown::None)));
    assert_eq!(*seen.lock(), vec!["TERMINATE"]);

    // The owner is the last active member.
    let receipt = owner.receive_messages(dialog).unwrap();
    assert_eq!(receipt.teardown, Teardown::RegionDestroyed);
}

#[test]
fn test_poller_for_non_member_fails() {
    let scratch = Scratch::new();
    let region = scratch.region();
    let dialog = Session::with_pid(Arc::clone(&region), 1).create_dialog().unwrap();

    let stranger = Session::with_pid(region, 2);
    let poller = Poller::spawn(stranger, dialog, scratch.config.poll_interval(), |_: &Delivery| {})
        .unwrap();

    assert!(matches!(
        poller.join(),
        PollExit::Failed(DialogError::NotFound(Lookup::Participant { pid: 2, .. }))
    ));
}
