// Two participants, one process: a scripted run through create, join, chat
// and the termination cascade.
//
// cargo run --example scripted_chat
use dialog_shm::Dialog::{Delivery, PollExit, Poller};
use dialog_shm::{RegionConfig, Session, SharedRegion};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let suffix = std::process::id();
    let config = RegionConfig::new()
        .with_shm_name(format!("dialog_demo_{suffix}"))
        .with_sem_name(format!("/dialog_demo_{suffix}"))
        .with_poll_interval(Duration::from_millis(50));

    let region = Arc::new(SharedRegion::create_or_attach(&config)?);
    // Stand-ins for two separate processes
    let alice = Session::with_pid(Arc::clone(&region), 1001);
    let bob = Session::with_pid(Arc::clone(&region), 1002);

    let dialog = alice.create_dialog()?;
    bob.join_dialog(dialog)?;
    println!("Dialog {dialog} open: {:?}", alice.list_dialogs()?);

    let printer = |name: &'static str| {
        move |d: &Delivery| println!("[{name}] from {}: {}", d.sender, d.text)
    };
    let alice_rx = Poller::spawn(alice.clone(), dialog, config.poll_interval(), printer("alice"))?;
    let bob_rx = Poller::spawn(bob.clone(), dialog, config.poll_interval(), printer("bob"))?;

    alice.send_message(dialog, "hello bob")?;
    bob.send_message(dialog, "hi alice")?;
    std::thread::sleep(Duration::from_millis(200));

    // Every member that consumes a sentinel leaves, so one is enough to end the dialog
    alice.send_termination(dialog)?;

    for (name, rx) in [("alice", alice_rx), ("bob", bob_rx)] {
        match rx.join() {
            PollExit::Terminated(teardown) => println!("{name} left, teardown: {teardown:?}"),
            other => println!("{name} stopped: {other:?}"),
        }
    }

    match SharedRegion::attach(&config) {
        Ok(_) => println!("region still present"),
        Err(e) => println!("region gone: {e}"),
    }
    Ok(())
}
