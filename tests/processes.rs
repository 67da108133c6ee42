// Real OS processes talking over one region: the test binary re-runs itself
// with DIALOG_TEST_ROLE set, and the child runs `child_participant` only.
// Region names reach the child through the normal DIALOG_* variables.

mod common;

use common::{eventually, Scratch};
use dialog_shm::config::{ENV_POLL_MS, ENV_SEM_NAME, ENV_SHM_NAME};
use dialog_shm::{DialogError, DialogId, RegionConfig, Session, SharedRegion, Teardown};
use serial_test::serial;
use std::collections::HashSet;
use std::io;
use std::process::{Child, Command, Output, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const ROLE_VAR: &str = "DIALOG_TEST_ROLE";
const DIALOG_VAR: &str = "DIALOG_TEST_DIALOG";
const ID_MARKER: &str = "created-dialog=";
const TEARDOWN_MARKER: &str = "teardown=";

fn spawn_child(role: &str, scratch: &Scratch, dialog: Option<DialogId>) -> io::Result<Child> {
    let mut command = Command::new(std::env::current_exe()?);
    command
        .args(["child_participant", "--exact", "--nocapture", "--test-threads=1"])
        .env(ROLE_VAR, role)
        .env(ENV_SHM_NAME, scratch.config.shm_name())
        .env(ENV_SEM_NAME, scratch.config.sem_name())
        // Far longer than any wait below: the child only keeps up if the
        // cross-process futex wake works.
        .env(ENV_POLL_MS, "30000")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(id) = dialog {
        command.env(DIALOG_VAR, id.to_string());
    }
    command.spawn()
}

/// Wait for `child`, killing it after `limit`.
fn finish(mut child: Child, limit: Duration) -> io::Result<Output> {
    let deadline = Instant::now() + limit;
    while child.try_wait()?.is_none() {
        if Instant::now() > deadline {
            child.kill()?;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        eprintln!("child stderr: {}", String::from_utf8_lossy(&output.stderr));
        eprintln!("child stdout: {}", String::from_utf8_lossy(&output.stdout));
        panic!("child failed: {}", output.status);
    }
    Ok(output)
}

/// Values printed after `marker`. libtest may put its own "test ... " text
/// in front on the same line.
fn marked(output: &Output, marker: &str) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split_once(marker).map(|(_, value)| value.trim().to_string()))
        .collect()
}

/// Entry point of the child processes; does nothing in a normal test run.
#[test]
fn child_participant() {
    let Ok(role) = std::env::var(ROLE_VAR) else {
        return;
    };
    let config = RegionConfig::from_env();

    match role.as_str() {
        "creator" => {
            let region = Arc::new(SharedRegion::create_or_attach(&config).unwrap());
            let id = Session::new(region).create_dialog().unwrap();
            println!("{ID_MARKER}{id}");
        }
        "echo" => {
            let dialog: DialogId = std::env::var(DIALOG_VAR).unwrap().parse().unwrap();
            let region = Arc::new(SharedRegion::attach(&config).unwrap());
            let session = Session::new(Arc::clone(&region));
            session.join_dialog(dialog).unwrap();

            loop {
                let seen = region.signal_value();
                let receipt = session.receive_messages(dialog).unwrap();
                for d in &receipt.deliveries {
                    if !d.is_termination && d.sender != session.pid() {
                        session.send_message(dialog, &format!("echo:{}", d.text)).unwrap();
                    }
                }
                if receipt.terminated {
                    println!("{TEARDOWN_MARKER}{:?}", receipt.teardown);
                    break;
                }
                region.wait_for_signal(seen, config.poll_interval());
            }
        }
        other => panic!("unknown role {other}"),
    }
}

#[test]
#[serial]
fn test_two_processes_exchange_and_tear_down() -> io::Result<()> {
    let scratch = Scratch::new();
    let region = scratch.region();
    let owner = Session::new(Arc::clone(&region));
    let dialog = owner.create_dialog().unwrap();

    let child = spawn_child("echo", &scratch, Some(dialog))?;
    let child_pid = child.id();
    assert_ne!(child_pid, owner.pid());

    assert!(eventually(|| owner.list_dialogs().unwrap()[0].participants == 2));
    owner.send_message(dialog, "hello").unwrap();

    let mut got = Vec::new();
    assert!(eventually(|| {
        got.extend(owner.receive_messages(dialog).unwrap().deliveries);
        got.iter().any(|d| d.text == "echo:hello")
    }));
    let echo = got.iter().find(|d| d.text == "echo:hello").unwrap();
    assert_eq!(echo.sender, child_pid);
    assert!(got.iter().any(|d| d.text == "hello" && d.sender == owner.pid()));

    // Both members acknowledged both messages.
    assert!(eventually(|| region.stats().unwrap().messages_in_use == 0));

    owner.send_termination(dialog).unwrap();
    let output = finish(child, Duration::from_secs(10))?;
    assert_eq!(marked(&output, TEARDOWN_MARKER), vec!["None"]);

    let receipt = owner.receive_messages(dialog).unwrap();
    assert!(receipt.terminated);
    assert_eq!(receipt.teardown, Teardown::RegionDestroyed);

    let err = SharedRegion::attach(&scratch.config).unwrap_err();
    assert!(matches!(err, DialogError::AttachFailure { .. }));
    Ok(())
}

#[test]
#[serial]
fn test_racing_creators_share_one_region() -> io::Result<()> {
    const CREATORS: usize = 4;
    let scratch = Scratch::new();

    // Started together against names nobody has created yet.
    let children = (0..CREATORS)
        .map(|_| spawn_child("creator", &scratch, None))
        .collect::<io::Result<Vec<_>>>()?;

    let mut ids = HashSet::new();
    for child in children {
        let output = finish(child, Duration::from_secs(20))?;
        for id in marked(&output, ID_MARKER) {
            ids.insert(id.parse::<DialogId>().unwrap());
        }
    }

    assert_eq!(ids, (1..=CREATORS as DialogId).collect());
    let region = SharedRegion::attach(&scratch.config).unwrap();
    let stats = region.stats().unwrap();
    assert_eq!(stats.open_dialogs, CREATORS);
    assert_eq!(stats.next_dialog_id, CREATORS as DialogId + 1);
    Ok(())
}
