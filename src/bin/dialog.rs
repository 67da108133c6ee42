//! Interactive front end: create or join a dialog, then chat until TERMINATE.

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use dialog_shm::Dialog::{Delivery, Poller, PollerHandle, Session, Teardown};
use dialog_shm::{DialogId, RegionConfig, SharedRegion};
use log::info;
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;

// Keeps the poller's output from interleaving with the menu
static CONSOLE: Mutex<()> = parking_lot::const_mutex(());

#[derive(Parser, Debug)]
#[command(name = "dialog")]
#[command(author, version, about = "Group dialogs over shared memory", long_about = None)]
struct Cli {
    /// Shared memory object name (overrides DIALOG_SHM_NAME)
    #[arg(long)]
    shm_name: Option<String>,

    /// Semaphore name (overrides DIALOG_SEM_NAME)
    #[arg(long)]
    sem_name: Option<String>,

    /// Poll interval in milliseconds (overrides DIALOG_POLL_MS)
    #[arg(long)]
    poll_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new dialog, creating the shared region if needed
    Create,

    /// Join an existing dialog
    Join {
        /// Dialog id; prompts with the list of open dialogs if omitted
        id: Option<DialogId>,
    },

    /// List open dialogs
    List,
}

fn setup_logging() -> Result<()> {
    // Warn by default; RUST_LOG still wins
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();
    Ok(())
}

fn say(line: impl AsRef<str>) {
    let _console = CONSOLE.lock();
    println!("{}", line.as_ref());
    let _ = io::stdout().flush();
}

fn prompt(stdin: &mut impl BufRead, label: &str) -> Option<String> {
    {
        let _console = CONSOLE.lock();
        print!("{label}");
        let _ = io::stdout().flush();
    }
    let mut line = String::new();
    match stdin.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn config_from(cli: &Cli) -> RegionConfig {
    let mut config = RegionConfig::from_env();
    if let Some(name) = &cli.shm_name {
        config = config.with_shm_name(name.clone());
    }
    if let Some(name) = &cli.sem_name {
        config = config.with_sem_name(name.clone());
    }
    if let Some(ms) = cli.poll_ms {
        config = config.with_poll_interval(std::time::Duration::from_millis(ms));
    }
    config
}

fn list(session: &Session) -> dialog_shm::Result<()> {
    let dialogs = session.list_dialogs()?;
    say("Available dialogs:");
    if dialogs.is_empty() {
        say("  (none)");
    }
    for d in dialogs {
        say(format!(
            "  ID: {} ({} participants, {} active)",
            d.id, d.participants, d.active
        ));
    }
    Ok(())
}

fn spawn_receiver(session: &Session, dialog_id: DialogId, config: &RegionConfig) -> io::Result<PollerHandle> {
    struct Console;

    impl dialog_shm::Dialog::MessageObserver for Console {
        fn on_message(&mut self, delivery: &Delivery) {
            say(format!("\n[RECEIVER] Message from {}: {}", delivery.sender, delivery.text));
        }

        fn on_terminated(&mut self, teardown: Teardown) {
            say("\n[RECEIVER] Dialog terminated (TERMINATE)");
            if teardown == Teardown::RegionDestroyed {
                say("[RECEIVER] Last dialog closed, shared region removed");
            }
        }
    }

    Poller::spawn(session.clone(), dialog_id, config.poll_interval(), Console)
}

fn chat(session: &Session, dialog_id: DialogId, config: &RegionConfig) -> Result<()> {
    let poller = spawn_receiver(session, dialog_id, config).context("Failed to start receiver")?;

    let keep_alive = Arc::clone(poller.keep_alive());
    ctrlc::set_handler(move || {
        keep_alive.store(false, Ordering::SeqCst);
        say("\nInterrupted, press Enter to leave");
    })
    .context("Error setting Ctrl-C handler")?;

    let mut stdin = io::stdin().lock();
    while poller.is_running() {
        say("\n1. Send message\n2. Send TERMINATE\n3. Exit");
        let Some(choice) = prompt(&mut stdin, "Choice: ") else {
            break;
        };
        if !poller.is_running() {
            break;
        }

        match choice.trim() {
            "1" => {
                let Some(text) = prompt(&mut stdin, "Message: ") else {
                    break;
                };
                if let Err(e) = session.send_message(dialog_id, &text) {
                    say(format!("Send failed: {e}"));
                }
            }
            "2" => match session.send_termination(dialog_id) {
                Ok(()) => say("TERMINATE sent"),
                Err(e) => say(format!("Send failed: {e}")),
            },
            "3" => poller.stop(),
            other => say(format!("Unknown choice {other:?}")),
        }
    }

    poller.stop();
    let exit = poller.join();
    info!("receiver stopped: {exit:?}");
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = config_from(&cli);

    match cli.command {
        Command::Create => {
            let region = Arc::new(
                SharedRegion::create_or_attach(&config).context("Cannot create shared memory")?,
            );
            let session = Session::new(region);
            let dialog_id = session.create_dialog()?;
            say(format!("Created dialog with ID {dialog_id}"));
            chat(&session, dialog_id, &config)
        }
        Command::Join { id } => {
            let region =
                Arc::new(SharedRegion::attach(&config).context("No shared region to join")?);
            let session = Session::new(region);
            let dialog_id = match id {
                Some(id) => id,
                None => {
                    list(&session)?;
                    let mut stdin = io::stdin().lock();
                    let raw = prompt(&mut stdin, "Dialog ID: ").unwrap_or_default();
                    raw.trim()
                        .parse::<DialogId>()
                        .with_context(|| format!("Invalid dialog id {raw:?}"))?
                }
            };
            session
                .join_dialog(dialog_id)
                .with_context(|| format!("Failed to join dialog {dialog_id}"))?;
            say(format!("Joined dialog {dialog_id}"));
            chat(&session, dialog_id, &config)
        }
        Command::List => {
            let region = Arc::new(SharedRegion::attach(&config)?);
            list(&Session::new(region))?;
            Ok(())
        }
    }
}
