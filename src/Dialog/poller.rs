// src/Dialog/poller.rs

use super::layout::DialogId;
use super::session::{Delivery, Session, Teardown};
use crate::error::DialogError;
use log::{debug, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receives what the poller pulls out of the region. Called outside the gate.
pub trait MessageObserver: Send {
    fn on_message(&mut self, delivery: &Delivery);

    /// Called once when this participant consumed a termination sentinel.
    fn on_terminated(&mut self, _teardown: Teardown) {}
}

impl<F> MessageObserver for F
where
    F: FnMut(&Delivery) + Send,
{
    fn on_message(&mut self, delivery: &Delivery) {
        self(delivery)
    }
}

/// Why a poller thread stopped.
#[derive(Debug)]
pub enum PollExit {
    /// This participant consumed a termination sentinel.
    Terminated(Teardown),
    /// [`PollerHandle::stop`] was called.
    Cancelled,
    /// A receive failed, e.g. the dialog or the region is gone.
    Failed(DialogError),
    /// The observer or the poll loop panicked.
    Panicked,
}

/// Background task that repeatedly calls `receive_messages` for one dialog.
pub struct Poller;

impl Poller {
    /// Start polling `dialog_id` every `interval`.
    ///
    /// Between passes the thread sleeps on the region's signal word, so a send
    /// from any process cuts the wait short; `interval` bounds the latency.
    pub fn spawn<O>(
        session: Session,
        dialog_id: DialogId,
        interval: Duration,
        mut observer: O,
    ) -> io::Result<PollerHandle>
    where
        O: MessageObserver + 'static,
    {
        let keep_alive = Arc::new(AtomicBool::new(true));
        let running = Arc::clone(&keep_alive);

        let thread = thread::Builder::new()
            .name(format!("dialog-{dialog_id}-poller"))
            .spawn(move || {
                let exit = Self::run(&session, dialog_id, interval, &running, &mut observer);
                running.store(false, Ordering::Release);
                debug!("poller for dialog {dialog_id} exited: {exit:?}");
                exit
            })?;

        Ok(PollerHandle {
            keep_alive,
            thread: Some(thread),
        })
    }

    fn run<O: MessageObserver>(
        session: &Session,
        dialog_id: DialogId,
        interval: Duration,
        keep_alive: &AtomicBool,
        observer: &mut O,
    ) -> PollExit {
        let region = session.region();

        while keep_alive.load(Ordering::Acquire) {
            let seen = region.signal_value();

            let receipt = match session.receive_messages(dialog_id) {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!("polling dialog {dialog_id} failed: {e}");
                    return PollExit::Failed(e);
                }
            };

            for delivery in &receipt.deliveries {
                observer.on_message(delivery);
            }

            if receipt.terminated {
                observer.on_terminated(receipt.teardown);
                return PollExit::Terminated(receipt.teardown);
            }

            region.wait_for_signal(seen, interval);
        }

        PollExit::Cancelled
    }
}

/// Owner side of a running poller. Dropping it stops and joins the thread.
pub struct PollerHandle {
    keep_alive: Arc<AtomicBool>,
    thread: Option<JoinHandle<PollExit>>,
}

impl PollerHandle {
    /// Ask the poller to stop after its current pass. It never holds the gate
    /// while checking the flag.
    pub fn stop(&self) {
        self.keep_alive.store(false, Ordering::Release);
    }

    /// False once the poller stopped for any reason.
    pub fn is_running(&self) -> bool {
        self.keep_alive.load(Ordering::Acquire)
    }

    /// Returns a reference to the keep-alive flag, e.g. for a Ctrl-C handler.
    pub fn keep_alive(&self) -> &Arc<AtomicBool> {
        &self.keep_alive
    }

    /// Wait for the thread to finish and report why it did.
    pub fn join(mut self) -> PollExit {
        self.join_inner()
    }

    fn join_inner(&mut self) -> PollExit {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(exit)) => exit,
            Some(Err(_)) => PollExit::Panicked,
            None => PollExit::Cancelled,
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
            let _ = self.join_inner();
        }
    }
}
