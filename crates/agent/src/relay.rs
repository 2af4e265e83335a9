//! Single-slot confirmation relay between the orchestrator and a front end.
//!
//! The orchestrator owns an `Arc<ConfirmationRelay>` and awaits
//! [`ConfirmationRelay::request_confirmation`] before running a sensitive
//! batch. A front end registers a [`ConfirmationHandler`] when it starts and
//! removes it when it goes away. At most one request may be outstanding per
//! relay; a second concurrent request is refused instead of queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use proto::{ConfirmationHandler, PendingConfirmation, RelayError};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Holds the active handler and the single in-flight marker.
pub struct ConfirmationRelay {
    handler: RwLock<Option<Arc<dyn ConfirmationHandler>>>,
    in_flight: AtomicBool,
}

impl ConfirmationRelay {
    /// Creates a relay with no handler installed.
    pub fn new() -> Self {
        Self {
            handler: RwLock::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Creates a relay with `handler` already installed.
    pub fn with_handler(handler: Arc<dyn ConfirmationHandler>) -> Self {
        let relay = Self::new();
        relay.register_handler(Some(handler));
        relay
    }

    /// Installs `handler` (or removes the current one with `None`) and
    /// returns whatever was installed before.
    pub fn register_handler(
        &self,
        handler: Option<Arc<dyn ConfirmationHandler>>,
    ) -> Option<Arc<dyn ConfirmationHandler>> {
        debug!(installed = handler.is_some(), "Confirmation handler updated");
        std::mem::replace(&mut *self.handler.write(), handler)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Whether a request is currently waiting on a decision.
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Asks the registered handler to approve `pending`.
    ///
    /// Returns `Ok(true)` when approved and `Ok(false)` when cancelled. Fails
    /// immediately with [`RelayError::NoConfirmationHandler`] when nothing is
    /// registered, and with [`RelayError::AlreadyPending`] when another
    /// request is still waiting. The slot is released when this future
    /// completes or is dropped.
    pub async fn request_confirmation(
        &self,
        pending: PendingConfirmation,
    ) -> Result<bool, RelayError> {
        let handler = {
            let installed = self.handler.read();
            installed.clone()
        }
        .ok_or(RelayError::NoConfirmationHandler)?;
        let _slot = SlotGuard::acquire(&self.in_flight)?;

        debug!(
            summary = %pending.summary,
            calls = pending.tool_calls.len(),
            "Awaiting confirmation"
        );
        let approved = handler.confirm(pending).await;
        debug!(approved, "Confirmation resolved");
        Ok(approved)
    }
}

impl Default for ConfirmationRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the relay busy for the lifetime of one request.
struct SlotGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SlotGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, RelayError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RelayError::AlreadyPending)?;
        Ok(Self { flag })
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A pending batch handed to a front end, resolvable exactly once.
///
/// Dropping an unresolved ticket answers the request with `false`, so a
/// front end that is reset or torn down never leaves the orchestrator hanging.
pub struct ConfirmationTicket {
    pending: PendingConfirmation,
    reply: Option<oneshot::Sender<bool>>,
}

impl ConfirmationTicket {
    /// Creates a ticket and the receiver the requesting side awaits.
    pub fn new(pending: PendingConfirmation) -> (Self, oneshot::Receiver<bool>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                pending,
                reply: Some(reply),
            },
            rx,
        )
    }

    pub fn pending(&self) -> &PendingConfirmation {
        &self.pending
    }

    /// Approves the batch. Returns `false` if the ticket was already resolved.
    pub fn confirm(&mut self) -> bool {
        self.resolve(true)
    }

    /// Cancels the batch. Returns `false` if the ticket was already resolved.
    pub fn cancel(&mut self) -> bool {
        self.resolve(false)
    }

    pub fn is_resolved(&self) -> bool {
        self.reply.is_none()
    }

    fn resolve(&mut self, approved: bool) -> bool {
        let Some(reply) = self.reply.take() else {
            debug!(approved, "Ignoring repeated confirmation response");
            return false;
        };
        if reply.send(approved).is_err() {
            debug!("Confirmation requester went away before the decision");
        }
        true
    }
}

/// Handler that forwards each batch to a front-end event loop as a
/// [`ConfirmationTicket`] and waits for it to be resolved.
pub struct ChannelConfirmationHandler {
    tx: mpsc::Sender<ConfirmationTicket>,
}

impl ChannelConfirmationHandler {
    /// Creates the handler and the receiver the event loop should poll.
    pub fn new() -> (Self, mpsc::Receiver<ConfirmationTicket>) {
        let (tx, rx) = mpsc::channel(4);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ConfirmationHandler for ChannelConfirmationHandler {
    async fn confirm(&self, pending: PendingConfirmation) -> bool {
        let (ticket, reply_rx) = ConfirmationTicket::new(pending);
        if self.tx.send(ticket).await.is_err() {
            debug!("Front end is gone, cancelling confirmation");
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }
}
