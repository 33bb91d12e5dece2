//! Reference-counted ownership of the live notification channels.
//!
//! The first [`SubscriptionManager::attach`] subscribes every channel and
//! spawns one pump task; later attaches share it. When the last
//! [`LiveHandle`] is dropped the pump is stopped and every channel is closed
//! on the ledger.

use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{LiveListener, LiveOutcome, Replayer};
use crate::event::{EventKind, RawEvent};
use crate::ledger::{EventStream, Ledger, LedgerError};

#[derive(Default)]
struct Attachment {
    refs: usize,
    pump: Option<JoinHandle<()>>,
}

struct Shared {
    ledger: Arc<dyn Ledger>,
    listener: LiveListener,
    resync: Option<Replayer>,
    attachment: Mutex<Attachment>,
    // Serializes the first attach so two callers never subscribe twice.
    attach_gate: tokio::sync::Mutex<()>,
}

impl Shared {
    fn attachment(&self) -> std::sync::MutexGuard<'_, Attachment> {
        self.attachment.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        // Channels close before the lock drops; an attach that observes
        // `refs == 0` must only ever subscribe after this teardown.
        let mut attachment = self.attachment();
        attachment.refs = attachment.refs.saturating_sub(1);
        if attachment.refs > 0 {
            return;
        }
        if let Some(pump) = attachment.pump.take() {
            pump.abort();
        }
        for kind in EventKind::ALL {
            self.ledger.unsubscribe_all(kind);
        }
        drop(attachment);
        info!("live notifications detached");
    }
}

/// Owns the live subscription for one store.
#[derive(Clone)]
pub struct SubscriptionManager {
    shared: Arc<Shared>,
}

impl SubscriptionManager {
    /// `resync` runs after each applicable notification when present.
    pub fn new(ledger: Arc<dyn Ledger>, listener: LiveListener, resync: Option<Replayer>) -> Self {
        Self {
            shared: Arc::new(Shared {
                ledger,
                listener,
                resync,
                attachment: Mutex::new(Attachment::default()),
                attach_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Attach to live notifications. Idempotent: only the first caller
    /// subscribes.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if a channel cannot be opened. Channels opened
    /// before the failure are closed again.
    pub async fn attach(&self) -> Result<LiveHandle, LedgerError> {
        let _gate = self.shared.attach_gate.lock().await;
        {
            let mut attachment = self.shared.attachment();
            if attachment.refs > 0 {
                attachment.refs += 1;
                debug!(refs = attachment.refs, "live subscription shared");
                return Ok(self.handle());
            }
        }

        let mut streams = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            match self.shared.ledger.subscribe(kind).await {
                Ok(rx) => streams.push(into_stream(rx)),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "subscription failed, rolling back");
                    for kind in EventKind::ALL {
                        self.shared.ledger.unsubscribe_all(kind);
                    }
                    return Err(e);
                }
            }
        }

        let pump = tokio::spawn(pump(
            stream::select_all(streams),
            self.shared.listener.clone(),
            self.shared.resync.clone(),
        ));
        {
            let mut attachment = self.shared.attachment();
            attachment.refs = 1;
            attachment.pump = Some(pump);
        }
        info!(channels = EventKind::ALL.len(), "live notifications attached");
        Ok(self.handle())
    }

    /// Live handles currently outstanding.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.shared.attachment().refs
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.ref_count() > 0
    }

    fn handle(&self) -> LiveHandle {
        LiveHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Keeps the live subscription open while held.
pub struct LiveHandle {
    shared: Arc<Shared>,
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.shared.release();
    }
}

fn into_stream(rx: EventStream) -> BoxStream<'static, RawEvent> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|raw| (raw, rx)) }).boxed()
}

async fn pump(
    mut events: stream::SelectAll<BoxStream<'static, RawEvent>>,
    listener: LiveListener,
    resync: Option<Replayer>,
) {
    while let Some(raw) = events.next().await {
        let outcome = listener.handle(&raw).await;
        if outcome == LiveOutcome::Ignored {
            continue;
        }
        let Some(replayer) = &resync else {
            continue;
        };
        if let Err(e) = replayer.resync_one(raw.item()).await {
            warn!(item_id = %raw.item(), error = %e, "resync after live notification failed");
        }
    }
    debug!("live event pump finished");
}
