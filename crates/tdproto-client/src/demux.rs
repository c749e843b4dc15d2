//! Routes each incoming message to exactly one of: a pending request, the
//! update subscribers, or the anomaly log.

use crate::error::ClientError;
use crate::pending::PendingTable;
use crate::update::{Update, Updates};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tdproto_core::{Dispatcher, ERROR_TAG, Envelope, Expect, Node, Token};
use tokio::sync::mpsc;

/// Routing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Responses delivered to a waiting request.
    pub responses: u64,
    /// Responses whose token was no longer live.
    pub late_responses: u64,
    /// Updates published to subscribers.
    pub updates: u64,
    /// Well-formed messages that were neither a response nor an update.
    pub anomalies: u64,
    /// Messages dropped or failed because they did not decode.
    pub decode_failures: u64,
    /// Requests currently awaiting a response.
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    responses: AtomicU64,
    late_responses: AtomicU64,
    updates: AtomicU64,
    anomalies: AtomicU64,
    decode_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub(crate) struct Demux {
    dispatcher: Dispatcher,
    table: PendingTable,
    /// `None` once closed.
    subscribers: Mutex<Option<Vec<mpsc::UnboundedSender<Update>>>>,
    counters: Counters,
}

impl Demux {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        let table = PendingTable::new(dispatcher.catalogue().clone());
        Self {
            dispatcher,
            table,
            subscribers: Mutex::new(Some(Vec::new())),
            counters: Counters::default(),
        }
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn table(&self) -> &PendingTable {
        &self.table
    }

    fn subscribers(&self) -> MutexGuard<'_, Option<Vec<mpsc::UnboundedSender<Update>>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(&self) -> Updates {
        let (tx, rx) = mpsc::unbounded_channel();
        // After close the sender is dropped here and the stream ends at once.
        if let Some(subscribers) = self.subscribers().as_mut() {
            subscribers.push(tx);
        }
        Updates::new(rx)
    }

    /// End every update stream. Queued updates stay readable.
    pub(crate) fn close_updates(&self) {
        self.subscribers().take();
    }

    /// Consume one raw message.
    pub(crate) fn route(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                bump(&self.counters.decode_failures);
                tracing::warn!("Dropping unreadable message: {}", e);
                return;
            }
        };

        match envelope.token.clone() {
            Some(token) => self.route_response(token, &envelope),
            None => self.route_unsolicited(envelope),
        }
    }

    fn route_response(&self, token: Token, envelope: &Envelope) {
        let delivered = match self.dispatcher.decode(&envelope.body, Expect::Any) {
            Ok(node) => self.table.resolve(&token, node),
            Err(e) => {
                bump(&self.counters.decode_failures);
                tracing::warn!("Response to {} failed to decode: {}", token, e);
                self.table.fail(&token, ClientError::Decode(e))
            }
        };

        if delivered {
            bump(&self.counters.responses);
        } else {
            bump(&self.counters.late_responses);
            tracing::warn!(
                "Dropping `{}` for {}: no request is waiting",
                envelope.tag().unwrap_or("?"),
                token
            );
        }
    }

    fn route_unsolicited(&self, envelope: Envelope) {
        let Some(tag) = envelope.tag() else {
            bump(&self.counters.decode_failures);
            tracing::warn!("Dropping token-less message without `@type`");
            return;
        };

        if !self.dispatcher.catalogue().is_update(tag) {
            bump(&self.counters.anomalies);
            if tag == ERROR_TAG {
                tracing::warn!("Peer reported an error outside any request: {}", envelope.body);
            } else {
                tracing::warn!("Dropping token-less `{}`: not an update", tag);
            }
            return;
        }

        match self.dispatcher.decode(&envelope.body, Expect::Any) {
            Ok(Node::Object(object)) => self.publish(Update {
                object,
                client_id: envelope.client_id,
            }),
            // Update tags are catalogue members, so they never come back
            // unrecognized.
            Ok(Node::Unrecognized(_)) => bump(&self.counters.anomalies),
            Err(e) => {
                bump(&self.counters.decode_failures);
                tracing::warn!("Dropping malformed update: {}", e);
            }
        }
    }

    fn publish(&self, update: Update) {
        tracing::trace!("Publishing `{}`", update.tag());
        bump(&self.counters.updates);
        if let Some(subscribers) = self.subscribers().as_mut() {
            // A failed send means the subscriber went away.
            subscribers.retain(|tx| tx.send(update.clone()).is_ok());
        }
    }

    pub(crate) fn stats(&self) -> Stats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Stats {
            responses: load(&self.counters.responses),
            late_responses: load(&self.counters.late_responses),
            updates: load(&self.counters.updates),
            anomalies: load(&self.counters.anomalies),
            decode_failures: load(&self.counters.decode_failures),
            pending: self.table.len(),
        }
    }
}
