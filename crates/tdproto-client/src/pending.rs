//! The pending-request table.
//!
//! Maps correlation tokens to one-shot completion slots. Each entry is
//! completed exactly once: by a response, a per-request failure, a
//! cancellation, or a drain. Dropping the [`PendingReply`] before then
//! removes the entry. Entries live in a sharded map so unrelated tokens
//! never contend.

use crate::error::{ChannelError, ClientError, TdError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as Slot;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock, Weak};
use std::task::{Context, Poll};
use std::time::Instant;
use tdproto_core::{Catalogue, ERROR_TAG, Node, Token};
use tokio::sync::oneshot;

/// The successful completion of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A result in the expected class, or a shape the catalogue does not know.
    Value(Node),
    /// The peer answered with an `error` object.
    Error(TdError),
}

impl Reply {
    /// Treat an error answer as an `Err`.
    pub fn into_result(self) -> Result<Node, TdError> {
        match self {
            Self::Value(node) => Ok(node),
            Self::Error(err) => Err(err),
        }
    }
}

/// Which result shapes a request accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Any,
    /// Constructors of this class. Unrecognized shapes also pass.
    Class(String),
}

type Outcome = Result<Reply, ClientError>;

struct Entry {
    tx: oneshot::Sender<Outcome>,
    expected: Expected,
    request: String,
    created_at: Instant,
}

/// Live requests keyed by token.
pub struct PendingTable {
    catalogue: Arc<Catalogue>,
    entries: Arc<DashMap<Token, Entry>>,
    closed: OnceLock<ChannelError>,
}

impl PendingTable {
    pub fn new(catalogue: Arc<Catalogue>) -> Self {
        Self {
            catalogue,
            entries: Arc::new(DashMap::new()),
            closed: OnceLock::new(),
        }
    }

    /// Insert a live entry for `token`.
    ///
    /// Fails if the token is already live or the table has been drained.
    pub fn register(
        &self,
        token: Token,
        request: &str,
        expected: Expected,
    ) -> Result<PendingReply, ClientError> {
        // The closed check runs under the shard lock, so a concurrent drain
        // either sees this entry or this call sees the closed flag.
        match self.entries.entry(token.clone()) {
            Slot::Occupied(_) => Err(ClientError::DuplicateToken(token)),
            Slot::Vacant(slot) => {
                if let Some(err) = self.closed.get() {
                    return Err(ClientError::Channel(err.clone()));
                }
                let (tx, rx) = oneshot::channel();
                slot.insert(Entry {
                    tx,
                    expected,
                    request: request.to_string(),
                    created_at: Instant::now(),
                });
                Ok(PendingReply {
                    token,
                    rx,
                    entries: Arc::downgrade(&self.entries),
                })
            }
        }
    }

    /// Complete `token` with a decoded response. Returns false if the token
    /// is not live.
    pub fn resolve(&self, token: &Token, node: Node) -> bool {
        let Some((_, entry)) = self.entries.remove(token) else {
            return false;
        };
        tracing::debug!(
            "{} ({}) answered with `{}` after {:?}",
            token,
            entry.request,
            node.tag(),
            entry.created_at.elapsed()
        );
        let outcome = classify(&self.catalogue, &entry.expected, node);
        // The caller may have stopped waiting.
        let _ = entry.tx.send(outcome);
        true
    }

    /// Complete `token` with a per-request error.
    pub fn fail(&self, token: &Token, err: ClientError) -> bool {
        let Some((_, entry)) = self.entries.remove(token) else {
            return false;
        };
        let _ = entry.tx.send(Err(err));
        true
    }

    /// Remove `token` before its response arrives.
    pub fn cancel(&self, token: &Token) -> bool {
        self.fail(token, ClientError::Cancelled)
    }

    /// Close the table and complete every live entry with `err`.
    ///
    /// Later calls keep the first error. Returns how many entries were
    /// drained by this call.
    pub fn drain_all(&self, err: ChannelError) -> usize {
        let _ = self.closed.set(err);
        let Some(err) = self.closed.get() else {
            return 0;
        };

        let tokens: Vec<Token> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut drained = 0;
        for token in tokens {
            if let Some((_, entry)) = self.entries.remove(&token) {
                let _ = entry.tx.send(Err(ClientError::Channel(err.clone())));
                drained += 1;
            }
        }
        drained
    }

    /// The error the table was drained with, once it has been.
    pub fn closed(&self) -> Option<&ChannelError> {
        self.closed.get()
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn classify(catalogue: &Catalogue, expected: &Expected, node: Node) -> Outcome {
    if node.tag() == ERROR_TAG {
        if let Some(err) = td_error(&node) {
            return Ok(Reply::Error(err));
        }
    }
    let Expected::Class(class) = expected else {
        return Ok(Reply::Value(node));
    };
    // Unrecognized shapes pass: a newer peer may answer with a shape this
    // catalogue predates.
    if let Node::Object(object) = &node {
        if !catalogue.is_member(object.tag(), class) {
            return Err(ClientError::UnexpectedResult {
                expected: class.clone(),
                tag: object.tag().to_string(),
            });
        }
    }
    Ok(Reply::Value(node))
}

fn td_error(node: &Node) -> Option<TdError> {
    match node {
        Node::Object(object) => Some(TdError {
            code: i32::try_from(object.get("code")?.as_i64()?).ok()?,
            message: object.get("message")?.as_str()?.to_string(),
        }),
        Node::Unrecognized(raw) => Some(TdError {
            code: i32::try_from(raw.raw().get("code")?.as_i64()?).ok()?,
            message: raw.raw().get("message")?.as_str()?.to_string(),
        }),
    }
}

/// Completes when the request it was registered for does.
///
/// Dropping it early cancels the request.
#[derive(Debug)]
pub struct PendingReply {
    token: Token,
    rx: oneshot::Receiver<Outcome>,
    entries: Weak<DashMap<Token, Entry>>,
}

impl PendingReply {
    /// The token the request went out with.
    pub fn token(&self) -> &Token {
        &self.token
    }
}

impl Future for PendingReply {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::Channel(ChannelError::Closed))))
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        // Closing first marks our own entry, so a later registration of the
        // same token is left alone.
        self.rx.close();
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        if entries
            .remove_if(&self.token, |_, entry| entry.tx.is_closed())
            .is_some()
        {
            tracing::debug!("{} abandoned before its response", self.token);
        }
    }
}
