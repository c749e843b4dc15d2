//! Unsolicited updates and their subscription stream.

use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tdproto_core::{Object, Value};
use tokio::sync::mpsc;

/// Coarse grouping of update tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateCategory {
    Message,
    Chat,
    Account,
    Connection,
    Other,
}

impl UpdateCategory {
    pub fn of(tag: &str) -> Self {
        match tag {
            "updateNewMessage" | "updateDeleteMessages" => Self::Message,
            "updateNewChat" => Self::Chat,
            "updateAuthorizationState" | "updateUser" | "updateUserStatus" | "updateOption" => {
                Self::Account
            }
            "updateConnectionState" => Self::Connection,
            t if t.starts_with("updateMessage") => Self::Message,
            t if t.starts_with("updateChat") => Self::Chat,
            _ => Self::Other,
        }
    }
}

/// One published update.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub object: Object,
    /// Instance that produced it, when the peer says.
    pub client_id: Option<i32>,
}

impl Update {
    pub fn tag(&self) -> &str {
        self.object.tag()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.object.get(name)
    }

    pub fn category(&self) -> UpdateCategory {
        UpdateCategory::of(self.tag())
    }
}

/// An ordered, unbounded subscription to updates.
///
/// Ends once the client shuts down and every queued update has been taken.
#[derive(Debug)]
pub struct Updates {
    rx: mpsc::UnboundedReceiver<Update>,
}

impl Updates {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Update>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Take the next queued update without waiting.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Updates {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Update>> {
        self.rx.poll_recv(cx)
    }
}
