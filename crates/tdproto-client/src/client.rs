//! The client façade.

use crate::config::{ClientConfig, ConfigError};
use crate::demux::{Demux, Stats};
use crate::error::{ChannelError, ClientError};
use crate::pending::{Expected, PendingReply, Reply};
use crate::transport::Transport;
use crate::update::Updates;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tdproto_core::{Catalogue, Dispatcher, Object, ShapeRole, Token, encode_request};

struct Inner {
    demux: Demux,
    transport: Box<dyn Transport>,
    next_token: AtomicU64,
    default_timeout: Option<Duration>,
}

impl Inner {
    fn shutdown_with(&self, err: ChannelError) {
        if self.demux.table().closed().is_some() {
            return;
        }
        let drained = self.demux.table().drain_all(err.clone());
        self.demux.close_updates();
        if drained > 0 {
            tracing::info!("Shut down ({}), {} requests drained", err, drained);
        } else {
            tracing::debug!("Shut down ({})", err);
        }
    }
}

/// Sends requests and hands out update subscriptions.
///
/// Cheap to clone; all clones share one pending table.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Build a client writing through `transport`.
    ///
    /// The returned [`Inbound`] must be fed every message received from the
    /// peer, in arrival order.
    pub fn new(
        catalogue: Arc<Catalogue>,
        transport: impl Transport,
        config: ClientConfig,
    ) -> Result<(Self, Inbound), ConfigError> {
        config.validate()?;
        let inner = Arc::new(Inner {
            demux: Demux::new(Dispatcher::new(catalogue)),
            transport: Box::new(transport),
            next_token: AtomicU64::new(1),
            default_timeout: config.request_timeout(),
        });
        let inbound = Inbound {
            inner: inner.clone(),
        };
        Ok((Self { inner }, inbound))
    }

    pub fn catalogue(&self) -> &Arc<Catalogue> {
        self.inner.demux.dispatcher().catalogue()
    }

    /// Write `request` and return a handle to its eventual reply.
    ///
    /// The request is checked against its catalogue descriptor first; nothing
    /// is registered or written when the check fails or the client is shut
    /// down.
    pub fn request(&self, request: Object) -> Result<PendingReply, ClientError> {
        let table = self.inner.demux.table();
        if let Some(err) = table.closed() {
            return Err(ClientError::Channel(err.clone()));
        }

        let dispatcher = self.inner.demux.dispatcher();
        let returns = match dispatcher.catalogue().shape(request.tag()).map(|s| &s.role) {
            Some(ShapeRole::Request { returns }) => returns.clone(),
            _ => return Err(ClientError::UnknownRequest(request.tag().to_string())),
        };
        dispatcher
            .validate(&request)
            .map_err(ClientError::InvalidRequest)?;

        let token = Token::from(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        let reply = table.register(token.clone(), request.tag(), Expected::Class(returns))?;

        let text = encode_request(&request, &token);
        tracing::debug!("Sending `{}` as {}", request.tag(), token);
        if let Err(e) = self.inner.transport.write_raw(text) {
            let err = ChannelError::Transport(e.to_string());
            tracing::warn!("Write failed, shutting down: {}", e);
            self.inner.shutdown_with(err.clone());
            return Err(ClientError::Channel(err));
        }
        Ok(reply)
    }

    /// Send `request` and wait for its reply, bounded by the configured
    /// default deadline if there is one.
    pub async fn send(&self, request: Object) -> Result<Reply, ClientError> {
        match self.inner.default_timeout {
            Some(after) => self.send_with_deadline(request, after).await,
            None => self.request(request)?.await,
        }
    }

    /// Send `request` and wait at most `after` for its reply.
    ///
    /// On expiry the request is cancelled; an answer arriving later is
    /// dropped.
    pub async fn send_with_deadline(
        &self,
        request: Object,
        after: Duration,
    ) -> Result<Reply, ClientError> {
        let reply = self.request(request)?;
        let token = reply.token().clone();
        match tokio::time::timeout(after, reply).await {
            Ok(outcome) => outcome,
            // The elapsed timeout dropped the reply, which cancelled it.
            Err(_) => {
                tracing::warn!("{} timed out after {:?}", token, after);
                Err(ClientError::Timeout { token, after })
            }
        }
    }

    /// Cancel an in-flight request. Returns false if it already completed.
    pub fn cancel(&self, token: &Token) -> bool {
        self.inner.demux.table().cancel(token)
    }

    /// Subscribe to updates published from now on.
    pub fn subscribe_updates(&self) -> Updates {
        self.inner.demux.subscribe()
    }

    /// Fail every in-flight request, end update streams and reject further
    /// sends.
    pub fn shutdown(&self, reason: impl Into<String>) {
        self.inner.shutdown_with(ChannelError::Shutdown(reason.into()));
    }

    /// True once the channel has failed or the client was shut down.
    pub fn is_closed(&self) -> bool {
        self.inner.demux.table().closed().is_some()
    }

    /// A snapshot of the routing counters.
    pub fn stats(&self) -> Stats {
        self.inner.demux.stats()
    }
}

/// The single reader feeding incoming messages to a [`Client`].
///
/// Dropping it closes the client.
pub struct Inbound {
    inner: Arc<Inner>,
}

impl Inbound {
    /// Route one message received from the peer.
    pub fn on_raw_message(&mut self, text: &str) {
        self.inner.demux.route(text);
    }

    /// Report that the connection ended.
    pub fn close(self, err: ChannelError) {
        self.inner.shutdown_with(err);
    }
}

impl Drop for Inbound {
    fn drop(&mut self) {
        self.inner.shutdown_with(ChannelError::Closed);
    }
}
