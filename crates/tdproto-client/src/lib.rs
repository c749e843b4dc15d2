//! Client side of the TDLib JSON protocol.
//!
//! A [`Client`] correlates requests with their responses through `@extra`
//! tokens and fans unsolicited updates out to subscribers. It owns no
//! connection: outgoing text goes through a [`Transport`], incoming text is
//! pushed in through the paired [`Inbound`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tdproto_client::{ChannelTransport, Client, ClientConfig};
//! use tdproto_core::{Catalogue, Object, Value};
//!
//! let catalogue = Arc::new(Catalogue::bundled()?);
//! let (transport, _outgoing) = ChannelTransport::new();
//! let (client, _inbound) = Client::new(catalogue, transport, ClientConfig::default())?;
//!
//! let reply = client
//!     .send(Object::new("getChat").with("chat_id", Value::Int53(42)))
//!     .await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod demux;
mod error;
mod pending;
mod transport;
mod update;

pub use client::{Client, Inbound};
pub use config::{ClientConfig, ConfigError};
pub use demux::Stats;
pub use error::{ChannelError, ClientError, TdError, TransportError};
pub use pending::{Expected, PendingReply, PendingTable, Reply};
pub use transport::{ChannelTransport, Transport};
pub use update::{Update, UpdateCategory, Updates};
