//! Transport clients for the Retriage backend.
//!
//! - [`api`] -- request/response client for events, pools, pool
//!   templates and the session user.
//! - [`channel`] -- duplex STOMP-over-WebSocket channel carrying event
//!   snapshots in both directions, with fixed-delay reconnection.
//! - [`stomp`] -- STOMP 1.2 frame codec.
//! - [`updates`] -- the tagged [`RemoteUpdate`](updates::RemoteUpdate)
//!   parsed from each broadcast.
//! - [`config`] / [`prefs`] -- endpoint configuration and the persisted
//!   key-value preferences it is derived from.

pub mod api;
pub mod channel;
pub mod config;
pub mod prefs;
pub mod stomp;
pub mod updates;

pub use api::{ApiError, EventCreated, RetriageApi};
pub use channel::{ChannelError, ChannelHandle, ChannelTask, EventChannel};
pub use config::{ClientConfig, ConfigError, Endpoints};
pub use prefs::{PrefsError, Preferences};
pub use updates::{parse_update, RemoteUpdate, UpdateParseError};
