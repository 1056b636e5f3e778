//! Live quiz/poll sessions over a shared messaging channel.
//!
//! A host loads a project, steps through its questions and pushes the
//! current one to every guest in the room. Guests chat, answer and react;
//! the host sees those events live. After a session, the stats view pulls
//! aggregated results over REST.
//!
//! Layout:
//! - [`model`] / [`events`]: data shapes and the wire frame vocabulary
//! - [`channel`]: transport seam, subscriber registry, websocket and loopback adapters
//! - [`host`] / [`guest`]: the two session controllers
//! - [`api`] / [`stats`]: REST client and the post-session stats view
//! - [`config`] / [`cli`] / [`error`]: ambient plumbing

pub mod api;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod guest;
pub mod host;
pub mod model;
pub mod stats;

pub use api::ApiClient;
pub use channel::{Channel, ConnectionStatus, MemoryChannel, Subscription, WsChannel};
pub use config::Config;
pub use error::{ApiError, ChannelError, ConfigError, PayloadError, SessionError};
pub use guest::GuestController;
pub use host::{HostCommand, HostController, HostHandle, HostSession, HostSnapshot};
pub use stats::{PlotType, StatsView};
