//! ArgusX - live transaction risk dashboard
//!
//! Client-side state engine and terminal UI for a risk-scoring backend. Scored
//! transactions arrive over a streaming connection, land in a bounded store, are
//! filtered for display and drive a selection, verification and routing layer.
//!
//! ## Architecture
//!
//! - [`transport`] owns the single stream connection (keepalive + reconnect)
//! - [`store`], [`filter`] and [`selection`] are pure state, driven by [`app::App`]
//! - [`api`] and [`stats`] talk to the REST backend off the UI thread
//! - [`ui`] renders an `App` with ratatui
//!
//! The network-facing pieces (websocket dialer, reqwest backend) need the `native`
//! feature; everything else builds and tests without it.

// Core modules
pub mod config;
pub mod constants;
pub mod types;

// Theme system
pub mod theme;

// Live state
pub mod filter;
pub mod router;
pub mod selection;
pub mod store;
pub mod verify;

pub mod app;
pub mod new_txn;
pub mod ui;

// Backend collaborators
pub mod api;
pub mod stats;
pub mod transport;

// Network utilities (429 backoff for native builds)
#[cfg(feature = "native")]
pub mod net;

// Re-export commonly used types
pub use app::{App, InputMode};
pub use config::Config;
pub use types::{AppEvent, Transaction};
