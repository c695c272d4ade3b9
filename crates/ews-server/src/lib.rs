//! # ews-server
//!
//! Live fan-out of weather station telemetry.
//!
//! - [`hub`]: the broadcast hub actor, sole owner of client membership
//! - [`session`]: per-connection read and write pumps
//! - [`server`]: axum router (`/ws`, `/api/health`) and listener
//! - [`shutdown`]: cancellation token, session tracking, signal handling

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod hub;
pub mod server;
pub mod session;
pub mod shutdown;

pub use errors::HubError;
pub use hub::{BroadcastReport, Hub, OutboundQueue};
pub use server::EwsServer;
pub use session::{PumpExit, SessionConfig, SessionState};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
