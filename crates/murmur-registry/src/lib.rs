//! Server-side session registry for Murmur.
//!
//! One [`Registry`] per server. It owns every peer session, keyed by
//! remote address, and implements the chat semantics on top of them:
//!
//! - routing decoded segments into the right session
//! - display-name registration and the in-band `!` commands
//! - broadcasting chat lines and join/leave notices
//! - evicting peers that stop sending traffic
//! - the password-protected `!kill` shutdown switch
//!
//! The registry is I/O-free: operations return [`RegistryOutput`] and
//! the server loop does the actual sending.

mod config;
mod error;
mod registry;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use registry::{Outbound, Registry, RegistryOutput};
