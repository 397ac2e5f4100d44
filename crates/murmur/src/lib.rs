//! # Murmur
//!
//! Multi-party real-time text chat over a miniature reliable transport
//! on UDP. Murmur builds its own connection layer — three-way
//! handshake, per-block acknowledgments, heartbeats, orderly teardown —
//! on plain datagrams, then runs a broadcast chat room on top of it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use murmur::{ChatClient, ChatServer, ClientConfig};
//!
//! # async fn demo() -> Result<(), murmur::MurmurError> {
//! // Server:
//! let server = ChatServer::builder().bind("127.0.0.1:34112").build().await?;
//! let addr = server.local_addr();
//! tokio::spawn(server.run());
//!
//! // Client:
//! let mut client =
//!     ChatClient::connect(addr, "alice", ClientConfig::default()).await?;
//! client.send_chat_line("hello world").await?;
//! let event = client.next_event().await?;
//! println!("{event:?}");
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod server;

pub use client::{ChatClient, ChatEvent, ClientConfig};
pub use error::MurmurError;
pub use server::{ChatServer, ChatServerBuilder};

// Re-export the pieces callers commonly need alongside the meta-crate.
pub use murmur_protocol::{Notice, Segment, MAX_PAYLOAD_SIZE};
pub use murmur_registry::RegistryConfig;
pub use murmur_session::{SessionError, SessionState};
