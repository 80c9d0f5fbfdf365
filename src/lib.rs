//! # ar-relay
//!
//! Relay bridge between one AR capture device and any number of viewers.
//!
//! The capture device streams length-prefixed frame documents over raw TCP.
//! The relay cuts the stream back into frames and pushes each one, untouched,
//! to every connected WebSocket viewer as one message.
//!
//! ```text
//!  capture device ──TCP──► ProducerSession ──► FrameDecoder
//!                                                  │
//!                                                  ▼
//!                                           BroadcastRelay ──► ConsumerRegistry
//!                                                                  │  │  │
//!                                                      WebSocket ◄─┘  │  └─► WebSocket
//!                                                                     ▼
//!                                                                 WebSocket
//! ```
//!
//! Each viewer has its own bounded queue. A viewer that cannot keep up is
//! dropped instead of slowing down the producer or the other viewers.
//!
//! ## Example
//!
//! ```no_run
//! use ar_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> ar_relay::error::Result<()> {
//! let server = RelayServer::bind(ServerConfig::default()).await?;
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use protocol::{ArFrame, FrameDecoder};
pub use registry::ConsumerRegistry;
pub use relay::BroadcastRelay;
pub use server::{ProducerPolicy, RelayServer, ServerConfig};
