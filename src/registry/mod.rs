//! Consumer registry for fan-out
//!
//! The registry tracks every connected viewer. Each viewer owns a bounded
//! queue; the relay pushes into those queues without ever awaiting a viewer.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ConsumerRegistry>
//!                   ┌──────────────────────────────┐
//!                   │ consumers: HashMap<u64,      │
//!                   │   ConsumerHandle {           │
//!                   │     tx: mpsc::Sender,        │
//!                   │     cancel,                  │
//!                   │   }                          │
//!                   │ >                            │
//!                   └──────────────┬───────────────┘
//!                                  │ snapshot()
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!    [Producer]               [Consumer]               [Consumer]
//!    relay.publish()          rx.recv()                rx.recv()
//!         │                        │                        │
//!         └──► try_send() ────────►└──► ws.send() ──► WebSocket
//! ```
//!
//! # Shared Payloads
//!
//! Payloads are `bytes::Bytes`, so every queue shares the allocation the
//! decoder produced; publishing only bumps a reference count per viewer.
//! The one copy per viewer happens in that viewer's own session, when the
//! frame is turned into a WebSocket message it owns.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{ConsumerHandle, DeliveryFailure, Subscription};
pub use error::RegistryError;
pub use frame::RelayFrame;
pub use store::ConsumerRegistry;
