//! Controller link for the PI STAT console.
//!
//! Provides the NDJSON wire codec, the [`EventChannel`] abstraction with
//! offline, loopback and stream-backed implementations, a TCP transport,
//! the task/device catalog, and the pending request ledger used to
//! attribute asynchronous events back to the request that caused them.

pub mod catalog;
pub mod channel;
pub mod client;
pub mod ledger;
pub mod protocol;
pub mod tcp;

pub use catalog::Catalog;
pub use channel::{Emitted, EventChannel, LoopbackChannel, OfflineChannel};
pub use client::{ClientState, StreamChannel};
pub use ledger::{PendingLedger, PendingRequest, new_request_id, resolve_device, resolve_label};
pub use protocol::{
    AckReply, DeviceStats, Envelope, Inbound, LogRecord, RemoteEvent, RequestEvent, RequestKind,
    RequestPhase, TaskEntry,
};
pub use tcp::TcpBackend;
