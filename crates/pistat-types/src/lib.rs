//! Foundation types and traits for the PI STAT console.
//!
//! This crate contains the pieces shared by every other crate in the
//! workspace: the error type, channel identifiers, the output sink contract,
//! configuration, time and entropy sources, and the network stream traits
//! the remote event channel is built on.

pub mod backend;
pub mod channel;
pub mod config;
pub mod entropy;
pub mod error;
pub mod output;
pub mod time;

pub use channel::ChannelId;
pub use config::ConsoleConfig;
pub use error::{PistatError, Result};
pub use output::{LineOptions, LineStyle, MemorySink, OutputSink};
pub use time::{ManualTime, SystemTimeService, TimeService};
