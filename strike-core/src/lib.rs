//! strike-core: Pure decode + validation library for the lightning feed.
//!
//! No async, no I/O — just algorithms and types. This crate is the shared
//! core used by `strike-server` (ingest daemon + web dashboard + CLI).

pub mod codec;
pub mod config;
pub mod event;

// Re-export commonly used items at crate root
pub use codec::{decode, encode, DecodeError};
pub use event::{parse_event, BroadcastPoint, ParseError, StrikeEvent, StrikeRecord};
