//! Pure library for the waymark acquisition pipeline.
//!
//! No tokio, no IO, no async. The state machines here return directives that
//! the runtime layer (waymark-daemon) applies to the real sensor and network
//! services.

pub mod error;
pub mod filter;
pub mod index;
pub mod parse;
pub mod types;
