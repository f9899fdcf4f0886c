//! Async runtime and wiring for the waymark acquisition pipeline.
//!
//! The pure state machines live in waymark-core; this crate owns the single
//! coordination event loop, the sensor and fetch-service boundaries, and the
//! CLI binary.

pub mod coordinator;
pub mod fetch;
pub mod flickr;
pub mod handle;
pub mod sensor;
