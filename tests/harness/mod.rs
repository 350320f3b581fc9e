//! Test harness utilities for end-to-end load runs.
//!
//! Provides a scripted websocket server that records what the load
//! generator's clients send it.

mod server;

pub use server::{Behavior, Event, TestServer};
