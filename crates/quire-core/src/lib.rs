//! Core types and trait definitions for Quire, the streaming artifact store.
//!
//! This crate is deliberately free of HTTP, transport and database
//! dependencies. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod artifact;
pub mod diff;
pub mod error;
pub mod event;
pub mod identity;
pub mod request;
pub mod store;

pub use error::{Error, Result};
