//! Core types and trait definitions for the Floortrack practice backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.
//! The goal progress engine ([`progress`], [`engine`]) and the goal
//! lifecycle state machine ([`lifecycle`]) live here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod client;
pub mod engine;
pub mod error;
pub mod goal;
pub mod lifecycle;
pub mod notes;
pub mod org;
pub mod progress;
pub mod session;
pub mod store;
pub mod support;
pub mod trial;

pub use error::{Error, Result};
