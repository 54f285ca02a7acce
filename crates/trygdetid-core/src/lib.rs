//! Core types and the calculation engine for insurance time ("trygdetid").
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! period model, normalizer and calculation engine are pure functions; the
//! aggregate is an immutable value whose every mutation yields a new record.
//! Storage and the external fact source are reached through the traits in
//! [`store`] and [`grunnlag`]; [`service`] composes the two.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod calculation;
pub mod error;
pub mod grunnlag;
pub mod memory;
pub mod normalize;
pub mod period;
pub mod record;
pub mod revision;
pub mod service;
pub mod store;

pub use error::{Error, Result};
