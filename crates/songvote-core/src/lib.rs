//! Core types and trait definitions for the songvote service.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain model, the consistency rules over users, songs, votes and
//! vetoes, and the [`service::VoteService`] that drives every state
//! transition. Storage backends plug in through [`store::VoteStore`] and
//! [`session::SessionStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod memory;
pub mod password;
pub mod service;
pub mod session;
pub mod song;
pub mod store;
pub mod user;

pub use error::{Error, Result};

/// Number of vetoes every newly registered user starts with.
pub const INITIAL_VETOES: u32 = 1;
