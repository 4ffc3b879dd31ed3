//! `retriage-console` library crate.
//!
//! Line-command parsing and the operator session driven by the binary.
//! Split out of `main.rs` so the session can be tested without a backend.

pub mod commands;
pub mod session;
