//! SQLSense backend: turns natural-language requests into SQL queries and
//! database schemas through a hosted language model, and keeps a ledger of
//! what was generated.
//!
//! The binary in `main.rs` wires these modules together; the library split
//! lets integration tests drive the router directly.

pub mod config;
pub mod db;
pub mod llm;
pub mod util;
pub mod web;
