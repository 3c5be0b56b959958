//! # checkout-cli
//!
//! Terminal front end for the cravt checkout engine.
//!
//! ## Modules
//!
//! - `context`: application context (cart, API client, settings)
//! - `commands`: one handler per CLI command
//! - `terminal`: line-based payment gateway UI

pub mod commands;
pub mod context;
pub mod terminal;
