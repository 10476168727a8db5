//! Core domain types and utilities for relaybot.
//!
//! This crate provides the identifiers and the error handling alias shared
//! by every other crate in the workspace.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ChatId, ParseIdError, TurnId};
