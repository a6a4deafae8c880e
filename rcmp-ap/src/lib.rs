//! rcmp Audio Player library
//!
//! Remote-controlled playback of a local, tag-filtered music catalog.
//! Exposes the modules for the `rcmp-ap` binary and for integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod library;
pub mod playback;

pub use error::{Error, Result};
