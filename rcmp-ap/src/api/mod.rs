//! HTTP API for remote control
//!
//! - `server.rs`: shared context, router, server loop
//! - `handlers.rs`: JSON endpoints
//! - `sse.rs`: `/stream` notification feed

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, serve, AppContext};
