//! Music catalog: discovery, tags, persistence
//!
//! - `scanner.rs`: directory walk, audio extension filter
//! - `catalog.rs`: path -> tag set mapping and its JSON document
//! - `store.rs`: shared, lock-protected catalog with out-of-lock persistence

pub mod catalog;
pub mod scanner;
mod store;

pub use catalog::{Catalog, TagSet};
pub use store::Library;
