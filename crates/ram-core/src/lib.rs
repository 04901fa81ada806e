//! Core types and the relationship lifecycle state machine for RAM.
//!
//! No HTTP or database dependencies live here.
//! Storage backends implement [`store::AuthorityStore`]; the request layer
//! drives a [`manager::RelationshipManager`] built over one.

// `AuthorityStore` spells out `Send` on its futures; implementors use plain
// `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod identity;
pub mod manager;
pub mod memory;
pub mod party;
pub mod relationship;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
