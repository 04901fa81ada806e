//! JSON REST API for the relationship authorisation manager.
//!
//! Exposes an axum [`Router`] backed by a [`RelationshipManager`] over any
//! [`ram_core::store::AuthorityStore`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ram_api::api_router(manager.clone()))
//! ```

pub mod error;
pub mod identities;
pub mod parties;
pub mod relationship_types;
pub mod relationships;

use axum::{
  Router,
  routing::{get, post},
};
use ram_core::{manager::RelationshipManager, store::AuthorityStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `manager`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(manager: RelationshipManager<S>) -> Router<()>
where
  S: AuthorityStore + 'static,
{
  Router::new()
    // Reference data
    .route("/parties", post(parties::create::<S>))
    .route("/parties/{id}", get(parties::get_one::<S>))
    .route("/identities", post(identities::create::<S>))
    .route("/identities/{id}", get(identities::get_one::<S>))
    .route(
      "/relationship-types",
      get(relationship_types::list::<S>).post(relationship_types::create::<S>),
    )
    .route("/relationship-types/{id}", get(relationship_types::get_one::<S>))
    // Relationships
    .route("/relationship", post(relationships::create::<S>))
    .route(
      "/relationship/{id}",
      get(relationships::get_one::<S>).delete(relationships::delete_one::<S>),
    )
    .route(
      "/relationship/invitation-code/{code}",
      get(relationships::get_by_code::<S>),
    )
    .route(
      "/relationship/invitation-code/{code}/accept",
      post(relationships::accept::<S>),
    )
    .route(
      "/relationship/invitation-code/{code}/reject",
      post(relationships::reject::<S>),
    )
    .route(
      "/relationship/invitation-code/{code}/notify-delegate",
      post(relationships::notify_delegate::<S>),
    )
    // Search
    .route(
      "/relationships/{role}/identity/{identity_id}",
      get(relationships::search::<S>),
    )
    .with_state(manager)
}
