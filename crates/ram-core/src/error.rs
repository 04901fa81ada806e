//! Error types for `ram-core`.
//!
//! A lookup that finds nothing is not an error: the manager returns `None`
//! and the request layer decides what that means. Everything here is a
//! failure the caller must see.

use thiserror::Error;
use uuid::Uuid;

use crate::{relationship::RelationshipStatus, validate::ValidationError};

#[derive(Debug, Error)]
pub enum Error {
  #[error("relationship {relationship_id} is {status}, expected pending")]
  InvalidState {
    relationship_id: Uuid,
    status:          RelationshipStatus,
  },

  #[error("invitation code for identity {0} has expired")]
  InvitationExpired(Uuid),

  #[error("relationship {0} has no invitation-code identity")]
  MissingInvitation(Uuid),

  #[error("validation failed: {0}")]
  Validation(#[from] ValidationError),

  #[error("identity already exists: {0}")]
  IdentityExists(String),

  #[error("party not found: {0}")]
  PartyNotFound(Uuid),

  #[error("identity not found: {0}")]
  IdentityNotFound(Uuid),

  #[error("relationship type not found: {0}")]
  RelationshipTypeNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error from any [`crate::store::AuthorityStore`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
