//! The `AuthorityStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `ram-store-sqlite`, or
//! [`crate::memory::MemoryStore`] in tests). The lifecycle manager depends on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  identity::{Identity, Invitation, NewIdentity},
  party::{Name, Party, PartyKind},
  relationship::{
    NewRelationshipType, PartyRole, Relationship, RelationshipDraft,
    RelationshipType, SearchResult,
  },
};

// ─── Query & command types ───────────────────────────────────────────────────

/// Parameters for [`AuthorityStore::search_relationships`].
#[derive(Debug, Clone)]
pub struct RelationshipQuery {
  pub party_id:  Uuid,
  pub role:      PartyRole,
  /// 1-based.
  pub page:      u32,
  pub page_size: u32,
}

impl RelationshipQuery {
  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }
}

/// The writes making up an accepted invitation, applied as one unit by
/// [`AuthorityStore::commit_acceptance`].
#[derive(Debug, Clone)]
pub struct Acceptance {
  pub relationship_id:        Uuid,
  pub invitation_identity_id: Uuid,
  /// The accepting identity's party; becomes the relationship's delegate.
  pub delegate_party_id:      Uuid,
  pub at:                     DateTime<Utc>,
}

/// The writes making up a rejected invitation.
#[derive(Debug, Clone)]
pub struct Rejection {
  pub relationship_id:        Uuid,
  pub invitation_identity_id: Uuid,
  pub at:                     DateTime<Utc>,
}

/// A new relationship together with the delegate party and invitation-code
/// identity it needs, written as one unit by
/// [`AuthorityStore::create_relationship`].
#[derive(Debug, Clone)]
pub struct Creation {
  pub delegate_kind:   PartyKind,
  /// Profile name of the invitation-code identity.
  pub delegate_name:   Name,
  pub invitation_code: String,
  pub invitation:      Invitation,
  pub draft:           RelationshipDraft,
}

/// The records written by [`AuthorityStore::create_relationship`].
#[derive(Debug, Clone)]
pub struct Created {
  pub delegate:     Party,
  pub invitation:   Identity,
  pub relationship: Relationship,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a RAM persistence backend.
///
/// Lookups return `Ok(None)` when nothing matches. The two `commit_*` methods
/// must check that the relationship is still pending and perform their writes
/// atomically; they return `Ok(false)` when the check fails and nothing was
/// written.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait AuthorityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Parties ───────────────────────────────────────────────────────────

  fn add_party(
    &self,
    kind: PartyKind,
  ) -> impl Future<Output = Result<Party, Self::Error>> + Send + '_;

  fn get_party(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Party>, Self::Error>> + Send + '_;

  // ── Identities ────────────────────────────────────────────────────────

  /// Insert an identity unless one with the same scoped id value exists.
  /// Returns `None` and writes nothing in that case.
  fn add_identity(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Find an invitation-code identity by the code itself.
  fn find_invitation_by_code(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Find the invitation-code identity owned by `party_id`, if any.
  fn find_invitation_for_party(
    &self,
    party_id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Find any identity by its scoped id value.
  fn find_identity_by_id_value(
    &self,
    id_value: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Overwrite the temporary e-mail of an invitation-code identity.
  /// Returns `false` if no such invitation exists.
  fn set_invitation_email(
    &self,
    identity_id: Uuid,
    email: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Relationship types ────────────────────────────────────────────────

  fn add_relationship_type(
    &self,
    input: NewRelationshipType,
  ) -> impl Future<Output = Result<RelationshipType, Self::Error>> + Send + '_;

  /// Retrieve a relationship type by id, including retired ones.
  fn get_relationship_type(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RelationshipType>, Self::Error>> + Send + '_;

  fn list_relationship_types(
    &self,
  ) -> impl Future<Output = Result<Vec<RelationshipType>, Self::Error>> + Send + '_;

  // ── Relationships ─────────────────────────────────────────────────────

  /// Write the delegate party, its invitation identity and the relationship,
  /// all or nothing.
  fn create_relationship(
    &self,
    creation: Creation,
  ) -> impl Future<Output = Result<Created, Self::Error>> + Send + '_;

  /// Retrieve a relationship by id, including logically deleted ones.
  fn get_relationship(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Relationship>, Self::Error>> + Send + '_;

  /// The non-deleted pending relationship whose delegate is `party_id`.
  fn find_pending_for_delegate(
    &self,
    party_id: Uuid,
  ) -> impl Future<Output = Result<Option<Relationship>, Self::Error>> + Send + '_;

  /// Non-deleted relationships where `query.party_id` plays `query.role`,
  /// newest first.
  fn search_relationships(
    &self,
    query: RelationshipQuery,
  ) -> impl Future<Output = Result<SearchResult<Relationship>, Self::Error>> + Send + '_;

  /// Set the deletion flag. Returns `false` if the relationship does not
  /// exist or was already deleted.
  fn mark_deleted(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Guarded transitions ───────────────────────────────────────────────

  /// Pending → Active, re-point the delegate, and mark the invitation
  /// claimed, all or nothing.
  fn commit_acceptance(
    &self,
    acceptance: Acceptance,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Pending → Invalid and mark the invitation rejected, all or nothing.
  fn commit_rejection(
    &self,
    rejection: Rejection,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
