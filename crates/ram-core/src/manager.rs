//! [`RelationshipManager`]: the relationship invitation/acceptance state
//! machine.
//!
//! The manager validates input, checks transition preconditions against the
//! relationship it is handed, and delegates the actual writes to the store's
//! guarded `commit_*` calls. A relationship that changed underneath the caller
//! fails the store's guard and surfaces as [`Error::InvalidState`], exactly
//! like a caller passing an already-transitioned relationship.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore as _};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  identity::{
    Identity, IdentityKind, Invitation, NewIdentity, NewLinkIdentity,
    scoped_id_value,
  },
  party::{Party, PartyKind},
  relationship::{
    CreatedRelationship, NewRelationship, NewRelationshipType, PartyFilter,
    Relationship, RelationshipDraft, RelationshipRef, RelationshipStatus,
    RelationshipType, SearchResult, Transition,
  },
  store::{Acceptance, AuthorityStore, Creation, Rejection, RelationshipQuery},
  validate::{
    ValidationError, validate_attributes, validate_email, validate_name,
    validate_nickname, validate_page, validate_period, validate_required,
  },
};

pub const DEFAULT_INVITATION_TTL_DAYS: i64 = 7;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

const INVITATION_CODE_LEN: usize = 10;
// 32 symbols, no 0/O or 1/I.
const INVITATION_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Owns relationship state transitions and the identity changes they imply.
pub struct RelationshipManager<S> {
  store:          Arc<S>,
  invitation_ttl: Duration,
}

impl<S> Clone for RelationshipManager<S> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      invitation_ttl: self.invitation_ttl,
    }
  }
}

impl<S: AuthorityStore> RelationshipManager<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      invitation_ttl: Duration::days(DEFAULT_INVITATION_TTL_DAYS),
    }
  }

  /// How long a newly issued invitation code stays claimable.
  pub fn with_invitation_ttl(mut self, ttl: Duration) -> Self {
    self.invitation_ttl = ttl;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  // ── Parties, identities, relationship types ───────────────────────────

  pub async fn add_party(&self, kind: PartyKind) -> Result<Party> {
    self.store.add_party(kind).await.map_err(Error::store)
  }

  pub async fn get_party(&self, id: Uuid) -> Result<Option<Party>> {
    self.store.get_party(id).await.map_err(Error::store)
  }

  pub async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    self.store.get_identity(id).await.map_err(Error::store)
  }

  /// Register a linked identity for an existing party.
  pub async fn add_link_identity(&self, input: NewLinkIdentity) -> Result<Identity> {
    let raw_id_value = validate_required("raw id value", &input.raw_id_value)?;
    let name = validate_name(input.name)?;

    if self.get_party(input.party_id).await?.is_none() {
      return Err(Error::PartyNotFound(input.party_id));
    }

    let id_value =
      scoped_id_value(IdentityKind::LinkId, Some(input.scheme), &raw_id_value);
    self
      .store
      .add_identity(NewIdentity {
        party_id: input.party_id,
        kind: IdentityKind::LinkId,
        raw_id_value,
        link_id_scheme: Some(input.scheme),
        invitation: None,
        name,
      })
      .await
      .map_err(Error::store)?
      .ok_or(Error::IdentityExists(id_value))
  }

  pub async fn add_relationship_type(
    &self,
    input: NewRelationshipType,
  ) -> Result<RelationshipType> {
    let code = validate_required("relationship type code", &input.code)?;
    let short_description = input
      .short_description
      .map(|d| d.trim().to_owned())
      .filter(|d| !d.is_empty());
    self
      .store
      .add_relationship_type(NewRelationshipType { code, short_description })
      .await
      .map_err(Error::store)
  }

  /// A relationship type that exists and has not been retired.
  pub async fn find_valid_relationship_type(
    &self,
    id: Uuid,
  ) -> Result<Option<RelationshipType>> {
    let found = self
      .store
      .get_relationship_type(id)
      .await
      .map_err(Error::store)?;
    Ok(found.filter(|t| !t.deleted))
  }

  pub async fn list_relationship_types(&self) -> Result<Vec<RelationshipType>> {
    let mut types = self
      .store
      .list_relationship_types()
      .await
      .map_err(Error::store)?;
    types.retain(|t| !t.deleted);
    Ok(types)
  }

  // ── Lookups ───────────────────────────────────────────────────────────

  /// Logically deleted relationships are reported as absent.
  pub async fn find_by_identifier(&self, id: Uuid) -> Result<Option<Relationship>> {
    let found = self.store.get_relationship(id).await.map_err(Error::store)?;
    Ok(found.filter(|r| !r.deleted))
  }

  /// The pending relationship whose delegate holds invitation `code`, provided
  /// the code is still pending and has not expired at `now`.
  pub async fn find_pending_by_invitation_code_in_date_range(
    &self,
    code: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<Relationship>> {
    let identity = self
      .store
      .find_invitation_by_code(code.to_owned())
      .await
      .map_err(Error::store)?;

    let Some(identity) = identity else {
      return Ok(None);
    };
    let claimable = identity
      .invitation
      .as_ref()
      .is_some_and(|inv| inv.is_claimable_at(now));
    if !claimable {
      return Ok(None);
    }

    self
      .store
      .find_pending_for_delegate(identity.party_id)
      .await
      .map_err(Error::store)
  }

  /// One page of relationships where the filtered identity's party is the
  /// subject or the delegate. An unknown identity yields an empty page.
  pub async fn search(
    &self,
    filter: PartyFilter,
    page: u32,
    page_size: Option<u32>,
  ) -> Result<SearchResult<RelationshipRef>> {
    let page_size = validate_page(page, page_size, DEFAULT_PAGE_SIZE)?;

    let identity = self
      .store
      .find_identity_by_id_value(filter.identity_id_value().to_owned())
      .await
      .map_err(Error::store)?;

    let Some(identity) = identity else {
      return Ok(SearchResult { total_count: 0, page, page_size, list: Vec::new() });
    };

    let result = self
      .store
      .search_relationships(RelationshipQuery {
        party_id: identity.party_id,
        role: filter.role(),
        page,
        page_size,
      })
      .await
      .map_err(Error::store)?;

    Ok(result.map(|r| r.to_ref()))
  }

  // ── Creation & deletion ───────────────────────────────────────────────

  /// Create a pending relationship for a brand-new delegate.
  ///
  /// The delegate party, its invitation-code identity and the relationship
  /// are written in one store call.
  pub async fn create(&self, input: NewRelationship) -> Result<CreatedRelationship> {
    let now = Utc::now();

    let delegate_name = validate_nickname(input.delegate.name)?;
    let subject_nickname = input.subject_nickname.map(validate_nickname).transpose()?;
    let start_at = input.start_at.unwrap_or(now);
    validate_period(start_at, input.end_at)?;
    let attributes = validate_attributes(input.attributes)?;

    if self
      .find_valid_relationship_type(input.relationship_type_id)
      .await?
      .is_none()
    {
      return Err(Error::RelationshipTypeNotFound(input.relationship_type_id));
    }
    if self.get_party(input.subject_party_id).await?.is_none() {
      return Err(Error::PartyNotFound(input.subject_party_id));
    }

    let expires_at = now + self.invitation_ttl;
    let created = self
      .store
      .create_relationship(Creation {
        delegate_kind:   input.delegate.kind,
        delegate_name:   delegate_name.clone(),
        invitation_code: generate_invitation_code(),
        invitation:      Invitation::pending(expires_at),
        draft:           RelationshipDraft {
          relationship_type_id: input.relationship_type_id,
          subject_party_id:     input.subject_party_id,
          subject_nickname,
          delegate_nickname:    Some(delegate_name),
          start_at,
          end_at:               input.end_at,
          end_event_at:         input.end_at.map(|_| now),
          status:               RelationshipStatus::Pending,
          attributes,
        },
      })
      .await
      .map_err(Error::store)?;
    let relationship = created.relationship;

    info!(
      relationship_id = %relationship.relationship_id,
      subject = %relationship.subject_party_id,
      delegate = %relationship.delegate_party_id,
      "relationship created"
    );

    Ok(CreatedRelationship {
      relationship,
      invitation_code: created.invitation.raw_id_value,
      invitation_expires_at: expires_at,
    })
  }

  /// Set the deletion flag. Returns `None` if the relationship is absent or
  /// already deleted.
  pub async fn delete(&self, id: Uuid) -> Result<Option<Relationship>> {
    let Some(mut relationship) = self.find_by_identifier(id).await? else {
      return Ok(None);
    };
    let now = Utc::now();
    if !self.store.mark_deleted(id, now).await.map_err(Error::store)? {
      return Ok(None);
    }
    relationship.deleted = true;
    relationship.updated_at = now;
    info!(relationship_id = %id, "relationship deleted");
    Ok(Some(relationship))
  }

  // ── Transitions ───────────────────────────────────────────────────────

  /// Activate a pending relationship and hand its delegate side over from
  /// the invitation code to `accepting`.
  pub async fn accept_pending_invitation(
    &self,
    relationship: &Relationship,
    accepting: &Identity,
  ) -> Result<Relationship> {
    let next = self.guard(relationship, Transition::Accept)?;
    if accepting.kind != IdentityKind::LinkId {
      return Err(ValidationError::AcceptingIdentityNotLinked.into());
    }

    let (invitation_id, invitation) = self.invitation_of(relationship).await?;
    let now = Utc::now();
    if invitation.expires_at < now {
      warn!(identity_id = %invitation_id, "invitation code expired");
      return Err(Error::InvitationExpired(invitation_id));
    }

    let committed = self
      .store
      .commit_acceptance(Acceptance {
        relationship_id:        relationship.relationship_id,
        invitation_identity_id: invitation_id,
        delegate_party_id:      accepting.party_id,
        at:                     now,
      })
      .await
      .map_err(Error::store)?;
    if !committed {
      return Err(self.lost_race(relationship).await);
    }

    info!(
      relationship_id = %relationship.relationship_id,
      identity_id = %accepting.identity_id,
      "invitation accepted"
    );

    let mut updated = relationship.clone();
    updated.status = next;
    updated.delegate_party_id = accepting.party_id;
    updated.updated_at = now;
    Ok(updated)
  }

  /// Invalidate a pending relationship and mark its invitation code rejected.
  pub async fn reject_pending_invitation(
    &self,
    relationship: &Relationship,
  ) -> Result<Relationship> {
    let next = self.guard(relationship, Transition::Reject)?;
    let (invitation_id, _) = self.invitation_of(relationship).await?;
    let now = Utc::now();

    let committed = self
      .store
      .commit_rejection(Rejection {
        relationship_id:        relationship.relationship_id,
        invitation_identity_id: invitation_id,
        at:                     now,
      })
      .await
      .map_err(Error::store)?;
    if !committed {
      return Err(self.lost_race(relationship).await);
    }

    info!(relationship_id = %relationship.relationship_id, "invitation rejected");

    let mut updated = relationship.clone();
    updated.status = next;
    updated.updated_at = now;
    Ok(updated)
  }

  /// Record where the invitation code should be sent. The relationship is
  /// returned unchanged.
  pub async fn notify_delegate(
    &self,
    relationship: &Relationship,
    email: &str,
  ) -> Result<Relationship> {
    if relationship.status != RelationshipStatus::Pending {
      return Err(Error::InvalidState {
        relationship_id: relationship.relationship_id,
        status:          relationship.status,
      });
    }
    validate_email(email)?;

    let (invitation_id, _) = self.invitation_of(relationship).await?;
    let stored = self
      .store
      .set_invitation_email(invitation_id, email.to_owned())
      .await
      .map_err(Error::store)?;
    if !stored {
      return Err(Error::MissingInvitation(relationship.relationship_id));
    }

    info!(relationship_id = %relationship.relationship_id, "delegate email recorded");
    Ok(relationship.clone())
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  fn guard(
    &self,
    relationship: &Relationship,
    transition: Transition,
  ) -> Result<RelationshipStatus> {
    relationship.status.apply(transition).ok_or_else(|| {
      warn!(
        relationship_id = %relationship.relationship_id,
        status = %relationship.status,
        ?transition,
        "transition refused"
      );
      Error::InvalidState {
        relationship_id: relationship.relationship_id,
        status:          relationship.status,
      }
    })
  }

  async fn invitation_of(&self, relationship: &Relationship) -> Result<(Uuid, Invitation)> {
    let identity = self
      .store
      .find_invitation_for_party(relationship.delegate_party_id)
      .await
      .map_err(Error::store)?;
    identity
      .and_then(|i| i.invitation.map(|inv| (i.identity_id, inv)))
      .ok_or(Error::MissingInvitation(relationship.relationship_id))
  }

  /// The store refused a guarded commit: report the status it actually holds.
  async fn lost_race(&self, relationship: &Relationship) -> Error {
    let id = relationship.relationship_id;
    match self.store.get_relationship(id).await {
      Ok(current) => {
        let status = current.map_or(relationship.status, |r| r.status);
        warn!(relationship_id = %id, %status, "relationship changed concurrently");
        Error::InvalidState { relationship_id: id, status }
      }
      Err(e) => Error::store(e),
    }
  }
}

/// A random code from an unambiguous alphabet.
pub fn generate_invitation_code() -> String {
  let mut bytes = [0u8; INVITATION_CODE_LEN];
  OsRng.fill_bytes(&mut bytes);
  bytes
    .iter()
    .map(|b| char::from(INVITATION_CODE_ALPHABET[usize::from(*b) % INVITATION_CODE_ALPHABET.len()]))
    .collect()
}
