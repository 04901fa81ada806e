//! [`MemoryStore`]: an [`AuthorityStore`] held entirely in process memory.
//!
//! Every operation runs under one mutex, which gives the guarded commits the
//! same all-or-nothing behaviour as a database transaction. Useful for tests
//! and for embedding the manager without a database.

use std::{
  convert::Infallible,
  sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  identity::{Identity, IdentityKind, InvitationCodeStatus, NewIdentity},
  party::{Party, PartyKind},
  relationship::{
    NewRelationshipType, PartyRole, Relationship, RelationshipStatus,
    RelationshipType, SearchResult,
  },
  store::{
    Acceptance, AuthorityStore, Created, Creation, Rejection, RelationshipQuery,
  },
};

#[derive(Default)]
struct Inner {
  parties:            Vec<Party>,
  identities:         Vec<Identity>,
  relationship_types: Vec<RelationshipType>,
  relationships:      Vec<Relationship>,
}

impl Inner {
  fn relationship_mut(&mut self, id: Uuid) -> Option<&mut Relationship> {
    self.relationships.iter_mut().find(|r| r.relationship_id == id)
  }

  fn pending_invitation_mut(&mut self, id: Uuid) -> Option<&mut Identity> {
    self.identities.iter_mut().find(|i| {
      i.identity_id == id
        && i
          .invitation
          .as_ref()
          .is_some_and(|inv| inv.status == InvitationCodeStatus::Pending)
    })
  }

  fn has_id_value(&self, id_value: &str) -> bool {
    self.identities.iter().any(|i| i.id_value() == id_value)
  }

  /// Both records exist and are still pending.
  fn can_transition(&self, relationship_id: Uuid, identity_id: Uuid) -> bool {
    let relationship_pending = self.relationships.iter().any(|r| {
      r.relationship_id == relationship_id
        && !r.deleted
        && r.status == RelationshipStatus::Pending
    });
    let invitation_pending = self.identities.iter().any(|i| {
      i.identity_id == identity_id
        && i
          .invitation
          .as_ref()
          .is_some_and(|inv| inv.status == InvitationCodeStatus::Pending)
    });
    relationship_pending && invitation_pending
  }
}

fn new_identity(input: NewIdentity) -> Identity {
  Identity {
    identity_id:    Uuid::new_v4(),
    party_id:       input.party_id,
    kind:           input.kind,
    raw_id_value:   input.raw_id_value,
    link_id_scheme: input.link_id_scheme,
    invitation:     input.invitation,
    name:           input.name,
    created_at:     Utc::now(),
  }
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl AuthorityStore for MemoryStore {
  type Error = Infallible;

  async fn add_party(&self, kind: PartyKind) -> Result<Party, Infallible> {
    let party = Party { party_id: Uuid::new_v4(), created_at: Utc::now(), kind };
    self.lock().parties.push(party.clone());
    Ok(party)
  }

  async fn get_party(&self, id: Uuid) -> Result<Option<Party>, Infallible> {
    Ok(self.lock().parties.iter().find(|p| p.party_id == id).cloned())
  }

  async fn add_identity(&self, input: NewIdentity) -> Result<Option<Identity>, Infallible> {
    let identity = new_identity(input);
    // Checked and inserted under one lock, like a UNIQUE column.
    let mut inner = self.lock();
    if inner.has_id_value(&identity.id_value()) {
      return Ok(None);
    }
    inner.identities.push(identity.clone());
    Ok(Some(identity))
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>, Infallible> {
    Ok(self.lock().identities.iter().find(|i| i.identity_id == id).cloned())
  }

  async fn find_invitation_by_code(
    &self,
    code: String,
  ) -> Result<Option<Identity>, Infallible> {
    Ok(
      self
        .lock()
        .identities
        .iter()
        .find(|i| i.kind == IdentityKind::InvitationCode && i.raw_id_value == code)
        .cloned(),
    )
  }

  async fn find_invitation_for_party(
    &self,
    party_id: Uuid,
  ) -> Result<Option<Identity>, Infallible> {
    Ok(
      self
        .lock()
        .identities
        .iter()
        .find(|i| i.kind == IdentityKind::InvitationCode && i.party_id == party_id)
        .cloned(),
    )
  }

  async fn find_identity_by_id_value(
    &self,
    id_value: String,
  ) -> Result<Option<Identity>, Infallible> {
    Ok(
      self
        .lock()
        .identities
        .iter()
        .find(|i| i.id_value() == id_value)
        .cloned(),
    )
  }

  async fn set_invitation_email(
    &self,
    identity_id: Uuid,
    email: String,
  ) -> Result<bool, Infallible> {
    let mut inner = self.lock();
    let invitation = inner
      .identities
      .iter_mut()
      .find(|i| i.identity_id == identity_id)
      .and_then(|i| i.invitation.as_mut());
    Ok(match invitation {
      Some(inv) => {
        inv.temporary_email = Some(email);
        true
      }
      None => false,
    })
  }

  async fn add_relationship_type(
    &self,
    input: NewRelationshipType,
  ) -> Result<RelationshipType, Infallible> {
    let relationship_type = RelationshipType {
      relationship_type_id: Uuid::new_v4(),
      code:                 input.code,
      short_description:    input.short_description,
      deleted:              false,
    };
    self.lock().relationship_types.push(relationship_type.clone());
    Ok(relationship_type)
  }

  async fn get_relationship_type(
    &self,
    id: Uuid,
  ) -> Result<Option<RelationshipType>, Infallible> {
    Ok(
      self
        .lock()
        .relationship_types
        .iter()
        .find(|t| t.relationship_type_id == id)
        .cloned(),
    )
  }

  async fn list_relationship_types(&self) -> Result<Vec<RelationshipType>, Infallible> {
    Ok(self.lock().relationship_types.clone())
  }

  async fn create_relationship(&self, creation: Creation) -> Result<Created, Infallible> {
    let now = Utc::now();
    let delegate = Party {
      party_id:   Uuid::new_v4(),
      created_at: now,
      kind:       creation.delegate_kind,
    };
    let invitation = new_identity(NewIdentity {
      party_id:       delegate.party_id,
      kind:           IdentityKind::InvitationCode,
      raw_id_value:   creation.invitation_code,
      link_id_scheme: None,
      invitation:     Some(creation.invitation),
      name:           creation.delegate_name,
    });
    let draft = creation.draft;
    let relationship = Relationship {
      relationship_id:      Uuid::new_v4(),
      relationship_type_id: draft.relationship_type_id,
      subject_party_id:     draft.subject_party_id,
      subject_nickname:     draft.subject_nickname,
      delegate_party_id:    delegate.party_id,
      delegate_nickname:    draft.delegate_nickname,
      start_at:             draft.start_at,
      end_at:               draft.end_at,
      end_event_at:         draft.end_event_at,
      status:               draft.status,
      attributes:           draft.attributes,
      deleted:              false,
      created_at:           now,
      updated_at:           now,
    };

    let mut inner = self.lock();
    inner.parties.push(delegate.clone());
    inner.identities.push(invitation.clone());
    inner.relationships.push(relationship.clone());
    Ok(Created { delegate, invitation, relationship })
  }

  async fn get_relationship(&self, id: Uuid) -> Result<Option<Relationship>, Infallible> {
    Ok(
      self
        .lock()
        .relationships
        .iter()
        .find(|r| r.relationship_id == id)
        .cloned(),
    )
  }

  async fn find_pending_for_delegate(
    &self,
    party_id: Uuid,
  ) -> Result<Option<Relationship>, Infallible> {
    Ok(
      self
        .lock()
        .relationships
        .iter()
        .find(|r| {
          r.delegate_party_id == party_id
            && !r.deleted
            && r.status == RelationshipStatus::Pending
        })
        .cloned(),
    )
  }

  async fn search_relationships(
    &self,
    query: RelationshipQuery,
  ) -> Result<SearchResult<Relationship>, Infallible> {
    let inner = self.lock();
    let mut matching: Vec<&Relationship> = inner
      .relationships
      .iter()
      .rev()
      .filter(|r| !r.deleted)
      .filter(|r| match query.role {
        PartyRole::Subject => r.subject_party_id == query.party_id,
        PartyRole::Delegate => r.delegate_party_id == query.party_id,
      })
      .collect();
    // Stable: ties keep newest-inserted first.
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total_count = matching.len() as u64;
    let list = matching
      .into_iter()
      .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
      .take(query.page_size as usize)
      .cloned()
      .collect();

    Ok(SearchResult {
      total_count,
      page: query.page,
      page_size: query.page_size,
      list,
    })
  }

  async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, Infallible> {
    let mut inner = self.lock();
    Ok(match inner.relationship_mut(id) {
      Some(r) if !r.deleted => {
        r.deleted = true;
        r.updated_at = at;
        true
      }
      _ => false,
    })
  }

  async fn commit_acceptance(&self, acceptance: Acceptance) -> Result<bool, Infallible> {
    let mut inner = self.lock();
    if !inner.can_transition(acceptance.relationship_id, acceptance.invitation_identity_id) {
      return Ok(false);
    }

    if let Some(r) = inner.relationship_mut(acceptance.relationship_id) {
      r.status = RelationshipStatus::Active;
      r.delegate_party_id = acceptance.delegate_party_id;
      r.updated_at = acceptance.at;
    }
    if let Some(inv) = inner
      .pending_invitation_mut(acceptance.invitation_identity_id)
      .and_then(|i| i.invitation.as_mut())
    {
      inv.status = InvitationCodeStatus::Claimed;
      inv.claimed_at = Some(acceptance.at);
    }
    Ok(true)
  }

  async fn commit_rejection(&self, rejection: Rejection) -> Result<bool, Infallible> {
    let mut inner = self.lock();
    if !inner.can_transition(rejection.relationship_id, rejection.invitation_identity_id) {
      return Ok(false);
    }

    if let Some(r) = inner.relationship_mut(rejection.relationship_id) {
      r.status = RelationshipStatus::Invalid;
      r.updated_at = rejection.at;
    }
    if let Some(inv) = inner
      .pending_invitation_mut(rejection.invitation_identity_id)
      .and_then(|i| i.invitation.as_mut())
    {
      inv.status = InvitationCodeStatus::Rejected;
    }
    Ok(true)
  }
}
