//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{Duration, TimeZone as _, Utc};
use ram_core::{
  Error as CoreError,
  identity::{
    IdentityKind, Invitation, InvitationCodeStatus, LinkIdScheme, NewIdentity,
    NewLinkIdentity,
  },
  manager::RelationshipManager,
  party::{Name, PartyKind},
  relationship::{
    Attribute, NewDelegate, NewRelationship, NewRelationshipType, PartyFilter,
    PartyRole, RelationshipDraft, RelationshipStatus,
  },
  store::{Acceptance, AuthorityStore, Creation, RelationshipQuery},
  validate::ValidationError,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn manager() -> RelationshipManager<SqliteStore> {
  RelationshipManager::new(Arc::new(store().await))
}

struct Seed {
  relationship_type_id: Uuid,
  subject_party_id:     Uuid,
}

async fn seed(m: &RelationshipManager<SqliteStore>) -> Seed {
  let relationship_type = m
    .add_relationship_type(NewRelationshipType {
      code:              "CUSTOM_REPRESENTATIVE".into(),
      short_description: Some("Custom Representative".into()),
    })
    .await
    .unwrap();
  let subject = m.add_party(PartyKind::Individual).await.unwrap();
  m.add_link_identity(NewLinkIdentity {
    party_id:     subject.party_id,
    scheme:       LinkIdScheme::MyGov,
    raw_id_value: "subject_1".into(),
    name:         Name::structured("Jane", "Subject 1"),
  })
  .await
  .unwrap();

  Seed {
    relationship_type_id: relationship_type.relationship_type_id,
    subject_party_id:     subject.party_id,
  }
}

fn new_relationship(seed: &Seed) -> NewRelationship {
  NewRelationship {
    relationship_type_id: seed.relationship_type_id,
    subject_party_id:     seed.subject_party_id,
    subject_nickname:     Some(Name::structured("Jane", "Subject 1")),
    delegate:             NewDelegate {
      kind: PartyKind::Individual,
      name: Name::unstructured("Delegate Pty Ltd"),
    },
    start_at:             None,
    end_at:               None,
    attributes:           Vec::new(),
  }
}

// ─── Parties & identities ────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_party() {
  let s = store().await;

  let party = s.add_party(PartyKind::Abn).await.unwrap();
  let fetched = s.get_party(party.party_id).await.unwrap().unwrap();
  assert_eq!(fetched.party_id, party.party_id);
  assert_eq!(fetched.kind, PartyKind::Abn);
  assert_eq!(fetched.created_at, party.created_at);
}

#[tokio::test]
async fn get_party_missing_returns_none() {
  let s = store().await;
  assert!(s.get_party(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn link_identity_is_found_by_scoped_value() {
  let m = manager().await;
  seed(&m).await;

  let found = m
    .store()
    .find_identity_by_id_value("LINK_ID:MY_GOV:subject_1".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.kind, IdentityKind::LinkId);
  assert_eq!(found.link_id_scheme, Some(LinkIdScheme::MyGov));
  assert!(found.invitation.is_none());
  assert_eq!(found.name.given_name.as_deref(), Some("Jane"));
}

#[tokio::test]
async fn duplicate_link_identity_is_refused() {
  let m = manager().await;
  let seed = seed(&m).await;

  let err = m
    .add_link_identity(NewLinkIdentity {
      party_id:     seed.subject_party_id,
      scheme:       LinkIdScheme::MyGov,
      raw_id_value: "subject_1".into(),
      name:         Name::structured("Jane", "Again"),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::IdentityExists(_)));
}

#[tokio::test]
async fn duplicate_identity_insert_writes_nothing() {
  let s = store().await;
  let party = s.add_party(PartyKind::Individual).await.unwrap();
  let input = NewIdentity {
    party_id:       party.party_id,
    kind:           IdentityKind::LinkId,
    raw_id_value:   "abc123".into(),
    link_id_scheme: Some(LinkIdScheme::MyGov),
    invitation:     None,
    name:           Name::structured("Jane", "Subject 1"),
  };

  assert!(s.add_identity(input.clone()).await.unwrap().is_some());
  assert!(s.add_identity(input).await.unwrap().is_none());
  assert_eq!(s.count_rows("identities").await.unwrap(), 1);
}

// ─── Relationship types ──────────────────────────────────────────────────────

#[tokio::test]
async fn relationship_types_list_by_code() {
  let s = store().await;
  for code in ["UNIVERSAL_REPRESENTATIVE", "CUSTOM_REPRESENTATIVE"] {
    s.add_relationship_type(NewRelationshipType {
      code:              code.into(),
      short_description: None,
    })
    .await
    .unwrap();
  }

  let codes: Vec<String> = s
    .list_relationship_types()
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.code)
    .collect();
  assert_eq!(codes, ["CUSTOM_REPRESENTATIVE", "UNIVERSAL_REPRESENTATIVE"]);
}

// ─── Relationship lifecycle ──────────────────────────────────────────────────

#[tokio::test]
async fn created_relationship_round_trips() {
  let m = manager().await;
  let seed = seed(&m).await;

  let mut input = new_relationship(&seed);
  input.end_at = Some(Utc::now() + Duration::days(30));
  input.attributes = vec![Attribute {
    code:  "SELECTED_GOVERNMENT_SERVICES".into(),
    value: "ato".into(),
  }];
  let created = m.create(input).await.unwrap();

  let fetched = m
    .find_by_identifier(created.relationship.relationship_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched, created.relationship);
  assert_eq!(fetched.status, RelationshipStatus::Pending);
  assert!(fetched.end_event_at.is_some());
  assert_eq!(fetched.attributes.len(), 1);
  assert_eq!(
    fetched.delegate_nickname.as_ref().and_then(|n| n.unstructured_name.as_deref()),
    Some("Delegate Pty Ltd"),
  );

  let invitation = m
    .store()
    .find_invitation_by_code(created.invitation_code.clone())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(invitation.party_id, fetched.delegate_party_id);
  let inv = invitation.invitation.unwrap();
  assert_eq!(inv.status, InvitationCodeStatus::Pending);
  assert_eq!(inv.expires_at, created.invitation_expires_at);
}

#[tokio::test]
async fn pending_relationship_found_by_code() {
  let m = manager().await;
  let seed = seed(&m).await;
  let created = m.create(new_relationship(&seed)).await.unwrap();

  let found = m
    .find_pending_by_invitation_code_in_date_range(&created.invitation_code, Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.relationship_id, created.relationship.relationship_id);

  let later = created.invitation_expires_at + Duration::seconds(1);
  let expired = m
    .find_pending_by_invitation_code_in_date_range(&created.invitation_code, later)
    .await
    .unwrap();
  assert!(expired.is_none());

  let unknown = m
    .find_pending_by_invitation_code_in_date_range("NOSUCHCODE", Utc::now())
    .await
    .unwrap();
  assert!(unknown.is_none());
}

#[tokio::test]
async fn accept_claims_invitation_and_moves_delegate() {
  let m = manager().await;
  let seed = seed(&m).await;
  let created = m.create(new_relationship(&seed)).await.unwrap();

  let delegate = m.add_party(PartyKind::Individual).await.unwrap();
  let accepting = m
    .add_link_identity(NewLinkIdentity {
      party_id:     delegate.party_id,
      scheme:       LinkIdScheme::MyGov,
      raw_id_value: "delegate_1".into(),
      name:         Name::structured("John", "Delegate 1"),
    })
    .await
    .unwrap();

  let accepted = m
    .accept_pending_invitation(&created.relationship, &accepting)
    .await
    .unwrap();
  assert_eq!(accepted.status, RelationshipStatus::Active);

  let stored = m
    .find_by_identifier(accepted.relationship_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.status, RelationshipStatus::Active);
  assert_eq!(stored.delegate_party_id, delegate.party_id);

  let invitation = m
    .store()
    .find_invitation_by_code(created.invitation_code.clone())
    .await
    .unwrap()
    .unwrap()
    .invitation
    .unwrap();
  assert_eq!(invitation.status, InvitationCodeStatus::Claimed);
  assert!(invitation.claimed_at.is_some());

  let page = m
    .search(PartyFilter::Delegate("LINK_ID:MY_GOV:delegate_1".into()), 1, None)
    .await
    .unwrap();
  assert_eq!(page.total_count, 1);

  // A stale pending copy is refused by the store's guard.
  let err = m
    .accept_pending_invitation(&created.relationship, &accepting)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    CoreError::InvalidState { status: RelationshipStatus::Active, .. }
  ));
}

#[tokio::test]
async fn reject_invalidates_and_blocks_accept() {
  let m = manager().await;
  let seed = seed(&m).await;
  let created = m.create(new_relationship(&seed)).await.unwrap();

  let rejected = m
    .reject_pending_invitation(&created.relationship)
    .await
    .unwrap();
  assert_eq!(rejected.status, RelationshipStatus::Invalid);

  let invitation = m
    .store()
    .find_invitation_by_code(created.invitation_code.clone())
    .await
    .unwrap()
    .unwrap()
    .invitation
    .unwrap();
  assert_eq!(invitation.status, InvitationCodeStatus::Rejected);

  // Nothing pending is left behind the code.
  let found = m
    .find_pending_by_invitation_code_in_date_range(&created.invitation_code, Utc::now())
    .await
    .unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn commit_is_all_or_nothing() {
  let m = manager().await;
  let seed = seed(&m).await;
  let created = m.create(new_relationship(&seed)).await.unwrap();

  // The relationship is pending but the identity is not an invitation, so the
  // identity update matches nothing and the relationship update rolls back.
  let subject_identity = m
    .store()
    .find_identity_by_id_value("LINK_ID:MY_GOV:subject_1".into())
    .await
    .unwrap()
    .unwrap();
  let committed = m
    .store()
    .commit_acceptance(Acceptance {
      relationship_id:        created.relationship.relationship_id,
      invitation_identity_id: subject_identity.identity_id,
      delegate_party_id:      seed.subject_party_id,
      at:                     Utc::now(),
    })
    .await
    .unwrap();
  assert!(!committed);

  let stored = m
    .store()
    .get_relationship(created.relationship.relationship_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.status, RelationshipStatus::Pending);
  assert_eq!(stored.delegate_party_id, created.relationship.delegate_party_id);
}

fn creation(seed: &Seed, code: &str) -> Creation {
  Creation {
    delegate_kind:   PartyKind::Individual,
    delegate_name:   Name::structured("John", "Delegate 1"),
    invitation_code: code.into(),
    invitation:      Invitation::pending(Utc::now() + Duration::days(7)),
    draft:           RelationshipDraft {
      relationship_type_id: seed.relationship_type_id,
      subject_party_id:     seed.subject_party_id,
      subject_nickname:     None,
      delegate_nickname:    Some(Name::structured("John", "Delegate 1")),
      start_at:             Utc::now(),
      end_at:               None,
      end_event_at:         None,
      status:               RelationshipStatus::Pending,
      attributes:           Vec::new(),
    },
  }
}

async fn row_counts(s: &SqliteStore) -> [i64; 3] {
  [
    s.count_rows("parties").await.unwrap(),
    s.count_rows("identities").await.unwrap(),
    s.count_rows("relationships").await.unwrap(),
  ]
}

#[tokio::test]
async fn failed_create_leaves_no_rows() {
  let m = manager().await;
  let seed = seed(&m).await;
  let before = row_counts(m.store()).await;

  // The relationship insert is last and fails its foreign key.
  let mut dangling = creation(&seed, "DANGLING01");
  dangling.draft.relationship_type_id = Uuid::new_v4();
  assert!(m.store().create_relationship(dangling).await.is_err());

  assert_eq!(row_counts(m.store()).await, before);
  let invitation = m
    .store()
    .find_invitation_by_code("DANGLING01".into())
    .await
    .unwrap();
  assert!(invitation.is_none());
}

#[tokio::test]
async fn invitation_code_collision_rolls_back_party() {
  let m = manager().await;
  let seed = seed(&m).await;
  let first = m
    .store()
    .create_relationship(creation(&seed, "SAMECODE22"))
    .await
    .unwrap();
  let before = row_counts(m.store()).await;

  assert!(
    m.store()
      .create_relationship(creation(&seed, "SAMECODE22"))
      .await
      .is_err()
  );

  assert_eq!(row_counts(m.store()).await, before);
  let invitation = m
    .store()
    .find_invitation_by_code("SAMECODE22".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(invitation.party_id, first.delegate.party_id);
}

#[tokio::test]
async fn five_digit_year_is_refused_before_writing() {
  let m = manager().await;
  let seed = seed(&m).await;
  let before = row_counts(m.store()).await;

  let mut input = new_relationship(&seed);
  input.end_at = Some(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap());
  let err = m.create(input).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Validation(ValidationError::TimestampOutOfRange(_))
  ));
  assert_eq!(row_counts(m.store()).await, before);

  let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
  let mut input = new_relationship(&seed);
  input.end_at = Some(last);
  let created = m.create(input).await.unwrap();
  let stored = m
    .store()
    .get_relationship(created.relationship.relationship_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored.end_at, Some(last));
}

#[tokio::test]
async fn notify_delegate_overwrites_email() {
  let m = manager().await;
  let seed = seed(&m).await;
  let created = m.create(new_relationship(&seed)).await.unwrap();

  m.notify_delegate(&created.relationship, "first@example.com")
    .await
    .unwrap();
  m.notify_delegate(&created.relationship, "second@example.com")
    .await
    .unwrap();

  let invitation = m
    .store()
    .find_invitation_by_code(created.invitation_code.clone())
    .await
    .unwrap()
    .unwrap()
    .invitation
    .unwrap();
  assert_eq!(invitation.temporary_email.as_deref(), Some("second@example.com"));
  assert_eq!(invitation.status, InvitationCodeStatus::Pending);
}

// ─── Search & deletion ───────────────────────────────────────────────────────

#[tokio::test]
async fn search_pages_newest_first() {
  let m = manager().await;
  let seed = seed(&m).await;

  let mut ids = Vec::new();
  for _ in 0..5 {
    ids.push(m.create(new_relationship(&seed)).await.unwrap().relationship.relationship_id);
  }
  ids.reverse();

  let filter = PartyFilter::Subject("LINK_ID:MY_GOV:subject_1".into());
  let first = m.search(filter.clone(), 1, Some(2)).await.unwrap();
  assert_eq!(first.total_count, 5);
  assert_eq!(first.page_size, 2);
  let first_ids: Vec<Uuid> = first.list.iter().map(|r| r.relationship_id).collect();
  assert_eq!(first_ids, ids[..2]);

  let last = m.search(filter, 3, Some(2)).await.unwrap();
  assert_eq!(last.list.len(), 1);
  assert_eq!(last.list[0].relationship_id, ids[4]);
  assert_eq!(last.list[0].href, format!("/relationship/{}", ids[4]));
}

#[tokio::test]
async fn deleted_relationships_are_hidden() {
  let m = manager().await;
  let seed = seed(&m).await;
  let created = m.create(new_relationship(&seed)).await.unwrap();
  let id = created.relationship.relationship_id;

  let deleted = m.delete(id).await.unwrap().unwrap();
  assert!(deleted.deleted);
  assert!(m.delete(id).await.unwrap().is_none());
  assert!(m.find_by_identifier(id).await.unwrap().is_none());

  // Still present underneath, flagged.
  let raw = m.store().get_relationship(id).await.unwrap().unwrap();
  assert!(raw.deleted);

  let page = m
    .store()
    .search_relationships(RelationshipQuery {
      party_id:  seed.subject_party_id,
      role:      PartyRole::Subject,
      page:      1,
      page_size: 10,
    })
    .await
    .unwrap();
  assert_eq!(page.total_count, 0);
  assert!(page.list.is_empty());
}

#[tokio::test]
async fn store_survives_reopen() {
  let dir = std::env::temp_dir().join(format!("ram-store-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("ram.db");

  let party_id = {
    let s = SqliteStore::open(&path).await.unwrap();
    s.add_party(PartyKind::Individual).await.unwrap().party_id
  };

  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_party(party_id).await.unwrap().is_some());

  drop(s);
  let _ = std::fs::remove_dir_all(&dir);
}
