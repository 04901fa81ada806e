//! Relationships between a subject and a delegate, and their status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::party::{Name, PartyKind};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationshipStatus {
  /// Granted by the subject, waiting for the delegate to respond.
  Pending,
  Active,
  /// Rejected by the delegate.
  Invalid,
  Cancelled,
  Deleted,
}

/// An event that moves a relationship out of [`RelationshipStatus::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Accept,
  Reject,
}

impl RelationshipStatus {
  /// The status reached by applying `transition`, or `None` if the transition
  /// is not allowed from `self`.
  pub fn apply(self, transition: Transition) -> Option<Self> {
    match (self, transition) {
      (Self::Pending, Transition::Accept) => Some(Self::Active),
      (Self::Pending, Transition::Reject) => Some(Self::Invalid),
      (Self::Active | Self::Invalid | Self::Cancelled | Self::Deleted, _) => None,
    }
  }
}

// ─── Attributes & types ──────────────────────────────────────────────────────

/// A free-form key/value pair attached to a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
  pub code:  String,
  pub value: String,
}

/// A reference-data entry describing what kind of authority is granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipType {
  pub relationship_type_id: Uuid,
  pub code:                 String,
  pub short_description:    Option<String>,
  /// Retired types stay readable by id but cannot back new relationships.
  pub deleted:              bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRelationshipType {
  pub code:              String,
  pub short_description: Option<String>,
}

// ─── Relationship ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
  pub relationship_id:      Uuid,
  pub relationship_type_id: Uuid,
  pub subject_party_id:     Uuid,
  pub subject_nickname:     Option<Name>,
  pub delegate_party_id:    Uuid,
  pub delegate_nickname:    Option<Name>,
  pub start_at:             DateTime<Utc>,
  pub end_at:               Option<DateTime<Utc>>,
  /// When the end of this relationship was recorded.
  pub end_event_at:         Option<DateTime<Utc>>,
  pub status:               RelationshipStatus,
  pub attributes:           Vec<Attribute>,
  pub deleted:              bool,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl Relationship {
  pub fn href(&self) -> String { relationship_href(self.relationship_id) }

  /// The lightweight summary returned by searches.
  pub fn to_ref(&self) -> RelationshipRef {
    RelationshipRef {
      href:                 self.href(),
      relationship_id:      self.relationship_id,
      relationship_type_id: self.relationship_type_id,
      subject_party_id:     self.subject_party_id,
      delegate_party_id:    self.delegate_party_id,
      status:               self.status,
      start_at:             self.start_at,
      end_at:               self.end_at,
    }
  }
}

pub fn relationship_href(id: Uuid) -> String { format!("/relationship/{id}") }

/// A fully-validated relationship ready to persist.
/// `relationship_id`, `created_at` and `updated_at` are assigned by the store,
/// and the delegate is the party created alongside it.
#[derive(Debug, Clone)]
pub struct RelationshipDraft {
  pub relationship_type_id: Uuid,
  pub subject_party_id:     Uuid,
  pub subject_nickname:     Option<Name>,
  pub delegate_nickname:    Option<Name>,
  pub start_at:             DateTime<Utc>,
  pub end_at:               Option<DateTime<Utc>>,
  pub end_event_at:         Option<DateTime<Utc>>,
  pub status:               RelationshipStatus,
  pub attributes:           Vec<Attribute>,
}

/// The delegate side of [`NewRelationship`]; becomes a fresh party plus an
/// invitation-code identity.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDelegate {
  pub kind: PartyKind,
  pub name: Name,
}

/// Input to [`crate::manager::RelationshipManager::create`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewRelationship {
  pub relationship_type_id: Uuid,
  pub subject_party_id:     Uuid,
  pub subject_nickname:     Option<Name>,
  pub delegate:             NewDelegate,
  /// Defaults to the creation time.
  pub start_at:             Option<DateTime<Utc>>,
  pub end_at:               Option<DateTime<Utc>>,
  #[serde(default)]
  pub attributes:           Vec<Attribute>,
}

/// A freshly created relationship together with the code the subject hands
/// to the delegate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRelationship {
  pub relationship:          Relationship,
  pub invitation_code:       String,
  pub invitation_expires_at: DateTime<Utc>,
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// Which side of a relationship a party is on.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartyRole {
  Subject,
  Delegate,
}

/// Selects relationships by exactly one side, identified by an identity's
/// scoped id value (see [`crate::identity::Identity::id_value`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyFilter {
  Subject(String),
  Delegate(String),
}

impl PartyFilter {
  pub fn new(role: PartyRole, identity_id_value: impl Into<String>) -> Self {
    match role {
      PartyRole::Subject => Self::Subject(identity_id_value.into()),
      PartyRole::Delegate => Self::Delegate(identity_id_value.into()),
    }
  }

  pub fn role(&self) -> PartyRole {
    match self {
      Self::Subject(_) => PartyRole::Subject,
      Self::Delegate(_) => PartyRole::Delegate,
    }
  }

  pub fn identity_id_value(&self) -> &str {
    match self {
      Self::Subject(v) | Self::Delegate(v) => v,
    }
  }
}

/// Summary of a relationship; bounded in size regardless of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRef {
  pub href:                 String,
  pub relationship_id:      Uuid,
  pub relationship_type_id: Uuid,
  pub subject_party_id:     Uuid,
  pub delegate_party_id:    Uuid,
  pub status:               RelationshipStatus,
  pub start_at:             DateTime<Utc>,
  pub end_at:               Option<DateTime<Utc>>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult<T> {
  pub total_count: u64,
  /// 1-based.
  pub page:        u32,
  pub page_size:   u32,
  pub list:        Vec<T>,
}

impl<T> SearchResult<T> {
  pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchResult<U> {
    SearchResult {
      total_count: self.total_count,
      page:        self.page,
      page_size:   self.page_size,
      list:        self.list.into_iter().map(f).collect(),
    }
  }
}
