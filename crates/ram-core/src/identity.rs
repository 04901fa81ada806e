//! Identities: the ways a party is known to the system.
//!
//! A delegate that has not yet signed in is represented by a disposable
//! invitation-code identity. Accepting the invitation hands the relationship
//! over to a real, linked identity and marks the code as claimed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::party::Name;

// ─── Enumerations ────────────────────────────────────────────────────────────

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
pub enum IdentityKind {
  /// Placeholder issued to a delegate who has not claimed the relationship.
  InvitationCode,
  /// An identity backed by an external credential provider.
  LinkId,
}

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
pub enum InvitationCodeStatus {
  Pending,
  Claimed,
  Rejected,
}

/// The credential provider behind a [`IdentityKind::LinkId`] identity.
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
pub enum LinkIdScheme {
  MyGov,
  Agency,
}

// ─── Invitation ──────────────────────────────────────────────────────────────

/// State carried only by invitation-code identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
  pub status:          InvitationCodeStatus,
  pub expires_at:      DateTime<Utc>,
  pub claimed_at:      Option<DateTime<Utc>>,
  /// Where the subject asked us to send the code; delivery happens elsewhere.
  pub temporary_email: Option<String>,
}

impl Invitation {
  pub fn pending(expires_at: DateTime<Utc>) -> Self {
    Self {
      status: InvitationCodeStatus::Pending,
      expires_at,
      claimed_at: None,
      temporary_email: None,
    }
  }

  /// Still pending and not past its expiry at `now`.
  pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
    self.status == InvitationCodeStatus::Pending && self.expires_at >= now
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub identity_id:    Uuid,
  pub party_id:       Uuid,
  pub kind:           IdentityKind,
  pub raw_id_value:   String,
  pub link_id_scheme: Option<LinkIdScheme>,
  /// Present iff `kind` is [`IdentityKind::InvitationCode`].
  pub invitation:     Option<Invitation>,
  pub name:           Name,
  pub created_at:     DateTime<Utc>,
}

impl Identity {
  /// The scoped identifier, unique across identity kinds and schemes.
  pub fn id_value(&self) -> String {
    scoped_id_value(self.kind, self.link_id_scheme, &self.raw_id_value)
  }
}

/// Build the value returned by [`Identity::id_value`] without an identity in
/// hand; stores use it to index identities.
pub fn scoped_id_value(
  kind: IdentityKind,
  scheme: Option<LinkIdScheme>,
  raw_id_value: &str,
) -> String {
  match (kind, scheme) {
    (IdentityKind::InvitationCode, _) => format!("INVITATION_CODE:{raw_id_value}"),
    (IdentityKind::LinkId, Some(scheme)) => {
      let scheme: &'static str = scheme.into();
      format!("LINK_ID:{}:{raw_id_value}", scheme.to_uppercase())
    }
    (IdentityKind::LinkId, None) => format!("LINK_ID:{raw_id_value}"),
  }
}

/// Input to [`crate::store::AuthorityStore::add_identity`].
/// `identity_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub party_id:       Uuid,
  pub kind:           IdentityKind,
  pub raw_id_value:   String,
  pub link_id_scheme: Option<LinkIdScheme>,
  pub invitation:     Option<Invitation>,
  pub name:           Name,
}

/// A linked identity registered for an existing party.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLinkIdentity {
  pub party_id:     Uuid,
  pub scheme:       LinkIdScheme,
  pub raw_id_value: String,
  pub name:         Name,
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn scoped_id_values() {
    assert_eq!(
      scoped_id_value(IdentityKind::InvitationCode, None, "ABC123"),
      "INVITATION_CODE:ABC123"
    );
    assert_eq!(
      scoped_id_value(IdentityKind::LinkId, Some(LinkIdScheme::MyGov), "u1"),
      "LINK_ID:MY_GOV:u1"
    );
  }

  #[test]
  fn invitation_claimable_until_expiry() {
    let now = Utc::now();
    let invitation = Invitation::pending(now);
    assert!(invitation.is_claimable_at(now));
    assert!(!invitation.is_claimable_at(now + Duration::seconds(1)));

    let claimed = Invitation {
      status: InvitationCodeStatus::Claimed,
      ..Invitation::pending(now + Duration::days(1))
    };
    assert!(!claimed.is_claimable_at(now));
  }
}
