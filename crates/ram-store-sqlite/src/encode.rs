//! Encoding and decoding helpers between RAM domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with nanosecond precision.
//! Enumerations use their snake_case names. Names and attribute lists are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use ram_core::{
  identity::{Identity, IdentityKind, Invitation, InvitationCodeStatus, LinkIdScheme},
  party::{Name, Party, PartyKind},
  relationship::{Attribute, Relationship, RelationshipStatus, RelationshipType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// The column form of any of the core enums.
pub fn encode_enum<E: Into<&'static str>>(value: E) -> &'static str { value.into() }

fn decode_enum<E: FromStr>(kind: &'static str, s: &str) -> Result<E> {
  E::from_str(s).map_err(|_| Error::UnknownVariant { kind, value: s.to_owned() })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_name(name: &Name) -> Result<String> { Ok(serde_json::to_string(name)?) }

pub fn encode_opt_name(name: Option<&Name>) -> Result<Option<String>> {
  name.map(encode_name).transpose()
}

fn decode_name(s: &str) -> Result<Name> { Ok(serde_json::from_str(s)?) }

pub fn encode_attributes(attributes: &[Attribute]) -> Result<String> {
  Ok(serde_json::to_string(attributes)?)
}

fn decode_attributes(s: &str) -> Result<Vec<Attribute>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PARTY_COLUMNS: &str = "party_id, created_at, kind";

/// Raw strings read directly from a `parties` row.
pub struct RawParty {
  pub party_id:   String,
  pub created_at: String,
  pub kind:       String,
}

impl RawParty {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      party_id:   row.get(0)?,
      created_at: row.get(1)?,
      kind:       row.get(2)?,
    })
  }

  pub fn into_party(self) -> Result<Party> {
    Ok(Party {
      party_id:   decode_uuid(&self.party_id)?,
      created_at: decode_dt(&self.created_at)?,
      kind:       decode_enum::<PartyKind>("party kind", &self.kind)?,
    })
  }
}

pub const IDENTITY_COLUMNS: &str = "identity_id, party_id, kind, raw_id_value, \
  link_id_scheme, invitation_status, invitation_expires_at, \
  invitation_claimed_at, invitation_email, name_json, created_at";

/// Raw strings read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_id:           String,
  pub party_id:              String,
  pub kind:                  String,
  pub raw_id_value:          String,
  pub link_id_scheme:        Option<String>,
  pub invitation_status:     Option<String>,
  pub invitation_expires_at: Option<String>,
  pub invitation_claimed_at: Option<String>,
  pub invitation_email:      Option<String>,
  pub name_json:             String,
  pub created_at:            String,
}

impl RawIdentity {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id:           row.get(0)?,
      party_id:              row.get(1)?,
      kind:                  row.get(2)?,
      raw_id_value:          row.get(3)?,
      link_id_scheme:        row.get(4)?,
      invitation_status:     row.get(5)?,
      invitation_expires_at: row.get(6)?,
      invitation_claimed_at: row.get(7)?,
      invitation_email:      row.get(8)?,
      name_json:             row.get(9)?,
      created_at:            row.get(10)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    let kind = decode_enum::<IdentityKind>("identity kind", &self.kind)?;

    let invitation = match (kind, self.invitation_status, self.invitation_expires_at) {
      (IdentityKind::InvitationCode, Some(status), Some(expires_at)) => Some(Invitation {
        status:          decode_enum::<InvitationCodeStatus>("invitation status", &status)?,
        expires_at:      decode_dt(&expires_at)?,
        claimed_at:      decode_opt_dt(self.invitation_claimed_at)?,
        temporary_email: self.invitation_email,
      }),
      (IdentityKind::InvitationCode, _, _) => {
        return Err(Error::IncompleteInvitation(self.identity_id));
      }
      (IdentityKind::LinkId, _, _) => None,
    };

    let link_id_scheme = self
      .link_id_scheme
      .as_deref()
      .map(|s| decode_enum::<LinkIdScheme>("link id scheme", s))
      .transpose()?;

    Ok(Identity {
      identity_id: decode_uuid(&self.identity_id)?,
      party_id: decode_uuid(&self.party_id)?,
      kind,
      raw_id_value: self.raw_id_value,
      link_id_scheme,
      invitation,
      name: decode_name(&self.name_json)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const RELATIONSHIP_TYPE_COLUMNS: &str =
  "relationship_type_id, code, short_description, deleted";

/// Raw values read directly from a `relationship_types` row.
pub struct RawRelationshipType {
  pub relationship_type_id: String,
  pub code:                 String,
  pub short_description:    Option<String>,
  pub deleted:              bool,
}

impl RawRelationshipType {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_type_id: row.get(0)?,
      code:                 row.get(1)?,
      short_description:    row.get(2)?,
      deleted:              row.get(3)?,
    })
  }

  pub fn into_relationship_type(self) -> Result<RelationshipType> {
    Ok(RelationshipType {
      relationship_type_id: decode_uuid(&self.relationship_type_id)?,
      code:                 self.code,
      short_description:    self.short_description,
      deleted:              self.deleted,
    })
  }
}

pub const RELATIONSHIP_COLUMNS: &str = "relationship_id, relationship_type_id, \
  subject_party_id, subject_nickname, delegate_party_id, delegate_nickname, \
  start_at, end_at, end_event_at, status, attributes, deleted, created_at, \
  updated_at";

/// Raw values read directly from a `relationships` row.
pub struct RawRelationship {
  pub relationship_id:      String,
  pub relationship_type_id: String,
  pub subject_party_id:     String,
  pub subject_nickname:     Option<String>,
  pub delegate_party_id:    String,
  pub delegate_nickname:    Option<String>,
  pub start_at:             String,
  pub end_at:               Option<String>,
  pub end_event_at:         Option<String>,
  pub status:               String,
  pub attributes:           String,
  pub deleted:              bool,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawRelationship {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_id:      row.get(0)?,
      relationship_type_id: row.get(1)?,
      subject_party_id:     row.get(2)?,
      subject_nickname:     row.get(3)?,
      delegate_party_id:    row.get(4)?,
      delegate_nickname:    row.get(5)?,
      start_at:             row.get(6)?,
      end_at:               row.get(7)?,
      end_event_at:         row.get(8)?,
      status:               row.get(9)?,
      attributes:           row.get(10)?,
      deleted:              row.get(11)?,
      created_at:           row.get(12)?,
      updated_at:           row.get(13)?,
    })
  }

  pub fn into_relationship(self) -> Result<Relationship> {
    Ok(Relationship {
      relationship_id:      decode_uuid(&self.relationship_id)?,
      relationship_type_id: decode_uuid(&self.relationship_type_id)?,
      subject_party_id:     decode_uuid(&self.subject_party_id)?,
      subject_nickname:     self.subject_nickname.as_deref().map(decode_name).transpose()?,
      delegate_party_id:    decode_uuid(&self.delegate_party_id)?,
      delegate_nickname:    self.delegate_nickname.as_deref().map(decode_name).transpose()?,
      start_at:             decode_dt(&self.start_at)?,
      end_at:               decode_opt_dt(self.end_at)?,
      end_event_at:         decode_opt_dt(self.end_event_at)?,
      status:               decode_enum::<RelationshipStatus>("relationship status", &self.status)?,
      attributes:           decode_attributes(&self.attributes)?,
      deleted:              self.deleted,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_ordered() {
    let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::nanoseconds(1_500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn enums_round_trip_through_columns() {
    let s = encode_enum(RelationshipStatus::Invalid);
    assert_eq!(s, "invalid");
    let back: RelationshipStatus = decode_enum("relationship status", s).unwrap();
    assert_eq!(back, RelationshipStatus::Invalid);
    assert!(decode_enum::<RelationshipStatus>("relationship status", "bogus").is_err());
  }
}
