//! [`SqliteStore`]: the SQLite implementation of [`AuthorityStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use ram_core::{
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

use crate::{
  Result,
  encode::{
    IDENTITY_COLUMNS, PARTY_COLUMNS, RELATIONSHIP_COLUMNS,
    RELATIONSHIP_TYPE_COLUMNS, RawIdentity, RawParty, RawRelationship,
    RawRelationshipType, encode_attributes, encode_dt, encode_enum,
    encode_name, encode_opt_name, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A RAM store backed by a single SQLite file.
///
/// Clones share one connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one identity matching `condition` (a `WHERE` fragment
  /// with a single `?1` parameter).
  async fn query_identity(
    &self,
    condition: &'static str,
    param: String,
  ) -> Result<Option<Identity>> {
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE {condition} LIMIT 1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![param], RawIdentity::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Row count of `table`.
  pub(crate) async fn count_rows(&self, table: &'static str) -> Result<i64> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
          })?)
        })
        .await?,
    )
  }
}

// ─── AuthorityStore impl ─────────────────────────────────────────────────────

impl AuthorityStore for SqliteStore {
  type Error = crate::Error;

  // ── Parties ───────────────────────────────────────────────────────────────

  async fn add_party(&self, kind: PartyKind) -> Result<Party> {
    let party = Party {
      party_id: Uuid::new_v4(),
      created_at: Utc::now(),
      kind,
    };

    let id_str   = encode_uuid(party.party_id);
    let at_str   = encode_dt(party.created_at);
    let kind_str = encode_enum(kind);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO parties (party_id, created_at, kind) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, at_str, kind_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(party)
  }

  async fn get_party(&self, id: Uuid) -> Result<Option<Party>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawParty> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties WHERE party_id = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawParty::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawParty::into_party).transpose()
  }

  // ── Identities ────────────────────────────────────────────────────────────

  async fn add_identity(&self, input: NewIdentity) -> Result<Option<Identity>> {
    let identity = new_identity(input);
    let row = IdentityRow::encode(&identity)?;

    let inserted = self
      .conn
      .call(move |conn| Ok(row.insert(conn)?))
      .await?;

    Ok((inserted == 1).then_some(identity))
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    self.query_identity("identity_id = ?1", encode_uuid(id)).await
  }

  async fn find_invitation_by_code(&self, code: String) -> Result<Option<Identity>> {
    self
      .query_identity("kind = 'invitation_code' AND raw_id_value = ?1", code)
      .await
  }

  async fn find_invitation_for_party(&self, party_id: Uuid) -> Result<Option<Identity>> {
    self
      .query_identity("kind = 'invitation_code' AND party_id = ?1", encode_uuid(party_id))
      .await
  }

  async fn find_identity_by_id_value(&self, id_value: String) -> Result<Option<Identity>> {
    self.query_identity("id_value = ?1", id_value).await
  }

  async fn set_invitation_email(&self, identity_id: Uuid, email: String) -> Result<bool> {
    let id_str = encode_uuid(identity_id);
    let kind_str = encode_enum(IdentityKind::InvitationCode);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE identities SET invitation_email = ?2
           WHERE identity_id = ?1 AND kind = ?3",
          rusqlite::params![id_str, email, kind_str],
        )?)
      })
      .await?;

    Ok(updated == 1)
  }

  // ── Relationship types ────────────────────────────────────────────────────

  async fn add_relationship_type(
    &self,
    input: NewRelationshipType,
  ) -> Result<RelationshipType> {
    let relationship_type = RelationshipType {
      relationship_type_id: Uuid::new_v4(),
      code:                 input.code,
      short_description:    input.short_description,
      deleted:              false,
    };

    let id_str = encode_uuid(relationship_type.relationship_type_id);
    let code   = relationship_type.code.clone();
    let desc   = relationship_type.short_description.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO relationship_types (relationship_type_id, code, short_description)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, code, desc],
        )?;
        Ok(())
      })
      .await?;

    Ok(relationship_type)
  }

  async fn get_relationship_type(&self, id: Uuid) -> Result<Option<RelationshipType>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRelationshipType> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RELATIONSHIP_TYPE_COLUMNS} FROM relationship_types
           WHERE relationship_type_id = ?1"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawRelationshipType::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRelationshipType::into_relationship_type).transpose()
  }

  async fn list_relationship_types(&self) -> Result<Vec<RelationshipType>> {
    let raws: Vec<RawRelationshipType> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {RELATIONSHIP_TYPE_COLUMNS} FROM relationship_types ORDER BY code"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawRelationshipType::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawRelationshipType::into_relationship_type)
      .collect()
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  async fn create_relationship(&self, creation: Creation) -> Result<Created> {
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

    let party_id_str     = encode_uuid(delegate.party_id);
    let party_at_str     = encode_dt(delegate.created_at);
    let party_kind_str   = encode_enum(delegate.kind);
    let identity_row     = IdentityRow::encode(&invitation)?;
    let relationship_row = RelationshipRow::encode(&relationship)?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO parties (party_id, created_at, kind) VALUES (?1, ?2, ?3)",
          rusqlite::params![party_id_str, party_at_str, party_kind_str],
        )?;
        if identity_row.insert(&tx)? != 1 {
          // Invitation code collision. Dropping `tx` discards the party.
          return Err(rusqlite::Error::StatementChangedRows(0).into());
        }
        relationship_row.insert(&tx)?;

        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(Created { delegate, invitation, relationship })
  }

  async fn get_relationship(&self, id: Uuid) -> Result<Option<Relationship>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRelationship> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE relationship_id = ?1"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawRelationship::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRelationship::into_relationship).transpose()
  }

  async fn find_pending_for_delegate(&self, party_id: Uuid) -> Result<Option<Relationship>> {
    let party_str  = encode_uuid(party_id);
    let status_str = encode_enum(RelationshipStatus::Pending);

    let raw: Option<RawRelationship> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RELATIONSHIP_COLUMNS} FROM relationships
           WHERE delegate_party_id = ?1 AND status = ?2 AND deleted = 0
           ORDER BY created_at DESC, rowid DESC
           LIMIT 1"
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![party_str, status_str], RawRelationship::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRelationship::into_relationship).transpose()
  }

  async fn search_relationships(
    &self,
    query: RelationshipQuery,
  ) -> Result<SearchResult<Relationship>> {
    let party_str = encode_uuid(query.party_id);
    let column = match query.role {
      PartyRole::Subject => "subject_party_id",
      PartyRole::Delegate => "delegate_party_id",
    };
    let limit_val  = i64::from(query.page_size);
    let offset_val = i64::try_from(query.offset()).unwrap_or(i64::MAX);

    let (total, raws): (i64, Vec<RawRelationship>) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM relationships WHERE {column} = ?1 AND deleted = 0"),
          rusqlite::params![party_str],
          |row| row.get(0),
        )?;

        let sql = format!(
          "SELECT {RELATIONSHIP_COLUMNS} FROM relationships
           WHERE {column} = ?1 AND deleted = 0
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![party_str, limit_val, offset_val],
            RawRelationship::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    let list = raws
      .into_iter()
      .map(RawRelationship::into_relationship)
      .collect::<Result<Vec<_>>>()?;

    Ok(SearchResult {
      total_count: u64::try_from(total).unwrap_or(0),
      page: query.page,
      page_size: query.page_size,
      list,
    })
  }

  async fn mark_deleted(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(at);

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE relationships SET deleted = 1, updated_at = ?2
           WHERE relationship_id = ?1 AND deleted = 0",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    Ok(updated == 1)
  }

  // ── Guarded transitions ───────────────────────────────────────────────────

  async fn commit_acceptance(&self, acceptance: Acceptance) -> Result<bool> {
    let rel_str      = encode_uuid(acceptance.relationship_id);
    let identity_str = encode_uuid(acceptance.invitation_identity_id);
    let delegate_str = encode_uuid(acceptance.delegate_party_id);
    let at_str       = encode_dt(acceptance.at);

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let identities = tx.execute(
          "UPDATE identities
           SET invitation_status = ?2, invitation_claimed_at = ?3
           WHERE identity_id = ?1 AND invitation_status = ?4",
          rusqlite::params![
            identity_str,
            encode_enum(InvitationCodeStatus::Claimed),
            at_str,
            encode_enum(InvitationCodeStatus::Pending),
          ],
        )?;
        let relationships = tx.execute(
          "UPDATE relationships
           SET status = ?2, delegate_party_id = ?3, updated_at = ?4
           WHERE relationship_id = ?1 AND status = ?5 AND deleted = 0",
          rusqlite::params![
            rel_str,
            encode_enum(RelationshipStatus::Active),
            delegate_str,
            at_str,
            encode_enum(RelationshipStatus::Pending),
          ],
        )?;

        // Dropping `tx` without committing rolls both updates back.
        if identities == 1 && relationships == 1 {
          tx.commit()?;
          Ok(true)
        } else {
          Ok(false)
        }
      })
      .await?;

    Ok(committed)
  }

  async fn commit_rejection(&self, rejection: Rejection) -> Result<bool> {
    let rel_str      = encode_uuid(rejection.relationship_id);
    let identity_str = encode_uuid(rejection.invitation_identity_id);
    let at_str       = encode_dt(rejection.at);

    let committed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let identities = tx.execute(
          "UPDATE identities SET invitation_status = ?2
           WHERE identity_id = ?1 AND invitation_status = ?3",
          rusqlite::params![
            identity_str,
            encode_enum(InvitationCodeStatus::Rejected),
            encode_enum(InvitationCodeStatus::Pending),
          ],
        )?;
        let relationships = tx.execute(
          "UPDATE relationships SET status = ?2, updated_at = ?3
           WHERE relationship_id = ?1 AND status = ?4 AND deleted = 0",
          rusqlite::params![
            rel_str,
            encode_enum(RelationshipStatus::Invalid),
            at_str,
            encode_enum(RelationshipStatus::Pending),
          ],
        )?;

        if identities == 1 && relationships == 1 {
          tx.commit()?;
          Ok(true)
        } else {
          Ok(false)
        }
      })
      .await?;

    Ok(committed)
  }
}

// ─── Row encoders ────────────────────────────────────────────────────────────

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

/// An [`Identity`] encoded into column values, ready to move into a
/// connection closure.
struct IdentityRow {
  identity_id:  String,
  party_id:     String,
  kind:         &'static str,
  raw_id_value: String,
  id_value:     String,
  scheme:       Option<&'static str>,
  inv_status:   Option<&'static str>,
  inv_expires:  Option<String>,
  inv_claimed:  Option<String>,
  inv_email:    Option<String>,
  name_json:    String,
  created_at:   String,
}

impl IdentityRow {
  fn encode(identity: &Identity) -> Result<Self> {
    let inv = identity.invitation.as_ref();
    Ok(Self {
      identity_id:  encode_uuid(identity.identity_id),
      party_id:     encode_uuid(identity.party_id),
      kind:         encode_enum(identity.kind),
      raw_id_value: identity.raw_id_value.clone(),
      id_value:     identity.id_value(),
      scheme:       identity.link_id_scheme.map(encode_enum),
      inv_status:   inv.map(|i| encode_enum(i.status)),
      inv_expires:  inv.map(|i| encode_dt(i.expires_at)),
      inv_claimed:  inv.and_then(|i| i.claimed_at).map(encode_dt),
      inv_email:    inv.and_then(|i| i.temporary_email.clone()),
      name_json:    encode_name(&identity.name)?,
      created_at:   encode_dt(identity.created_at),
    })
  }

  /// Returns the number of rows written: 0 when the `id_value` is taken.
  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO identities (
         identity_id, party_id, kind, raw_id_value, id_value,
         link_id_scheme, invitation_status, invitation_expires_at,
         invitation_claimed_at, invitation_email, name_json, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
       ON CONFLICT(id_value) DO NOTHING",
      rusqlite::params![
        self.identity_id,
        self.party_id,
        self.kind,
        self.raw_id_value,
        self.id_value,
        self.scheme,
        self.inv_status,
        self.inv_expires,
        self.inv_claimed,
        self.inv_email,
        self.name_json,
        self.created_at,
      ],
    )
  }
}

struct RelationshipRow {
  relationship_id:      String,
  relationship_type_id: String,
  subject_party_id:     String,
  subject_nickname:     Option<String>,
  delegate_party_id:    String,
  delegate_nickname:    Option<String>,
  start_at:             String,
  end_at:               Option<String>,
  end_event_at:         Option<String>,
  status:               &'static str,
  attributes:           String,
  created_at:           String,
}

impl RelationshipRow {
  fn encode(relationship: &Relationship) -> Result<Self> {
    Ok(Self {
      relationship_id:      encode_uuid(relationship.relationship_id),
      relationship_type_id: encode_uuid(relationship.relationship_type_id),
      subject_party_id:     encode_uuid(relationship.subject_party_id),
      subject_nickname:     encode_opt_name(relationship.subject_nickname.as_ref())?,
      delegate_party_id:    encode_uuid(relationship.delegate_party_id),
      delegate_nickname:    encode_opt_name(relationship.delegate_nickname.as_ref())?,
      start_at:             encode_dt(relationship.start_at),
      end_at:               relationship.end_at.map(encode_dt),
      end_event_at:         relationship.end_event_at.map(encode_dt),
      status:               encode_enum(relationship.status),
      attributes:           encode_attributes(&relationship.attributes)?,
      created_at:           encode_dt(relationship.created_at),
    })
  }

  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO relationships (
         relationship_id, relationship_type_id, subject_party_id,
         subject_nickname, delegate_party_id, delegate_nickname,
         start_at, end_at, end_event_at, status, attributes,
         created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
      rusqlite::params![
        self.relationship_id,
        self.relationship_type_id,
        self.subject_party_id,
        self.subject_nickname,
        self.delegate_party_id,
        self.delegate_nickname,
        self.start_at,
        self.end_at,
        self.end_event_at,
        self.status,
        self.attributes,
        self.created_at,
      ],
    )
  }
}
