//! Handlers for `/relationship` and `/relationships` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/relationship` | Body: [`NewRelationship`]; returns 201 + invitation code |
//! | `GET`    | `/relationship/:id` | 404 if absent or deleted |
//! | `DELETE` | `/relationship/:id` | Logical delete |
//! | `GET`    | `/relationship/invitation-code/:code` | Pending and unexpired only |
//! | `POST`   | `/relationship/invitation-code/:code/accept` | Body: `{"identity_id":"..."}` |
//! | `POST`   | `/relationship/invitation-code/:code/reject` | |
//! | `POST`   | `/relationship/invitation-code/:code/notify-delegate` | Body: `{"email":"..."}` |
//! | `GET`    | `/relationships/:role/identity/:identity_id` | `role` is `subject` or `delegate`; `?page&page_size` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::Utc;
use ram_core::{
  Error as CoreError,
  manager::RelationshipManager,
  relationship::{
    CreatedRelationship, NewRelationship, PartyFilter, PartyRole, Relationship,
    RelationshipRef, SearchResult,
  },
  store::AuthorityStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /relationship`
pub async fn create<S>(
  State(manager): State<RelationshipManager<S>>,
  Json(body): Json<NewRelationship>,
) -> Result<(StatusCode, Json<CreatedRelationship>), ApiError>
where
  S: AuthorityStore + 'static,
{
  let created = manager.create(body).await?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── By identifier ────────────────────────────────────────────────────────────

/// `GET /relationship/:id`
pub async fn get_one<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Relationship>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship = manager
    .find_by_identifier(id)
    .await?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(relationship))
}

/// `DELETE /relationship/:id`
pub async fn delete_one<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Relationship>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship = manager.delete(id).await?.ok_or_else(|| not_found(id))?;
  Ok(Json(relationship))
}

// ─── By invitation code ───────────────────────────────────────────────────────

/// `GET /relationship/invitation-code/:code`
pub async fn get_by_code<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(code): Path<String>,
) -> Result<Json<Relationship>, ApiError>
where
  S: AuthorityStore + 'static,
{
  Ok(Json(pending_by_code(&manager, &code).await?))
}

#[derive(Debug, Deserialize)]
pub struct AcceptBody {
  /// The linked identity claiming the invitation.
  pub identity_id: Uuid,
}

/// `POST /relationship/invitation-code/:code/accept`
pub async fn accept<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(code): Path<String>,
  Json(body): Json<AcceptBody>,
) -> Result<Json<Relationship>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship = pending_by_code(&manager, &code).await?;
  let accepting = manager
    .get_identity(body.identity_id)
    .await?
    .ok_or(CoreError::IdentityNotFound(body.identity_id))?;
  let accepted = manager
    .accept_pending_invitation(&relationship, &accepting)
    .await?;
  Ok(Json(accepted))
}

/// `POST /relationship/invitation-code/:code/reject`
pub async fn reject<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(code): Path<String>,
) -> Result<Json<Relationship>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship = pending_by_code(&manager, &code).await?;
  Ok(Json(manager.reject_pending_invitation(&relationship).await?))
}

#[derive(Debug, Deserialize)]
pub struct NotifyBody {
  pub email: String,
}

/// `POST /relationship/invitation-code/:code/notify-delegate`
pub async fn notify_delegate<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(code): Path<String>,
  Json(body): Json<NotifyBody>,
) -> Result<Json<Relationship>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship = pending_by_code(&manager, &code).await?;
  Ok(Json(manager.notify_delegate(&relationship, &body.email).await?))
}

// ─── Search ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  /// 1-based. Defaults to the first page.
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /relationships/:role/identity/:identity_id[?page=..][&page_size=..]`
///
/// `identity_id` is the scoped id value, e.g. `LINK_ID:MY_GOV:abc123`.
pub async fn search<S>(
  State(manager): State<RelationshipManager<S>>,
  Path((role, identity_id)): Path<(PartyRole, String)>,
  Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult<RelationshipRef>>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let result = manager
    .search(
      PartyFilter::new(role, identity_id),
      params.page.unwrap_or(1),
      params.page_size,
    )
    .await?;
  Ok(Json(result))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

async fn pending_by_code<S: AuthorityStore>(
  manager: &RelationshipManager<S>,
  code: &str,
) -> Result<Relationship, ApiError> {
  manager
    .find_pending_by_invitation_code_in_date_range(code, Utc::now())
    .await?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no pending relationship for invitation code {code}"))
    })
}

fn not_found(id: Uuid) -> ApiError {
  ApiError::NotFound(format!("relationship {id} not found"))
}
