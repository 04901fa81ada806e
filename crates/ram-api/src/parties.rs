//! Handlers for `/parties` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/parties` | Body: `{"kind":"individual"}` |
//! | `GET`  | `/parties/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ram_core::{
  manager::RelationshipManager,
  party::{Party, PartyKind},
  store::AuthorityStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kind: PartyKind,
}

/// `POST /parties`, body: `{"kind":"individual"}`
pub async fn create<S>(
  State(manager): State<RelationshipManager<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AuthorityStore + 'static,
{
  let party = manager.add_party(body.kind).await?;
  Ok((StatusCode::CREATED, Json(party)))
}

/// `GET /parties/:id`
pub async fn get_one<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Party>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let party = manager
    .get_party(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("party {id} not found")))?;
  Ok(Json(party))
}
