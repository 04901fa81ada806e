//! Handlers for `/identities` endpoints.
//!
//! Only linked identities are created here; invitation codes are issued by
//! relationship creation.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ram_core::{
  identity::{Identity, NewLinkIdentity},
  manager::RelationshipManager,
  store::AuthorityStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `POST /identities`, body: [`NewLinkIdentity`]
pub async fn create<S>(
  State(manager): State<RelationshipManager<S>>,
  Json(body): Json<NewLinkIdentity>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AuthorityStore + 'static,
{
  let identity = manager.add_link_identity(body).await?;
  Ok((StatusCode::CREATED, Json(identity)))
}

/// `GET /identities/:id`
pub async fn get_one<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Identity>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let identity = manager
    .get_identity(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("identity {id} not found")))?;
  Ok(Json(identity))
}
