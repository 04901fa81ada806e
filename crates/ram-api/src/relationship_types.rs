//! Handlers for `/relationship-types` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ram_core::{
  manager::RelationshipManager,
  relationship::{NewRelationshipType, RelationshipType},
  store::AuthorityStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /relationship-types`. Retired types are omitted.
pub async fn list<S>(
  State(manager): State<RelationshipManager<S>>,
) -> Result<Json<Vec<RelationshipType>>, ApiError>
where
  S: AuthorityStore + 'static,
{
  Ok(Json(manager.list_relationship_types().await?))
}

/// `POST /relationship-types`, body: `{"code":"...","short_description":"..."}`
pub async fn create<S>(
  State(manager): State<RelationshipManager<S>>,
  Json(body): Json<NewRelationshipType>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship_type = manager.add_relationship_type(body).await?;
  Ok((StatusCode::CREATED, Json(relationship_type)))
}

/// `GET /relationship-types/:id`
pub async fn get_one<S>(
  State(manager): State<RelationshipManager<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RelationshipType>, ApiError>
where
  S: AuthorityStore + 'static,
{
  let relationship_type = manager
    .find_valid_relationship_type(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("relationship type {id} not found")))?;
  Ok(Json(relationship_type))
}
