use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use uuid::Uuid;

use super::dto::{FavoriteRequest, TemplateResponse};
use super::{ApiErr, AppState};
use crate::access::AccessAction;
use crate::favorites;
use crate::identity::{self, Identity};

pub async fn list_favorites(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<TemplateResponse>>, ApiErr> {
    let actor = identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::FavoriteList,
        &Method::GET,
    )
    .await?;
    let list_all = state.policy.allows(
        actor.role.access_level,
        AccessAction::TemplateListAll,
        &Method::GET,
    );
    let rows = favorites::list_for(&state.db, &actor.user, list_all).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<FavoriteRequest>,
) -> Result<StatusCode, ApiErr> {
    let actor = identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::FavoriteAdd,
        &Method::POST,
    )
    .await?;
    favorites::add(&state.db, &actor.user.id, payload.app_template_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    identity: Identity,
    Path(template_id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    let actor = identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::FavoriteRemove,
        &Method::DELETE,
    )
    .await?;
    favorites::remove(&state.db, &actor.user.id, template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
