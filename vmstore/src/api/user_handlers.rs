use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};

use super::dto::{SetRoleRequest, UserResponse};
use super::{ApiErr, AppState};
use crate::access::AccessAction;
use crate::identity::{self, Identity};
use crate::users;

pub async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<UserResponse>>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::UserList,
        &Method::GET,
    )
    .await?;
    let rows = users::list(&state.db).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(user, role)| UserResponse::new(user, role))
            .collect(),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::UserDetail,
        &Method::GET,
    )
    .await?;
    let (user, role) = users::get(&state.db, &id).await?;
    Ok(Json(UserResponse::new(user, Some(role))))
}

pub async fn set_user_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::UserRoleChange,
        &Method::PATCH,
    )
    .await?;
    users::set_role(&state.db, &id, payload.role_id).await?;
    let (user, role) = users::get(&state.db, &id).await?;
    Ok(Json(UserResponse::new(user, Some(role))))
}

pub async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiErr> {
    let actor = identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::UserDelete,
        &Method::DELETE,
    )
    .await?;
    users::delete(&state.db, &id, &actor.user).await?;
    Ok(StatusCode::NO_CONTENT)
}
