use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use super::dto::{RoleRequest, RoleResponse};
use super::{ApiErr, AppState};
use crate::access::AccessAction;
use crate::entity::role;
use crate::identity::{self, Identity};

pub async fn list_roles(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<RoleResponse>>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::RoleList,
        &Method::GET,
    )
    .await?;
    let roles = role::Entity::find()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}

pub async fn get_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<RoleResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::RoleDetail,
        &Method::GET,
    )
    .await?;
    let role = role::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found(format!("Role {id} not found")))?;
    Ok(Json(role.into()))
}

pub async fn create_role(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<RoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::RoleCreate,
        &Method::POST,
    )
    .await?;
    if payload.name.trim().is_empty() {
        return Err(ApiErr::new(
            StatusCode::BAD_REQUEST,
            "Field 'name' is required",
        ));
    }

    let now = Utc::now().naive_utc();
    let inserted = role::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(payload.name.clone()),
        access_level: Set(payload.access_level),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("UNIQUE") || msg.contains("unique") {
            ApiErr::conflict(format!("Role with name '{}' already exists", payload.name))
        } else {
            ApiErr::internal(e)
        }
    })?;
    Ok((StatusCode::CREATED, Json(inserted.into())))
}

pub async fn update_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<RoleResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::RoleUpdate,
        &Method::PUT,
    )
    .await?;
    let role = role::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found(format!("Role {id} not found")))?;

    let mut active: role::ActiveModel = role.into();
    active.name = Set(payload.name.clone());
    active.access_level = Set(payload.access_level);
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&state.db).await.map_err(|e| {
        let msg = e.to_string();
        if msg.contains("UNIQUE") || msg.contains("unique") {
            ApiErr::conflict(format!("Role with name '{}' already exists", payload.name))
        } else {
            ApiErr::internal(e)
        }
    })?;
    Ok(Json(updated.into()))
}

pub async fn delete_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::RoleDelete,
        &Method::DELETE,
    )
    .await?;
    // The user FK restricts deletion of a role still in use.
    let result = role::Entity::delete_by_id(id)
        .exec(&state.db)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("FOREIGN KEY") || msg.contains("foreign key") {
                ApiErr::conflict("Role is still assigned to users")
            } else {
                ApiErr::internal(e)
            }
        })?;
    if result.rows_affected == 0 {
        return Err(ApiErr::not_found(format!("Role {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
