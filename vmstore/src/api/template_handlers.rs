use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use super::dto::{ApproveResponse, CollisionResponse, TemplateDetailResponse, TemplateResponse};
use super::{ApiErr, AppState};
use crate::access::AccessAction;
use crate::entity::{app_template, user};
use crate::identity::{self, Identity};
use crate::{naming, templates};

async fn detail_response(
    db: &DatabaseConnection,
    template: app_template::Model,
) -> Result<TemplateDetailResponse, ApiErr> {
    let (instantiation, account, groups) = templates::attributes(db, template.id).await?;
    Ok(TemplateDetailResponse {
        template: template.into(),
        instantiation_attributes: instantiation.into_iter().map(Into::into).collect(),
        account_attributes: account.into_iter().map(Into::into).collect(),
        security_groups: groups.into_iter().map(Into::into).collect(),
    })
}

fn visible_to(template: &app_template::Model, user: &user::Model, list_all: bool) -> bool {
    template.creator_id.as_deref() == Some(user.id.as_str())
        || (template.public && (list_all || template.approved))
}

pub async fn list_templates(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<templates::TemplateQuery>,
) -> Result<Json<Vec<TemplateResponse>>, ApiErr> {
    // A search-narrowed list sits one level above the plain list.
    let action = if query.search.as_deref().is_some_and(|s| !s.is_empty()) {
        AccessAction::TemplateSearch
    } else {
        AccessAction::TemplateList
    };
    let actor = identity::require(&state.db, &state.policy, &identity, action, &Method::GET).await?;
    let list_all = state.policy.allows(
        actor.role.access_level,
        AccessAction::TemplateListAll,
        &Method::GET,
    );
    let rows = templates::list(&state.db, &actor.user, list_all, &query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn create_template(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<templates::TemplatePayload>,
) -> Result<(StatusCode, Json<TemplateDetailResponse>), ApiErr> {
    let actor = identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateCreate,
        &Method::POST,
    )
    .await?;
    let template = templates::create(&state.db, &payload, &actor.user).await?;
    let detail = detail_response(&state.db, template).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_template(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateDetailResponse>, ApiErr> {
    let actor = identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateDetail,
        &Method::GET,
    )
    .await?;
    let template = templates::get(&state.db, id).await?;
    let list_all = state.policy.allows(
        actor.role.access_level,
        AccessAction::TemplateListAll,
        &Method::GET,
    );
    // Invisible rows 404 rather than 403, so existence is not leaked.
    if !visible_to(&template, &actor.user, list_all) {
        return Err(ApiErr::not_found(format!("AppTemplate {id} not found")));
    }
    Ok(Json(detail_response(&state.db, template).await?))
}

pub async fn update_template(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<templates::TemplatePayload>,
) -> Result<Json<TemplateDetailResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateUpdate,
        &Method::PUT,
    )
    .await?;
    let template = templates::update(&state.db, id, &payload).await?;
    Ok(Json(detail_response(&state.db, template).await?))
}

pub async fn delete_template(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateDelete,
        &Method::DELETE,
    )
    .await?;
    templates::soft_delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn approve_template(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApproveResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateApprove,
        &Method::PATCH,
    )
    .await?;
    let (release, draft) = templates::approve(&state.db, id).await?;
    Ok(Json(ApproveResponse {
        release: release.into(),
        draft: draft.into(),
    }))
}

pub async fn reject_template(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateReject,
        &Method::PATCH,
    )
    .await?;
    let template = templates::reject(&state.db, id).await?;
    Ok(Json(template.into()))
}

pub async fn check_collisions(
    State(state): State<AppState>,
    identity: Identity,
    Path(name): Path<String>,
) -> Result<Json<CollisionResponse>, ApiErr> {
    identity::require(
        &state.db,
        &state.policy,
        &identity,
        AccessAction::TemplateCollisionCheck,
        &Method::GET,
    )
    .await?;
    let collision = naming::check_name_collision(&state.db, &name).await?;
    Ok(Json(collision.into()))
}
