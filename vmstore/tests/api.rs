//! End-to-end tests against the full router with an in-memory database.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;
use vmstore::access::{AccessPolicy, ROLE_ADMIN, ROLE_USER};
use vmstore::api::{AppState, app_router};
use vmstore::users;

async fn setup_app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    users::ensure_role(&db, &ROLE_USER).await.unwrap();
    users::ensure_role(&db, &ROLE_ADMIN).await.unwrap();
    app_router(AppState {
        db,
        policy: Arc::new(AccessPolicy::new()),
    })
}

fn request(method: &str, uri: &str, identity: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = identity {
        builder = builder.header("X-Identity-Id", id).header("X-Identity-Role", role);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn template_payload(name: &str, public: bool) -> Value {
    json!({
        "name": name,
        "description": "A classroom VM image",
        "image_id": "018f4e2a-0000-7000-8000-000000000001",
        "public": public,
        "fixed_ram_gb": 2.0,
        "fixed_disk_gb": 20.0,
        "fixed_cores": 2.0,
        "per_user_ram_gb": 1.0,
        "per_user_disk_gb": 5.0,
        "per_user_cores": 0.5,
        "instantiation_attributes": [{"name": "hostname"}]
    })
}

async fn create_template(app: &Router, identity: (&str, &str), name: &str, public: bool) -> Value {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/app-templates",
            Some(identity),
            Some(template_payload(name, public)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn missing_identity_header_is_unauthorized() {
    let app = setup_app().await;

    let response = app
        .oneshot(request("GET", "/api/v1/app-templates", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_needs_no_identity() {
    let app = setup_app().await;

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ordinary_user_creates_a_draft() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Ubuntu Base", false).await;
    assert_eq!(body["name"], "Ubuntu Base");
    assert_eq!(body["version"], 1);
    assert_eq!(body["approved"], false);
    assert_eq!(body["creator_id"], "alice");
    assert_eq!(body["instantiation_attributes"][0]["name"], "hostname");
}

#[tokio::test]
async fn create_without_required_field_is_bad_request() {
    let app = setup_app().await;

    let mut payload = template_payload("Broken", false);
    payload.as_object_mut().unwrap().remove("description");
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/app-templates",
            Some(("alice", "")),
            Some(payload),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Field 'description' is required");
}

#[tokio::test]
async fn duplicate_name_is_conflict() {
    let app = setup_app().await;

    create_template(&app, ("alice", ""), "Taken", false).await;
    let response = app
        .oneshot(request(
            "POST",
            "/api/v1/app-templates",
            Some(("alice", "")),
            Some(template_payload("Taken", false)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn ordinary_user_cannot_approve() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Pending", false).await;
    let id = body["id"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/app-templates/{id}/approve"),
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approval_mints_versioned_releases() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Ubuntu Base", true).await;
    let id = body["id"].as_str().unwrap().to_owned();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/app-templates/{id}/approve"),
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["release"]["name"], "Ubuntu Base-V1");
    assert_eq!(body["release"]["approved"], true);
    assert_eq!(body["draft"]["version"], 2);
    assert_eq!(body["draft"]["public"], false);

    let response = app
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/app-templates/{id}/approve"),
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["release"]["name"], "Ubuntu Base-V2");
}

#[tokio::test]
async fn updating_a_release_is_rejected() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Frozen", false).await;
    let id = body["id"].as_str().unwrap().to_owned();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/app-templates/{id}/approve"),
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let release_id = body["release"]["id"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(request(
            "PUT",
            &format!("/api/v1/app-templates/{release_id}"),
            Some(("alice", "")),
            Some(template_payload("Frozen again", false)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn collision_endpoint_reports_reserved_suffix() {
    let app = setup_app().await;

    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/app-templates/name/Fresh-V2/collisions",
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["collisions"], true);
    assert_eq!(body["reason"], "VERSION_SUFFIX_RESERVED");
}

#[tokio::test]
async fn unapproved_public_drafts_stay_hidden_from_other_users() {
    let app = setup_app().await;

    create_template(&app, ("alice", ""), "Public Draft", true).await;

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/app-templates",
            Some(("bob", "")),
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    // An admin holds the widened base set.
    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/app-templates",
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn soft_deleted_template_returns_not_found() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Doomed", false).await;
    let id = body["id"].as_str().unwrap().to_owned();

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/app-templates/{id}"),
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/app-templates/{id}"),
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorite_add_is_idempotent_over_http() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Liked", false).await;
    let id = body["id"].as_str().unwrap().to_owned();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/favorites",
                Some(("alice", "")),
                Some(json!({"app_template_id": id})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(request("GET", "/api/v1/favorites", Some(("alice", "")), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_self_delete_blocked_with_public_templates() {
    let app = setup_app().await;

    create_template(&app, ("root", "admin"), "Root Public", true).await;

    let response = app
        .oneshot(request(
            "DELETE",
            "/api/v1/users/root",
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_deletes_user_and_inherits_public_templates() {
    let app = setup_app().await;

    let body = create_template(&app, ("alice", ""), "Shared", true).await;
    let id = body["id"].as_str().unwrap().to_owned();

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            "/api/v1/users/alice",
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/app-templates/{id}"),
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["creator_id"], "root");
}

#[tokio::test]
async fn ordinary_user_cannot_list_users() {
    let app = setup_app().await;

    let response = app
        .oneshot(request("GET", "/api/v1/users", Some(("alice", "")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn search_requires_its_own_access_level() {
    let app = setup_app().await;

    // Provision alice, then pin her to a role that clears the plain list
    // threshold but not the search one.
    app.clone()
        .oneshot(request(
            "GET",
            "/api/v1/app-templates",
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/roles",
            Some(("root", "admin")),
            Some(json!({"name": "Viewer", "access_level": 1003})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let role_id = json_body(response).await["id"].as_str().unwrap().to_owned();
    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            "/api/v1/users/alice/role",
            Some(("root", "admin")),
            Some(json!({"role_id": role_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/app-templates",
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "GET",
            "/api/v1/app-templates?search=ubuntu",
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_roles() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/roles",
            Some(("root", "admin")),
            Some(json!({"name": "Auditor", "access_level": 3500})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let role_id = body["id"].as_str().unwrap().to_owned();

    // Duplicate role name.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/roles",
            Some(("root", "admin")),
            Some(json!({"name": "Auditor", "access_level": 3500})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Promote alice into the new role.
    app.clone()
        .oneshot(request(
            "GET",
            "/api/v1/app-templates",
            Some(("alice", "")),
            None,
        ))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            "/api/v1/users/alice/role",
            Some(("root", "admin")),
            Some(json!({"role_id": role_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["role"]["name"], "Auditor");

    // A role in use cannot be deleted.
    let response = app
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/roles/{role_id}"),
            Some(("root", "admin")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
