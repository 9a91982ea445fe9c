//! Request identity and the authorization gate.
//!
//! Token validation happens at the gateway in front of this service; by
//! the time a request arrives here it carries the already-verified
//! identity in two headers. `X-Identity-Id` is mandatory, `X-Identity-Role`
//! is a free-form hint only consulted when the user is first provisioned.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use sea_orm::DatabaseConnection;

use crate::access::{AccessAction, AccessPolicy};
use crate::entity::{role, user};
use crate::error::Error;
use crate::users;

pub const IDENTITY_ID_HEADER: &str = "x-identity-id";
pub const IDENTITY_ROLE_HEADER: &str = "x-identity-role";

/// The verified caller identity as asserted by the gateway.
#[derive(Clone, Debug)]
pub struct Identity {
    pub external_id: String,
    pub role_hint: String,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let external_id = parts
            .headers
            .get(IDENTITY_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing X-Identity-Id header".to_owned(),
            ))?
            .to_owned();
        let role_hint = parts
            .headers
            .get(IDENTITY_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_owned();
        Ok(Self {
            external_id,
            role_hint,
        })
    }
}

/// A provisioned caller: the local user row and its role.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user: user::Model,
    pub role: role::Model,
}

/// Resolve the identity to a local user (provisioning on first sight) and
/// check its access level against the policy table for the given pair.
pub async fn require(
    db: &DatabaseConnection,
    policy: &AccessPolicy,
    identity: &Identity,
    action: AccessAction,
    verb: &Method,
) -> Result<Actor, Error> {
    let (user, role) = users::get_or_create(db, &identity.external_id, &identity.role_hint).await?;
    if !policy.allows(role.access_level, action, verb) {
        return Err(Error::Forbidden(format!(
            "Access level of user {} not sufficient",
            user.id
        )));
    }
    Ok(Actor { user, role })
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn require_provisions_and_gates_by_level() {
        let db = setup_db().await;
        let policy = AccessPolicy::new();

        let plain = Identity {
            external_id: "alice".to_owned(),
            role_hint: String::new(),
        };
        let actor = require(&db, &policy, &plain, AccessAction::TemplateList, &Method::GET)
            .await
            .unwrap();
        assert_eq!(actor.user.id, "alice");

        let err = require(
            &db,
            &policy,
            &plain,
            AccessAction::TemplateApprove,
            &Method::PATCH,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let admin = Identity {
            external_id: "root".to_owned(),
            role_hint: "admin".to_owned(),
        };
        require(
            &db,
            &policy,
            &admin,
            AccessAction::TemplateApprove,
            &Method::PATCH,
        )
        .await
        .unwrap();
    }
}
