//! User provisioning and administration.
//!
//! Users are shadows of externally authenticated identities: rows come
//! into existence on first request, with a role derived from the identity
//! provider's role hint. Local state is only the role assignment and the
//! favorites/ownership graph hanging off the id.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::access::{self, RoleSeed};
use crate::entity::{app_template, role, user};
use crate::error::Error;

/// Get a role row by name, creating it from the seed when absent.
pub async fn ensure_role(db: &DatabaseConnection, seed: &RoleSeed) -> Result<role::Model, Error> {
    if let Some(existing) = role::Entity::find()
        .filter(role::Column::Name.eq(seed.name))
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    let now = Utc::now().naive_utc();
    let inserted = role::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(seed.name.to_owned()),
        access_level: Set(seed.access_level),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await;
    match inserted {
        Ok(role) => Ok(role),
        // Concurrent provisioning can win the insert; re-read in that case.
        Err(err) => role::Entity::find()
            .filter(role::Column::Name.eq(seed.name))
            .one(db)
            .await?
            .ok_or(Error::Db(err)),
    }
}

/// Look up a user by external id, provisioning the row (and its default
/// role) on first sight. Returns the user together with its role.
pub async fn get_or_create(
    db: &DatabaseConnection,
    external_id: &str,
    role_hint: &str,
) -> Result<(user::Model, role::Model), Error> {
    if let Some(existing) = user::Entity::find_by_id(external_id)
        .filter(user::Column::Deleted.eq(false))
        .one(db)
        .await?
    {
        let role = role::Entity::find_by_id(existing.role_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found(format!("Role {}", existing.role_id)))?;
        return Ok((existing, role));
    }

    let seed = access::default_role_for_hint(role_hint);
    let role = ensure_role(db, &seed).await?;

    let now = Utc::now().naive_utc();
    let inserted = user::ActiveModel {
        id: Set(external_id.to_owned()),
        role_id: Set(role.id),
        deleted: Set(false),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await;
    match inserted {
        Ok(user) => Ok((user, role)),
        // Two first requests of the same identity can race; the loser
        // re-reads the winner's row.
        Err(err) => {
            let existing = user::Entity::find_by_id(external_id)
                .filter(user::Column::Deleted.eq(false))
                .one(db)
                .await?
                .ok_or(Error::Db(err))?;
            let role = role::Entity::find_by_id(existing.role_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("Role {}", existing.role_id)))?;
            Ok((existing, role))
        }
    }
}

/// Fetch one non-deleted user with its role.
pub async fn get(
    db: &DatabaseConnection,
    id: &str,
) -> Result<(user::Model, role::Model), Error> {
    let user = user::Entity::find_by_id(id)
        .filter(user::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {id}")))?;
    let role = role::Entity::find_by_id(user.role_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("Role {}", user.role_id)))?;
    Ok((user, role))
}

/// List all non-deleted users with their roles.
pub async fn list(
    db: &DatabaseConnection,
) -> Result<Vec<(user::Model, Option<role::Model>)>, Error> {
    Ok(user::Entity::find()
        .filter(user::Column::Deleted.eq(false))
        .find_also_related(role::Entity)
        .all(db)
        .await?)
}

/// Assign an existing role to an existing user.
pub async fn set_role(
    db: &DatabaseConnection,
    user_id: &str,
    role_id: Uuid,
) -> Result<user::Model, Error> {
    let user = user::Entity::find_by_id(user_id)
        .filter(user::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {user_id}")))?;
    role::Entity::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("Role {role_id}")))?;

    let mut active: user::ActiveModel = user.into();
    active.role_id = Set(role_id);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

/// Remove a user and resolve ownership of their templates.
///
/// Private templates go with the user; public ones survive with their
/// creator re-pointed to the acting administrator. An administrator
/// cannot remove themselves while they still own public templates, since
/// re-pointing to the actor would be a no-op and the templates would be
/// orphaned in spirit.
pub async fn delete(
    db: &DatabaseConnection,
    target_id: &str,
    actor: &user::Model,
) -> Result<(), Error> {
    let txn = db.begin().await?;

    let target = user::Entity::find_by_id(target_id)
        .filter(user::Column::Deleted.eq(false))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {target_id}")))?;

    let owned = app_template::Entity::find()
        .filter(app_template::Column::CreatorId.eq(target.id.as_str()))
        .filter(app_template::Column::Deleted.eq(false))
        .all(&txn)
        .await?;
    let (public, private): (Vec<_>, Vec<_>) = owned.into_iter().partition(|t| t.public);

    if actor.id == target.id && !public.is_empty() {
        return Err(Error::validation(
            "Cannot delete own user while public templates exist; delete or transfer them first",
        ));
    }

    if !private.is_empty() {
        let ids: Vec<Uuid> = private.iter().map(|t| t.id).collect();
        app_template::Entity::delete_many()
            .filter(app_template::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;
    }

    let now = Utc::now().naive_utc();
    for template in public {
        let mut active: app_template::ActiveModel = template.into();
        active.creator_id = Set(Some(actor.id.clone()));
        active.updated_at = Set(now);
        active.update(&txn).await?;
    }

    user::Entity::delete_by_id(target.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}
