//! Per-user favorites over templates. Adding is idempotent; listing goes
//! through the same visibility filter as the template list, so a stale
//! favorite on a template the user can no longer see simply drops out.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use crate::entity::{app_template, favorite, user};
use crate::error::Error;
use crate::templates;

async fn find_pair(
    db: &DatabaseConnection,
    user_id: &str,
    template_id: Uuid,
) -> Result<Option<favorite::Model>, Error> {
    Ok(favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::AppTemplateId.eq(template_id))
        .one(db)
        .await?)
}

/// Mark a template as a favorite. Returns the existing row when the pair
/// is already registered.
pub async fn add(
    db: &DatabaseConnection,
    user_id: &str,
    template_id: Uuid,
) -> Result<favorite::Model, Error> {
    // Soft-deleted templates cannot gain new favorites.
    templates::get(db, template_id).await?;

    if let Some(existing) = find_pair(db, user_id, template_id).await? {
        return Ok(existing);
    }

    let inserted = favorite::ActiveModel {
        id: Set(Uuid::now_v7()),
        user_id: Set(user_id.to_owned()),
        app_template_id: Set(template_id),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await;
    match inserted {
        Ok(favorite) => Ok(favorite),
        // The unique (user, template) index catches a concurrent add; the
        // pair read back is the winner's row.
        Err(err) => find_pair(db, user_id, template_id)
            .await?
            .ok_or(Error::Db(err)),
    }
}

/// Remove a favorite pair.
pub async fn remove(
    db: &DatabaseConnection,
    user_id: &str,
    template_id: Uuid,
) -> Result<(), Error> {
    let result = favorite::Entity::delete_many()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::AppTemplateId.eq(template_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found(format!(
            "Favorite for template {template_id}"
        )));
    }
    Ok(())
}

/// List the user's favorited templates, restricted to what the user may
/// currently see.
pub async fn list_for(
    db: &DatabaseConnection,
    user: &user::Model,
    list_all: bool,
) -> Result<Vec<app_template::Model>, Error> {
    Ok(app_template::Entity::find()
        .join(JoinType::InnerJoin, app_template::Relation::Favorite.def())
        .filter(favorite::Column::UserId.eq(user.id.as_str()))
        .filter(templates::visible_condition(&user.id, list_all))
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplatePayload;
    use crate::users;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, PaginatorTrait};

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn payload(name: &str, public: bool) -> TemplatePayload {
        TemplatePayload {
            name: Some(name.to_owned()),
            description: Some("d".to_owned()),
            image_id: Some(Uuid::now_v7()),
            public,
            fixed_ram_gb: Some(1.0),
            fixed_disk_gb: Some(10.0),
            fixed_cores: Some(1.0),
            per_user_ram_gb: Some(0.5),
            per_user_disk_gb: Some(5.0),
            per_user_cores: Some(0.5),
            ..TemplatePayload::default()
        }
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let db = setup_db().await;
        let (alice, _) = users::get_or_create(&db, "alice", "").await.unwrap();
        let (bob, _) = users::get_or_create(&db, "bob", "").await.unwrap();
        let template = templates::create(&db, &payload("Shared", true), &alice)
            .await
            .unwrap();

        let first = add(&db, &bob.id, template.id).await.unwrap();
        let second = add(&db, &bob.id, template.id).await.unwrap();
        assert_eq!(first.id, second.id);

        let rows = favorite::Entity::find()
            .filter(favorite::Column::UserId.eq("bob"))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn add_rejects_missing_template() {
        let db = setup_db().await;
        let (alice, _) = users::get_or_create(&db, "alice", "").await.unwrap();

        let err = add(&db, &alice.id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_missing_pair_is_not_found() {
        let db = setup_db().await;
        let (alice, _) = users::get_or_create(&db, "alice", "").await.unwrap();
        let template = templates::create(&db, &payload("Mine", false), &alice)
            .await
            .unwrap();

        remove(&db, &alice.id, template.id).await.unwrap();
        let err = remove(&db, &alice.id, template.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_applies_the_visibility_filter() {
        let db = setup_db().await;
        let (alice, _) = users::get_or_create(&db, "alice", "").await.unwrap();
        let (bob, _) = users::get_or_create(&db, "bob", "").await.unwrap();

        // Public but unapproved: bob can favorite it only while it is
        // visible to him, so insert the pair directly.
        let draft = templates::create(&db, &payload("Draft", true), &alice)
            .await
            .unwrap();
        favorite::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(bob.id.clone()),
            app_template_id: Set(draft.id),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&db)
        .await
        .unwrap();

        let plain = list_for(&db, &bob, false).await.unwrap();
        assert!(plain.is_empty());

        let widened = list_for(&db, &bob, true).await.unwrap();
        assert_eq!(widened.len(), 1);
        assert_eq!(widened[0].name, "Draft");
    }
}
