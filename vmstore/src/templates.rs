//! Template lifecycle: create, update, approve, reject, soft delete and
//! the visibility-filtered query path.
//!
//! Approval never flips a draft in place. It clones the whole aggregate
//! into a new, immutable release row named `<draft>-V<version>` and bumps
//! the draft's version counter, so history stays addressable while the
//! draft keeps evolving.

use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entity::{
    account_attribute, app_template, favorite, instantiation_attribute, security_group, user,
};
use crate::error::Error;
use crate::naming;

// ---------- payloads ----------

#[derive(Clone, Debug, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
}

/// Full template representation accepted by create and update.
///
/// Update is reset-on-omit: defaultable fields omitted from the payload
/// revert to their declared default instead of staying unchanged. The
/// attribute collections are replaced wholesale when supplied and left
/// alone when absent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TemplatePayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub instantiation_notice: Option<String>,
    pub script: Option<String>,
    pub image_id: Option<Uuid>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub ssh_user_requested: bool,
    pub volume_size_gb: Option<f64>,
    pub fixed_ram_gb: Option<f64>,
    pub fixed_disk_gb: Option<f64>,
    pub fixed_cores: Option<f64>,
    pub per_user_ram_gb: Option<f64>,
    pub per_user_disk_gb: Option<f64>,
    pub per_user_cores: Option<f64>,
    pub instantiation_attributes: Option<Vec<AttributeSpec>>,
    pub account_attributes: Option<Vec<AttributeSpec>>,
    pub security_groups: Option<Vec<AttributeSpec>>,
}

/// Optional narrowing of the visible-template base set. Never widens it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub search: Option<String>,
    pub public: Option<bool>,
    pub approved: Option<bool>,
}

fn required<T: Clone>(value: &Option<T>, field: &str) -> Result<T, Error> {
    value
        .clone()
        .ok_or_else(|| Error::validation(format!("Field '{field}' is required")))
}

struct ValidatedFields {
    name: String,
    description: String,
    image_id: Uuid,
    fixed_ram_gb: f64,
    fixed_disk_gb: f64,
    fixed_cores: f64,
    per_user_ram_gb: f64,
    per_user_disk_gb: f64,
    per_user_cores: f64,
}

fn validate(payload: &TemplatePayload) -> Result<ValidatedFields, Error> {
    let name = required(&payload.name, "name")?;
    if name.trim().is_empty() {
        return Err(Error::validation("Field 'name' is required"));
    }
    Ok(ValidatedFields {
        name,
        description: required(&payload.description, "description")?,
        image_id: required(&payload.image_id, "image_id")?,
        fixed_ram_gb: required(&payload.fixed_ram_gb, "fixed_ram_gb")?,
        fixed_disk_gb: required(&payload.fixed_disk_gb, "fixed_disk_gb")?,
        fixed_cores: required(&payload.fixed_cores, "fixed_cores")?,
        per_user_ram_gb: required(&payload.per_user_ram_gb, "per_user_ram_gb")?,
        per_user_disk_gb: required(&payload.per_user_disk_gb, "per_user_disk_gb")?,
        per_user_cores: required(&payload.per_user_cores, "per_user_cores")?,
    })
}

// ---------- attribute collections ----------

async fn insert_instantiation_attributes<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
    attrs: &[AttributeSpec],
) -> Result<(), Error> {
    for attr in attrs {
        instantiation_attribute::ActiveModel {
            id: Set(Uuid::now_v7()),
            app_template_id: Set(template_id),
            name: Set(attr.name.clone()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn insert_account_attributes<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
    attrs: &[AttributeSpec],
) -> Result<(), Error> {
    for attr in attrs {
        account_attribute::ActiveModel {
            id: Set(Uuid::now_v7()),
            app_template_id: Set(template_id),
            name: Set(attr.name.clone()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn insert_security_groups<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
    attrs: &[AttributeSpec],
) -> Result<(), Error> {
    for attr in attrs {
        security_group::ActiveModel {
            id: Set(Uuid::now_v7()),
            app_template_id: Set(template_id),
            name: Set(attr.name.clone()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn replace_instantiation_attributes<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
    attrs: &[AttributeSpec],
) -> Result<(), Error> {
    instantiation_attribute::Entity::delete_many()
        .filter(instantiation_attribute::Column::AppTemplateId.eq(template_id))
        .exec(db)
        .await?;
    insert_instantiation_attributes(db, template_id, attrs).await
}

async fn replace_account_attributes<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
    attrs: &[AttributeSpec],
) -> Result<(), Error> {
    account_attribute::Entity::delete_many()
        .filter(account_attribute::Column::AppTemplateId.eq(template_id))
        .exec(db)
        .await?;
    insert_account_attributes(db, template_id, attrs).await
}

async fn replace_security_groups<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
    attrs: &[AttributeSpec],
) -> Result<(), Error> {
    security_group::Entity::delete_many()
        .filter(security_group::Column::AppTemplateId.eq(template_id))
        .exec(db)
        .await?;
    insert_security_groups(db, template_id, attrs).await
}

/// Fetch the three attribute collections of a template.
pub async fn attributes<C: ConnectionTrait>(
    db: &C,
    template_id: Uuid,
) -> Result<
    (
        Vec<instantiation_attribute::Model>,
        Vec<account_attribute::Model>,
        Vec<security_group::Model>,
    ),
    Error,
> {
    let instantiation = instantiation_attribute::Entity::find()
        .filter(instantiation_attribute::Column::AppTemplateId.eq(template_id))
        .all(db)
        .await?;
    let account = account_attribute::Entity::find()
        .filter(account_attribute::Column::AppTemplateId.eq(template_id))
        .all(db)
        .await?;
    let groups = security_group::Entity::find()
        .filter(security_group::Column::AppTemplateId.eq(template_id))
        .all(db)
        .await?;
    Ok((instantiation, account, groups))
}

// ---------- lookups ----------

async fn find_active<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<app_template::Model, Error> {
    app_template::Entity::find_by_id(id)
        .filter(app_template::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("AppTemplate {id}")))
}

/// Fetch one non-deleted template.
pub async fn get<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<app_template::Model, Error> {
    find_active(db, id).await
}

// ---------- lifecycle operations ----------

/// Create a draft template plus its attribute collections and an automatic
/// favorite for the creator, in one transaction.
pub async fn create(
    db: &DatabaseConnection,
    payload: &TemplatePayload,
    creator: &user::Model,
) -> Result<app_template::Model, Error> {
    let fields = validate(payload)?;

    let collision = naming::check_name_collision(db, &fields.name).await?;
    if collision.colliding() {
        return Err(Error::Collision(collision));
    }

    let now = Utc::now().naive_utc();
    let id = Uuid::now_v7();

    let txn = db.begin().await?;

    let template = app_template::ActiveModel {
        id: Set(id),
        name: Set(fields.name),
        description: Set(fields.description),
        short_description: Set(payload.short_description.clone()),
        instantiation_notice: Set(payload.instantiation_notice.clone()),
        script: Set(payload.script.clone()),
        image_id: Set(fields.image_id),
        version: Set(1),
        public: Set(payload.public),
        approved: Set(false),
        creator_id: Set(Some(creator.id.clone())),
        fixed_ram_gb: Set(fields.fixed_ram_gb),
        fixed_disk_gb: Set(fields.fixed_disk_gb),
        fixed_cores: Set(fields.fixed_cores),
        per_user_ram_gb: Set(fields.per_user_ram_gb),
        per_user_disk_gb: Set(fields.per_user_disk_gb),
        per_user_cores: Set(fields.per_user_cores),
        volume_size_gb: Set(payload.volume_size_gb),
        ssh_user_requested: Set(payload.ssh_user_requested),
        deleted: Set(false),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    insert_instantiation_attributes(
        &txn,
        id,
        payload.instantiation_attributes.as_deref().unwrap_or(&[]),
    )
    .await?;
    insert_account_attributes(&txn, id, payload.account_attributes.as_deref().unwrap_or(&[]))
        .await?;
    insert_security_groups(&txn, id, payload.security_groups.as_deref().unwrap_or(&[])).await?;

    favorite::ActiveModel {
        id: Set(Uuid::now_v7()),
        user_id: Set(creator.id.clone()),
        app_template_id: Set(id),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(template)
}

/// Replace a draft's fields with the supplied full representation.
///
/// Approved releases are immutable: the rejection happens before any data
/// is touched. A successful update always clears `approved`, since editing
/// a draft invalidates any earlier approval readiness.
pub async fn update(
    db: &DatabaseConnection,
    id: Uuid,
    payload: &TemplatePayload,
) -> Result<app_template::Model, Error> {
    let fields = validate(payload)?;

    let txn = db.begin().await?;

    let current = find_active(&txn, id).await?;
    if current.approved {
        return Err(Error::validation(
            "Approved templates are immutable; create a new draft instead",
        ));
    }

    let mut active: app_template::ActiveModel = current.into();
    active.name = Set(fields.name);
    active.description = Set(fields.description);
    active.short_description = Set(payload.short_description.clone());
    active.instantiation_notice = Set(payload.instantiation_notice.clone());
    active.script = Set(payload.script.clone());
    active.image_id = Set(fields.image_id);
    active.public = Set(payload.public);
    active.approved = Set(false);
    active.fixed_ram_gb = Set(fields.fixed_ram_gb);
    active.fixed_disk_gb = Set(fields.fixed_disk_gb);
    active.fixed_cores = Set(fields.fixed_cores);
    active.per_user_ram_gb = Set(fields.per_user_ram_gb);
    active.per_user_disk_gb = Set(fields.per_user_disk_gb);
    active.per_user_cores = Set(fields.per_user_cores);
    active.volume_size_gb = Set(payload.volume_size_gb);
    active.ssh_user_requested = Set(payload.ssh_user_requested);
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&txn).await?;

    if let Some(attrs) = &payload.instantiation_attributes {
        replace_instantiation_attributes(&txn, id, attrs).await?;
    }
    if let Some(attrs) = &payload.account_attributes {
        replace_account_attributes(&txn, id, attrs).await?;
    }
    if let Some(groups) = &payload.security_groups {
        replace_security_groups(&txn, id, groups).await?;
    }

    txn.commit().await?;
    Ok(updated)
}

/// Approve a draft: clone it (with all attribute rows) into a new release
/// row named `<name>-V<version>`, then take the draft out of the public
/// review queue and bump its version. Returns `(release, draft)`.
pub async fn approve(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<(app_template::Model, app_template::Model), Error> {
    let txn = db.begin().await?;

    // Row lock: concurrent approvals of the same draft must serialize on
    // the version counter or they would mint duplicate release names.
    let draft = app_template::Entity::find_by_id(id)
        .filter(app_template::Column::Deleted.eq(false))
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found(format!("AppTemplate {id}")))?;

    let (instantiation, account, groups) = attributes(&txn, id).await?;

    let now = Utc::now().naive_utc();
    let release_id = Uuid::now_v7();
    let draft_version = draft.version;

    // The release name carries the pre-increment version.
    let release = app_template::ActiveModel {
        id: Set(release_id),
        name: Set(format!("{}-V{}", draft.name, draft_version)),
        description: Set(draft.description.clone()),
        short_description: Set(draft.short_description.clone()),
        instantiation_notice: Set(draft.instantiation_notice.clone()),
        script: Set(draft.script.clone()),
        image_id: Set(draft.image_id),
        version: Set(draft_version),
        public: Set(draft.public),
        approved: Set(true),
        creator_id: Set(draft.creator_id.clone()),
        fixed_ram_gb: Set(draft.fixed_ram_gb),
        fixed_disk_gb: Set(draft.fixed_disk_gb),
        fixed_cores: Set(draft.fixed_cores),
        per_user_ram_gb: Set(draft.per_user_ram_gb),
        per_user_disk_gb: Set(draft.per_user_disk_gb),
        per_user_cores: Set(draft.per_user_cores),
        volume_size_gb: Set(draft.volume_size_gb),
        ssh_user_requested: Set(draft.ssh_user_requested),
        deleted: Set(false),
        deleted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let to_specs = |names: Vec<String>| -> Vec<AttributeSpec> {
        names.into_iter().map(|name| AttributeSpec { name }).collect()
    };
    insert_instantiation_attributes(
        &txn,
        release_id,
        &to_specs(instantiation.into_iter().map(|a| a.name).collect()),
    )
    .await?;
    insert_account_attributes(
        &txn,
        release_id,
        &to_specs(account.into_iter().map(|a| a.name).collect()),
    )
    .await?;
    insert_security_groups(
        &txn,
        release_id,
        &to_specs(groups.into_iter().map(|g| g.name).collect()),
    )
    .await?;

    // The draft no longer needs to sit in the review queue.
    let mut active: app_template::ActiveModel = draft.into();
    active.public = Set(false);
    active.version = Set(draft_version + 1);
    active.updated_at = Set(now);
    let draft = active.update(&txn).await?;

    txn.commit().await?;
    Ok((release, draft))
}

/// Take a template out of the approval queue. Idempotent.
pub async fn reject(db: &DatabaseConnection, id: Uuid) -> Result<app_template::Model, Error> {
    let template = find_active(db, id).await?;
    let mut active: app_template::ActiveModel = template.into();
    active.approved = Set(false);
    active.public = Set(false);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

/// Mark a template deleted. Attribute children are intentionally left in
/// place; soft delete does not cascade today.
pub async fn soft_delete(db: &DatabaseConnection, id: Uuid) -> Result<(), Error> {
    let template = find_active(db, id).await?;
    let now = Utc::now().naive_utc();
    let mut active: app_template::ActiveModel = template.into();
    active.deleted = Set(true);
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(())
}

// ---------- query path ----------

/// Base visibility set for a user: own templates, plus public templates.
/// Without the list-all capability the public side is narrowed to
/// public-and-approved.
pub fn visible_condition(user_id: &str, list_all: bool) -> Condition {
    let ownership = app_template::Column::CreatorId.eq(user_id);
    let base = if list_all {
        Condition::any()
            .add(ownership)
            .add(app_template::Column::Public.eq(true))
    } else {
        Condition::any().add(ownership).add(
            Condition::all()
                .add(app_template::Column::Public.eq(true))
                .add(app_template::Column::Approved.eq(true)),
        )
    };
    Condition::all()
        .add(app_template::Column::Deleted.eq(false))
        .add(base)
}

fn lower_like(col: app_template::Column, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col((app_template::Entity, col))))
        .like(LikeExpr::new(pattern).escape('\\'))
}

fn search_condition(term: &str) -> Condition {
    // `%` and `_` in the term are literal characters, not wildcards.
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{escaped}%");
    Condition::any()
        .add(lower_like(app_template::Column::Name, &pattern))
        .add(lower_like(app_template::Column::Description, &pattern))
        .add(lower_like(app_template::Column::ShortDescription, &pattern))
        .add(lower_like(app_template::Column::InstantiationNotice, &pattern))
}

/// List the templates visible to `user`, optionally narrowed by free-text
/// search and explicit public/approved filters.
pub async fn list(
    db: &DatabaseConnection,
    user: &user::Model,
    list_all: bool,
    query: &TemplateQuery,
) -> Result<Vec<app_template::Model>, Error> {
    let mut select = app_template::Entity::find().filter(visible_condition(&user.id, list_all));

    if let Some(term) = query.search.as_deref().filter(|s| !s.is_empty()) {
        select = select.filter(search_condition(term));
    }
    if let Some(public) = query.public {
        select = select.filter(app_template::Column::Public.eq(public));
    }
    if let Some(approved) = query.approved {
        select = select.filter(app_template::Column::Approved.eq(approved));
    }

    Ok(select
        .order_by_asc(app_template::Column::CreatedAt)
        .all(db)
        .await?)
}
