use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// A VM template. `approved = false` rows are editable drafts; `approved = true`
/// rows are immutable releases created only by the approve step.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "app_template")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub instantiation_notice: Option<String>,
    pub script: Option<String>,
    pub image_id: Uuid,
    pub version: i32,
    pub public: bool,
    pub approved: bool,
    pub creator_id: Option<String>,
    pub fixed_ram_gb: f64,
    pub fixed_disk_gb: f64,
    pub fixed_cores: f64,
    pub per_user_ram_gb: f64,
    pub per_user_disk_gb: f64,
    pub per_user_cores: f64,
    pub volume_size_gb: Option<f64>,
    pub ssh_user_requested: bool,
    pub deleted: bool,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Creator,
    #[sea_orm(has_many = "super::instantiation_attribute::Entity")]
    InstantiationAttribute,
    #[sea_orm(has_many = "super::account_attribute::Entity")]
    AccountAttribute,
    #[sea_orm(has_many = "super::security_group::Entity")]
    SecurityGroup,
    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorite,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::instantiation_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InstantiationAttribute.def()
    }
}

impl Related<super::account_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountAttribute.def()
    }
}

impl Related<super::security_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SecurityGroup.def()
    }
}

impl Related<super::favorite::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorite.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
