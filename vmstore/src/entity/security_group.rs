use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "security_group")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub app_template_id: Uuid,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::app_template::Entity",
        from = "Column::AppTemplateId",
        to = "super::app_template::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    AppTemplate,
}

impl Related<super::app_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AppTemplate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
