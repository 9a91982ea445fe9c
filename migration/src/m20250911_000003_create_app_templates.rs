use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // app_template
        manager
            .create_table(
                Table::create()
                    .table(AppTemplate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppTemplate::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    // Unique backstop for the application-level collision check.
                    .col(
                        ColumnDef::new(AppTemplate::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppTemplate::Description).text().not_null())
                    .col(
                        ColumnDef::new(AppTemplate::ShortDescription)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::InstantiationNotice)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(AppTemplate::Script).text().null())
                    .col(ColumnDef::new(AppTemplate::ImageId).uuid().not_null())
                    .col(
                        ColumnDef::new(AppTemplate::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::Public)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // Nullable so ownership can be re-pointed when a creator is removed.
                    .col(ColumnDef::new(AppTemplate::CreatorId).string().null())
                    .col(ColumnDef::new(AppTemplate::FixedRamGb).double().not_null())
                    .col(
                        ColumnDef::new(AppTemplate::FixedDiskGb)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AppTemplate::FixedCores).double().not_null())
                    .col(
                        ColumnDef::new(AppTemplate::PerUserRamGb)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::PerUserDiskGb)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::PerUserCores)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AppTemplate::VolumeSizeGb).double().null())
                    .col(
                        ColumnDef::new(AppTemplate::SshUserRequested)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(AppTemplate::DeletedAt).timestamp().null())
                    .col(
                        ColumnDef::new(AppTemplate::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AppTemplate::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AppTemplate::Table, AppTemplate::CreatorId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // instantiation_attribute
        manager
            .create_table(
                Table::create()
                    .table(InstantiationAttribute::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InstantiationAttribute::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InstantiationAttribute::AppTemplateId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstantiationAttribute::Name)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                InstantiationAttribute::Table,
                                InstantiationAttribute::AppTemplateId,
                            )
                            .to(AppTemplate::Table, AppTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // account_attribute
        manager
            .create_table(
                Table::create()
                    .table(AccountAttribute::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountAttribute::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AccountAttribute::AppTemplateId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountAttribute::Name)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AccountAttribute::Table, AccountAttribute::AppTemplateId)
                            .to(AppTemplate::Table, AppTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // security_group
        manager
            .create_table(
                Table::create()
                    .table(SecurityGroup::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SecurityGroup::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SecurityGroup::AppTemplateId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SecurityGroup::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(SecurityGroup::Table, SecurityGroup::AppTemplateId)
                            .to(AppTemplate::Table, AppTemplate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SecurityGroup::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AccountAttribute::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(InstantiationAttribute::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(AppTemplate::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AppTemplate {
    Table,
    Id,
    Name,
    Description,
    ShortDescription,
    InstantiationNotice,
    Script,
    ImageId,
    Version,
    Public,
    Approved,
    CreatorId,
    FixedRamGb,
    FixedDiskGb,
    FixedCores,
    PerUserRamGb,
    PerUserDiskGb,
    PerUserCores,
    VolumeSizeGb,
    SshUserRequested,
    Deleted,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum InstantiationAttribute {
    Table,
    Id,
    AppTemplateId,
    Name,
}

#[derive(Iden)]
enum AccountAttribute {
    Table,
    Id,
    AppTemplateId,
    Name,
}

#[derive(Iden)]
enum SecurityGroup {
    Table,
    Id,
    AppTemplateId,
    Name,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
