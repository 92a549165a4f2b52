use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HisConfigInfo::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(HisConfigInfo::Id).big_integer().not_null())
                    .col(
                        ColumnDef::new(HisConfigInfo::Nid)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HisConfigInfo::DataId).string_len(255).not_null())
                    .col(ColumnDef::new(HisConfigInfo::GroupId).string_len(128).not_null())
                    .col(ColumnDef::new(HisConfigInfo::AppName).string_len(128).null())
                    .col(ColumnDef::new(HisConfigInfo::Content).text().not_null())
                    .col(ColumnDef::new(HisConfigInfo::Md5).string_len(32).null())
                    .col(ColumnDef::new(HisConfigInfo::GmtCreate).date_time().not_null())
                    .col(ColumnDef::new(HisConfigInfo::GmtModified).date_time().not_null())
                    .col(ColumnDef::new(HisConfigInfo::SrcUser).text().null())
                    .col(ColumnDef::new(HisConfigInfo::SrcIp).string_len(50).null())
                    .col(ColumnDef::new(HisConfigInfo::OpType).char_len(10).null())
                    .col(
                        ColumnDef::new(HisConfigInfo::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(HisConfigInfo::EncryptedDataKey).text().null())
                    .col(ColumnDef::new(HisConfigInfo::PublishType).string_len(50).null())
                    .col(ColumnDef::new(HisConfigInfo::GrayName).string_len(50).null())
                    .col(ColumnDef::new(HisConfigInfo::ExtInfo).text().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_hisconfiginfo_gmt_create")
                    .table(HisConfigInfo::Table)
                    .col(HisConfigInfo::GmtCreate)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_hisconfiginfo_gmt_modified")
                    .table(HisConfigInfo::Table)
                    .col(HisConfigInfo::GmtModified)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_hisconfiginfo_did")
                    .table(HisConfigInfo::Table)
                    .col(HisConfigInfo::DataId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TenantInfo::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantInfo::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TenantInfo::Kp).string_len(128).not_null())
                    .col(
                        ColumnDef::new(TenantInfo::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(TenantInfo::TenantName).string_len(128).not_null())
                    .col(ColumnDef::new(TenantInfo::TenantDesc).string_len(256).null())
                    .col(ColumnDef::new(TenantInfo::CreateSource).string_len(32).null())
                    .col(ColumnDef::new(TenantInfo::GmtCreate).big_integer().not_null())
                    .col(ColumnDef::new(TenantInfo::GmtModified).big_integer().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_tenantinfo_kptenantid")
                    .table(TenantInfo::Table)
                    .col(TenantInfo::Kp)
                    .col(TenantInfo::TenantId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TenantInfo::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HisConfigInfo::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum HisConfigInfo {
    Table,
    Id,
    Nid,
    DataId,
    GroupId,
    AppName,
    Content,
    Md5,
    GmtCreate,
    GmtModified,
    SrcUser,
    SrcIp,
    OpType,
    TenantId,
    EncryptedDataKey,
    PublishType,
    GrayName,
    ExtInfo,
}

#[derive(DeriveIden)]
enum TenantInfo {
    Table,
    Id,
    Kp,
    TenantId,
    TenantName,
    TenantDesc,
    CreateSource,
    GmtCreate,
    GmtModified,
}
