use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConfigInfo::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConfigInfo::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConfigInfo::DataId).string_len(255).not_null())
                    .col(ColumnDef::new(ConfigInfo::GroupId).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigInfo::Content).text().not_null())
                    .col(ColumnDef::new(ConfigInfo::Md5).string_len(32).null())
                    .col(ColumnDef::new(ConfigInfo::GmtCreate).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfo::GmtModified).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfo::SrcUser).text().null())
                    .col(ColumnDef::new(ConfigInfo::SrcIp).string_len(50).null())
                    .col(ColumnDef::new(ConfigInfo::AppName).string_len(128).null())
                    .col(
                        ColumnDef::new(ConfigInfo::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(ConfigInfo::CDesc).string_len(256).null())
                    .col(ColumnDef::new(ConfigInfo::CUse).string_len(64).null())
                    .col(ColumnDef::new(ConfigInfo::Effect).string_len(64).null())
                    .col(ColumnDef::new(ConfigInfo::Type).string_len(64).null())
                    .col(ColumnDef::new(ConfigInfo::CSchema).text().null())
                    .col(ColumnDef::new(ConfigInfo::EncryptedDataKey).text().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_configinfo_datagrouptenant")
                    .table(ConfigInfo::Table)
                    .col(ConfigInfo::DataId)
                    .col(ConfigInfo::GroupId)
                    .col(ConfigInfo::TenantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConfigInfoBeta::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConfigInfoBeta::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConfigInfoBeta::DataId).string_len(255).not_null())
                    .col(ColumnDef::new(ConfigInfoBeta::GroupId).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigInfoBeta::AppName).string_len(128).null())
                    .col(ColumnDef::new(ConfigInfoBeta::Content).text().not_null())
                    .col(ColumnDef::new(ConfigInfoBeta::BetaIps).string_len(1024).null())
                    .col(ColumnDef::new(ConfigInfoBeta::Md5).string_len(32).null())
                    .col(ColumnDef::new(ConfigInfoBeta::GmtCreate).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfoBeta::GmtModified).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfoBeta::SrcUser).text().null())
                    .col(ColumnDef::new(ConfigInfoBeta::SrcIp).string_len(50).null())
                    .col(
                        ColumnDef::new(ConfigInfoBeta::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(ConfigInfoBeta::EncryptedDataKey).text().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_configinfobeta_datagrouptenant")
                    .table(ConfigInfoBeta::Table)
                    .col(ConfigInfoBeta::DataId)
                    .col(ConfigInfoBeta::GroupId)
                    .col(ConfigInfoBeta::TenantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConfigInfoTag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConfigInfoTag::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConfigInfoTag::DataId).string_len(255).not_null())
                    .col(ColumnDef::new(ConfigInfoTag::GroupId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(ConfigInfoTag::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(ConfigInfoTag::TagId).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigInfoTag::AppName).string_len(128).null())
                    .col(ColumnDef::new(ConfigInfoTag::Content).text().not_null())
                    .col(ColumnDef::new(ConfigInfoTag::Md5).string_len(32).null())
                    .col(ColumnDef::new(ConfigInfoTag::GmtCreate).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfoTag::GmtModified).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfoTag::SrcUser).text().null())
                    .col(ColumnDef::new(ConfigInfoTag::SrcIp).string_len(50).null())
                    .col(ColumnDef::new(ConfigInfoTag::EncryptedDataKey).text().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_configinfotag_datagrouptenanttag")
                    .table(ConfigInfoTag::Table)
                    .col(ConfigInfoTag::DataId)
                    .col(ConfigInfoTag::GroupId)
                    .col(ConfigInfoTag::TenantId)
                    .col(ConfigInfoTag::TagId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConfigInfoGray::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConfigInfoGray::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConfigInfoGray::DataId).string_len(255).not_null())
                    .col(ColumnDef::new(ConfigInfoGray::GroupId).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigInfoGray::Content).text().not_null())
                    .col(ColumnDef::new(ConfigInfoGray::Md5).string_len(32).null())
                    .col(ColumnDef::new(ConfigInfoGray::SrcUser).text().null())
                    .col(ColumnDef::new(ConfigInfoGray::SrcIp).string_len(100).null())
                    .col(ColumnDef::new(ConfigInfoGray::GmtCreate).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfoGray::GmtModified).date_time().not_null())
                    .col(ColumnDef::new(ConfigInfoGray::AppName).string_len(128).null())
                    .col(
                        ColumnDef::new(ConfigInfoGray::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(ConfigInfoGray::GrayName).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigInfoGray::GrayRule).text().not_null())
                    .col(ColumnDef::new(ConfigInfoGray::EncryptedDataKey).text().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uk_configinfogray_datagrouptenantgray")
                    .table(ConfigInfoGray::Table)
                    .col(ConfigInfoGray::DataId)
                    .col(ConfigInfoGray::GroupId)
                    .col(ConfigInfoGray::TenantId)
                    .col(ConfigInfoGray::GrayName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConfigTagsRelation::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ConfigTagsRelation::Id).big_integer().not_null())
                    .col(ColumnDef::new(ConfigTagsRelation::TagName).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigTagsRelation::TagType).string_len(64).null())
                    .col(ColumnDef::new(ConfigTagsRelation::DataId).string_len(255).not_null())
                    .col(ColumnDef::new(ConfigTagsRelation::GroupId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(ConfigTagsRelation::TenantId)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ConfigTagsRelation::Nid)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_configtagsrelation_id")
                    .table(ConfigTagsRelation::Table)
                    .col(ConfigTagsRelation::Id)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_configtagsrelation_tenant_id")
                    .table(ConfigTagsRelation::Table)
                    .col(ConfigTagsRelation::TenantId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConfigTagsRelation::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConfigInfoGray::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConfigInfoTag::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConfigInfoBeta::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConfigInfo::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConfigInfo {
    Table,
    Id,
    DataId,
    GroupId,
    Content,
    Md5,
    GmtCreate,
    GmtModified,
    SrcUser,
    SrcIp,
    AppName,
    TenantId,
    CDesc,
    CUse,
    Effect,
    Type,
    CSchema,
    EncryptedDataKey,
}

#[derive(DeriveIden)]
enum ConfigInfoBeta {
    Table,
    Id,
    DataId,
    GroupId,
    AppName,
    Content,
    BetaIps,
    Md5,
    GmtCreate,
    GmtModified,
    SrcUser,
    SrcIp,
    TenantId,
    EncryptedDataKey,
}

#[derive(DeriveIden)]
enum ConfigInfoTag {
    Table,
    Id,
    DataId,
    GroupId,
    TenantId,
    TagId,
    AppName,
    Content,
    Md5,
    GmtCreate,
    GmtModified,
    SrcUser,
    SrcIp,
    EncryptedDataKey,
}

#[derive(DeriveIden)]
enum ConfigInfoGray {
    Table,
    Id,
    DataId,
    GroupId,
    Content,
    Md5,
    SrcUser,
    SrcIp,
    GmtCreate,
    GmtModified,
    AppName,
    TenantId,
    GrayName,
    GrayRule,
    EncryptedDataKey,
}

#[derive(DeriveIden)]
enum ConfigTagsRelation {
    Table,
    Id,
    TagName,
    TagType,
    DataId,
    GroupId,
    TenantId,
    Nid,
}
