use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // domain_records 表
        manager
            .create_table(
                Table::create()
                    .table(DomainRecord::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DomainRecord::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DomainRecord::Domain).string().not_null())
                    .col(
                        ColumnDef::new(DomainRecord::Port)
                            .integer()
                            .not_null()
                            .default(80),
                    )
                    .col(
                        ColumnDef::new(DomainRecord::RecordId)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(DomainRecord::ZoneId)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(DomainRecord::IsDisableCheck)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DomainRecord::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DomainRecord::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(DomainRecord::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domain_records_domain_port")
                    .table(DomainRecord::Table)
                    .col(DomainRecord::Domain)
                    .col(DomainRecord::Port)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // forward_records 表
        manager
            .create_table(
                Table::create()
                    .table(ForwardRecord::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ForwardRecord::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::DomainRecordId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ForwardRecord::ForwardDomain).string().not_null())
                    .col(
                        ColumnDef::new(ForwardRecord::Ip)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::Isp)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::IsBan)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::BanTime)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::Weight)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::RecordType)
                            .string()
                            .not_null()
                            .default("A"),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::LastResolvedAt)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ForwardRecord::ResolveStatus)
                            .string()
                            .not_null()
                            .default("never"),
                    )
                    .col(ColumnDef::new(ForwardRecord::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(ForwardRecord::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_forward_records_domain_record_id")
                    .table(ForwardRecord::Table)
                    .col(ForwardRecord::DomainRecordId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // telegram_admins 表
        manager
            .create_table(
                Table::create()
                    .table(TelegramAdmin::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TelegramAdmin::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::Uid)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::Username)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::FirstName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::LastName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::Role)
                            .string()
                            .not_null()
                            .default("admin"),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::Remark)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::AddedBy)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TelegramAdmin::IsBan)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TelegramAdmin::CreatedAt).big_integer().not_null())
                    .col(ColumnDef::new(TelegramAdmin::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TelegramAdmin::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ForwardRecord::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DomainRecord::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum DomainRecord {
    #[sea_orm(iden = "domain_records")]
    Table,
    Id,
    Domain,
    Port,
    RecordId,
    ZoneId,
    IsDisableCheck,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ForwardRecord {
    #[sea_orm(iden = "forward_records")]
    Table,
    Id,
    DomainRecordId,
    ForwardDomain,
    Ip,
    Isp,
    IsBan,
    BanTime,
    Weight,
    SortOrder,
    RecordType,
    LastResolvedAt,
    ResolveStatus,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TelegramAdmin {
    #[sea_orm(iden = "telegram_admins")]
    Table,
    Id,
    Uid,
    Username,
    FirstName,
    LastName,
    Role,
    Remark,
    AddedBy,
    IsBan,
    CreatedAt,
    UpdatedAt,
}
