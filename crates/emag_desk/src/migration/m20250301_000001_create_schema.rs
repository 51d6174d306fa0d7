//! Integrations plus the order and offer tables they own.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_integrations(manager).await?;
        self.create_orders(manager).await?;
        self.create_product_offers(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmagProductOffers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EmagOrders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Integrations::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_integrations(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Integrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Integrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Integrations::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Integrations::Region)
                            .string()
                            .not_null()
                            .default("ro"),
                    )
                    .col(ColumnDef::new(Integrations::Username).string().not_null())
                    .col(ColumnDef::new(Integrations::Password).string().not_null())
                    .col(
                        ColumnDef::new(Integrations::OrdersCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Integrations::OffersCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Integrations::LastOrdersImport)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::LastOffersImport)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::SyncStatus)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    .col(ColumnDef::new(Integrations::LastError).text().null())
                    .col(
                        ColumnDef::new(Integrations::StatusUpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Integrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_orders(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmagOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmagOrders::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EmagOrders::IntegrationId).uuid().not_null())
                    .col(ColumnDef::new(EmagOrders::EmagId).big_integer().not_null())
                    .col(ColumnDef::new(EmagOrders::Status).integer().not_null())
                    .col(ColumnDef::new(EmagOrders::OrderType).integer().null())
                    .col(ColumnDef::new(EmagOrders::PaymentModeId).integer().null())
                    .col(ColumnDef::new(EmagOrders::CustomerName).string().null())
                    .col(
                        ColumnDef::new(EmagOrders::ProductCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EmagOrders::Total)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(EmagOrders::Currency).string().null())
                    .col(ColumnDef::new(EmagOrders::OrderedAt).date_time().not_null())
                    .col(ColumnDef::new(EmagOrders::ModifiedAt).date_time().null())
                    .col(
                        ColumnDef::new(EmagOrders::Payload)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(EmagOrders::ImportedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emag_orders_integration")
                            .from(EmagOrders::Table, EmagOrders::IntegrationId)
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Dedupe key
        manager
            .create_index(
                Index::create()
                    .name("idx_emag_orders_integration_emag_id")
                    .table(EmagOrders::Table)
                    .col(EmagOrders::IntegrationId)
                    .col(EmagOrders::EmagId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Incremental window lookup (newest order per integration)
        manager
            .create_index(
                Index::create()
                    .name("idx_emag_orders_integration_ordered_at")
                    .table(EmagOrders::Table)
                    .col(EmagOrders::IntegrationId)
                    .col((EmagOrders::OrderedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_product_offers(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmagProductOffers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmagProductOffers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::IntegrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::EmagId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmagProductOffers::Name).string().not_null())
                    .col(ColumnDef::new(EmagProductOffers::PartNumber).string().null())
                    .col(
                        ColumnDef::new(EmagProductOffers::PartNumberKey)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::CategoryId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(EmagProductOffers::Brand).string().null())
                    .col(
                        ColumnDef::new(EmagProductOffers::SalePrice)
                            .string()
                            .not_null()
                            .default("0"),
                    )
                    .col(ColumnDef::new(EmagProductOffers::Currency).string().null())
                    .col(
                        ColumnDef::new(EmagProductOffers::Stock)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::Status)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::GeniusEligible)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::Payload)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(EmagProductOffers::ImportedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_emag_product_offers_integration")
                            .from(EmagProductOffers::Table, EmagProductOffers::IntegrationId)
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emag_offers_integration_emag_id")
                    .table(EmagProductOffers::Table)
                    .col(EmagProductOffers::IntegrationId)
                    .col(EmagProductOffers::EmagId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emag_offers_part_number_key")
                    .table(EmagProductOffers::Table)
                    .col(EmagProductOffers::PartNumberKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Integrations {
    Table,
    Id,
    Name,
    Region,
    Username,
    Password,
    OrdersCount,
    OffersCount,
    LastOrdersImport,
    LastOffersImport,
    SyncStatus,
    LastError,
    StatusUpdatedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EmagOrders {
    Table,
    Id,
    IntegrationId,
    EmagId,
    Status,
    OrderType,
    PaymentModeId,
    CustomerName,
    ProductCount,
    Total,
    Currency,
    OrderedAt,
    ModifiedAt,
    Payload,
    ImportedAt,
}

#[derive(DeriveIden)]
enum EmagProductOffers {
    Table,
    Id,
    IntegrationId,
    EmagId,
    Name,
    PartNumber,
    PartNumberKey,
    CategoryId,
    Brand,
    SalePrice,
    Currency,
    Stock,
    Status,
    GeniusEligible,
    Payload,
    ImportedAt,
}
