use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_products_table::Migration),
            Box::new(m20250301_000002_create_orders_table::Migration),
            Box::new(m20250301_000003_create_order_lines_table::Migration),
            Box::new(m20250301_000004_create_lease_tables::Migration),
            Box::new(m20250301_000005_create_manifests_table::Migration),
        ]
    }
}

mod m20250301_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Code)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::ManufacturerCode).string().null())
                        .col(ColumnDef::new(Products::Description).string().not_null())
                        .col(ColumnDef::new(Products::Reference).string().null())
                        .col(ColumnDef::new(Products::Unit).string().null())
                        .col(
                            ColumnDef::new(Products::DepartmentCode)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Department).string().null())
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_department_code")
                        .table(Products::Table)
                        .col(Products::DepartmentCode)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Code,
        ManufacturerCode,
        Description,
        Reference,
        Unit,
        DepartmentCode,
        Department,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::Buyer).string().null())
                        .col(ColumnDef::new(Orders::Platform).string().null())
                        .col(
                            ColumnDef::new(Orders::PlacedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::IsKit)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::StatusBucket).string().not_null())
                        .col(
                            ColumnDef::new(Orders::Checked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::UnitCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::ManifestId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_status_bucket")
                        .table(Orders::Table)
                        .col(Orders::StatusBucket)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        OrderNumber,
        Buyer,
        Platform,
        PlacedAt,
        IsKit,
        StatusBucket,
        Checked,
        TotalAmount,
        UnitCount,
        ManifestId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000003_create_order_lines_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_order_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::ProductCode).string().not_null())
                        .col(ColumnDef::new(OrderLines::Sku).string().not_null())
                        .col(ColumnDef::new(OrderLines::Description).string().null())
                        .col(
                            ColumnDef::new(OrderLines::QuantityRequired)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::QuantityDone)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderLines::Status).string().not_null())
                        .col(
                            ColumnDef::new(OrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_lines_natural_key")
                        .table(OrderLines::Table)
                        .col(OrderLines::OrderId)
                        .col(OrderLines::ProductCode)
                        .col(OrderLines::Sku)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // Allocation scans by product with FIFO ordering
            manager
                .create_index(
                    Index::create()
                        .name("idx_order_lines_product_created")
                        .table(OrderLines::Table)
                        .col(OrderLines::ProductCode)
                        .col(OrderLines::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum OrderLines {
        Table,
        Id,
        OrderId,
        ProductCode,
        Sku,
        Description,
        QuantityRequired,
        QuantityDone,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000004_create_lease_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_lease_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PickingLeases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PickingLeases::ProductCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PickingLeases::DepartmentCode)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PickingLeases::Holder).uuid().not_null())
                        .col(
                            ColumnDef::new(PickingLeases::Target)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PickingLeases::Completed)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PickingLeases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PickingLeases::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One active picking lease per operator
            manager
                .create_index(
                    Index::create()
                        .name("idx_picking_leases_holder")
                        .table(PickingLeases::Table)
                        .col(PickingLeases::Holder)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PackingLeases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PackingLeases::OrderNumber)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PackingLeases::Holder).uuid().not_null())
                        .col(ColumnDef::new(PackingLeases::Progress).json().not_null())
                        .col(
                            ColumnDef::new(PackingLeases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PackingLeases::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_packing_leases_holder")
                        .table(PackingLeases::Table)
                        .col(PackingLeases::Holder)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PickingLeases::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PackingLeases::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum PickingLeases {
        Table,
        ProductCode,
        DepartmentCode,
        Holder,
        Target,
        Completed,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum PackingLeases {
        Table,
        OrderNumber,
        Holder,
        Progress,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000005_create_manifests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000005_create_manifests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Manifests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Manifests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Manifests::BatchNumber).string().not_null())
                        .col(ColumnDef::new(Manifests::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Manifests::ClosedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Manifests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_manifests_batch_number")
                        .table(Manifests::Table)
                        .col(Manifests::BatchNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Manifests::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Manifests {
        Table,
        Id,
        BatchNumber,
        CreatedBy,
        ClosedAt,
        CreatedAt,
    }
}
