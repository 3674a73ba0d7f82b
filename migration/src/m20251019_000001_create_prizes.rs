use sea_orm_migration::prelude::*;

/// Prizes (奖品库存表)
#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
    Name,
    RemainingStock,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// remaining_stock 只允许通过条件更新修改:
/// - 扣减: WHERE version = ? AND remaining_stock > 0
/// - 补偿: remaining_stock + 1 (相对更新)
/// - 补货: WHERE version = ?
///
/// version 在每次库存变更时 +1，作为乐观锁版本号
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prizes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prizes::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Prizes::RemainingStock)
                            .big_integer()
                            .not_null()
                            .default(0)
                            // 数据库层面兜底：库存永不为负
                            .check(Expr::col(Prizes::RemainingStock).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Prizes::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Prizes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Prizes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // listAvailable 只扫描有库存的奖品
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_prizes_remaining_stock")
                    .table(Prizes::Table)
                    .col(Prizes::RemainingStock)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Prizes::Table).to_owned())
            .await?;
        Ok(())
    }
}
