use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

/// Redeem Codes (兑换码台账)
#[derive(DeriveIden)]
enum RedeemCodes {
    Table,
    Id,
    Code,
    State,
    PrizeId,
    RedemptionId,
    RedeemerName,
    RedeemerNationalId,
    RedeemerCity,
    RedeemerAddress,
    RedeemerPhone,
    CreatedAt,
    RedeemedAt,
}

#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 状态只有 pending -> redeemed 一次迁移:
/// - pending 行的 prize_id / redemption_id / redeemer_* 全部为 NULL
/// - redeemed 行的 prize_id 为 NULL 表示 "未中奖" (库存耗尽)
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("redeem_state"))
                    .values(vec![Alias::new("pending"), Alias::new("redeemed")])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RedeemCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RedeemCodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RedeemCodes::Code).string_len(64).not_null())
                    .col(
                        ColumnDef::new(RedeemCodes::State)
                            .custom(Alias::new("redeem_state"))
                            .not_null()
                            .default(Expr::cust("'pending'::redeem_state")),
                    )
                    .col(ColumnDef::new(RedeemCodes::PrizeId).big_integer().null())
                    .col(ColumnDef::new(RedeemCodes::RedemptionId).uuid().null())
                    .col(
                        ColumnDef::new(RedeemCodes::RedeemerName)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RedeemCodes::RedeemerNationalId)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RedeemCodes::RedeemerCity)
                            .string_len(255)
                            .null(),
                    )
                    .col(ColumnDef::new(RedeemCodes::RedeemerAddress).text().null())
                    .col(
                        ColumnDef::new(RedeemCodes::RedeemerPhone)
                            .string_len(32)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RedeemCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(RedeemCodes::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // code 唯一 (生成冲突时插入失败，由生成器重试)
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_redeem_codes_code_unique")
                    .table(RedeemCodes::Table)
                    .col(RedeemCodes::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_redeem_codes_prize")
                    .table(RedeemCodes::Table)
                    .col(RedeemCodes::PrizeId)
                    .to_owned(),
            )
            .await?;

        // 已发放的奖品不可删除：兑换记录需保留 (审计)
        manager
            .alter_table(
                Table::alter()
                    .table(RedeemCodes::Table)
                    .add_foreign_key(
                        TableForeignKey::new()
                            .name("fk_redeem_code_prize")
                            .from_tbl(RedeemCodes::Table)
                            .from_col(RedeemCodes::PrizeId)
                            .to_tbl(Prizes::Table)
                            .to_col(Prizes::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(RedeemCodes::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("redeem_state")).to_owned())
            .await?;
        Ok(())
    }
}
