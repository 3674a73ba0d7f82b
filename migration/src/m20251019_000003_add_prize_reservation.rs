use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Prizes {
    Table,
    LastReservation,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// last_reservation: 扣减时与库存在同一条 UPDATE 中写入，
/// 扣减应答丢失时据此判断扣减是否已生效
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Prizes::Table)
                    .add_column_if_not_exists(ColumnDef::new(Prizes::LastReservation).uuid().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Prizes::Table)
                    .drop_column(Prizes::LastReservation)
                    .to_owned(),
            )
            .await
    }
}
