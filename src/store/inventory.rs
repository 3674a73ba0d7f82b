use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, SqlErr, UpdateResult,
};
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::entities::{prize_entity as prizes, redeem_code_entity as codes};
use crate::models::Prize;

/// 条件扣减结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    Success,
    /// 读取之后版本已变化（被其他请求抢先修改）或库存已为 0
    Conflict,
    NotFound,
}

/// 扣减调用报错（应答丢失）后回查得到的预留状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    /// 行上记录的预留令牌就是本次的令牌：扣减已生效
    Applied,
    /// 版本号仍为读取时的值：扣减没有生效
    NotApplied,
    /// 版本号已被后续写入推进且令牌被覆盖，无法判断
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestockOutcome {
    Success(Prize),
    Conflict,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// 已有兑换码绑定该奖品，保留审计记录
    InUse,
}

/// 奖品库存存储
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// 有库存奖品的快照，仅代表调用期间某一时刻的状态，不构成预留
    async fn list_available(&self) -> StoreResult<Vec<Prize>>;

    /// 库存 -1，仅当版本号仍为 `observed_version` 且库存 > 0。
    /// 成功时在同一次写入中记下 `reservation`，供应答丢失时回查
    async fn try_decrement(
        &self,
        prize_id: i64,
        observed_version: i64,
        reservation: Uuid,
    ) -> StoreResult<DecrementOutcome>;

    /// 回查一次报错的扣减是否已生效
    async fn reservation_status(
        &self,
        prize_id: i64,
        observed_version: i64,
        reservation: Uuid,
    ) -> StoreResult<ReservationStatus>;

    /// 补偿：归还一个已扣减的单位（相对更新 +1）。奖品不存在时返回 false
    async fn release(&self, prize_id: i64) -> StoreResult<bool>;

    async fn create(&self, name: &str, stock: i64) -> StoreResult<Prize>;

    async fn get(&self, prize_id: i64) -> StoreResult<Option<Prize>>;

    async fn list_all(&self) -> StoreResult<Vec<Prize>>;

    async fn rename(&self, prize_id: i64, name: &str) -> StoreResult<Option<Prize>>;

    /// 补货：与扣减相同的条件写纪律，版本号不匹配则冲突
    async fn restock(
        &self,
        prize_id: i64,
        expected_version: i64,
        new_stock: i64,
    ) -> StoreResult<RestockOutcome>;

    async fn delete(&self, prize_id: i64) -> StoreResult<DeleteOutcome>;
}

pub struct DbInventoryStore {
    pool: Arc<DatabaseConnection>,
}

impl DbInventoryStore {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }
}

#[async_trait]
impl InventoryStore for DbInventoryStore {
    async fn list_available(&self) -> StoreResult<Vec<Prize>> {
        let list = prizes::Entity::find()
            .filter(prizes::Column::RemainingStock.gt(0))
            .order_by_asc(prizes::Column::Id)
            .all(self.pool.as_ref())
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    async fn try_decrement(
        &self,
        prize_id: i64,
        observed_version: i64,
        reservation: Uuid,
    ) -> StoreResult<DecrementOutcome> {
        // 单条条件更新:
        // UPDATE prizes SET remaining_stock = remaining_stock - 1, version = version + 1,
        //        last_reservation = ?
        // WHERE id = ? AND version = ? AND remaining_stock > 0
        let update_result: UpdateResult = prizes::Entity::update_many()
            .col_expr(
                prizes::Column::RemainingStock,
                Expr::col(prizes::Column::RemainingStock).sub(1),
            )
            .col_expr(
                prizes::Column::Version,
                Expr::col(prizes::Column::Version).add(1),
            )
            .col_expr(prizes::Column::LastReservation, Expr::value(reservation))
            .col_expr(prizes::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(prizes::Column::Id.eq(prize_id))
            .filter(prizes::Column::Version.eq(observed_version))
            .filter(prizes::Column::RemainingStock.gt(0))
            .exec(self.pool.as_ref())
            .await?;

        if update_result.rows_affected == 1 {
            return Ok(DecrementOutcome::Success);
        }

        // 未命中：区分 "被抢先修改" 与 "已删除"
        match prizes::Entity::find_by_id(prize_id).one(self.pool.as_ref()).await? {
            Some(_) => Ok(DecrementOutcome::Conflict),
            None => Ok(DecrementOutcome::NotFound),
        }
    }

    async fn reservation_status(
        &self,
        prize_id: i64,
        observed_version: i64,
        reservation: Uuid,
    ) -> StoreResult<ReservationStatus> {
        let Some(model) = prizes::Entity::find_by_id(prize_id).one(self.pool.as_ref()).await? else {
            return Ok(ReservationStatus::NotApplied);
        };
        Ok(reservation_status_of(&model, observed_version, reservation))
    }

    async fn release(&self, prize_id: i64) -> StoreResult<bool> {
        let update_result = prizes::Entity::update_many()
            .col_expr(
                prizes::Column::RemainingStock,
                Expr::col(prizes::Column::RemainingStock).add(1),
            )
            .col_expr(
                prizes::Column::Version,
                Expr::col(prizes::Column::Version).add(1),
            )
            .col_expr(prizes::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(prizes::Column::Id.eq(prize_id))
            .exec(self.pool.as_ref())
            .await?;
        Ok(update_result.rows_affected == 1)
    }

    async fn create(&self, name: &str, stock: i64) -> StoreResult<Prize> {
        let now = Utc::now();
        let model = prizes::ActiveModel {
            name: Set(name.to_string()),
            remaining_stock: Set(stock),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;
        Ok(model.into())
    }

    async fn get(&self, prize_id: i64) -> StoreResult<Option<Prize>> {
        let model = prizes::Entity::find_by_id(prize_id).one(self.pool.as_ref()).await?;
        Ok(model.map(Into::into))
    }

    async fn list_all(&self) -> StoreResult<Vec<Prize>> {
        let list = prizes::Entity::find()
            .order_by_asc(prizes::Column::Id)
            .all(self.pool.as_ref())
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    async fn rename(&self, prize_id: i64, name: &str) -> StoreResult<Option<Prize>> {
        let Some(model) = prizes::Entity::find_by_id(prize_id).one(self.pool.as_ref()).await? else {
            return Ok(None);
        };
        // 只写 name / updated_at 两列，不触碰库存
        let mut am = model.into_active_model();
        am.name = Set(name.to_string());
        am.updated_at = Set(Utc::now());
        let updated = am.update(self.pool.as_ref()).await?;
        Ok(Some(updated.into()))
    }

    async fn restock(
        &self,
        prize_id: i64,
        expected_version: i64,
        new_stock: i64,
    ) -> StoreResult<RestockOutcome> {
        let update_result = prizes::Entity::update_many()
            .col_expr(prizes::Column::RemainingStock, Expr::value(new_stock))
            .col_expr(
                prizes::Column::Version,
                Expr::col(prizes::Column::Version).add(1),
            )
            .col_expr(prizes::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(prizes::Column::Id.eq(prize_id))
            .filter(prizes::Column::Version.eq(expected_version))
            .exec(self.pool.as_ref())
            .await?;

        let current = prizes::Entity::find_by_id(prize_id).one(self.pool.as_ref()).await?;
        match (update_result.rows_affected, current) {
            (1, Some(m)) => Ok(RestockOutcome::Success(m.into())),
            (_, Some(_)) => Ok(RestockOutcome::Conflict),
            (_, None) => Ok(RestockOutcome::NotFound),
        }
    }

    async fn delete(&self, prize_id: i64) -> StoreResult<DeleteOutcome> {
        // DELETE FROM prizes WHERE id = ?
        //   AND NOT EXISTS (SELECT 1 FROM redeem_codes WHERE prize_id = ?)
        let bound = Query::select()
            .expr(Expr::val(1))
            .from(codes::Entity)
            .and_where(codes::Column::PrizeId.eq(prize_id))
            .to_owned();
        let result = prizes::Entity::delete_many()
            .filter(prizes::Column::Id.eq(prize_id))
            .filter(Expr::exists(bound).not())
            .exec(self.pool.as_ref())
            .await;

        match result {
            Ok(res) if res.rows_affected == 1 => Ok(DeleteOutcome::Deleted),
            Ok(_) => match prizes::Entity::find_by_id(prize_id).one(self.pool.as_ref()).await? {
                Some(_) => Ok(DeleteOutcome::InUse),
                None => Ok(DeleteOutcome::NotFound),
            },
            // 检查与删除之间有兑换提交：由外键 RESTRICT 拦下
            Err(e) => match e.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => Ok(DeleteOutcome::InUse),
                _ => Err(StoreError::Database(e)),
            },
        }
    }
}

/// 令牌只由扣减写入，补偿和补货不会改动它
fn reservation_status_of(
    model: &prizes::Model,
    observed_version: i64,
    reservation: Uuid,
) -> ReservationStatus {
    if model.last_reservation == Some(reservation) {
        ReservationStatus::Applied
    } else if model.version == observed_version {
        ReservationStatus::NotApplied
    } else {
        ReservationStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, RuntimeErr};

    fn prize_model(id: i64, stock: i64, version: i64) -> prizes::Model {
        prizes::Model {
            id,
            name: "Tshirt".into(),
            remaining_stock: stock,
            version,
            last_reservation: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_try_decrement_success_when_row_updated() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let store = DbInventoryStore::new(db);

        let outcome = store.try_decrement(1, 0, Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::Success);
    }

    #[tokio::test]
    async fn test_try_decrement_conflict_when_version_moved() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![prize_model(1, 4, 7)]])
            .into_connection();
        let store = DbInventoryStore::new(db);

        let outcome = store.try_decrement(1, 6, Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_try_decrement_not_found_when_prize_deleted() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([Vec::<prizes::Model>::new()])
            .into_connection();
        let store = DbInventoryStore::new(db);

        let outcome = store.try_decrement(9, 0, Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_restock_conflict_on_stale_version() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![prize_model(1, 2, 3)]])
            .into_connection();
        let store = DbInventoryStore::new(db);

        let outcome = store.restock(1, 1, 10).await.unwrap();
        assert_eq!(outcome, RestockOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_restock_returns_fresh_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![prize_model(1, 10, 4)]])
            .into_connection();
        let store = DbInventoryStore::new(db);

        match store.restock(1, 3, 10).await.unwrap() {
            RestockOutcome::Success(p) => {
                assert_eq!(p.remaining_stock, 10);
                assert_eq!(p.version, 4);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_available_maps_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![prize_model(1, 2, 0), prize_model(2, 5, 1)]])
            .into_connection();
        let store = DbInventoryStore::new(db);

        let list = store.list_available().await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(Prize::is_available));
    }

    #[tokio::test]
    async fn test_reservation_status_reads_token_and_version() {
        let ours = Uuid::new_v4();
        let mut applied = prize_model(1, 0, 4);
        applied.last_reservation = Some(ours);
        let mut overwritten = prize_model(1, 0, 6);
        overwritten.last_reservation = Some(Uuid::new_v4());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![applied],
                vec![prize_model(1, 1, 3)],
                vec![overwritten],
                vec![],
            ])
            .into_connection();
        let store = DbInventoryStore::new(db);

        assert_eq!(
            store.reservation_status(1, 3, ours).await.unwrap(),
            ReservationStatus::Applied
        );
        assert_eq!(
            store.reservation_status(1, 3, ours).await.unwrap(),
            ReservationStatus::NotApplied
        );
        assert_eq!(
            store.reservation_status(1, 3, ours).await.unwrap(),
            ReservationStatus::Unknown
        );
        // 奖品已删除：没有可归还的库存
        assert_eq!(
            store.reservation_status(1, 3, ours).await.unwrap(),
            ReservationStatus::NotApplied
        );
    }

    #[tokio::test]
    async fn test_release_reports_missing_prize() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let store = DbInventoryStore::new(db);

        assert!(store.release(1).await.unwrap());
        assert!(!store.release(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_outcomes() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .append_exec_errors([DbErr::Exec(RuntimeErr::Internal("connection reset".into()))])
            .append_query_results([vec![prize_model(2, 0, 5)], vec![]])
            .into_connection();
        let store = DbInventoryStore::new(db);

        assert_eq!(store.delete(1).await.unwrap(), DeleteOutcome::Deleted);
        // 行仍在但未删除：已有兑换码绑定
        assert_eq!(store.delete(2).await.unwrap(), DeleteOutcome::InUse);
        assert_eq!(store.delete(3).await.unwrap(), DeleteOutcome::NotFound);
        // 非约束类错误原样上抛
        assert!(matches!(store.delete(4).await, Err(StoreError::Database(_))));
    }
}
