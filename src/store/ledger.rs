use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use super::StoreResult;
use crate::entities::{RedeemStateKind, redeem_code_entity as codes};
use crate::models::{Grant, RedeemCode, RedeemerInfo};

/// 状态迁移结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Success(RedeemCode),
    AlreadyRedeemed,
    NotFound,
}

/// 兑换码台账
#[async_trait]
pub trait RedemptionLedger: Send + Sync {
    async fn lookup(&self, code: &str) -> StoreResult<Option<RedeemCode>>;

    /// pending -> redeemed，仅当写入时状态仍为 pending
    async fn mark_redeemed(
        &self,
        code: &str,
        redeemer: &RedeemerInfo,
        grant: Grant,
        redemption_id: Uuid,
    ) -> StoreResult<MarkOutcome>;

    /// 登记新的 pending 兑换码；code 已存在时返回 false
    async fn issue(&self, code: &str) -> StoreResult<bool>;

    async fn list(&self, offset: u64, limit: u64) -> StoreResult<Vec<RedeemCode>>;

    async fn count(&self) -> StoreResult<u64>;
}

pub struct DbRedemptionLedger {
    pool: Arc<DatabaseConnection>,
}

impl DbRedemptionLedger {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }
}

#[async_trait]
impl RedemptionLedger for DbRedemptionLedger {
    async fn lookup(&self, code: &str) -> StoreResult<Option<RedeemCode>> {
        codes::Entity::find()
            .filter(codes::Column::Code.eq(code))
            .one(self.pool.as_ref())
            .await?
            .map(RedeemCode::try_from)
            .transpose()
    }

    async fn mark_redeemed(
        &self,
        code: &str,
        redeemer: &RedeemerInfo,
        grant: Grant,
        redemption_id: Uuid,
    ) -> StoreResult<MarkOutcome> {
        // UPDATE redeem_codes SET state = 'redeemed', ... WHERE code = ? AND state = 'pending'
        let update_result = codes::Entity::update_many()
            .set(codes::ActiveModel {
                state: Set(RedeemStateKind::Redeemed),
                prize_id: Set(grant.prize_id()),
                redemption_id: Set(Some(redemption_id)),
                redeemer_name: Set(Some(redeemer.name.clone())),
                redeemer_national_id: Set(Some(redeemer.national_id.clone())),
                redeemer_city: Set(Some(redeemer.city.clone())),
                redeemer_address: Set(Some(redeemer.address.clone())),
                redeemer_phone: Set(Some(redeemer.phone.clone())),
                redeemed_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(codes::Column::Code.eq(code))
            .filter(codes::Column::State.eq(RedeemStateKind::Pending))
            .exec(self.pool.as_ref())
            .await?;

        let current = self.lookup(code).await?;
        match (update_result.rows_affected, current) {
            (1, Some(record)) => Ok(MarkOutcome::Success(record)),
            (_, Some(_)) => Ok(MarkOutcome::AlreadyRedeemed),
            (_, None) => Ok(MarkOutcome::NotFound),
        }
    }

    async fn issue(&self, code: &str) -> StoreResult<bool> {
        let model = codes::ActiveModel {
            code: Set(code.to_string()),
            state: Set(RedeemStateKind::Pending),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        // INSERT ... ON CONFLICT (code) DO NOTHING：撞码时影响行数为 0
        let inserted = codes::Entity::insert(model)
            .on_conflict(
                OnConflict::column(codes::Column::Code)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.pool.as_ref())
            .await?;
        Ok(inserted == 1)
    }

    async fn list(&self, offset: u64, limit: u64) -> StoreResult<Vec<RedeemCode>> {
        codes::Entity::find()
            .order_by_desc(codes::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(RedeemCode::try_from)
            .collect()
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(codes::Entity::find().count(self.pool.as_ref()).await?)
    }
}
