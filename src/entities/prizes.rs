use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 奖品库存实体
/// 说明:
/// - remaining_stock: 剩余库存，永不为负 (数据库 CHECK 约束兜底)
/// - version: 乐观锁版本号，每次库存变更 +1
/// - last_reservation: 最近一次成功扣减写入的预留令牌
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "prizes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub remaining_stock: i64,
    pub version: i64,
    pub last_reservation: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::redeem_codes::Entity")]
    RedeemCodes,
}

impl Related<super::redeem_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RedeemCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
