use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "redeem_state")]
#[serde(rename_all = "snake_case")]
pub enum RedeemStateKind {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "redeemed")]
    Redeemed,
}

impl std::fmt::Display for RedeemStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedeemStateKind::Pending => write!(f, "pending"),
            RedeemStateKind::Redeemed => write!(f, "redeemed"),
        }
    }
}

/// 兑换码台账实体
/// 说明:
/// - pending 行: prize_id / redemption_id / redeemer_* / redeemed_at 均为 NULL
/// - redeemed 行: redeemer_* 全部非空; prize_id 为 NULL 表示未中奖
/// - redemption_id: 本次兑换尝试的标识，用于提交结果不确定时回查
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "redeem_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub state: RedeemStateKind,
    pub prize_id: Option<i64>,
    pub redemption_id: Option<Uuid>,
    pub redeemer_name: Option<String>,
    pub redeemer_national_id: Option<String>,
    pub redeemer_city: Option<String>,
    pub redeemer_address: Option<String>,
    pub redeemer_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::prizes::Entity",
        from = "Column::PrizeId",
        to = "super::prizes::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Prize,
}

impl Related<super::prizes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prize.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
