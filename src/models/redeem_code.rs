use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::PaginatedResponse;
use crate::entities::{RedeemStateKind, redeem_code_entity};
use crate::store::StoreError;

/// 各字段的最大字符数，与 redeem_codes 表的列宽一致（address 为 text，限制在应用层）
pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_NATIONAL_ID_CHARS: usize = 64;
pub const MAX_CITY_CHARS: usize = 255;
pub const MAX_ADDRESS_CHARS: usize = 1024;
pub const MAX_PHONE_CHARS: usize = 32;

/// 兑换人资料（全有或全无，兑换时必须完整）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RedeemerInfo {
    pub name: String,
    pub national_id: String,
    pub city: String,
    pub address: String,
    pub phone: String,
}

impl RedeemerInfo {
    /// 返回为空（去除空白后）的字段名
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("national_id", &self.national_id),
            ("city", &self.city),
            ("address", &self.address),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }

    /// 返回去除空白后超出列宽的字段名
    pub fn oversized_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name, MAX_NAME_CHARS),
            ("national_id", &self.national_id, MAX_NATIONAL_ID_CHARS),
            ("city", &self.city, MAX_CITY_CHARS),
            ("address", &self.address, MAX_ADDRESS_CHARS),
            ("phone", &self.phone, MAX_PHONE_CHARS),
        ]
        .into_iter()
        .filter(|(_, v, max)| v.trim().chars().count() > *max)
        .map(|(k, _, _)| k)
        .collect()
    }

    pub fn normalized(&self) -> Self {
        RedeemerInfo {
            name: self.name.trim().to_string(),
            national_id: self.national_id.trim().to_string(),
            city: self.city.trim().to_string(),
            address: self.address.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// 兑换结果绑定的奖品引用；`NoPrize` 为库存耗尽时的显式 "未中奖"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Prize(i64),
    NoPrize,
}

impl Grant {
    pub fn prize_id(&self) -> Option<i64> {
        match self {
            Grant::Prize(id) => Some(*id),
            Grant::NoPrize => None,
        }
    }
}

/// 兑换码状态。Grant 只存在于 Redeemed 中，保证 "已兑换 <=> 已绑定奖品引用"。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemState {
    Pending,
    Redeemed {
        grant: Grant,
        redeemer: RedeemerInfo,
        redemption_id: Uuid,
        redeemed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemCode {
    pub code: String,
    pub state: RedeemState,
    pub created_at: DateTime<Utc>,
}

impl RedeemCode {
    pub fn pending(code: impl Into<String>) -> Self {
        RedeemCode {
            code: code.into(),
            state: RedeemState::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_redeemed(&self) -> bool {
        matches!(self.state, RedeemState::Redeemed { .. })
    }

    pub fn grant(&self) -> Option<Grant> {
        match &self.state {
            RedeemState::Pending => None,
            RedeemState::Redeemed { grant, .. } => Some(*grant),
        }
    }

    pub fn redemption_id(&self) -> Option<Uuid> {
        match &self.state {
            RedeemState::Pending => None,
            RedeemState::Redeemed { redemption_id, .. } => Some(*redemption_id),
        }
    }
}

impl TryFrom<redeem_code_entity::Model> for RedeemCode {
    type Error = StoreError;

    fn try_from(m: redeem_code_entity::Model) -> Result<Self, Self::Error> {
        let state = match m.state {
            RedeemStateKind::Pending => {
                if m.prize_id.is_some() || m.redemption_id.is_some() {
                    return Err(StoreError::Corrupt(format!(
                        "pending code {} carries a grant",
                        m.code
                    )));
                }
                RedeemState::Pending
            }
            RedeemStateKind::Redeemed => {
                let corrupt = || StoreError::Corrupt(format!("redeemed code {} is incomplete", m.code));
                let redeemer = RedeemerInfo {
                    name: m.redeemer_name.clone().ok_or_else(corrupt)?,
                    national_id: m.redeemer_national_id.clone().ok_or_else(corrupt)?,
                    city: m.redeemer_city.clone().ok_or_else(corrupt)?,
                    address: m.redeemer_address.clone().ok_or_else(corrupt)?,
                    phone: m.redeemer_phone.clone().ok_or_else(corrupt)?,
                };
                RedeemState::Redeemed {
                    grant: m.prize_id.map_or(Grant::NoPrize, Grant::Prize),
                    redeemer,
                    redemption_id: m.redemption_id.ok_or_else(corrupt)?,
                    redeemed_at: m.redeemed_at.ok_or_else(corrupt)?,
                }
            }
        };

        Ok(RedeemCode {
            code: m.code,
            state,
            created_at: m.created_at,
        })
    }
}

/// 台账列表项（管理端）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedeemCodeResponse {
    pub code: String,
    pub state: RedeemStateKind,
    /// 已兑换且中奖时的奖品ID；未中奖或未兑换为 null
    pub prize_id: Option<i64>,
    pub redeemer: Option<RedeemerInfo>,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl From<RedeemCode> for RedeemCodeResponse {
    fn from(rc: RedeemCode) -> Self {
        match rc.state {
            RedeemState::Pending => RedeemCodeResponse {
                code: rc.code,
                state: RedeemStateKind::Pending,
                prize_id: None,
                redeemer: None,
                created_at: rc.created_at,
                redeemed_at: None,
            },
            RedeemState::Redeemed {
                grant,
                redeemer,
                redeemed_at,
                ..
            } => RedeemCodeResponse {
                code: rc.code,
                state: RedeemStateKind::Redeemed,
                prize_id: grant.prize_id(),
                redeemer: Some(redeemer),
                created_at: rc.created_at,
                redeemed_at: Some(redeemed_at),
            },
        }
    }
}

pub type RedeemCodePageResponse = PaginatedResponse<RedeemCodeResponse>;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RedeemCodeQuery {
    /// 页码 (默认 1)
    pub page: Option<u32>,
    /// 每页数量 (默认 20)
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct GenerateCodesRequest {
    /// 生成数量 (1-1000)
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateCodesResponse {
    pub codes: Vec<String>,
}
