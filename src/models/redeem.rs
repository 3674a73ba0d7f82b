use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{RedeemerInfo, WonPrize};
use crate::error::{RedeemError, RedeemErrorKind};

/// 兑换请求：兑换码 + 兑换人资料
/// 缺失字段按空串处理，由引擎统一返回 MISSING_FIELDS
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct RedeemRequest {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

impl RedeemRequest {
    pub fn redeemer(&self) -> RedeemerInfo {
        RedeemerInfo {
            name: self.name.clone(),
            national_id: self.national_id.clone(),
            city: self.city.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedeemResponse {
    pub success: bool,
    /// 获得的奖品；库存耗尽时成功兑换但为 null
    pub prize: Option<WonPrize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RedeemErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RedeemResponse {
    pub fn granted(prize: Option<WonPrize>) -> Self {
        RedeemResponse {
            success: true,
            prize,
            error_kind: None,
            message: None,
        }
    }

    pub fn failed(err: &RedeemError) -> Self {
        RedeemResponse {
            success: false,
            prize: None,
            error_kind: Some(err.kind()),
            message: Some(err.to_string()),
        }
    }
}
