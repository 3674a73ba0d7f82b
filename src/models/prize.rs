use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::prize_entity;
use crate::error::{AppError, AppResult};

/// 奖品库存快照
///
/// `version` 是读取时刻的乐观锁版本号，扣减/补货时必须原样带回。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Prize {
    pub id: i64,
    pub name: String,
    pub remaining_stock: i64,
    pub version: i64,
}

impl Prize {
    pub fn is_available(&self) -> bool {
        self.remaining_stock > 0
    }
}

impl From<prize_entity::Model> for Prize {
    fn from(m: prize_entity::Model) -> Self {
        Prize {
            id: m.id,
            name: m.name,
            remaining_stock: m.remaining_stock,
            version: m.version,
        }
    }
}

/// 兑换成功后返回给用户的奖品（隐藏库存信息）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WonPrize {
    pub id: i64,
    pub name: String,
}

impl From<&Prize> for WonPrize {
    fn from(p: &Prize) -> Self {
        WonPrize {
            id: p.id,
            name: p.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreatePrizeRequest {
    pub name: String,
    /// 初始库存
    pub stock: i64,
}

impl CreatePrizeRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError("name is required".into()));
        }
        if self.stock <= 0 {
            return Err(AppError::ValidationError(
                "stock must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdatePrizeRequest {
    pub name: String,
}

/// 补货请求：基于版本号的条件写，禁止盲写覆盖库存
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RestockPrizeRequest {
    /// 读取奖品时拿到的 version
    pub expected_version: i64,
    /// 新的剩余库存
    pub remaining_stock: i64,
}

impl RestockPrizeRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.remaining_stock < 0 {
            return Err(AppError::ValidationError("Invalid quantity".into()));
        }
        Ok(())
    }
}
