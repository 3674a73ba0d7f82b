use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{CreatePrizeRequest, Prize, RestockPrizeRequest, UpdatePrizeRequest};
use crate::store::{DeleteOutcome, InventoryStore, RestockOutcome};

/// 奖品目录管理（管理员）
#[derive(Clone)]
pub struct PrizeService {
    inventory: Arc<dyn InventoryStore>,
}

impl PrizeService {
    pub fn new(inventory: Arc<dyn InventoryStore>) -> Self {
        Self { inventory }
    }

    pub async fn create(&self, request: &CreatePrizeRequest) -> AppResult<Prize> {
        request.validate()?;
        let prize = self
            .inventory
            .create(request.name.trim(), request.stock)
            .await?;
        log::info!(
            "Prize {} ({}) created with stock {}",
            prize.id,
            prize.name,
            prize.remaining_stock
        );
        Ok(prize)
    }

    pub async fn list(&self) -> AppResult<Vec<Prize>> {
        Ok(self.inventory.list_all().await?)
    }

    pub async fn get(&self, prize_id: i64) -> AppResult<Prize> {
        self.inventory
            .get(prize_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prize {prize_id} not found")))
    }

    /// 改名不影响库存与版本号
    pub async fn rename(&self, prize_id: i64, request: &UpdatePrizeRequest) -> AppResult<Prize> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("name is required".into()));
        }
        self.inventory
            .rename(prize_id, name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prize {prize_id} not found")))
    }

    /// 补货：仅当 version 未变化时覆盖库存
    pub async fn restock(&self, prize_id: i64, request: &RestockPrizeRequest) -> AppResult<Prize> {
        request.validate()?;
        match self
            .inventory
            .restock(prize_id, request.expected_version, request.remaining_stock)
            .await?
        {
            RestockOutcome::Success(prize) => {
                log::info!(
                    "Prize {} restocked to {} (version {})",
                    prize.id,
                    prize.remaining_stock,
                    prize.version
                );
                Ok(prize)
            }
            RestockOutcome::Conflict => Err(AppError::Conflict(format!(
                "Prize {prize_id} was modified concurrently; reload and retry"
            ))),
            RestockOutcome::NotFound => {
                Err(AppError::NotFound(format!("Prize {prize_id} not found")))
            }
        }
    }

    /// 删除奖品；已被兑换码引用的奖品不可删除
    pub async fn delete(&self, prize_id: i64) -> AppResult<()> {
        match self.inventory.delete(prize_id).await? {
            DeleteOutcome::Deleted => {
                log::info!("Prize {prize_id} deleted");
                Ok(())
            }
            DeleteOutcome::NotFound => {
                Err(AppError::NotFound(format!("Prize {prize_id} not found")))
            }
            DeleteOutcome::InUse => Err(AppError::Conflict(format!(
                "Prize {prize_id} is referenced by redeemed codes"
            ))),
        }
    }
}
