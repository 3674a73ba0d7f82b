use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RedemptionConfig;
use crate::error::{AppError, AppResult, RedeemError};
use crate::models::{
    GenerateCodesResponse, PaginatedResponse, PaginationParams, RedeemCodePageResponse,
    RedeemCodeQuery, RedeemRequest, WonPrize,
};
use crate::services::{Allocation, AllocationEngine, RetryPolicy};
use crate::store::{InventoryStore, RedemptionLedger};
use crate::utils::generate_redeem_code;

/// 单次批量生成的上限
pub const MAX_CODES_PER_BATCH: u32 = 1000;
/// 单个兑换码撞码后的最大重新生成次数
const MAX_CODE_COLLISIONS: u32 = 5;

#[derive(Clone)]
pub struct RedemptionService {
    engine: AllocationEngine,
    ledger: Arc<dyn RedemptionLedger>,
    deadline: Duration,
    code_length: usize,
}

impl RedemptionService {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        ledger: Arc<dyn RedemptionLedger>,
        config: &RedemptionConfig,
    ) -> Self {
        let engine = AllocationEngine::new(
            inventory,
            ledger.clone(),
            RetryPolicy::from_config(config),
        );
        Self {
            engine,
            ledger,
            deadline: Duration::from_millis(config.deadline_ms),
            code_length: config.code_length,
        }
    }

    /// 兑换（公开接口），返回获得的奖品；库存耗尽时为 None
    pub async fn redeem(&self, request: &RedeemRequest) -> Result<Option<WonPrize>, RedeemError> {
        let code = request.code.trim();
        let deadline = Instant::now() + self.deadline;

        let outcome = self
            .engine
            .redeem(code, &request.redeemer(), Some(deadline))
            .await?;

        let prize = match &outcome.allocation {
            Allocation::Prize(p) => Some(WonPrize::from(p)),
            Allocation::NoPrize => None,
        };
        log::info!(
            "Code {} redeemed (redemption {}), prize: {:?}",
            outcome.code,
            outcome.redemption_id,
            prize.as_ref().map(|p| p.id)
        );
        Ok(prize)
    }

    /// 批量生成并登记兑换码
    pub async fn generate_codes(&self, count: u32) -> AppResult<GenerateCodesResponse> {
        if count == 0 || count > MAX_CODES_PER_BATCH {
            return Err(AppError::ValidationError(format!(
                "count must be between 1 and {MAX_CODES_PER_BATCH}"
            )));
        }

        let mut codes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            codes.push(self.issue_one().await?);
        }
        log::info!("Issued {} redeem codes", codes.len());
        Ok(GenerateCodesResponse { codes })
    }

    async fn issue_one(&self) -> AppResult<String> {
        for _ in 0..MAX_CODE_COLLISIONS {
            let code = generate_redeem_code(self.code_length);
            if self.ledger.issue(&code).await? {
                return Ok(code);
            }
            log::warn!("Generated redeem code collided, regenerating");
        }
        Err(AppError::InternalError(format!(
            "Could not generate a unique redeem code after {MAX_CODE_COLLISIONS} attempts"
        )))
    }

    /// 兑换码列表（分页，最新在前）
    pub async fn list_codes(
        &self,
        query: &RedeemCodeQuery,
    ) -> AppResult<RedeemCodePageResponse> {
        let params = PaginationParams::new(query.page, query.per_page);
        let total = self.ledger.count().await?;
        let items = self
            .ledger
            .list(params.get_offset(), params.get_limit())
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::RedeemStateKind;
    use crate::store::MemoryStore;

    fn service_over(store: &MemoryStore) -> RedemptionService {
        RedemptionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            &RedemptionConfig::default(),
        )
    }

    fn request(code: &str) -> RedeemRequest {
        RedeemRequest {
            code: code.to_string(),
            name: "Siti".into(),
            national_id: "3273000000000002".into(),
            city: "Bandung".into(),
            address: "Jl. Asia Afrika 8".into(),
            phone: "08221234567".into(),
        }
    }

    #[tokio::test]
    async fn test_generate_codes_issues_pending_codes() {
        let store = MemoryStore::new();
        let service = service_over(&store);

        let resp = service.generate_codes(25).await.unwrap();
        assert_eq!(resp.codes.len(), 25);
        assert!(resp.codes.iter().all(|c| c.len() == 8));
        assert_eq!(store.count().await.unwrap(), 25);
        for code in &resp.codes {
            assert!(!store.lookup(code).await.unwrap().unwrap().is_redeemed());
        }
    }

    #[tokio::test]
    async fn test_generate_codes_rejects_out_of_range_count() {
        let service = service_over(&MemoryStore::new());
        assert!(matches!(
            service.generate_codes(0).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.generate_codes(MAX_CODES_PER_BATCH + 1).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_redeem_trims_code_and_returns_prize() {
        let store = MemoryStore::new();
        let prize = store.create("Tshirt", 1).await.unwrap();
        store.issue("ABCD1234").await.unwrap();
        let service = service_over(&store);

        let won = service.redeem(&request("  ABCD1234 ")).await.unwrap();
        assert_eq!(
            won,
            Some(WonPrize {
                id: prize.id,
                name: "Tshirt".into()
            })
        );
        assert_eq!(
            service.redeem(&request("ABCD1234")).await,
            Err(RedeemError::AlreadyRedeemed)
        );
    }

    #[tokio::test]
    async fn test_list_codes_reports_state() {
        let store = MemoryStore::new();
        let service = service_over(&store);
        store.issue("FIRST001").await.unwrap();
        store.issue("SECOND02").await.unwrap();
        service.redeem(&request("FIRST001")).await.unwrap();

        let page = service
            .list_codes(&RedeemCodeQuery {
                page: Some(1),
                per_page: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].code, "SECOND02");
        assert_eq!(page.data[0].state, RedeemStateKind::Pending);

        let page = service
            .list_codes(&RedeemCodeQuery {
                page: Some(2),
                per_page: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(page.data[0].code, "FIRST001");
        assert_eq!(page.data[0].state, RedeemStateKind::Redeemed);
        // 无库存，兑换成功但未中奖
        assert_eq!(page.data[0].prize_id, None);
    }
}
