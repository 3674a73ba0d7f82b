use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::RedemptionConfig;
use crate::error::RedeemError;
use crate::models::{Grant, Prize, RedeemerInfo};
use crate::store::{
    DecrementOutcome, InventoryStore, MarkOutcome, RedemptionLedger, ReservationStatus, StoreError,
};

/// 补偿（归还库存）的最大尝试次数
const RELEASE_ATTEMPTS: u32 = 3;

/// 库存竞争重试策略：指数退避 + 随机抖动，上限 `max_delay`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RedemptionConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RedemptionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// 第 `retry` 次重试前的等待时间 (retry 从 0 开始)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << retry.min(16))
            .min(self.max_delay);
        let half = exp.as_millis() as u64 / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=half)
        };
        (exp + Duration::from_millis(jitter)).min(self.max_delay)
    }
}

/// 选奖结果：已预留（扣减成功）的奖品，或库存耗尽时的 "未中奖"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    Prize(Prize),
    NoPrize,
}

impl Allocation {
    pub fn grant(&self) -> Grant {
        match self {
            Allocation::Prize(p) => Grant::Prize(p.id),
            Allocation::NoPrize => Grant::NoPrize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemOutcome {
    pub code: String,
    pub allocation: Allocation,
    pub redemption_id: Uuid,
}

/// 兑换分配引擎
///
/// 一次兑换 = 校验兑换码 -> 随机选奖并条件扣减库存 -> 条件写台账。
/// 两个存储之间没有跨表事务：台账提交失败时对已扣减的库存做补偿归还。
/// 引擎本身无共享可变状态，可多实例并行运行在同一存储之上。
#[derive(Clone)]
pub struct AllocationEngine {
    inventory: Arc<dyn InventoryStore>,
    ledger: Arc<dyn RedemptionLedger>,
    policy: RetryPolicy,
}

impl AllocationEngine {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        ledger: Arc<dyn RedemptionLedger>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inventory,
            ledger,
            policy,
        }
    }

    /// 兑换
    ///
    /// 逻辑:
    /// 1. 台账查码: 不存在 -> InvalidCode, 已兑换 -> AlreadyRedeemed
    /// 2. 校验兑换人资料完整性 -> MissingFields，超出列宽 -> InvalidFields
    /// 3. 选奖 + 条件扣减（冲突时用新快照重试，超过上限 -> AllocationExhausted）
    /// 4. 条件写台账 pending -> redeemed；输给并发请求时归还库存
    ///
    /// `deadline` 只在存储调用之间检查，不会中断进行中的写操作。
    pub async fn redeem(
        &self,
        code: &str,
        redeemer: &RedeemerInfo,
        deadline: Option<Instant>,
    ) -> Result<RedeemOutcome, RedeemError> {
        check_deadline(deadline)?;

        let record = self
            .ledger
            .lookup(code)
            .await?
            .ok_or(RedeemError::InvalidCode)?;
        if record.is_redeemed() {
            return Err(RedeemError::AlreadyRedeemed);
        }

        let missing = redeemer.missing_fields();
        if !missing.is_empty() {
            return Err(RedeemError::MissingFields(missing));
        }
        let oversized = redeemer.oversized_fields();
        if !oversized.is_empty() {
            return Err(RedeemError::InvalidFields(oversized));
        }
        let redeemer = redeemer.normalized();

        let allocation = self.select_prize(deadline).await?;

        if let Err(e) = check_deadline(deadline) {
            self.compensate(&allocation).await;
            return Err(e);
        }

        self.commit(code, &redeemer, allocation).await
    }

    /// 随机选择一个有库存的奖品并条件扣减
    async fn select_prize(&self, deadline: Option<Instant>) -> Result<Allocation, RedeemError> {
        let max_attempts = self.policy.max_retries.saturating_add(1);

        for attempt in 0..max_attempts {
            check_deadline(deadline)?;

            let candidates = self.inventory.list_available().await?;
            // rng 不可跨 await 持有
            let picked = {
                let mut rng = rand::thread_rng();
                candidates.choose(&mut rng).cloned()
            };
            let Some(candidate) = picked else {
                return Ok(Allocation::NoPrize);
            };

            let reservation = Uuid::new_v4();
            let outcome = match self
                .inventory
                .try_decrement(candidate.id, candidate.version, reservation)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    return Err(self
                        .resolve_failed_decrement(&candidate, reservation, err)
                        .await);
                }
            };

            match outcome {
                DecrementOutcome::Success => {
                    return Ok(Allocation::Prize(Prize {
                        remaining_stock: candidate.remaining_stock - 1,
                        version: candidate.version + 1,
                        ..candidate
                    }));
                }
                outcome => {
                    log::debug!(
                        "Decrement of prize {} lost ({:?}), attempt {}/{}",
                        candidate.id,
                        outcome,
                        attempt + 1,
                        max_attempts
                    );
                    if attempt + 1 < max_attempts {
                        self.backoff(attempt, deadline).await;
                    }
                }
            }
        }

        Err(RedeemError::AllocationExhausted {
            attempts: max_attempts,
        })
    }

    /// 扣减报错时写入可能已生效：按预留令牌回查，已生效则归还
    async fn resolve_failed_decrement(
        &self,
        candidate: &Prize,
        reservation: Uuid,
        err: StoreError,
    ) -> RedeemError {
        match self
            .inventory
            .reservation_status(candidate.id, candidate.version, reservation)
            .await
        {
            Ok(ReservationStatus::Applied) => {
                log::error!(
                    "Decrement of prize {} reported error but was applied: {err}; releasing",
                    candidate.id
                );
                self.release_unit(candidate.id).await;
            }
            Ok(ReservationStatus::NotApplied) => {
                log::warn!("Decrement of prize {} failed: {err}", candidate.id);
            }
            Ok(ReservationStatus::Unknown) => {
                log::error!(
                    "Decrement outcome for prize {} unknown after error: {err}; \
                     one unit may be held until restored manually",
                    candidate.id
                );
            }
            Err(check_err) => {
                log::error!(
                    "Decrement outcome for prize {} unknown (decrement: {err}; check: {check_err}); \
                     one unit may be held until restored manually",
                    candidate.id
                );
            }
        }
        err.into()
    }

    async fn backoff(&self, retry: u32, deadline: Option<Instant>) {
        let wake = Instant::now() + self.policy.delay_for(retry);
        let wake = deadline.map_or(wake, |d| wake.min(d));
        tokio::time::sleep_until(wake).await;
    }

    async fn commit(
        &self,
        code: &str,
        redeemer: &RedeemerInfo,
        allocation: Allocation,
    ) -> Result<RedeemOutcome, RedeemError> {
        let redemption_id = Uuid::new_v4();
        let outcome = RedeemOutcome {
            code: code.to_string(),
            allocation,
            redemption_id,
        };

        match self
            .ledger
            .mark_redeemed(code, redeemer, outcome.allocation.grant(), redemption_id)
            .await
        {
            Ok(MarkOutcome::Success(_)) => Ok(outcome),
            Ok(MarkOutcome::AlreadyRedeemed) => {
                // 同一兑换码的并发请求先提交
                self.compensate(&outcome.allocation).await;
                Err(RedeemError::AlreadyRedeemed)
            }
            Ok(MarkOutcome::NotFound) => {
                self.compensate(&outcome.allocation).await;
                Err(RedeemError::InvalidCode)
            }
            Err(err) => self.resolve_failed_commit(outcome, err).await,
        }
    }

    /// 台账写入报错时写入可能已生效：回查 redemption_id 判断
    async fn resolve_failed_commit(
        &self,
        outcome: RedeemOutcome,
        err: StoreError,
    ) -> Result<RedeemOutcome, RedeemError> {
        match self.ledger.lookup(&outcome.code).await {
            Ok(Some(record)) if record.redemption_id() == Some(outcome.redemption_id) => {
                log::warn!(
                    "Commit for code {} reported error but was applied: {err}",
                    outcome.code
                );
                Ok(outcome)
            }
            Ok(Some(record)) if record.is_redeemed() => {
                self.compensate(&outcome.allocation).await;
                Err(RedeemError::AlreadyRedeemed)
            }
            Ok(_) => {
                self.compensate(&outcome.allocation).await;
                Err(err.into())
            }
            Err(lookup_err) => {
                // 无法确认是否已提交：宁可少发也不超发，不做归还
                log::error!(
                    "Commit outcome for code {} unknown (commit: {err}; lookup: {lookup_err}); \
                     allocation {:?} left in place",
                    outcome.code,
                    outcome.allocation
                );
                Err(err.into())
            }
        }
    }

    /// 归还已扣减但未能绑定的库存
    async fn compensate(&self, allocation: &Allocation) {
        if let Allocation::Prize(prize) = allocation {
            self.release_unit(prize.id).await;
        }
    }

    async fn release_unit(&self, prize_id: i64) {
        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.inventory.release(prize_id).await {
                Ok(true) => {
                    log::warn!("Released reserved unit of prize {prize_id}");
                    return;
                }
                Ok(false) => {
                    log::error!(
                        "Prize {prize_id} disappeared before its reserved unit could be released"
                    );
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "Release of prize {prize_id} failed (attempt {attempt}/{RELEASE_ATTEMPTS}): {e}"
                    );
                }
            }
        }

        log::error!(
            "Giving up releasing one unit of prize {prize_id}; stock must be restored manually"
        );
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), RedeemError> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(RedeemError::DeadlineExceeded),
        _ => Ok(()),
    }
}
