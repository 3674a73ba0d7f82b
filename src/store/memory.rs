//! 进程内存储实现
//!
//! 库存与台账放在同一把互斥锁之后，每个方法即一次原子的条件写，
//! 语义与 SQL 实现一致。多个引擎实例共享同一个 `MemoryStore`（clone 共享内部状态）
//! 即相当于共享同一个数据库。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    DecrementOutcome, DeleteOutcome, InventoryStore, MarkOutcome, RedemptionLedger,
    ReservationStatus, RestockOutcome, StoreResult,
};
use crate::models::{Grant, Prize, RedeemCode, RedeemState, RedeemerInfo};

#[derive(Default)]
struct MemoryState {
    prizes: BTreeMap<i64, Prize>,
    /// 每个奖品最近一次成功扣减的预留令牌
    reservations: HashMap<i64, Uuid>,
    codes: HashMap<String, RedeemCode>,
    /// 登记顺序，用于分页
    issued: Vec<String>,
    next_prize_id: i64,
}

impl MemoryState {
    fn prize_in_use(&self, prize_id: i64) -> bool {
        self.codes
            .values()
            .any(|c| c.grant() == Some(Grant::Prize(prize_id)))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_available(&self) -> StoreResult<Vec<Prize>> {
        let state = self.state.lock().await;
        Ok(state
            .prizes
            .values()
            .filter(|p| p.is_available())
            .cloned()
            .collect())
    }

    async fn try_decrement(
        &self,
        prize_id: i64,
        observed_version: i64,
        reservation: Uuid,
    ) -> StoreResult<DecrementOutcome> {
        let mut state = self.state.lock().await;
        let Some(prize) = state.prizes.get_mut(&prize_id) else {
            return Ok(DecrementOutcome::NotFound);
        };
        if prize.version != observed_version || prize.remaining_stock <= 0 {
            return Ok(DecrementOutcome::Conflict);
        }
        prize.remaining_stock -= 1;
        prize.version += 1;
        state.reservations.insert(prize_id, reservation);
        Ok(DecrementOutcome::Success)
    }

    async fn reservation_status(
        &self,
        prize_id: i64,
        observed_version: i64,
        reservation: Uuid,
    ) -> StoreResult<ReservationStatus> {
        let state = self.state.lock().await;
        let Some(prize) = state.prizes.get(&prize_id) else {
            return Ok(ReservationStatus::NotApplied);
        };
        if state.reservations.get(&prize_id) == Some(&reservation) {
            Ok(ReservationStatus::Applied)
        } else if prize.version == observed_version {
            Ok(ReservationStatus::NotApplied)
        } else {
            Ok(ReservationStatus::Unknown)
        }
    }

    async fn release(&self, prize_id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.prizes.get_mut(&prize_id) {
            Some(prize) => {
                prize.remaining_stock += 1;
                prize.version += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create(&self, name: &str, stock: i64) -> StoreResult<Prize> {
        let mut state = self.state.lock().await;
        state.next_prize_id += 1;
        let prize = Prize {
            id: state.next_prize_id,
            name: name.to_string(),
            remaining_stock: stock,
            version: 0,
        };
        state.prizes.insert(prize.id, prize.clone());
        Ok(prize)
    }

    async fn get(&self, prize_id: i64) -> StoreResult<Option<Prize>> {
        Ok(self.state.lock().await.prizes.get(&prize_id).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<Prize>> {
        Ok(self.state.lock().await.prizes.values().cloned().collect())
    }

    async fn rename(&self, prize_id: i64, name: &str) -> StoreResult<Option<Prize>> {
        let mut state = self.state.lock().await;
        Ok(state.prizes.get_mut(&prize_id).map(|p| {
            p.name = name.to_string();
            p.clone()
        }))
    }

    async fn restock(
        &self,
        prize_id: i64,
        expected_version: i64,
        new_stock: i64,
    ) -> StoreResult<RestockOutcome> {
        let mut state = self.state.lock().await;
        let Some(prize) = state.prizes.get_mut(&prize_id) else {
            return Ok(RestockOutcome::NotFound);
        };
        if prize.version != expected_version {
            return Ok(RestockOutcome::Conflict);
        }
        prize.remaining_stock = new_stock;
        prize.version += 1;
        Ok(RestockOutcome::Success(prize.clone()))
    }

    async fn delete(&self, prize_id: i64) -> StoreResult<DeleteOutcome> {
        let mut state = self.state.lock().await;
        if !state.prizes.contains_key(&prize_id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if state.prize_in_use(prize_id) {
            return Ok(DeleteOutcome::InUse);
        }
        state.prizes.remove(&prize_id);
        state.reservations.remove(&prize_id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[async_trait]
impl RedemptionLedger for MemoryStore {
    async fn lookup(&self, code: &str) -> StoreResult<Option<RedeemCode>> {
        Ok(self.state.lock().await.codes.get(code).cloned())
    }

    async fn mark_redeemed(
        &self,
        code: &str,
        redeemer: &RedeemerInfo,
        grant: Grant,
        redemption_id: Uuid,
    ) -> StoreResult<MarkOutcome> {
        let mut state = self.state.lock().await;
        let Some(record) = state.codes.get_mut(code) else {
            return Ok(MarkOutcome::NotFound);
        };
        if record.is_redeemed() {
            return Ok(MarkOutcome::AlreadyRedeemed);
        }
        record.state = RedeemState::Redeemed {
            grant,
            redeemer: redeemer.clone(),
            redemption_id,
            redeemed_at: Utc::now(),
        };
        Ok(MarkOutcome::Success(record.clone()))
    }

    async fn issue(&self, code: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if state.codes.contains_key(code) {
            return Ok(false);
        }
        state
            .codes
            .insert(code.to_string(), RedeemCode::pending(code));
        state.issued.push(code.to_string());
        Ok(true)
    }

    async fn list(&self, offset: u64, limit: u64) -> StoreResult<Vec<RedeemCode>> {
        let state = self.state.lock().await;
        // 最新登记的在前，与 SQL 实现的 ORDER BY id DESC 一致
        Ok(state
            .issued
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|c| state.codes.get(c).cloned())
            .collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.state.lock().await.codes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redeemer() -> RedeemerInfo {
        RedeemerInfo {
            name: "Siti".into(),
            national_id: "3273000000000002".into(),
            city: "Bandung".into(),
            address: "Jl. Braga 10".into(),
            phone: "08129876543".into(),
        }
    }

    #[tokio::test]
    async fn test_decrement_requires_matching_version() {
        let store = MemoryStore::new();
        let prize = store.create("Tshirt", 2).await.unwrap();

        assert_eq!(
            store.try_decrement(prize.id, prize.version, Uuid::new_v4()).await.unwrap(),
            DecrementOutcome::Success
        );
        // 旧版本号再次扣减 -> 冲突
        assert_eq!(
            store.try_decrement(prize.id, prize.version, Uuid::new_v4()).await.unwrap(),
            DecrementOutcome::Conflict
        );
        let current = store.get(prize.id).await.unwrap().unwrap();
        assert_eq!(current.remaining_stock, 1);
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_decrement_never_goes_below_zero() {
        let store = MemoryStore::new();
        let prize = store.create("Sticker", 1).await.unwrap();
        store.try_decrement(prize.id, 0, Uuid::new_v4()).await.unwrap();

        let outcome = store.try_decrement(prize.id, 1, Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, DecrementOutcome::Conflict);
        assert_eq!(store.get(prize.id).await.unwrap().unwrap().remaining_stock, 0);
        assert!(store.list_available().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decrement_unknown_prize() {
        let store = MemoryStore::new();
        assert_eq!(
            store.try_decrement(42, 0, Uuid::new_v4()).await.unwrap(),
            DecrementOutcome::NotFound
        );
        assert!(!store.release(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_restores_unit_and_bumps_version() {
        let store = MemoryStore::new();
        let prize = store.create("Mug", 1).await.unwrap();
        store.try_decrement(prize.id, 0, Uuid::new_v4()).await.unwrap();
        assert!(store.release(prize.id).await.unwrap());

        let current = store.get(prize.id).await.unwrap().unwrap();
        assert_eq!(current.remaining_stock, 1);
        assert_eq!(current.version, 2);
    }

    #[tokio::test]
    async fn test_restock_is_conditional() {
        let store = MemoryStore::new();
        let prize = store.create("Cap", 1).await.unwrap();
        store.try_decrement(prize.id, 0, Uuid::new_v4()).await.unwrap();

        // 管理员持有过期版本号
        assert_eq!(
            store.restock(prize.id, 0, 50).await.unwrap(),
            RestockOutcome::Conflict
        );
        match store.restock(prize.id, 1, 50).await.unwrap() {
            RestockOutcome::Success(p) => assert_eq!(p.remaining_stock, 50),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mark_redeemed_only_once() {
        let store = MemoryStore::new();
        assert!(store.issue("Xy12Ab34").await.unwrap());
        assert!(!store.issue("Xy12Ab34").await.unwrap());

        let first = store
            .mark_redeemed("Xy12Ab34", &redeemer(), Grant::NoPrize, Uuid::new_v4())
            .await
            .unwrap();
        assert!(matches!(first, MarkOutcome::Success(_)));

        let second = store
            .mark_redeemed("Xy12Ab34", &redeemer(), Grant::Prize(1), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(second, MarkOutcome::AlreadyRedeemed);

        let record = store.lookup("Xy12Ab34").await.unwrap().unwrap();
        assert_eq!(record.grant(), Some(Grant::NoPrize));

        assert_eq!(
            store
                .mark_redeemed("missing", &redeemer(), Grant::NoPrize, Uuid::new_v4())
                .await
                .unwrap(),
            MarkOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_granted_prize_cannot_be_deleted() {
        let store = MemoryStore::new();
        let granted = store.create("Tshirt", 1).await.unwrap();
        let spare = store.create("Pin", 1).await.unwrap();
        store.issue("Code0001").await.unwrap();
        store
            .mark_redeemed("Code0001", &redeemer(), Grant::Prize(granted.id), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(store.delete(granted.id).await.unwrap(), DeleteOutcome::InUse);
        assert_eq!(store.delete(spare.id).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete(spare.id).await.unwrap(), DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        for code in ["A0000001", "A0000002", "A0000003"] {
            store.issue(code).await.unwrap();
        }
        let page = store.list(0, 2).await.unwrap();
        let codes: Vec<_> = page.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["A0000003", "A0000002"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reservation_status_after_decrement() {
        let store = MemoryStore::new();
        let prize = store.create("Mug", 3).await.unwrap();
        let ours = Uuid::new_v4();

        assert_eq!(
            store.reservation_status(prize.id, 0, ours).await.unwrap(),
            ReservationStatus::NotApplied
        );
        store.try_decrement(prize.id, 0, ours).await.unwrap();
        assert_eq!(
            store.reservation_status(prize.id, 0, ours).await.unwrap(),
            ReservationStatus::Applied
        );
        // 补偿不改动令牌
        store.release(prize.id).await.unwrap();
        assert_eq!(
            store.reservation_status(prize.id, 0, ours).await.unwrap(),
            ReservationStatus::Applied
        );
        // 后续扣减覆盖令牌
        store.try_decrement(prize.id, 2, Uuid::new_v4()).await.unwrap();
        assert_eq!(
            store.reservation_status(prize.id, 0, ours).await.unwrap(),
            ReservationStatus::Unknown
        );
    }
}
