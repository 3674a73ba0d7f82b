//! 持久化存储接口
//!
//! 库存计数与兑换台账是仅有的共享可变状态，全部由存储层持有。
//! 所有修改都以单条条件写完成（版本号 / 状态比较），引擎进程内不做任何缓存或加锁。

pub mod inventory;
pub mod ledger;
pub mod memory;

pub use inventory::{
    DbInventoryStore, DecrementOutcome, DeleteOutcome, InventoryStore, ReservationStatus,
    RestockOutcome,
};
pub use ledger::{DbRedemptionLedger, MarkOutcome, RedemptionLedger};
pub use memory::MemoryStore;

use sea_orm::DbErr;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}
